//! Command dispatch for the `scorable` binary.

use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Confirm};
use futures::TryStreamExt;
use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::calibration::{self, load_definitions, BatchResult, DatasetSpec};
use crate::client::{create_demo_user, ScorableClient};
use crate::config::{
    tri_state, CliArgs, ClientConfig, Command, DatasetCommand, EvaluatorCommand, ExecutionArgs,
    ExecutionLogCommand, JudgeCommand, JudgeListArgs, OpenAiArgs, PromptTestCommand, API_KEY_ENV,
};
use crate::error::{ScorableError, ScorableResult};
use crate::output::{self, TerminalObserver};
use crate::presets::PresetEvaluator;
use crate::prompt_test::report::{aggregate, compare_url, export, render_results};
use crate::prompt_test::{await_completion, init_config, submit, PollOptions, PromptTestSpec};
use crate::resources::datasets::{CreateDataset, DatasetType};
use crate::resources::evaluators::EvaluatorListParams;
use crate::resources::execution_logs::ExecutionLogListParams;
use crate::resources::judges::{
    CreateJudge, EvaluatorReference, JudgeListParams, OpenAiChatRequest, UpdateJudge,
};
use crate::resources::ExecutionPayload;
use crate::settings::{load_settings, save_settings, settings_path, PersistentSettings};

pub async fn run(args: CliArgs) -> ScorableResult<()> {
    // `init` is purely local and must work without credentials.
    if let Command::PromptTest(PromptTestCommand::Init { config, force }) = &args.command {
        return init_prompt_tests(config, *force);
    }

    let client = connect(&args).await?;
    match args.command {
        Command::Judge(cmd) => judge(&client, cmd).await,
        Command::Evaluator(cmd) => evaluator(&client, cmd).await,
        Command::PromptTest(cmd) => prompt_test(&client, cmd).await,
        Command::Dataset(cmd) => dataset(&client, cmd).await,
        Command::ExecutionLog(cmd) => execution_log(&client, cmd).await,
    }
}

// ============================================================================
// Credentials
// ============================================================================

async fn connect(args: &CliArgs) -> ScorableResult<ScorableClient> {
    let has_key = args.api_key.as_deref().is_some_and(|k| !k.trim().is_empty());
    let fallback = if has_key {
        None
    } else {
        temporary_key(&args.api_url).await?
    };
    let config = ClientConfig::from_args(args, fallback)?;
    debug!(base_url = %config.normalized_base_url(), "Using Scorable API");
    ScorableClient::new(config)
}

/// Saved temporary key, or a freshly issued one when the user agrees.
async fn temporary_key(base_url: &str) -> ScorableResult<Option<String>> {
    let path = settings_path();
    let settings = load_settings(&path);
    if let Some(key) = settings.temporary_api_key.filter(|k| !k.is_empty()) {
        debug!(
            issued_at = ?settings.temporary_key_issued_at,
            "Using temporary API key from {:?}",
            path
        );
        return Ok(Some(key));
    }

    if !(std::io::stdin().is_terminal() && std::io::stdout().is_terminal()) {
        return Ok(None);
    }

    output::warn(&format!("{} environment variable not set.", API_KEY_ENV));
    let create = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt("No API key found. Create a temporary key now?")
        .default(true)
        .interact()
        .unwrap_or(false);
    if !create {
        return Ok(None);
    }

    let key = create_demo_user(base_url).await?;
    save_settings(&path, &PersistentSettings::with_temporary_key(key.clone()));
    info!("Issued temporary API key");
    output::success(&format!("Temporary API key saved to {}", path.display()));
    output::info(&format!(
        "To persist it in your shell: export {}='<your_key>'",
        API_KEY_ENV
    ));
    Ok(Some(key))
}

// ============================================================================
// Shared argument parsing
// ============================================================================

fn parse_json_arg<T: serde::de::DeserializeOwned>(flag: &str, raw: &str) -> ScorableResult<T> {
    serde_json::from_str(raw)
        .map_err(|e| ScorableError::config(format!("invalid JSON for {}: {}", flag, e)))
}

/// Piped stdin stands in for a missing `--response`.
fn read_stdin_response() -> ScorableResult<Option<String>> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }
    let mut buf = String::new();
    stdin.lock().read_to_string(&mut buf)?;
    let trimmed = buf.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

fn execution_payload(args: ExecutionArgs) -> ScorableResult<ExecutionPayload> {
    let contexts = args
        .contexts
        .as_deref()
        .map(|raw| parse_json_arg::<Vec<String>>("--contexts", raw))
        .transpose()?;
    let response = match args.response {
        Some(r) => Some(r),
        None => read_stdin_response()?,
    };

    let payload = ExecutionPayload {
        request: args.request,
        response,
        contexts,
        expected_output: args.expected_output,
        tags: (!args.tags.is_empty()).then_some(args.tags),
        user_id: args.user_id,
        session_id: args.session_id,
        system_prompt: args.system_prompt,
        ..ExecutionPayload::default()
    };
    payload.validate()?;
    Ok(payload)
}

fn evaluator_references(raw: Option<&str>) -> ScorableResult<Option<Vec<EvaluatorReference>>> {
    raw.map(|r| parse_json_arg("--evaluator-references", r))
        .transpose()
}

fn openai_request(args: OpenAiArgs) -> ScorableResult<OpenAiChatRequest> {
    let messages = parse_json_arg("--messages", &args.messages)?;
    let extra_body = match args.extra_body.as_deref() {
        Some(raw) => match serde_json::from_str(raw) {
            Ok(value) => Some(value),
            Err(_) => {
                output::warn("Invalid JSON for --extra-body. Skipping.");
                None
            }
        },
        None => None,
    };
    Ok(OpenAiChatRequest {
        model: args.model,
        messages,
        extra_body,
    })
}

/// Ask before a destructive step; `skip_flag` names the flag that bypasses it.
fn confirm(prompt: &str, skip: bool, skip_flag: &str) -> ScorableResult<bool> {
    if skip {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(ScorableError::config(format!(
            "refusing to proceed without confirmation; pass {}",
            skip_flag
        )));
    }
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()
        .unwrap_or(false))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

// ============================================================================
// judge
// ============================================================================

async fn judge(client: &ScorableClient, cmd: JudgeCommand) -> ScorableResult<()> {
    let judges = client.judges();
    match cmd {
        JudgeCommand::List(args) => list_judges(client, args).await,
        JudgeCommand::Get { judge_id } => {
            let judge = judges.get(&judge_id).await?;
            output::json(&*judge);
            Ok(())
        }
        JudgeCommand::Create {
            name,
            intent,
            stage,
            evaluator_references: refs,
        } => {
            let mut request = CreateJudge::new(name, intent);
            request.stage = stage;
            request.evaluator_references = evaluator_references(refs.as_deref())?.unwrap_or_default();
            let judge = judges.create(&request).await?;
            output::success(&format!("Judge '{}' created with ID {}", judge.name, judge.id));
            output::json(&*judge);
            Ok(())
        }
        JudgeCommand::Update {
            judge_id,
            name,
            stage,
            evaluator_references: refs,
        } => {
            let request = UpdateJudge {
                name,
                stage,
                evaluator_references: evaluator_references(refs.as_deref())?,
            };
            let judge = judges.update(&judge_id, &request).await?;
            output::success(&format!("Judge {} updated", judge.id));
            output::json(&*judge);
            Ok(())
        }
        JudgeCommand::Delete { judge_id, yes } => {
            if !confirm(&format!("Delete judge {}?", judge_id), yes, "--yes")? {
                output::info("Aborted.");
                return Ok(());
            }
            judges.delete(&judge_id).await?;
            output::success(&format!("Judge {} deleted", judge_id));
            Ok(())
        }
        JudgeCommand::Execute { judge_id, payload } => {
            let result = judges.execute(&judge_id, &execution_payload(payload)?).await?;
            output::json(&result);
            Ok(())
        }
        JudgeCommand::ExecuteByName {
            judge_name,
            payload,
        } => {
            let result = judges
                .execute_by_name(&judge_name, &execution_payload(payload)?)
                .await?;
            output::json(&result);
            Ok(())
        }
        JudgeCommand::Duplicate { judge_id } => {
            let judge = judges.duplicate(&judge_id).await?;
            output::success(&format!("Judge {} duplicated as {}", judge_id, judge.id));
            output::json(&*judge);
            Ok(())
        }
        JudgeCommand::ExecOpenai { judge_id, args } => {
            output::info(&format!(
                "Executing judge {} using the OpenAI chat completions format",
                judge_id
            ));
            let result = judges
                .execute_openai(Some(judge_id.as_str()), &openai_request(args)?)
                .await?;
            output::json(&result);
            Ok(())
        }
        JudgeCommand::ExecOpenaiGeneric { args } => {
            output::info(&format!(
                "Executing a judge using the generic OpenAI endpoint: {}",
                args.model
            ));
            let result = judges.execute_openai(None, &openai_request(args)?).await?;
            output::json(&result);
            Ok(())
        }
    }
}

async fn list_judges(client: &ScorableClient, args: JudgeListArgs) -> ScorableResult<()> {
    let params = JudgeListParams {
        search: args.search,
        name: args.name,
        ordering: args.ordering,
        is_preset: tri_state(args.is_preset, args.not_is_preset),
        is_public: tri_state(args.is_public, args.not_is_public),
        show_global: tri_state(args.show_global, args.not_show_global),
    };
    let page = client
        .judges()
        .list_page(&params, args.cursor.as_deref(), args.page_size)
        .await?;

    if page.results.is_empty() {
        output::info("No judges found.");
        return Ok(());
    }

    println!("{}", "Judges".bold());
    println!(
        "{:<38} {:<28} {:<40} {:<26} {:<10}",
        "ID", "Name", "Intent", "Created At", "Status"
    );
    for judge in &page.results {
        println!(
            "{:<38} {:<28} {:<40} {:<26} {:<10}",
            judge.id.cyan(),
            truncate(&judge.name, 28).magenta(),
            truncate(judge.intent.as_deref().unwrap_or(""), 40).green(),
            judge.created_at.as_deref().unwrap_or("").blue(),
            judge.status.as_deref().unwrap_or("").yellow(),
        );
    }
    if let Some(next) = page.next.as_deref().and_then(crate::pagination::extract_cursor) {
        output::info(&format!("Next page cursor: {}", next));
    }
    Ok(())
}

// ============================================================================
// evaluator
// ============================================================================

async fn evaluator(client: &ScorableClient, cmd: EvaluatorCommand) -> ScorableResult<()> {
    let evaluators = client.evaluators();
    match cmd {
        EvaluatorCommand::List {
            search,
            name,
            only_root,
            limit,
        } => {
            let params = EvaluatorListParams {
                search,
                name,
                only_root_evaluators: only_root,
            };
            let found: Vec<_> = evaluators.list(params, limit).try_collect().await?;
            if found.is_empty() {
                output::info("No evaluators found.");
                return Ok(());
            }
            println!("{:<38} {}", "ID", "Name");
            for e in &found {
                println!("{:<38} {}", e.id.cyan(), e.name);
            }
            Ok(())
        }
        EvaluatorCommand::Get { evaluator_id } => {
            let evaluator = evaluators.get(&evaluator_id).await?;
            output::json(&*evaluator);
            Ok(())
        }
        EvaluatorCommand::Run {
            evaluator_id,
            payload,
        } => {
            let result = evaluators
                .run(&evaluator_id, &execution_payload(payload)?)
                .await?;
            output::json(&result);
            Ok(())
        }
        EvaluatorCommand::RunPreset { preset, payload } => {
            let preset: PresetEvaluator = preset.parse()?;
            let result = evaluators
                .preset(preset)
                .run(&execution_payload(payload)?)
                .await?;
            output::json(&result);
            Ok(())
        }
        EvaluatorCommand::CalibrateBatch {
            file,
            dataset_id,
            data,
            concurrency,
        } => calibrate_batch(client, &file, dataset_id, data, concurrency).await,
    }
}

async fn calibrate_batch(
    client: &ScorableClient,
    file: &Path,
    dataset_id: Option<String>,
    data: Option<PathBuf>,
    concurrency: usize,
) -> ScorableResult<()> {
    let rows = data
        .as_deref()
        .map(DatasetSpec::rows_from_file)
        .transpose()?;
    let dataset = DatasetSpec::from_parts(dataset_id, rows)?;
    let definitions = load_definitions(file)?;

    output::info(&format!(
        "Calibrating {} evaluator definitions (concurrency {})",
        definitions.len(),
        concurrency.max(1)
    ));
    let result = calibration::run(client, definitions, dataset, concurrency).await?;
    print_calibration(&result);
    Ok(())
}

fn print_calibration(result: &BatchResult) {
    output::success(&format!("Calibrated {} rows", result.results.len()));

    println!("\n{}", "Errors by model".bold());
    println!("{:<30} {:>8} {:>8}", "Model", "RMS", "MAE");
    for (model, rms) in &result.rms_errors_model {
        let mae = result.mae_errors_model.get(model).copied().unwrap_or_default();
        println!("{:<30} {:>8.4} {:>8.4}", model.green(), rms, mae);
    }

    println!("\n{}", "Errors by prompt".bold());
    println!("{:<50} {:>8} {:>8}", "Prompt", "RMS", "MAE");
    for (prompt, rms) in &result.rms_errors_prompt {
        let mae = result.mae_errors_prompt.get(prompt).copied().unwrap_or_default();
        println!(
            "{:<50} {:>8.4} {:>8.4}",
            truncate(&prompt.replace('\n', " "), 50).blue(),
            rms,
            mae
        );
    }
}

// ============================================================================
// dataset / execution-log
// ============================================================================

async fn dataset(client: &ScorableClient, cmd: DatasetCommand) -> ScorableResult<()> {
    let datasets = client.datasets();
    match cmd {
        DatasetCommand::List { search, limit } => {
            let found: Vec<_> = datasets.list(search, limit).try_collect().await?;
            if found.is_empty() {
                output::info("No datasets found.");
                return Ok(());
            }
            println!("{:<38} {:<40} {}", "ID", "Name", "Type");
            for d in &found {
                println!(
                    "{:<38} {:<40} {}",
                    d.id.cyan(),
                    truncate(d.name.as_deref().unwrap_or(""), 40),
                    d.kind.map(|k| k.as_str()).unwrap_or("")
                );
            }
            Ok(())
        }
        DatasetCommand::Get { dataset_id } => {
            output::json(&datasets.get(&dataset_id).await?);
            Ok(())
        }
        DatasetCommand::Create { name, file, test } => {
            let kind = if test {
                DatasetType::Test
            } else {
                DatasetType::Reference
            };
            let request = CreateDataset {
                name,
                kind,
                file,
            };
            let created = datasets.create(request).await?;
            output::success(&format!("Dataset created with ID {}", created.id));
            output::json(&created);
            Ok(())
        }
        DatasetCommand::Delete { dataset_id, yes } => {
            if !confirm(&format!("Delete dataset {}?", dataset_id), yes, "--yes")? {
                output::info("Aborted.");
                return Ok(());
            }
            datasets.delete(&dataset_id).await?;
            output::success(&format!("Dataset {} deleted", dataset_id));
            Ok(())
        }
    }
}

async fn execution_log(client: &ScorableClient, cmd: ExecutionLogCommand) -> ScorableResult<()> {
    let logs = client.execution_logs();
    match cmd {
        ExecutionLogCommand::List {
            search,
            tags,
            limit,
        } => {
            let params = ExecutionLogListParams {
                search,
                tags,
                include: Vec::new(),
            };
            let found: Vec<_> = logs.list(params, limit).try_collect().await?;
            if found.is_empty() {
                output::info("No execution logs found.");
                return Ok(());
            }
            println!("{:<38} {:<8} {}", "ID", "Score", "Created At");
            for log in &found {
                let score = log
                    .score
                    .map(|s| format!("{:.2}", s))
                    .unwrap_or_else(|| "N/A".to_string());
                println!(
                    "{:<38} {:<8} {}",
                    log.id.cyan(),
                    score,
                    log.created_at.as_deref().unwrap_or("")
                );
            }
            Ok(())
        }
        ExecutionLogCommand::Get { log_id } => {
            output::json(&logs.get(&log_id).await?);
            Ok(())
        }
    }
}

// ============================================================================
// prompt-test
// ============================================================================

fn init_prompt_tests(path: &Path, force: bool) -> ScorableResult<()> {
    let overwrite = if path.exists() && !force {
        output::warn(&format!("'{}' already exists.", path.display()));
        confirm("Do you want to overwrite it?", false, "--force")?
    } else {
        true
    };
    if !overwrite {
        output::info("Aborted.");
        return Ok(());
    }
    init_config(path, true)?;
    output::success(&format!("'{}' created successfully.", path.display()));
    output::info("Update the file with your prompt test details and run `scorable prompt-test run`.");
    Ok(())
}

async fn prompt_test(client: &ScorableClient, cmd: PromptTestCommand) -> ScorableResult<()> {
    match cmd {
        PromptTestCommand::Init { config, force } => init_prompt_tests(&config, force),
        PromptTestCommand::Run {
            config,
            output: output_path,
            deadline_secs,
        } => run_prompt_tests(client, &config, output_path.as_deref(), deadline_secs).await,
    }
}

async fn run_prompt_tests(
    client: &ScorableClient,
    config: &Path,
    output_path: Option<&Path>,
    deadline_secs: Option<u64>,
) -> ScorableResult<()> {
    let spec = PromptTestSpec::load(config)?;
    let mut observer = TerminalObserver::default();

    output::info("Starting prompt tests");
    let mut registry = submit(client, &spec, &mut observer).await?;

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = stop_tx.send(true);
        }
    });

    let mut options = PollOptions::default().with_stop(stop_rx);
    if let Some(secs) = deadline_secs {
        options = options.with_deadline(Duration::from_secs(secs));
    }

    output::info("Waiting for prompt tests to complete...");
    let settled = await_completion(client, &mut registry, options, &mut observer).await?;
    output::success("All prompt tests completed.");

    print!("{}", render_results(&aggregate(&settled)));

    if let Some(path) = output_path {
        match export(&settled, path) {
            Ok(()) => output::success(&format!("Results saved to {}", path.display())),
            Err(e) => output::error(&format!(
                "Failed to write results to {}: {}",
                path.display(),
                e
            )),
        }
    }

    output::info(&format!(
        "View full results in the browser:\n{}",
        compare_url(&settled)
    ));
    Ok(())
}
