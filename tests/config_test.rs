use clap::Parser;
use scorable::config::*;
use std::time::Duration;

fn parse(args: &[&str]) -> CliArgs {
    let mut argv = vec!["scorable"];
    argv.extend_from_slice(args);
    CliArgs::try_parse_from(argv).unwrap()
}

#[test]
fn test_defaults() {
    assert_eq!(DEFAULT_BASE_URL, "https://api.scorable.ai");
    assert_eq!(POLL_INTERVAL_SECS, 1);
    assert_eq!(DEFAULT_PROMPT_TEST_CONFIG, "prompt-tests.yaml");
}

#[test]
fn test_prompt_test_run_args() {
    let args = parse(&["prompt-test", "run", "-o", "out.json", "--deadline-secs", "30"]);
    match args.command {
        Command::PromptTest(PromptTestCommand::Run {
            config,
            output,
            deadline_secs,
        }) => {
            assert_eq!(config.to_str(), Some("prompt-tests.yaml"));
            assert_eq!(output.unwrap().to_str(), Some("out.json"));
            assert_eq!(deadline_secs, Some(30));
        }
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn test_pt_alias() {
    let args = parse(&["pt", "init", "--force"]);
    assert!(matches!(
        args.command,
        Command::PromptTest(PromptTestCommand::Init { force: true, .. })
    ));
}

#[test]
fn test_judge_list_flags() {
    let args = parse(&["judge", "list", "--not-is-public", "--show-global", "--page-size", "5"]);
    let Command::Judge(JudgeCommand::List(list)) = args.command else {
        panic!("expected judge list");
    };
    assert_eq!(list.page_size, Some(5));
    assert_eq!(tri_state(list.is_public, list.not_is_public), Some(false));
    assert_eq!(tri_state(list.show_global, list.not_show_global), Some(true));
    assert_eq!(tri_state(list.is_preset, list.not_is_preset), None);
}

#[test]
fn test_execute_collects_tags() {
    let args = parse(&[
        "judge", "execute", "j1", "--response", "hi", "--tag", "a", "--tag", "b",
    ]);
    let Command::Judge(JudgeCommand::Execute { judge_id, payload }) = args.command else {
        panic!("expected judge execute");
    };
    assert_eq!(judge_id, "j1");
    assert_eq!(payload.response.as_deref(), Some("hi"));
    assert_eq!(payload.tags, vec!["a", "b"]);
}

#[test]
fn test_client_config_from_args() {
    let mut args = parse(&["--timeout", "5", "--api-url", "http://localhost:9000/", "judge", "get", "x"]);
    args.api_key = Some("key".into());

    let config = ClientConfig::from_args(&args, Some("fallback".into())).unwrap();
    assert_eq!(config.api_key, "key");
    assert_eq!(config.timeout, Duration::from_secs(5));
    assert_eq!(config.normalized_base_url(), "http://localhost:9000");
}

#[test]
fn test_client_config_fallback_key() {
    let mut args = parse(&["judge", "get", "x"]);
    args.api_key = Some("   ".into());
    let config = ClientConfig::from_args(&args, Some("tmp".into())).unwrap();
    assert_eq!(config.api_key, "tmp");

    args.api_key = None;
    let err = ClientConfig::from_args(&args, None).unwrap_err();
    assert!(err.to_string().contains("SCORABLE_API_KEY"));
}
