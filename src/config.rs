use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ScorableError, ScorableResult};

/// Scorable CLI: manage judges and evaluators, run prompt tests.
#[derive(Parser, Debug, Clone)]
#[command(name = "scorable", version)]
pub struct CliArgs {
    /// API key (falls back to SCORABLE_API_KEY, then the saved temporary key)
    #[arg(long = "api-key", env = "SCORABLE_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Base URL of the Scorable API
    #[arg(long = "api-url", env = "SCORABLE_API_URL", default_value = DEFAULT_BASE_URL, global = true)]
    pub api_url: String,

    /// Request timeout in seconds
    #[arg(long = "timeout", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS, global = true)]
    pub timeout_secs: u64,

    /// Debug-level logging
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(short = 'l', long = "log-file", global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Judge management commands
    #[command(subcommand)]
    Judge(JudgeCommand),

    /// Evaluator commands
    #[command(subcommand)]
    Evaluator(EvaluatorCommand),

    /// Prompt testing commands
    #[command(subcommand, name = "prompt-test", alias = "pt")]
    PromptTest(PromptTestCommand),

    /// Dataset commands
    #[command(subcommand)]
    Dataset(DatasetCommand),

    /// Execution log commands
    #[command(subcommand, name = "execution-log")]
    ExecutionLog(ExecutionLogCommand),
}

#[derive(Subcommand, Debug, Clone)]
pub enum JudgeCommand {
    /// List judges with optional filters
    List(JudgeListArgs),
    /// Get a specific judge by its ID
    Get { judge_id: String },
    /// Create a new judge
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        intent: String,
        #[arg(long)]
        stage: Option<String>,
        /// JSON list of evaluator references, e.g. '[{"id": "eval-id"}]'
        #[arg(long = "evaluator-references")]
        evaluator_references: Option<String>,
    },
    /// Update an existing judge (PATCH)
    Update {
        judge_id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        stage: Option<String>,
        /// JSON list of evaluator references; "[]" clears them
        #[arg(long = "evaluator-references")]
        evaluator_references: Option<String>,
    },
    /// Delete a judge by its ID
    Delete {
        judge_id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Execute a judge with interaction details
    Execute {
        judge_id: String,
        #[command(flatten)]
        payload: ExecutionArgs,
    },
    /// Execute a judge by name
    ExecuteByName {
        judge_name: String,
        #[command(flatten)]
        payload: ExecutionArgs,
    },
    /// Duplicate an existing judge
    Duplicate { judge_id: String },
    /// Execute a specific judge via the OpenAI compatible API
    ExecOpenai {
        judge_id: String,
        #[command(flatten)]
        args: OpenAiArgs,
    },
    /// Execute a judge via the generic OpenAI API (judge goes in the model field)
    ExecOpenaiGeneric {
        #[command(flatten)]
        args: OpenAiArgs,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct JudgeListArgs {
    #[arg(long = "page-size")]
    pub page_size: Option<u32>,
    #[arg(long)]
    pub cursor: Option<String>,
    #[arg(long)]
    pub search: Option<String>,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub ordering: Option<String>,
    #[arg(long = "is-preset", overrides_with = "not_is_preset")]
    pub is_preset: bool,
    #[arg(long = "not-is-preset")]
    pub not_is_preset: bool,
    #[arg(long = "is-public", overrides_with = "not_is_public")]
    pub is_public: bool,
    #[arg(long = "not-is-public")]
    pub not_is_public: bool,
    #[arg(long = "show-global", overrides_with = "not_show_global")]
    pub show_global: bool,
    #[arg(long = "not-show-global")]
    pub not_show_global: bool,
}

/// Collapse a `--flag/--not-flag` pair into a tri-state filter.
pub fn tri_state(yes: bool, no: bool) -> Option<bool> {
    match (yes, no) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ExecutionArgs {
    /// Request text
    #[arg(long)]
    pub request: Option<String>,
    /// Response text to evaluate (read from stdin when omitted and piped)
    #[arg(long)]
    pub response: Option<String>,
    /// JSON list of context strings, e.g. '["ctx1"]'
    #[arg(long)]
    pub contexts: Option<String>,
    #[arg(long = "expected-output")]
    pub expected_output: Option<String>,
    /// Add one or more tags
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    #[arg(long = "user-id")]
    pub user_id: Option<String>,
    #[arg(long = "session-id")]
    pub session_id: Option<String>,
    /// System prompt that was used for the LLM call
    #[arg(long = "system-prompt")]
    pub system_prompt: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct OpenAiArgs {
    /// Model field of the chat completion request
    #[arg(long)]
    pub model: String,
    /// JSON string of the messages payload
    #[arg(long)]
    pub messages: String,
    /// Optional JSON string for extra_body parameters
    #[arg(long = "extra-body")]
    pub extra_body: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum EvaluatorCommand {
    /// List evaluators
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        name: Option<String>,
        /// Only Scorable-defined evaluators
        #[arg(long = "only-root")]
        only_root: bool,
        #[arg(long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: usize,
    },
    /// Get an evaluator by ID
    Get { evaluator_id: String },
    /// Run an evaluator by ID
    Run {
        evaluator_id: String,
        #[command(flatten)]
        payload: ExecutionArgs,
    },
    /// Run one of the preset evaluators by name (e.g. Clarity)
    RunPreset {
        preset: String,
        #[command(flatten)]
        payload: ExecutionArgs,
    },
    /// Calibrate several evaluator definitions against a shared test set
    CalibrateBatch {
        /// YAML file with a list of evaluator definitions
        #[arg(short = 'f', long = "file")]
        file: PathBuf,
        #[arg(long = "dataset-id")]
        dataset_id: Option<String>,
        /// JSON file with inline test rows (list of string lists)
        #[arg(long = "data")]
        data: Option<PathBuf>,
        #[arg(long, default_value_t = 1)]
        concurrency: usize,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum DatasetCommand {
    /// List datasets
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: usize,
    },
    /// Get a dataset by ID
    Get { dataset_id: String },
    /// Register a dataset, uploading a local file when given
    Create {
        #[arg(long)]
        name: Option<String>,
        /// File to upload (e.g. a CSV)
        #[arg(long)]
        file: Option<PathBuf>,
        /// Register as a test dataset instead of a reference dataset
        #[arg(long)]
        test: bool,
    },
    /// Delete a dataset by ID
    Delete {
        dataset_id: String,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ExecutionLogCommand {
    /// List execution logs
    List {
        /// Filter, e.g. an evaluator id or name
        #[arg(long)]
        search: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: usize,
    },
    /// Get one execution log
    Get { log_id: String },
}

#[derive(Subcommand, Debug, Clone)]
pub enum PromptTestCommand {
    /// Write a starter prompt-tests.yaml in the current directory
    Init {
        #[arg(short = 'c', long = "config", default_value = DEFAULT_PROMPT_TEST_CONFIG)]
        config: PathBuf,
        /// Overwrite without asking
        #[arg(long)]
        force: bool,
    },
    /// Run prompt tests from the configuration file
    Run {
        #[arg(short = 'c', long = "config", default_value = DEFAULT_PROMPT_TEST_CONFIG)]
        config: PathBuf,
        /// Save settled prompt tests as JSON
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
        /// Give up polling after this many seconds (default: wait forever)
        #[arg(long = "deadline-secs")]
        deadline_secs: Option<u64>,
    },
}

/// Connection settings shared by every request a client makes.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

pub const DEFAULT_BASE_URL: &str = "https://api.scorable.ai";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEMO_USER_TIMEOUT_SECS: u64 = 60;
pub const DATASET_UPLOAD_TIMEOUT_SECS: u64 = 120;

// Prompt tests
pub const POLL_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_PROMPT_TEST_CONFIG: &str = "prompt-tests.yaml";
pub const COMPARE_URL_BASE: &str = "https://scorable.ai/prompt-testing/compare";

// Listing
pub const DEFAULT_LIST_LIMIT: usize = 100;

pub const API_KEY_ENV: &str = "SCORABLE_API_KEY";

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build from CLI arguments; `fallback_key` is consulted when neither the
    /// flag nor the environment carried a key.
    pub fn from_args(args: &CliArgs, fallback_key: Option<String>) -> ScorableResult<Self> {
        let api_key = args
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or(fallback_key)
            .ok_or_else(|| {
                ScorableError::config(format!("{} environment variable not set", API_KEY_ENV))
            })?;

        Ok(Self::new(args.api_url.clone(), api_key)
            .with_timeout(Duration::from_secs(args.timeout_secs)))
    }

    /// Base URL without a trailing slash.
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
