// Library crate: the API client, prompt-test orchestration and calibration
// runner. main.rs is a thin wrapper over `cli::run`.

pub mod calibration;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod output;
pub mod pagination;
pub mod presets;
pub mod prompt_test;
pub mod resources;
pub mod settings;

pub use client::ScorableClient;
pub use error::{ScorableError, ScorableResult};
