//! Aggregated view of settled prompt tests and its text rendering.

use colored::Colorize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{info, warn};

use super::PromptTestJob;
use crate::config::COMPARE_URL_BASE;
use crate::error::ScorableResult;

/// Placeholder for a missing cost, latency or score.
pub const UNAVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    High,
    Mid,
    Low,
}

impl ScoreBand {
    /// High above 0.8, low at or below 0.2.
    pub fn of(score: f64) -> Self {
        if score > 0.8 {
            Self::High
        } else if score <= 0.2 {
            Self::Low
        } else {
            Self::Mid
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreColumn {
    pub evaluator_id: String,
    pub name: String,
}

/// One task of one settled job.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub inputs: String,
    pub prompt: String,
    pub model: String,
    pub cost: String,
    pub latency: String,
    pub output: String,
    /// Aligned with [`AggregatedResults::columns`]; `None` when the task has
    /// no result for that evaluator.
    pub scores: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregatedResults {
    pub columns: Vec<ScoreColumn>,
    pub rows: Vec<ResultRow>,
}

/// Union of evaluators declared on the jobs and evaluators that produced a
/// task result, sorted by id.
pub fn score_columns(jobs: &[PromptTestJob]) -> Vec<ScoreColumn> {
    let mut columns: BTreeMap<&str, &str> = BTreeMap::new();
    for job in jobs {
        for evaluator in &job.evaluators {
            columns.entry(&evaluator.id).or_insert(&evaluator.name);
        }
        for result in job.tasks.iter().flat_map(|t| &t.evaluation_results) {
            columns.entry(&result.id).or_insert(&result.name);
        }
    }
    columns
        .into_iter()
        .map(|(id, name)| ScoreColumn {
            evaluator_id: id.to_string(),
            name: name.to_string(),
        })
        .collect()
}

pub fn aggregate(jobs: &[PromptTestJob]) -> AggregatedResults {
    let columns = score_columns(jobs);
    let mut rows = Vec::new();

    for job in jobs {
        for task in &job.tasks {
            let scores = columns
                .iter()
                .map(|col| {
                    task.evaluation_results
                        .iter()
                        .find(|r| r.id == col.evaluator_id)
                        .and_then(|r| r.score)
                })
                .collect();

            rows.push(ResultRow {
                inputs: format_variables(&task.variables),
                prompt: job.prompt.clone(),
                model: job.model.clone(),
                cost: task
                    .cost
                    .clone()
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(|| UNAVAILABLE.to_string()),
                latency: task
                    .model_call_duration
                    .map(|d| format!("{:.3}", d))
                    .unwrap_or_else(|| UNAVAILABLE.to_string()),
                output: task.llm_output.clone().unwrap_or_default(),
                scores,
            });
        }
    }

    AggregatedResults { columns, rows }
}

fn format_variables(vars: &serde_json::Map<String, Value>) -> String {
    vars.iter()
        .map(|(k, v)| match v {
            Value::String(s) => format!("{}: {}", k, s),
            other => format!("{}: {}", k, other),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRow {
    pub id: String,
    pub complete: bool,
    pub finished_tasks: usize,
    pub total_tasks: usize,
}

pub fn progress_rows(jobs: &[PromptTestJob]) -> Vec<ProgressRow> {
    jobs.iter()
        .map(|job| ProgressRow {
            id: job.id.clone(),
            complete: job.is_complete(),
            finished_tasks: job.finished_tasks(),
            total_tasks: job.tasks.len(),
        })
        .collect()
}

// ============================================================================
// Text rendering
// ============================================================================

fn truncate_str(s: &str, max: usize) -> String {
    let flat = s.replace('\n', "; ");
    if flat.chars().count() <= max {
        flat
    } else {
        let head: String = flat.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

pub fn render_progress(jobs: &[PromptTestJob]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "Prompt Test Progress".bold());
    let _ = writeln!(out, "{:<38} {:<12} {:>8}", "Prompt Test ID", "Status", "Tasks");
    for row in progress_rows(jobs) {
        let status = if row.complete {
            format!("{:<12}", "Completed").green()
        } else {
            format!("{:<12}", "Running").yellow()
        };
        let _ = writeln!(
            out,
            "{:<38} {} {:>8}",
            row.id.cyan(),
            status,
            format!("{}/{}", row.finished_tasks, row.total_tasks)
        );
    }
    out
}

pub fn render_results(results: &AggregatedResults) -> String {
    let mut out = String::new();
    if results.rows.is_empty() {
        let _ = writeln!(out, "{}", "No prompt test results to display.".yellow());
        return out;
    }

    let _ = writeln!(out, "{}", "Aggregated Prompt Test Results".bold());
    let mut header = format!(
        "{:<24} {:<30} {:<22} {:<10} {:<11} {:<40}",
        "Inputs", "Prompt", "Model", "Cost", "Latency (s)", "Output"
    );
    for col in &results.columns {
        let _ = write!(header, " {:<12}", truncate_str(&col.name, 12));
    }
    let _ = writeln!(out, "{}", header);

    for row in &results.rows {
        let _ = write!(
            out,
            "{:<24} {:<30} {:<22} {:<10} {:<11} {:<40}",
            truncate_str(&row.inputs, 24).cyan(),
            truncate_str(&row.prompt, 30).blue(),
            truncate_str(&row.model, 22).green(),
            truncate_str(&row.cost, 10),
            row.latency,
            truncate_str(&row.output, 40).magenta(),
        );
        for score in &row.scores {
            let _ = write!(out, " {}", render_score(*score));
        }
        out.push('\n');
    }
    out
}

fn render_score(score: Option<f64>) -> colored::ColoredString {
    match score {
        None => format!("{:<12}", UNAVAILABLE).normal(),
        Some(s) => {
            let cell = format!("{:<12}", s);
            match ScoreBand::of(s) {
                ScoreBand::High => cell.green(),
                ScoreBand::Mid => cell.yellow(),
                ScoreBand::Low => cell.red(),
            }
        }
    }
}

/// Link to the side-by-side comparison of the given jobs.
pub fn compare_url(jobs: &[PromptTestJob]) -> String {
    let ids: Vec<&str> = jobs.iter().map(|j| j.id.as_str()).collect();
    format!("{}?ids={}", COMPARE_URL_BASE, ids.join(","))
}

/// Write the settled jobs as a pretty JSON array. Failures are logged and
/// returned; they do not invalidate the finished run.
pub fn export(jobs: &[PromptTestJob], path: &Path) -> ScorableResult<()> {
    let result: ScorableResult<()> = serde_json::to_string_pretty(jobs)
        .map_err(Into::into)
        .and_then(|json| std::fs::write(path, json).map_err(Into::into));
    match &result {
        Ok(()) => info!(path = %path.display(), jobs = jobs.len(), "Results saved"),
        Err(e) => warn!(path = %path.display(), "Failed to write results: {}", e),
    }
    result
}
