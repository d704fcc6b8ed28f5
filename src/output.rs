//! Terminal output for the CLI: status lines, JSON dumps and the live
//! prompt-test observer.

use colored::Colorize;
use crossterm::cursor::MoveUp;
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::ExecutableCommand;
use serde::Serialize;
use std::io::{IsTerminal, Write};

use crate::error::ScorableError;
use crate::prompt_test::report::render_progress;
use crate::prompt_test::{PollObserver, PromptTestJob};

pub fn info(message: &str) {
    println!("{} {}", "•".bright_blue(), message);
}

pub fn success(message: &str) {
    println!("{} {}", "✓".bright_green(), message.green());
}

pub fn warn(message: &str) {
    println!("{} {}", "⚠".bright_yellow(), message.yellow());
}

pub fn error(message: &str) {
    eprintln!("{} {}", "✗ Error:".bright_red().bold(), message);
}

/// Pretty-print any serializable value to stdout.
pub fn json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => error(&format!("failed to render JSON: {}", e)),
    }
}

/// Prints prompt-test progress, redrawing the progress table in place when
/// stdout is a terminal and nothing else was printed since the last round.
#[derive(Debug)]
pub struct TerminalObserver {
    redraw: bool,
    /// Terminal rows the last table occupied, wrapped lines included.
    last_table_rows: usize,
    interleaved: bool,
}

impl Default for TerminalObserver {
    fn default() -> Self {
        Self {
            redraw: std::io::stdout().is_terminal(),
            last_table_rows: 0,
            interleaved: true,
        }
    }
}

impl TerminalObserver {
    fn note(&mut self) {
        self.interleaved = true;
    }
}

impl PollObserver for TerminalObserver {
    fn on_job_created(&mut self, job: &PromptTestJob) {
        success(&format!(
            "Created prompt test for model '{}' with ID: {}",
            job.model, job.id
        ));
        self.note();
    }

    fn on_job_creation_failed(&mut self, prompt: &str, model: &str, error: &ScorableError) {
        warn(&format!(
            "Failed to create prompt test for model '{}' with prompt: {} ({})",
            model, prompt, error
        ));
        self.note();
    }

    fn on_fetch_failed(&mut self, job_id: &str, _error: &ScorableError) {
        warn(&format!("Could not retrieve status for prompt test {}", job_id));
        self.note();
    }

    fn on_settled(&mut self, job: &PromptTestJob) {
        success(&format!("Prompt test {} completed.", job.id));
        self.note();
    }

    fn on_round(&mut self, jobs: &[PromptTestJob]) {
        let table = render_progress(jobs);
        let mut stdout = std::io::stdout().lock();
        if self.redraw && !self.interleaved && self.last_table_rows > 0 {
            let up = u16::try_from(self.last_table_rows).unwrap_or(u16::MAX);
            let _ = stdout
                .execute(MoveUp(up))
                .and_then(|out| out.execute(Clear(ClearType::FromCursorDown)));
        }
        let _ = write!(stdout, "{}", table);
        let _ = stdout.flush();
        let columns = terminal::size().map(|(cols, _)| cols as usize).unwrap_or(0);
        self.last_table_rows = rendered_rows(&table, columns);
        self.interleaved = false;
    }
}

/// Rows `text` takes on a terminal `columns` wide, counting the extra rows
/// of lines that wrap. A width of 0 means unknown and counts one row per line.
fn rendered_rows(text: &str, columns: usize) -> usize {
    text.lines()
        .map(|line| {
            let width = visible_width(line);
            if columns == 0 || width == 0 {
                1
            } else {
                width.div_ceil(columns)
            }
        })
        .sum()
}

/// Printable character count, skipping CSI color sequences.
fn visible_width(line: &str) -> usize {
    let mut width = 0;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            if chars.peek() == Some(&'[') {
                chars.next();
                // Parameter bytes, then one final byte.
                while chars.next_if(|next| ('\x20'..='\x3f').contains(next)).is_some() {}
                chars.next();
            }
        } else if !c.is_control() {
            width += 1;
        }
    }
    width
}
