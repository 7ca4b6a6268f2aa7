//! Terminal rendering of cycle events

use crate::controller::{CycleEvent, EventSink};
use crate::ui::output::{muted, sql_block};
use crate::ui::table::result_table;
use crate::ui::{theme, Icons, Spinner};
use owo_colors::OwoColorize;

/// Lines to print for one event
pub fn format_event(event: &CycleEvent) -> String {
    match event {
        CycleEvent::Question { text } => {
            format!("{} {}", Icons::QUESTION, text.style(theme().header.clone()))
        }
        CycleEvent::AttemptFailed {
            attempt,
            max_attempts,
            sql,
            error,
        } => {
            let mut out = format!(
                "{} {}",
                Icons::RETRY,
                format!("Attempt {}/{} failed, retrying", attempt, max_attempts).style(theme().warn.clone())
            );
            if let Some(sql) = sql {
                out.push('\n');
                out.push_str(&sql_block(sql));
            }
            out.push_str(&format!("\n    {}", muted(error)));
            out
        }
        CycleEvent::Exhausted { attempts, sql, error } => {
            let mut out = format!(
                "{} {}",
                Icons::CROSS,
                format!("No working query after {} attempts", attempts).style(theme().error.clone())
            );
            if let Some(sql) = sql {
                out.push_str("\n  Last SQL:\n");
                out.push_str(&sql_block(sql));
            }
            out.push_str(&format!("\n  Last error: {}", error));
            out
        }
        CycleEvent::GeneratedSql { sql } => {
            format!("{} {}\n{}", Icons::BRAIN, "Generated SQL".style(theme().success.clone()), sql_block(sql))
        }
        CycleEvent::ResultTable { table } => {
            format!("{}\n{}", result_table(table), muted(&format!("{} rows", table.row_count())))
        }
        CycleEvent::EmptyResult => {
            format!("{} {}", Icons::EMPTY, "The query returned no rows".style(theme().warn.clone()))
        }
        CycleEvent::ResultProcessingFailed { message } => {
            format!("{} {}", Icons::WARN, format!("Could not read the result: {}", message).style(theme().error.clone()))
        }
        CycleEvent::Aborted { message } => {
            format!("{} {}", Icons::CROSS, message.style(theme().error.clone()))
        }
    }
}

/// Prints events as they arrive, with a spinner running between them
pub struct TerminalSink {
    spinner: Option<Spinner>,
}

impl TerminalSink {
    pub fn new() -> Self {
        Self { spinner: None }
    }

    /// Stop the spinner if a cycle ended without a final event
    pub fn finish(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for TerminalSink {
    fn emit(&mut self, event: CycleEvent) {
        let text = format_event(&event);
        match &self.spinner {
            Some(spinner) => spinner.suspend(|| println!("{}", text)),
            None => println!("{}", text),
        }

        match event {
            CycleEvent::Question { .. } => {
                self.spinner = Some(Spinner::new("Generating SQL..."));
            }
            CycleEvent::AttemptFailed { attempt, max_attempts, .. } => {
                if let Some(spinner) = &self.spinner {
                    spinner.set_message(&format!("Generating SQL (attempt {}/{})...", attempt + 1, max_attempts));
                }
            }
            CycleEvent::GeneratedSql { .. } => {
                if let Some(spinner) = &self.spinner {
                    spinner.set_message("Reading result...");
                }
            }
            _ => self.finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{Cell, Table};

    fn plain(event: &CycleEvent) -> String {
        console::strip_ansi_codes(&format_event(event)).to_string()
    }

    #[test]
    fn test_attempt_failed_shows_sql_and_error() {
        let out = plain(&CycleEvent::AttemptFailed {
            attempt: 1,
            max_attempts: 3,
            sql: Some("SELECT x FROM \"sales\"".into()),
            error: "no such column: x".into(),
        });
        assert!(out.contains("Attempt 1/3 failed"));
        assert!(out.contains("SELECT x FROM \"sales\""));
        assert!(out.contains("no such column: x"));
    }

    #[test]
    fn test_exhausted_without_sql() {
        let out = plain(&CycleEvent::Exhausted {
            attempts: 3,
            sql: None,
            error: "model timed out".into(),
        });
        assert!(out.contains("after 3 attempts"));
        assert!(!out.contains("Last SQL"));
        assert!(out.contains("Last error: model timed out"));
    }

    #[test]
    fn test_result_table_event() {
        let out = plain(&CycleEvent::ResultTable {
            table: Table {
                columns: vec!["n".into()],
                rows: vec![vec![Cell::Integer(7)]],
            },
        });
        assert!(out.contains('7'));
        assert!(out.contains("1 rows"));
    }
}
