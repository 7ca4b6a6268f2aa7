//! Display events handed to the presentation layer

use crate::normalize::Table;
use serde::Serialize;

/// What happened during a question cycle, in the order it happened
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CycleEvent {
    /// Echo of the user's question
    Question { text: String },
    /// An attempt failed and another one follows
    AttemptFailed {
        attempt: usize,
        max_attempts: usize,
        sql: Option<String>,
        error: String,
    },
    /// The retry budget is spent; reported once
    Exhausted {
        attempts: usize,
        sql: Option<String>,
        error: String,
    },
    GeneratedSql { sql: String },
    ResultTable { table: Table },
    /// The query ran but returned no rows
    EmptyResult,
    /// The query ran but its result could not be turned into a table
    ResultProcessingFailed { message: String },
    /// The cycle stopped on a non-retryable error
    Aborted { message: String },
}

/// Receiver of cycle events (terminal, HTTP response, test recorder)
pub trait EventSink {
    fn emit(&mut self, event: CycleEvent);
}

impl EventSink for Vec<CycleEvent> {
    fn emit(&mut self, event: CycleEvent) {
        self.push(event);
    }
}

/// Sink that drops everything
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: CycleEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = CycleEvent::AttemptFailed {
            attempt: 1,
            max_attempts: 3,
            sql: None,
            error: "boom".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "attempt_failed");
        assert_eq!(json["attempt"], 1);
        assert!(json["sql"].is_null());

        let json = serde_json::to_value(CycleEvent::EmptyResult).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "empty_result" }));
    }
}
