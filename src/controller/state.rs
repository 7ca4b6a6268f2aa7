//! Cycle states and the pure transition rules between them
//!
//! ```text
//! Start -> Generating -> Executing -> Success
//!              ^             |
//!              |             v
//!              +-------- Retrying -> Exhausted
//! ```

use super::memory::Attempt;
use crate::database::RawResult;
use crate::Error;

#[derive(Debug)]
pub enum CycleState {
    Start,
    Generating,
    Executing { sql: String },
    Retrying,
    Success { sql: String, raw: RawResult },
    Exhausted,
}

impl CycleState {
    pub fn name(&self) -> &'static str {
        match self {
            CycleState::Start => "start",
            CycleState::Generating => "generating",
            CycleState::Executing { .. } => "executing",
            CycleState::Retrying => "retrying",
            CycleState::Success { .. } => "success",
            CycleState::Exhausted => "exhausted",
        }
    }
}

/// Tagged result of one attempt step
#[derive(Debug)]
pub enum StepOutcome<T> {
    Done(T),
    /// Counts against the retry budget and is remembered
    Failed(Attempt),
    /// Ends the cycle immediately
    Fatal(Error),
}

/// Sort a step result into the three outcomes the loop distinguishes
pub fn classify<T>(result: crate::Result<T>, sql: Option<&str>) -> StepOutcome<T> {
    match result {
        Ok(value) => StepOutcome::Done(value),
        Err(e) if e.is_retryable() => {
            StepOutcome::Failed(Attempt::failed(sql.map(str::to_string), e.to_string()))
        }
        Err(e) => StepOutcome::Fatal(e),
    }
}

/// Where a cycle goes after `failed_attempts` failures
pub fn after_failure(failed_attempts: usize, max_retries: usize) -> CycleState {
    if failed_attempts < max_retries {
        CycleState::Retrying
    } else {
        CycleState::Exhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_after_failure_is_bounded() {
        assert!(matches!(after_failure(1, 3), CycleState::Retrying));
        assert!(matches!(after_failure(2, 3), CycleState::Retrying));
        assert!(matches!(after_failure(3, 3), CycleState::Exhausted));
        assert!(matches!(after_failure(4, 3), CycleState::Exhausted));
        assert!(matches!(after_failure(1, 1), CycleState::Exhausted));
    }

    #[test]
    fn test_classify() {
        let ok: crate::Result<u8> = Ok(1);
        assert!(matches!(classify(ok, None), StepOutcome::Done(1)));

        let exec: crate::Result<u8> = Err(Error::Execution { message: "no such table: x".into() });
        match classify(exec, Some("SELECT * FROM x")) {
            StepOutcome::Failed(attempt) => {
                assert_eq!(attempt.sql.as_deref(), Some("SELECT * FROM x"));
                assert_eq!(attempt.error, "no such table: x");
            }
            other => panic!("unexpected {:?}", other),
        }

        let generation: crate::Result<u8> = Err(Error::Generation("timeout".into()));
        assert!(matches!(classify(generation, None), StepOutcome::Failed(Attempt { sql: None, .. })));

        let fatal: crate::Result<u8> = Err(Error::Composition("no schema".into()));
        assert!(matches!(classify(fatal, None), StepOutcome::Fatal(Error::Composition(_))));
    }
}
