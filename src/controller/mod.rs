//! Retry Controller - the bounded generate/execute loop
//!
//! One question is one cycle. Each attempt composes a fresh prompt from the
//! schema, the question, the exemplar and every failure seen so far in the
//! cycle, asks the model for SQL and runs it. Generation and execution
//! failures are remembered and retried until `max_retries` attempts have
//! failed; everything else ends the cycle at once. Attempts never overlap.

pub mod events;
pub mod memory;
pub mod state;

pub use events::{CycleEvent, EventSink, NullSink};
pub use memory::{Attempt, Memory};
pub use state::{CycleState, StepOutcome};

use crate::config::{Config, ExemplarPolicy};
use crate::database::{Database, RawResult, SchemaInfo};
use crate::exemplar::{ExampleStore, Exemplar};
use crate::llm::QueryGenerator;
use crate::normalize::{normalize, Table};
use crate::prompt::{compose, PromptOptions};
use crate::{Error, Result};
use serde::Serialize;
use state::{after_failure, classify};
use std::sync::Arc;

/// Loop parameters fixed at startup
#[derive(Debug, Clone, Copy)]
pub struct ControllerSettings {
    pub max_retries: usize,
    pub exemplar_policy: ExemplarPolicy,
    pub prompt: PromptOptions,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            max_retries: crate::config::DEFAULT_MAX_RETRIES,
            exemplar_policy: ExemplarPolicy::default(),
            prompt: PromptOptions::default(),
        }
    }
}

impl From<&Config> for ControllerSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries,
            exemplar_policy: config.exemplar_policy,
            prompt: PromptOptions {
                top_k: config.top_k,
                memory_error_chars: config.memory_error_chars,
            },
        }
    }
}

/// How a cycle ended when it did not abort
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleOutcome {
    Answered { sql: String, table: Table },
    /// No SQL is surfaced; only the last failure is kept for reporting
    Exhausted { attempts: usize, last: Option<Attempt> },
}

impl CycleOutcome {
    pub fn is_answered(&self) -> bool {
        matches!(self, CycleOutcome::Answered { .. })
    }
}

pub struct RetryController {
    schema: Arc<SchemaInfo>,
    examples: Arc<dyn ExampleStore>,
    generator: QueryGenerator,
    database: Arc<dyn Database>,
    settings: ControllerSettings,
}

impl RetryController {
    pub fn new(
        schema: Arc<SchemaInfo>,
        examples: Arc<dyn ExampleStore>,
        generator: QueryGenerator,
        database: Arc<dyn Database>,
        mut settings: ControllerSettings,
    ) -> Self {
        // every cycle makes at least one attempt
        settings.max_retries = settings.max_retries.max(1);
        Self {
            schema,
            examples,
            generator,
            database,
            settings,
        }
    }

    pub fn schema(&self) -> &SchemaInfo {
        &self.schema
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn examples(&self) -> &Arc<dyn ExampleStore> {
        &self.examples
    }

    pub fn provider_name(&self) -> &'static str {
        self.generator.provider_name()
    }

    /// Run a full cycle for `question` starting from an empty memory
    pub async fn ask(&self, question: &str, sink: &mut (dyn EventSink + Send)) -> Result<CycleOutcome> {
        self.ask_with_memory(question, Memory::new(), sink).await
    }

    /// Run a cycle that already carries `memory` from earlier attempts.
    ///
    /// At most `max_retries - memory.len()` further attempts are made.
    pub async fn ask_with_memory(
        &self,
        question: &str,
        mut memory: Memory,
        sink: &mut (dyn EventSink + Send),
    ) -> Result<CycleOutcome> {
        let max = self.settings.max_retries;
        sink.emit(CycleEvent::Question {
            text: question.to_string(),
        });

        let mut shown: Vec<Exemplar> = Vec::new();
        let mut exemplar: Option<Exemplar> = None;
        let mut state = CycleState::Start;

        loop {
            tracing::trace!("cycle state: {}", state.name());
            state = match state {
                CycleState::Start => {
                    if self.settings.exemplar_policy == ExemplarPolicy::Reuse {
                        exemplar = self.lookup_once(question).await;
                    }
                    if memory.len() >= max {
                        CycleState::Exhausted
                    } else {
                        CycleState::Generating
                    }
                }

                CycleState::Generating => {
                    if self.settings.exemplar_policy == ExemplarPolicy::PerAttempt {
                        exemplar = self.pick_unshown(question, &shown).await;
                        if let Some(e) = &exemplar {
                            if !shown.contains(e) {
                                shown.push(e.clone());
                            }
                        }
                    }

                    let prompt = match compose(
                        &self.schema,
                        question,
                        exemplar.as_ref(),
                        &memory,
                        &self.settings.prompt,
                    ) {
                        Ok(prompt) => prompt,
                        Err(e) => return Err(abort(sink, e)),
                    };

                    tracing::info!("Attempt {}/{}: generating SQL", memory.len() + 1, max);
                    match classify(self.generator.generate(&prompt).await, None) {
                        StepOutcome::Done(sql) => CycleState::Executing { sql },
                        StepOutcome::Failed(attempt) => {
                            tracing::warn!("Generation failed: {}", attempt.error);
                            memory.push(attempt);
                            after_failure(memory.len(), max)
                        }
                        StepOutcome::Fatal(e) => return Err(abort(sink, e)),
                    }
                }

                CycleState::Executing { sql } => {
                    tracing::debug!("Executing: {}", sql);
                    match classify(self.execute(&sql).await, Some(sql.as_str())) {
                        StepOutcome::Done(raw) => CycleState::Success { sql, raw },
                        StepOutcome::Failed(attempt) => {
                            tracing::warn!("Execution failed: {}", attempt.error);
                            memory.push(attempt);
                            after_failure(memory.len(), max)
                        }
                        StepOutcome::Fatal(e) => return Err(abort(sink, e)),
                    }
                }

                CycleState::Retrying => {
                    if let Some(last) = memory.last() {
                        sink.emit(CycleEvent::AttemptFailed {
                            attempt: memory.len(),
                            max_attempts: max,
                            sql: last.sql.clone(),
                            error: last.error.clone(),
                        });
                    }
                    CycleState::Generating
                }

                CycleState::Exhausted => {
                    let last = memory.last().cloned();
                    tracing::info!("Giving up after {} failed attempts", memory.len());
                    if let Some(last) = &last {
                        sink.emit(CycleEvent::Exhausted {
                            attempts: memory.len(),
                            sql: last.sql.clone(),
                            error: last.error.clone(),
                        });
                    }
                    return Ok(CycleOutcome::Exhausted {
                        attempts: memory.len(),
                        last,
                    });
                }

                CycleState::Success { sql, raw } => {
                    tracing::info!("Query succeeded after {} failed attempts", memory.len());
                    sink.emit(CycleEvent::GeneratedSql { sql: sql.clone() });

                    let table = match normalize(Some(&raw)) {
                        Ok(table) => table,
                        Err(e) => {
                            tracing::error!("Result processing failed: {}", e);
                            sink.emit(CycleEvent::ResultProcessingFailed {
                                message: e.to_string(),
                            });
                            return Err(e);
                        }
                    };

                    if table.is_empty() {
                        sink.emit(CycleEvent::EmptyResult);
                    } else {
                        sink.emit(CycleEvent::ResultTable { table: table.clone() });
                    }
                    return Ok(CycleOutcome::Answered { sql, table });
                }
            };
        }
    }

    async fn execute(&self, sql: &str) -> Result<RawResult> {
        let database = Arc::clone(&self.database);
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || database.run(&sql))
            .await
            .map_err(|e| Error::Execution {
                message: format!("query task failed: {}", e),
            })?
    }

    async fn lookup_once(&self, question: &str) -> Option<Exemplar> {
        match self.examples.lookup(question).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Exemplar lookup failed, continuing without one: {}", e);
                None
            }
        }
    }

    /// Best exemplar not shown earlier in this cycle, falling back to the best
    async fn pick_unshown(&self, question: &str, shown: &[Exemplar]) -> Option<Exemplar> {
        match self.examples.nearest(question, shown.len() + 1).await {
            Ok(ranked) => {
                let best = ranked.first().map(|s| s.exemplar.clone());
                ranked
                    .into_iter()
                    .map(|s| s.exemplar)
                    .find(|e| !shown.contains(e))
                    .or(best)
            }
            Err(e) => {
                tracing::warn!("Exemplar lookup failed, continuing without one: {}", e);
                None
            }
        }
    }
}

fn abort(sink: &mut (dyn EventSink + Send), error: Error) -> Error {
    tracing::error!("Cycle aborted: {}", error);
    sink.emit(CycleEvent::Aborted {
        message: error.to_string(),
    });
    error
}
