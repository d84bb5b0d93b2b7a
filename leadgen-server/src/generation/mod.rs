//! Script generation pipeline
//!
//! One lead in, at most `scripts_per_lead` stored scripts out:
//! 1. Ask for a numbered title list and parse it
//! 2. For each title in order, ask for a script and store it immediately
//! 3. A title whose script cannot be produced gets the placeholder body
//!
//! A failed titles step marks the run failed so an admin can regenerate it.

pub mod prompts;
pub mod titles;

use chrono::Utc;
use leadgen_common::config::GenerationConfig;
use leadgen_common::db::{
    self, GenerationState, Lead, RunOutcome, PLACEHOLDER_SCRIPT_BODY,
};
use leadgen_common::events::{EventBus, LeadEvent};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::llm::{complete_with_retry, CompletionClient, LlmError, RetryPolicy};
pub use prompts::GenerationBrief;
pub use titles::parse_titles;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Title generation failed: {0}")]
    Titles(#[from] LlmError),

    #[error("Title response contained no numbered titles")]
    NoTitles,
}

#[derive(Debug, Clone, Copy)]
pub struct GeneratorSettings {
    pub scripts_per_lead: usize,
    pub retry: RetryPolicy,
    pub title_delay: Duration,
}

impl GeneratorSettings {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            scripts_per_lead: config.scripts_per_lead,
            retry: RetryPolicy::new(
                config.max_attempts,
                Duration::from_millis(config.retry_backoff_ms),
            ),
            title_delay: Duration::from_millis(config.title_delay_ms),
        }
    }
}

pub struct ScriptGenerator {
    client: Arc<dyn CompletionClient>,
    db: SqlitePool,
    event_bus: EventBus,
    settings: GeneratorSettings,
}

impl ScriptGenerator {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        db: SqlitePool,
        event_bus: EventBus,
        settings: GeneratorSettings,
    ) -> Self {
        Self {
            client,
            db,
            event_bus,
            settings,
        }
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Run the whole pipeline for `lead` and record the result in its run row
    pub async fn generate(&self, lead: &Lead) -> Result<RunOutcome, GenerationError> {
        let target = self.settings.scripts_per_lead;
        info!(lead_id = %lead.id, target, "Starting script generation");

        if let Err(e) = db::mark_running(&self.db, lead.id).await {
            error!(lead_id = %lead.id, error = %e, "Failed to mark generation run as running");
        }
        self.event_bus.emit_lossy(LeadEvent::GenerationStarted {
            lead_id: lead.id,
            target_count: target,
            timestamp: Utc::now(),
        });

        let brief = GenerationBrief::from(lead);

        let titles = match self.fetch_titles(&brief).await {
            Ok(titles) => titles,
            Err(err) => {
                self.record_failure(lead, &err).await;
                return Err(err);
            }
        };

        if titles.len() < target {
            warn!(
                lead_id = %lead.id,
                found = titles.len(),
                target,
                "Fewer titles than requested, continuing with what was found"
            );
        }

        let mut outcome = RunOutcome {
            titles_found: titles.len() as i64,
            ..RunOutcome::default()
        };

        for (i, title) in titles.iter().enumerate() {
            if i > 0 && !self.settings.title_delay.is_zero() {
                tokio::time::sleep(self.settings.title_delay).await;
            }

            let order_index = (i + 1) as i64;
            let (body, placeholder) = match complete_with_retry(
                self.client.as_ref(),
                &prompts::script_prompt(&brief, title),
                &self.settings.retry,
            )
            .await
            {
                Ok(body) => (body, false),
                Err(e) => {
                    warn!(
                        lead_id = %lead.id,
                        order_index,
                        title = %title,
                        error = %e,
                        "Script generation failed, storing placeholder"
                    );
                    (PLACEHOLDER_SCRIPT_BODY.to_string(), true)
                }
            };

            match db::insert_script(&self.db, lead.id, title, &body, order_index).await {
                Ok(script) => {
                    outcome.scripts_saved += 1;
                    if placeholder {
                        outcome.placeholders += 1;
                    }
                    info!(lead_id = %lead.id, order_index, placeholder, "Saved script");
                    self.event_bus.emit_lossy(LeadEvent::ScriptSaved {
                        lead_id: lead.id,
                        script,
                        placeholder,
                        timestamp: Utc::now(),
                    });
                }
                Err(e) => {
                    error!(lead_id = %lead.id, order_index, error = %e, "Failed to save script");
                }
            }
        }

        if let Err(e) =
            db::finish_run(&self.db, lead.id, GenerationState::Completed, outcome, None).await
        {
            error!(lead_id = %lead.id, error = %e, "Failed to record completed run");
        }

        info!(
            lead_id = %lead.id,
            scripts_saved = outcome.scripts_saved,
            placeholders = outcome.placeholders,
            "Script generation completed"
        );
        self.event_bus.emit_lossy(LeadEvent::GenerationCompleted {
            lead_id: lead.id,
            scripts_saved: outcome.scripts_saved as usize,
            placeholders: outcome.placeholders as usize,
            timestamp: Utc::now(),
        });

        Ok(outcome)
    }

    async fn fetch_titles(&self, brief: &GenerationBrief) -> Result<Vec<String>, GenerationError> {
        let target = self.settings.scripts_per_lead;
        let text = complete_with_retry(
            self.client.as_ref(),
            &prompts::titles_prompt(brief, target),
            &self.settings.retry,
        )
        .await?;

        let titles = parse_titles(&text, target);
        if titles.is_empty() {
            return Err(GenerationError::NoTitles);
        }
        Ok(titles)
    }

    async fn record_failure(&self, lead: &Lead, err: &GenerationError) {
        error!(lead_id = %lead.id, error = %err, "Script generation failed");
        let message = err.to_string();

        if let Err(e) = db::finish_run(
            &self.db,
            lead.id,
            GenerationState::Failed,
            RunOutcome::default(),
            Some(&message),
        )
        .await
        {
            error!(lead_id = %lead.id, error = %e, "Failed to record failed run");
        }

        self.event_bus.emit_lossy(LeadEvent::GenerationFailed {
            lead_id: lead.id,
            error: message,
            timestamp: Utc::now(),
        });
    }
}
