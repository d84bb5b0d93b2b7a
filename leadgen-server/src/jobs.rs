//! Background job queue
//!
//! Intake and the admin regenerate operation hand leads to the workers over
//! bounded channels. The generation worker runs up to `max_concurrent` leads
//! at once; inside one lead, generation is strictly sequential. The CRM worker
//! handles one sync at a time. Workers exit once every [`JobQueue`] clone has
//! been dropped and in-flight jobs have finished.

use leadgen_common::db::Lead;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::crm::CrmSync;
use crate::generation::ScriptGenerator;

#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub lead: Lead,
}

#[derive(Debug, Clone)]
pub struct CrmSyncJob {
    pub lead: Lead,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("Job queue is full")]
    QueueFull,

    #[error("Job queue is closed")]
    Closed,
}

impl<T> From<mpsc::error::TrySendError<T>> for JobError {
    fn from(err: mpsc::error::TrySendError<T>) -> Self {
        match err {
            mpsc::error::TrySendError::Full(_) => JobError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => JobError::Closed,
        }
    }
}

/// Sending half shared by the HTTP handlers
#[derive(Clone)]
pub struct JobQueue {
    generation_tx: mpsc::Sender<GenerationJob>,
    crm_tx: Option<mpsc::Sender<CrmSyncJob>>,
}

/// Worker task handles
pub struct JobWorkers {
    generation: JoinHandle<()>,
    crm: Option<JoinHandle<()>>,
}

impl JobWorkers {
    /// Wait for the workers to drain and stop
    pub async fn join(self) {
        if let Err(e) = self.generation.await {
            error!(error = %e, "Generation worker panicked");
        }
        if let Some(crm) = self.crm {
            if let Err(e) = crm.await {
                error!(error = %e, "CRM worker panicked");
            }
        }
    }
}

impl JobQueue {
    /// Spawn the workers and return the queue handle
    ///
    /// `crm` is None when the CRM integration is not configured; CRM jobs are
    /// then skipped at enqueue time.
    pub fn start(
        generator: Arc<ScriptGenerator>,
        crm: Option<Arc<CrmSync>>,
        capacity: usize,
        max_concurrent: usize,
    ) -> (Self, JobWorkers) {
        let (generation_tx, generation_rx) = mpsc::channel(capacity.max(1));
        let generation = tokio::spawn(run_generation_worker(
            generation_rx,
            generator,
            max_concurrent.max(1),
        ));

        let (crm_tx, crm) = match crm {
            Some(sync) => {
                let (tx, rx) = mpsc::channel(capacity.max(1));
                (Some(tx), Some(tokio::spawn(run_crm_worker(rx, sync))))
            }
            None => (None, None),
        };

        (
            Self {
                generation_tx,
                crm_tx,
            },
            JobWorkers { generation, crm },
        )
    }

    pub fn crm_enabled(&self) -> bool {
        self.crm_tx.is_some()
    }

    pub fn enqueue_generation(&self, lead: Lead) -> Result<(), JobError> {
        let lead_id = lead.id;
        self.generation_tx
            .try_send(GenerationJob { lead })
            .map_err(JobError::from)?;
        info!(lead_id = %lead_id, "Queued script generation");
        Ok(())
    }

    /// Queue a CRM sync; a no-op when the integration is not configured
    pub fn enqueue_crm_sync(&self, lead: Lead) -> Result<(), JobError> {
        let Some(tx) = &self.crm_tx else {
            info!(lead_id = %lead.id, "CRM integration not configured, skipping sync");
            return Ok(());
        };
        let lead_id = lead.id;
        tx.try_send(CrmSyncJob { lead }).map_err(JobError::from)?;
        info!(lead_id = %lead_id, "Queued CRM sync");
        Ok(())
    }
}

async fn run_generation_worker(
    mut rx: mpsc::Receiver<GenerationJob>,
    generator: Arc<ScriptGenerator>,
    max_concurrent: usize,
) {
    let semaphore = Arc::new(Semaphore::new(max_concurrent));
    info!(max_concurrent, "Generation worker started");

    while let Some(job) = rx.recv().await {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let generator = generator.clone();

        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = generator.generate(&job.lead).await {
                warn!(lead_id = %job.lead.id, error = %e, "Generation job ended without scripts");
            }
        });
    }

    // Wait for in-flight jobs before reporting the worker stopped
    if semaphore.acquire_many(max_concurrent as u32).await.is_ok() {
        info!("Generation worker stopped");
    }
}

async fn run_crm_worker(mut rx: mpsc::Receiver<CrmSyncJob>, sync: Arc<CrmSync>) {
    info!("CRM worker started");
    while let Some(job) = rx.recv().await {
        sync.sync_lead(&job.lead).await;
    }
    info!("CRM worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::GeneratorSettings;
    use crate::llm::{CompletionClient, LlmError, RetryPolicy};
    use async_trait::async_trait;
    use leadgen_common::db::{self, create_schema, GenerationState, NewLead};
    use leadgen_common::events::EventBus;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::time::Duration;

    struct Canned;

    #[async_trait]
    impl CompletionClient for Canned {
        async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            if prompt.starts_with("Act as a market research expert") {
                Ok("1. One\n2. Two".to_string())
            } else {
                Ok("Body".to_string())
            }
        }
    }

    #[tokio::test]
    async fn test_worker_processes_jobs_and_stops_on_drop() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_schema(&pool).await.unwrap();

        let generator = Arc::new(ScriptGenerator::new(
            Arc::new(Canned),
            pool.clone(),
            EventBus::new(16),
            GeneratorSettings {
                scripts_per_lead: 2,
                retry: RetryPolicy::new(1, Duration::ZERO),
                title_delay: Duration::ZERO,
            },
        ));
        let (queue, workers) = JobQueue::start(generator, None, 8, 2);
        assert!(!queue.crm_enabled());

        let mut ids = Vec::new();
        for i in 0..3 {
            let lead = db::insert_lead(
                &pool,
                &NewLead {
                    first_name: format!("Lead {}", i),
                    company_name: "Co".to_string(),
                    email: "a@b.co".to_string(),
                    business_type: "Plumber".to_string(),
                    business_description: "Pipes".to_string(),
                    city: "Leeds".to_string(),
                    ..NewLead::default()
                },
            )
            .await
            .unwrap();
            db::queue_run(&pool, lead.id, 2).await.unwrap();
            ids.push(lead.id);
            queue.enqueue_generation(lead.clone()).unwrap();
            queue.enqueue_crm_sync(lead).unwrap();
        }

        drop(queue);
        workers.join().await;

        for id in ids {
            assert_eq!(db::count_scripts_for_lead(&pool, id).await.unwrap(), 2);
            let run = db::find_run(&pool, id).await.unwrap().unwrap();
            assert_eq!(run.state, GenerationState::Completed);
        }
    }

    #[test]
    fn test_try_send_error_mapping() {
        assert_eq!(
            JobError::from(mpsc::error::TrySendError::Full(())),
            JobError::QueueFull
        );
        assert_eq!(
            JobError::from(mpsc::error::TrySendError::Closed(())),
            JobError::Closed
        );
    }
}
