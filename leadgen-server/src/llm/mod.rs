//! Chat-completion clients
//!
//! [`CompletionClient`] is the seam between the script generator and the
//! language model. Production uses [`openrouter::OpenRouterClient`]; tests
//! plug in scripted fakes.

pub mod openrouter;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use openrouter::OpenRouterClient;

/// Errors from a single completion attempt or from an exhausted retry loop
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Completion returned no content")]
    EmptyContent,

    #[error("Client setup failed: {0}")]
    Setup(String),

    #[error("All {attempts} attempts failed; last error: {last}")]
    Exhausted { attempts: u32, last: Box<LlmError> },
}

/// One prompt in, one completion text out
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Bounded retry with linear backoff
///
/// After failed attempt `k` the caller sleeps `k * backoff_step` before the
/// next attempt. No sleep follows the final attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_step: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_step,
        }
    }

    /// Delay slept after failed attempt `attempt` (1-based)
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

/// Call `client` until it succeeds or the policy's attempts are used up
pub async fn complete_with_retry(
    client: &dyn CompletionClient,
    prompt: &str,
    policy: &RetryPolicy,
) -> Result<String, LlmError> {
    let mut attempt = 0;

    loop {
        attempt += 1;

        match client.complete(prompt).await {
            Ok(text) => {
                if attempt > 1 {
                    tracing::debug!(attempt, "Completion succeeded after retry");
                }
                return Ok(text);
            }
            Err(err) => {
                if attempt >= policy.max_attempts {
                    tracing::error!(attempt, error = %err, "Completion failed, attempts exhausted");
                    return Err(LlmError::Exhausted {
                        attempts: attempt,
                        last: Box::new(err),
                    });
                }

                let delay = policy.backoff_after(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Completion attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
