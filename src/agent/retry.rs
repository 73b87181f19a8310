//! Bounded, retryable agent invocation
//!
//! Every turn runs under a hard deadline. Transient failures are retried
//! with exponential backoff and jitter; anything else fails the turn at once.

use std::time::Duration;

use rand::Rng;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::agent::runtime::{AgentReply, NegotiatingAgent};
use crate::agent::transcript::Transcript;
use crate::core::config::NegotiationConfig;
use crate::core::{AccordError, Result};

/// Deadline and retry settings for one agent turn
#[derive(Debug, Clone)]
pub struct InvocationPolicy {
    pub timeout: Duration,
    pub max_retries: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f32,
    pub jitter: bool,
}

impl Default for InvocationPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            max_retries: 1,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl InvocationPolicy {
    pub fn from_config(config: &NegotiationConfig) -> Self {
        Self {
            timeout: config.invocation_timeout(),
            max_retries: config.max_retries,
            initial_delay: config.retry_delay(),
            ..Default::default()
        }
    }

    /// No retries, no jitter
    pub fn once(timeout: Duration) -> Self {
        Self {
            timeout,
            max_retries: 0,
            jitter: false,
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exp = f64::from(self.backoff_multiplier).powi(attempt.saturating_sub(1) as i32);
        let millis = (self.initial_delay.as_millis() as f64 * exp)
            .round()
            .min(self.max_delay.as_millis() as f64);
        let mut delay = Duration::from_millis(millis as u64);

        if self.jitter {
            let jitter = rand::rng().random_range(0.0..0.3);
            delay += Duration::from_millis((delay.as_millis() as f64 * jitter) as u64);
        }

        delay
    }

    /// Invoke the agent under this policy
    pub async fn invoke(
        &self,
        agent: &dyn NegotiatingAgent,
        transcript: &Transcript,
    ) -> Result<AgentReply> {
        let mut attempt = 0;
        loop {
            let outcome = match timeout(self.timeout, agent.invoke(transcript)).await {
                Ok(result) => result,
                Err(_) => Err(AccordError::Timeout {
                    agent: agent.name().to_string(),
                    secs: self.timeout.as_secs(),
                }),
            };

            match outcome {
                Ok(reply) => {
                    if attempt > 0 {
                        debug!(agent = agent.name(), attempts = attempt + 1, "Turn succeeded after retry");
                    }
                    return Ok(reply);
                }
                Err(error) if error.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.delay_for(attempt);
                    warn!(
                        agent = agent.name(),
                        attempt,
                        ?delay,
                        %error,
                        "Turn failed, retrying"
                    );
                    sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::core::Message;

    struct Flaky {
        failures: usize,
        error: fn() -> AccordError,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl NegotiatingAgent for Flaky {
        fn name(&self) -> &str {
            "Flaky"
        }

        async fn invoke(&self, _transcript: &Transcript) -> Result<AgentReply> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err((self.error)())
            } else {
                Ok(AgentReply::single(Message::agent("Flaky", "ok")))
            }
        }
    }

    struct Sleepy;

    #[async_trait]
    impl NegotiatingAgent for Sleepy {
        fn name(&self) -> &str {
            "Sleepy"
        }

        async fn invoke(&self, _transcript: &Transcript) -> Result<AgentReply> {
            sleep(Duration::from_secs(3600)).await;
            Ok(AgentReply::single(Message::agent("Sleepy", "late")))
        }
    }

    fn fast_policy(max_retries: usize) -> InvocationPolicy {
        InvocationPolicy {
            timeout: Duration::from_secs(5),
            max_retries,
            initial_delay: Duration::from_millis(1),
            jitter: false,
            ..Default::default()
        }
    }

    fn transient() -> AccordError {
        AccordError::invocation("Flaky", "Cannot connect to Ollama at http://localhost:11434")
    }

    #[tokio::test]
    async fn test_one_retry_recovers_transient_failure() {
        let agent = Flaky {
            failures: 1,
            error: transient,
            calls: AtomicUsize::new(0),
        };
        let reply = fast_policy(1).invoke(&agent, &Transcript::new()).await;
        tokio_test::assert_ok!(reply);
        assert_eq!(agent.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let agent = Flaky {
            failures: 5,
            error: transient,
            calls: AtomicUsize::new(0),
        };
        let reply = fast_policy(1).invoke(&agent, &Transcript::new()).await;
        tokio_test::assert_err!(reply);
        assert_eq!(agent.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let agent = Flaky {
            failures: 1,
            error: || AccordError::ModelNotFound("qwen3:8b".to_string()),
            calls: AtomicUsize::new(0),
        };
        let reply = fast_policy(3).invoke(&agent, &Transcript::new()).await;
        assert!(matches!(reply, Err(AccordError::ModelNotFound(_))));
        assert_eq!(agent.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_bounds_a_turn() {
        let policy = InvocationPolicy::once(Duration::from_millis(50));
        let reply = policy.invoke(&Sleepy, &Transcript::new()).await;
        assert!(matches!(reply, Err(AccordError::Timeout { ref agent, .. }) if agent == "Sleepy"));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = InvocationPolicy {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            jitter: false,
            ..Default::default()
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(300));
    }
}
