use std::time::Duration;

use crate::config::MonitorConfig;
use crate::error::{ChainError, MonitorError};
use crate::logging::{ErrorLogger, LogContext, MetricsLogger};

/// What the subscription does once the backoff sleep is over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Keep the current filter and poll it again
    RetrySamePoll,
    /// Drop the filter and open a fresh one
    Resubscribe,
}

impl std::fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoveryAction::RetrySamePoll => f.write_str("retry"),
            RecoveryAction::Resubscribe => f.write_str("resubscribe"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffDecision {
    pub action: RecoveryAction,
    pub delay: Duration,
}

/// Turns a failure caught by the subscription loop into a sleep and a next
/// step. Non-chain errors are fatal and handed back unchanged.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    retry_delay: Duration,
    rate_limit_cooldown: Duration,
    max_consecutive_retries: u32,
    consecutive_retries: u32,
}

impl BackoffPolicy {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            retry_delay: config.retry_delay(),
            rate_limit_cooldown: config.rate_limit_cooldown(),
            max_consecutive_retries: config.max_consecutive_retries,
            consecutive_retries: 0,
        }
    }

    pub fn consecutive_retries(&self) -> u32 {
        self.consecutive_retries
    }

    /// Forget earlier transient failures after a successful poll.
    pub fn record_success(&mut self) {
        if self.consecutive_retries > 0 {
            LogContext::new("error_recovery", "recovered")
                .with_retry_count(self.consecutive_retries)
                .info("Provider responding again");
        }
        self.consecutive_retries = 0;
    }

    pub fn decide(&mut self, error: MonitorError) -> Result<BackoffDecision, MonitorError> {
        let chain_error = match error {
            MonitorError::Chain(chain_error) => chain_error,
            fatal => {
                ErrorLogger::log_error(&fatal, Some(LogContext::new("error_recovery", "fatal")));
                return Err(fatal);
            }
        };

        let decision = match &chain_error {
            ChainError::TransientNetwork(_) => {
                self.consecutive_retries += 1;
                if self.max_consecutive_retries > 0 && self.consecutive_retries > self.max_consecutive_retries {
                    self.consecutive_retries = 0;
                    BackoffDecision {
                        action: RecoveryAction::Resubscribe,
                        delay: self.retry_delay,
                    }
                } else {
                    BackoffDecision {
                        action: RecoveryAction::RetrySamePoll,
                        delay: self.retry_delay,
                    }
                }
            }
            ChainError::RateLimit(_) => {
                self.consecutive_retries = 0;
                BackoffDecision {
                    action: RecoveryAction::Resubscribe,
                    delay: self.rate_limit_cooldown,
                }
            }
            // Protocol errors normally stay at the block or transaction that
            // raised them; one reaching here came from the filter itself.
            ChainError::FilterNotFound(_) | ChainError::ProviderProtocol(_) => {
                self.consecutive_retries = 0;
                BackoffDecision {
                    action: RecoveryAction::Resubscribe,
                    delay: self.retry_delay,
                }
            }
        };

        MetricsLogger::log_backoff(
            &decision.action.to_string(),
            decision.delay.as_secs(),
            self.consecutive_retries,
            &chain_error.to_string(),
        );

        Ok(decision)
    }
}
