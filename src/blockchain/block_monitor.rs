use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use tokio::signal;
use tokio::sync::Notify;
use tokio::time::{interval, sleep, Interval, MissedTickBehavior};

use crate::blockchain::block_processor::{BlockOutcome, BlockProcessor};
use crate::blockchain::ChainClient;
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::error_recovery::{BackoffPolicy, RecoveryAction};
use crate::ledger::Ledger;
use crate::logging::{LogContext, MetricsLogger};
use crate::models::{BlockRef, FilterHandle};

const STATE_HISTORY_LEN: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubscriptionState {
    #[default]
    Unsubscribed,
    Active,
    Backoff,
}

/// Cooperative cancellation shared between the monitor and whoever stops it.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    triggered: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Resolves once `trigger` has been called.
    pub async fn wait(&self) {
        let notified = self.notify.notified();
        if self.is_triggered() {
            return;
        }
        notified.await;
    }

    /// Trigger on Ctrl-C.
    pub fn listen_for_ctrl_c(&self) {
        let shutdown = self.clone();
        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received shutdown signal");
                    shutdown.trigger();
                }
                Err(err) => {
                    error!("Unable to listen for shutdown signal: {}", err);
                }
            }
        });
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorStatus {
    pub state: SubscriptionState,
    pub filters_opened: u64,
    pub blocks_processed: u64,
    pub blocks_skipped: u64,
    pub contracts_recorded: u64,
    pub transient_retries: u64,
    pub resubscriptions: u64,
}

/// Subscription manager: keeps a block filter open, polls it, and feeds
/// every reported block through the processor into the ledger.
///
/// Block refs returned by a poll wait in a queue until processed, so a
/// failure halfway through a batch resumes at the interrupted block once the
/// backoff is over, on the same filter or a fresh one.
pub struct BlockMonitor<C> {
    client: Arc<C>,
    block_processor: BlockProcessor<C>,
    ledger: Ledger,
    policy: BackoffPolicy,
    poll_interval: Duration,
    shutdown: ShutdownSignal,
    status: MonitorStatus,
    history: VecDeque<SubscriptionState>,
}

impl<C: ChainClient> BlockMonitor<C> {
    pub fn new(client: Arc<C>, ledger: Ledger, config: &MonitorConfig, shutdown: ShutdownSignal) -> Self {
        let mut history = VecDeque::with_capacity(STATE_HISTORY_LEN);
        history.push_back(SubscriptionState::Unsubscribed);
        Self {
            block_processor: BlockProcessor::new(Arc::clone(&client)),
            client,
            ledger,
            policy: BackoffPolicy::new(config),
            poll_interval: config.poll_interval(),
            shutdown,
            status: MonitorStatus::default(),
            history,
        }
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn status(&self) -> &MonitorStatus {
        &self.status
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Most recent states, oldest first
    pub fn state_history(&self) -> Vec<SubscriptionState> {
        self.history.iter().copied().collect()
    }

    /// Run until shut down or a fatal error.
    ///
    /// On shutdown the block in flight is finished and the ledger flushed.
    /// Only ledger, config and internal failures come back as `Err`; chain
    /// failures are absorbed by the backoff policy.
    pub async fn run(&mut self) -> Result<(), MonitorError> {
        info!(
            "Starting contract monitor with {} ms polling interval, ledger at {}",
            self.poll_interval.as_millis(),
            self.ledger.path().display()
        );

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut filter: Option<FilterHandle> = None;
        let mut pending: VecDeque<BlockRef> = VecDeque::new();

        while !self.shutdown.is_triggered() {
            let step = match &filter {
                None => self.subscribe().await.map(Some),
                Some(handle) => self
                    .poll_and_process(handle, &mut pending, &mut ticker)
                    .await
                    .map(|()| None),
            };

            match step {
                Ok(Some(handle)) => filter = Some(handle),
                Ok(None) => {}
                Err(e) => {
                    self.transition(SubscriptionState::Backoff);
                    let decision = match self.policy.decide(e) {
                        Ok(decision) => decision,
                        Err(fatal) => {
                            MetricsLogger::log_monitor_status(&self.status);
                            return Err(fatal);
                        }
                    };

                    if !self.sleep_unless_shutdown(decision.delay).await {
                        break;
                    }

                    // Only a held filter can be polled again; a failed
                    // subscribe always goes back to Unsubscribed
                    match (decision.action, filter.is_some()) {
                        (RecoveryAction::RetrySamePoll, true) => {
                            self.status.transient_retries += 1;
                            self.transition(SubscriptionState::Active);
                        }
                        (RecoveryAction::Resubscribe, true) => {
                            self.status.resubscriptions += 1;
                            filter = None;
                            self.transition(SubscriptionState::Unsubscribed);
                        }
                        (_, false) => self.transition(SubscriptionState::Unsubscribed),
                    }
                }
            }
        }

        self.finish()
    }

    async fn subscribe(&mut self) -> Result<FilterHandle, MonitorError> {
        let handle = self.client.open_block_filter().await?;
        self.status.filters_opened += 1;
        LogContext::new("block_monitor", "subscribe")
            .with_metadata("filter_id", serde_json::json!(handle.as_str()))
            .info(&format!("Opened block filter {}", handle));
        self.transition(SubscriptionState::Active);
        Ok(handle)
    }

    async fn poll_and_process(
        &mut self,
        filter: &FilterHandle,
        pending: &mut VecDeque<BlockRef>,
        ticker: &mut Interval,
    ) -> Result<(), MonitorError> {
        if pending.is_empty() {
            let ticked = tokio::select! {
                _ = ticker.tick() => true,
                _ = self.shutdown.wait() => false,
            };
            if !ticked {
                return Ok(());
            }

            let refs = self.client.poll_new_block_hashes(filter).await?;
            self.policy.record_success();
            pending.extend(refs);
        }

        while let Some(block_ref) = pending.front().cloned() {
            if self.shutdown.is_triggered() {
                break;
            }

            match self.block_processor.process(&block_ref, &mut self.ledger).await? {
                BlockOutcome::Processed(summary) => {
                    self.status.blocks_processed += 1;
                    self.status.contracts_recorded += summary.records.len() as u64;
                }
                BlockOutcome::Skipped => self.status.blocks_skipped += 1,
            }
            pending.pop_front();
        }

        Ok(())
    }

    /// Returns false when the sleep was cut short by shutdown.
    async fn sleep_unless_shutdown(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = sleep(delay) => true,
            _ = self.shutdown.wait() => false,
        }
    }

    fn transition(&mut self, next: SubscriptionState) {
        if self.status.state == next {
            return;
        }
        LogContext::new("block_monitor", "transition")
            .with_metadata("from", serde_json::json!(format!("{:?}", self.status.state)))
            .with_metadata("to", serde_json::json!(format!("{:?}", next)))
            .debug("Subscription state changed");
        self.status.state = next;
        if self.history.len() == STATE_HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(next);
    }

    fn finish(&mut self) -> Result<(), MonitorError> {
        info!("Shutdown signal received, stopping contract monitor");
        self.ledger.flush()?;
        MetricsLogger::log_monitor_status(&self.status);
        Ok(())
    }
}
