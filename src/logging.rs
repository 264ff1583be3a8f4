use log::{info, warn, error, debug, trace};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{ErrorSeverity, MonitorError};

/// Structured logging context for the monitor
pub struct LogContext {
    pub component: String,
    pub operation: String,
    pub metadata: HashMap<String, Value>,
}

impl LogContext {
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            component: component.to_string(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn with_block_number(self, block_number: u64) -> Self {
        self.with_metadata("block_number", json!(block_number))
    }

    pub fn with_block_hash(self, block_hash: &str) -> Self {
        self.with_metadata("block_hash", json!(block_hash))
    }

    pub fn with_transaction_hash(self, tx_hash: &str) -> Self {
        self.with_metadata("transaction_hash", json!(tx_hash))
    }

    pub fn with_address(self, address: &str) -> Self {
        self.with_metadata("address", json!(address))
    }

    pub fn with_duration_ms(self, duration_ms: u64) -> Self {
        self.with_metadata("duration_ms", json!(duration_ms))
    }

    pub fn with_retry_count(self, retry_count: u32) -> Self {
        self.with_metadata("retry_count", json!(retry_count))
    }

    fn format_message(&self, level: &str, message: &str) -> String {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let mut log_entry = json!({
            "timestamp": timestamp,
            "level": level,
            "component": self.component,
            "operation": self.operation,
            "message": message,
        });

        for (key, value) in &self.metadata {
            log_entry[key] = value.clone();
        }

        log_entry.to_string()
    }

    pub fn info(&self, message: &str) {
        info!("{}", self.format_message("INFO", message));
    }

    pub fn warn(&self, message: &str) {
        warn!("{}", self.format_message("WARN", message));
    }

    pub fn error(&self, message: &str) {
        error!("{}", self.format_message("ERROR", message));
    }

    pub fn debug(&self, message: &str) {
        debug!("{}", self.format_message("DEBUG", message));
    }

    pub fn trace(&self, message: &str) {
        trace!("{}", self.format_message("TRACE", message));
    }
}

/// Times a single operation, typically one RPC call
pub struct PerformanceMonitor {
    pub start_time: SystemTime,
    operation: String,
    metadata: HashMap<String, Value>,
}

impl PerformanceMonitor {
    pub fn new(operation: &str) -> Self {
        Self {
            start_time: SystemTime::now(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn finish_with_result<T, E>(self, result: &Result<T, E>) -> u64
    where
        E: std::fmt::Display,
    {
        let duration = SystemTime::now()
            .duration_since(self.start_time)
            .unwrap_or_default()
            .as_millis() as u64;

        let mut context = LogContext::new("performance", &self.operation)
            .with_duration_ms(duration);

        for (key, value) in self.metadata {
            context = context.with_metadata(&key, value);
        }

        match result {
            Ok(_) => {
                context.trace(&format!("Operation completed successfully in {}ms", duration));
            }
            Err(e) => {
                context = context.with_metadata("error", json!(e.to_string()));
                context.debug(&format!("Operation failed after {}ms: {}", duration, e));
            }
        }

        duration
    }
}

/// Error logging utilities
pub struct ErrorLogger;

impl ErrorLogger {
    pub fn log_error(error: &MonitorError, context: Option<LogContext>) {
        let severity = error.severity();

        let log_context = context
            .unwrap_or_else(|| LogContext::new("error", "unknown"))
            .with_metadata("error_type", json!(format!("{:?}", error)))
            .with_metadata("severity", json!(format!("{:?}", severity)))
            .with_metadata("fatal", json!(error.is_fatal()));

        let message = format!("Error occurred: {}", error);

        match severity {
            ErrorSeverity::Critical => log_context.error(&message),
            ErrorSeverity::High => log_context.warn(&message),
            ErrorSeverity::Medium => log_context.warn(&message),
            ErrorSeverity::Low => log_context.info(&message),
        }
    }
}

/// Operator-facing progress events
pub struct MetricsLogger;

impl MetricsLogger {
    pub fn log_block_observed(block_hash: &str, block_number: u64, transaction_count: usize) {
        let context = LogContext::new("metrics", "block_observed")
            .with_block_hash(block_hash)
            .with_block_number(block_number)
            .with_metadata("transaction_count", json!(transaction_count));

        context.info(&format!(
            "New block {} ({}) with {} transactions",
            block_number, block_hash, transaction_count
        ));
    }

    pub fn log_contract_discovered(record: &crate::models::ContractRecord) {
        let context = LogContext::new("metrics", "contract_discovered")
            .with_block_number(record.block_number)
            .with_transaction_hash(&record.transaction_hash)
            .with_address(&record.address)
            .with_metadata("reason", json!(record.reason.to_string()));

        context.info(&format!(
            "Contract {} found in transaction {} ({})",
            record.address, record.transaction_hash, record.reason
        ));
    }

    pub fn log_rpc_call(method: &str, duration_ms: u64, success: bool) {
        let context = LogContext::new("metrics", "rpc_call")
            .with_metadata("method", json!(method))
            .with_duration_ms(duration_ms)
            .with_metadata("success", json!(success));

        if success {
            context.trace(&format!("RPC call {} completed in {}ms", method, duration_ms));
        } else {
            context.debug(&format!("RPC call {} failed after {}ms", method, duration_ms));
        }
    }

    pub fn log_backoff(action: &str, delay_seconds: u64, consecutive_failures: u32, cause: &str) {
        let context = LogContext::new("metrics", "backoff")
            .with_metadata("action", json!(action))
            .with_metadata("delay_seconds", json!(delay_seconds))
            .with_retry_count(consecutive_failures)
            .with_metadata("cause", json!(cause));

        context.warn(&format!(
            "Backing off for {}s then {} (failure {}): {}",
            delay_seconds, action, consecutive_failures, cause
        ));
    }

    pub fn log_monitor_status(status: &crate::blockchain::MonitorStatus) {
        let context = LogContext::new("metrics", "monitor_status")
            .with_metadata("state", json!(format!("{:?}", status.state)))
            .with_metadata("filters_opened", json!(status.filters_opened))
            .with_metadata("blocks_processed", json!(status.blocks_processed))
            .with_metadata("blocks_skipped", json!(status.blocks_skipped))
            .with_metadata("contracts_recorded", json!(status.contracts_recorded))
            .with_metadata("transient_retries", json!(status.transient_retries))
            .with_metadata("resubscriptions", json!(status.resubscriptions));

        context.info(&format!(
            "Processed {} blocks, recorded {} contracts, opened {} filters",
            status.blocks_processed, status.contracts_recorded, status.filters_opened
        ));
    }
}

/// Initialize logging for the application.
///
/// `RUST_LOG` wins over `level` when set. With `format = "json"` structured
/// lines are pretty-printed, otherwise they are written as-is after a
/// timestamp.
pub fn init_logging(level: &str, format: &str) -> Result<(), log::SetLoggerError> {
    let pretty_json = format == "json";

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(move |buf, record| {
            use std::io::Write;

            if pretty_json {
                if let Ok(json_value) = serde_json::from_str::<Value>(record.args().to_string().as_str()) {
                    return writeln!(buf, "{}", serde_json::to_string_pretty(&json_value)?);
                }
            }

            writeln!(
                buf,
                "{} [{}] {}: {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init()?;

    info!("Logging initialized at level {}", level);
    Ok(())
}
