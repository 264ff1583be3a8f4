pub mod blockchain;
pub mod config;
pub mod error;
pub mod error_recovery;
pub mod ledger;
pub mod logging;
pub mod models;

pub use blockchain::{BlockMonitor, ChainClient, MockChainClient, MonitorStatus, RpcClient, ShutdownSignal};
pub use config::{AppConfig, LedgerConfig, LoggingConfig, MonitorConfig, RpcConfig};
pub use error::{ChainError, ConfigError, LedgerError, MonitorError, Result};
pub use error_recovery::{BackoffDecision, BackoffPolicy, RecoveryAction};
pub use ledger::Ledger;
pub use logging::{ErrorLogger, LogContext, MetricsLogger, PerformanceMonitor};
pub use models::{ContractRecord, DiscoveryReason, SeenSet};
