use thiserror::Error;

/// Main error type for the contract creation monitor
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Chain client error: {0}")]
    Chain(#[from] ChainError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures reported by a chain client. Every variant carries the provider's
/// diagnostic text so the value stays cheap to clone and compare.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("Transient network failure: {0}")]
    TransientNetwork(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Block filter not found: {0}")]
    FilterNotFound(String),

    #[error("Unexpected provider response: {0}")]
    ProviderProtocol(String),
}

/// Ledger file errors
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Ledger I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed ledger row at line {line}: {content:?}")]
    MalformedRow { line: usize, content: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration parsing failed: {0}")]
    Parsing(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Error severity levels for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Terminates the monitor
    Critical,
    /// Forces a resubscribe or a long cooldown
    High,
    /// Retried after a short delay
    Medium,
    /// Scoped to a single block or transaction
    Low,
}

impl ChainError {
    /// A protocol error is handled where it happens and only skips the
    /// current block or transaction.
    pub fn is_protocol(&self) -> bool {
        matches!(self, ChainError::ProviderProtocol(_))
    }
}

impl MonitorError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            MonitorError::Ledger(_) => ErrorSeverity::Critical,
            MonitorError::Config(_) => ErrorSeverity::Critical,
            MonitorError::Internal(_) => ErrorSeverity::Critical,

            MonitorError::Chain(ChainError::RateLimit(_)) => ErrorSeverity::High,
            MonitorError::Chain(ChainError::FilterNotFound(_)) => ErrorSeverity::High,

            MonitorError::Chain(ChainError::TransientNetwork(_)) => ErrorSeverity::Medium,

            MonitorError::Chain(ChainError::ProviderProtocol(_)) => ErrorSeverity::Low,
        }
    }

    /// Fatal errors are never retried: the process exits with a non-zero status.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, MonitorError::Chain(_))
    }
}
