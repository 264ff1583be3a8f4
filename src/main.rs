use std::sync::Arc;

use clap::Parser;
use log::info;

use contract_creation_monitor::blockchain::{BlockMonitor, RpcClient, ShutdownSignal};
use contract_creation_monitor::config::AppConfig;
use contract_creation_monitor::error::MonitorError;
use contract_creation_monitor::ledger::Ledger;
use contract_creation_monitor::logging::{init_logging, ErrorLogger, LogContext};

#[derive(Parser)]
#[command(name = "contract-monitor")]
#[command(about = "Watch new blocks on an EVM chain and record every contract seen")]
#[command(version)]
struct Args {
    /// JSON-RPC endpoint of the provider
    #[arg(long)]
    endpoint: Option<String>,

    /// TOML configuration file (defaults to $CONFIG_FILE or ./monitor.toml)
    #[arg(long)]
    config: Option<String>,

    /// Delay between filter polls in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Ledger CSV file; created with a header when missing
    ledger: Option<String>,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(endpoint) = &self.endpoint {
            config.rpc.endpoint = endpoint.clone();
        }
        if let Some(poll_interval_ms) = self.poll_interval_ms {
            config.monitor.poll_interval_ms = poll_interval_ms;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(ledger) = &self.ledger {
            config.ledger.path = ledger.clone();
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), MonitorError> {
    let mut config = AppConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    if args.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    if let Err(e) = init_logging(&config.logging.level, &config.logging.format) {
        eprintln!("Logger already initialised: {}", e);
    }

    let client = Arc::new(RpcClient::new_with_config(&config.rpc)?);
    let ledger = Ledger::open(&config.ledger.path)?;
    LogContext::new("main", "startup")
        .with_metadata("endpoint", serde_json::json!(client.endpoint()))
        .with_metadata("known_addresses", serde_json::json!(ledger.seen().len()))
        .info(&format!("Ledger {} loaded", config.ledger.path));

    let shutdown = ShutdownSignal::new();
    shutdown.listen_for_ctrl_c();

    let mut monitor = BlockMonitor::new(client, ledger, &config.monitor, shutdown);
    let result = monitor.run().await;

    match &result {
        Ok(()) => info!("Contract monitor stopped"),
        Err(e) => ErrorLogger::log_error(e, Some(LogContext::new("main", "run"))),
    }
    result
}
