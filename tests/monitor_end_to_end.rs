use std::sync::Arc;

use tempfile::TempDir;

use contract_creation_monitor::blockchain::{BlockMonitor, ClientCall, MockChainClient, ShutdownSignal};
use contract_creation_monitor::config::MonitorConfig;
use contract_creation_monitor::error::ChainError;
use contract_creation_monitor::ledger::{Ledger, LedgerRow};
use contract_creation_monitor::models::{Block, Transaction};

fn tx(hash: &str, block_number: u64, to: Option<&str>) -> Transaction {
    Transaction {
        hash: hash.to_string(),
        from: "0xsender".to_string(),
        to: to.map(str::to_string),
        block_number,
    }
}

/// Block #100: A creates 0xAAA, B calls 0xAAA, C calls contract 0xBBB, D calls
/// the plain account 0xCCC.
fn block_100() -> Block {
    Block {
        hash: "0xb100".to_string(),
        number: 100,
        transactions: vec![
            tx("0xh1", 100, None),
            tx("0xh2", 100, Some("0xAAA")),
            tx("0xh3", 100, Some("0xBBB")),
            tx("0xh4", 100, Some("0xCCC")),
        ],
    }
}

/// Block #101 calls every address from block #100 again.
fn block_101() -> Block {
    Block {
        hash: "0xb101".to_string(),
        number: 101,
        transactions: vec![
            tx("0xh5", 101, Some("0xaaa")),
            tx("0xh6", 101, Some("0xBBB")),
            tx("0xh7", 101, Some("0xCCC")),
        ],
    }
}

fn scripted_client() -> MockChainClient {
    MockChainClient::new()
        .with_block(block_100())
        .with_block(block_101())
        .with_receipt("0xh1", Some("0xAAA"))
        .with_code("0xAAA", vec![0x60, 0x80])
        .with_code("0xBBB", vec![0x60, 0x80])
}

async fn run_monitor(client: MockChainClient, ledger_path: &std::path::Path) -> Arc<MockChainClient> {
    let shutdown = ShutdownSignal::new();
    let client = Arc::new(client.with_shutdown_when_drained(shutdown.clone()));
    let ledger = Ledger::open(ledger_path).expect("Failed to open ledger");
    let config = MonitorConfig {
        poll_interval_ms: 10,
        ..MonitorConfig::default()
    };

    let mut monitor = BlockMonitor::new(Arc::clone(&client), ledger, &config, shutdown);
    monitor.run().await.expect("Monitor failed");
    client
}

fn row(block_number: u64, transaction_hash: &str, address: &str) -> LedgerRow {
    LedgerRow {
        block_number,
        transaction_hash: transaction_hash.to_string(),
        address: address.to_string(),
    }
}

#[tokio::test]
async fn test_end_to_end_discovery() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("contracts.csv");

    let client = run_monitor(scripted_client().with_poll(&["0xb100"]).with_poll(&["0xb101"]), &path).await;

    let rows = Ledger::read_rows(&path).unwrap();
    assert_eq!(rows, vec![row(100, "0xh1", "0xAAA"), row(100, "0xh3", "0xBBB")]);

    // 0xAAA is known from its creation, 0xCCC was checked once
    assert_eq!(client.code_fetches("0xAAA"), 0);
    assert_eq!(client.code_fetches("0xBBB"), 1);
    assert_eq!(client.code_fetches("0xCCC"), 1);

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("Block,Transaction Hash,Contract Address\n"));
}

#[tokio::test]
async fn test_restart_replays_without_duplicates() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("contracts.csv");

    run_monitor(scripted_client().with_poll(&["0xb100"]), &path).await;
    let first = Ledger::read_rows(&path).unwrap();

    let reopened = Ledger::open(&path).unwrap();
    assert_eq!(reopened.recorded_count(), 2);
    assert!(reopened.has_seen("0xaaa"));
    assert!(reopened.has_seen("0xbbb"));
    assert!(!reopened.has_seen("0xccc"));
    drop(reopened);

    let client = run_monitor(scripted_client().with_poll(&["0xb100"]), &path).await;

    assert_eq!(Ledger::read_rows(&path).unwrap(), first);
    // Recorded addresses are never re-queried after a restart
    assert_eq!(client.code_fetches("0xBBB"), 0);
}

#[tokio::test]
async fn test_unusable_block_is_skipped() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("contracts.csv");

    let client = scripted_client()
        .with_block_failure("0xb100", ChainError::ProviderProtocol("malformed block".to_string()))
        .with_poll(&["0xb100", "0xb101"]);
    let client = run_monitor(client, &path).await;

    // Only block #101 was classified; its call to 0xAAA now needs a code check
    let rows = Ledger::read_rows(&path).unwrap();
    assert_eq!(rows, vec![row(101, "0xh5", "0xaaa"), row(101, "0xh6", "0xBBB")]);
    assert_eq!(client.filters_opened(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_mid_batch_resumes_after_cooldown() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("contracts.csv");

    let client = scripted_client()
        .with_block_failure("0xb101", ChainError::RateLimit("HTTP 429".to_string()))
        .with_poll(&["0xb100", "0xb101"]);
    let start = tokio::time::Instant::now();
    let client = run_monitor(client, &path).await;

    assert!(start.elapsed() >= std::time::Duration::from_secs(600));
    assert_eq!(client.filters_opened(), 2);

    let fetched_blocks: Vec<ClientCall> = client
        .calls()
        .into_iter()
        .filter(|call| matches!(call, ClientCall::FetchBlock(_)))
        .collect();
    assert_eq!(
        fetched_blocks,
        vec![
            ClientCall::FetchBlock("0xb100".to_string()),
            ClientCall::FetchBlock("0xb101".to_string()),
            ClientCall::FetchBlock("0xb101".to_string()),
        ]
    );
    assert_eq!(Ledger::read_rows(&path).unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_expired_filter_is_replaced() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("contracts.csv");

    let client = scripted_client()
        .with_poll_error(ChainError::FilterNotFound("filter not found".to_string()))
        .with_poll(&["0xb100"]);
    let client = run_monitor(client, &path).await;

    assert_eq!(client.filters_opened(), 2);
    assert_eq!(Ledger::read_rows(&path).unwrap().len(), 2);
}
