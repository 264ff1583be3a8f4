use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use contract_creation_monitor::blockchain::{ChainClient, RpcClient};
use contract_creation_monitor::config::RpcConfig;
use contract_creation_monitor::error::ChainError;
use contract_creation_monitor::models::{BlockRef, FilterHandle};

fn client_for(server: &MockServer) -> RpcClient {
    RpcClient::new_with_config(&RpcConfig {
        endpoint: server.uri(),
        timeout_seconds: 5,
        max_requests_per_second: 0,
    })
    .expect("Failed to create client")
}

fn rpc_result(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
}

fn rpc_error(code: i64, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": { "code": code, "message": message }
    }))
}

async fn mount(server: &MockServer, rpc_method: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_open_filter_and_poll() {
    let server = MockServer::start().await;
    mount(&server, "eth_newBlockFilter", rpc_result(json!("0x1f"))).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_getFilterChanges", "params": ["0x1f"] })))
        .respond_with(rpc_result(json!(["0xaaa1", "0xaaa2"])))
        .mount(&server)
        .await;
    let client = client_for(&server);

    let filter = client.open_block_filter().await.unwrap();
    assert_eq!(filter, FilterHandle("0x1f".to_string()));

    let refs = client.poll_new_block_hashes(&filter).await.unwrap();
    let hashes: Vec<&str> = refs.iter().map(|r| r.hash.as_str()).collect();
    assert_eq!(hashes, vec!["0xaaa1", "0xaaa2"]);
}

#[tokio::test]
async fn test_fetch_block_with_full_transactions() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_getBlockByHash", "params": ["0xblock", true] })))
        .respond_with(rpc_result(json!({
            "hash": "0xblock",
            "number": "0x64",
            "transactions": [
                { "hash": "0xh1", "from": "0xdeployer", "to": null, "blockNumber": "0x64" },
                { "hash": "0xh2", "from": "0xuser", "to": "0xAAA", "blockNumber": "0x64" }
            ]
        })))
        .mount(&server)
        .await;
    let client = client_for(&server);

    let block = client.fetch_block(&BlockRef::from_hash("0xblock")).await.unwrap();

    assert_eq!(block.number, 100);
    assert_eq!(block.transactions.len(), 2);
    assert!(block.transactions[0].is_contract_creation());
    assert_eq!(block.transactions[1].to.as_deref(), Some("0xAAA"));
}

#[tokio::test]
async fn test_receipt_and_code() {
    let server = MockServer::start().await;
    mount(
        &server,
        "eth_getTransactionReceipt",
        rpc_result(json!({ "transactionHash": "0xh1", "contractAddress": "0xAAA", "status": "0x1" })),
    )
    .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_getCode", "params": ["0xBBB", "latest"] })))
        .respond_with(rpc_result(json!("0x6080604052")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_getCode", "params": ["0xCCC", "latest"] })))
        .respond_with(rpc_result(json!("0x")))
        .mount(&server)
        .await;
    let client = client_for(&server);

    let receipt = client.fetch_transaction_receipt("0xh1").await.unwrap();
    assert_eq!(receipt.contract_address.as_deref(), Some("0xAAA"));

    assert_eq!(client.fetch_code("0xBBB").await.unwrap(), vec![0x60, 0x80, 0x60, 0x40, 0x52]);
    assert!(client.fetch_code("0xCCC").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_http_429_is_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
        .mount(&server)
        .await;
    let client = client_for(&server);

    let result = client.poll_new_block_hashes(&FilterHandle("0x1".to_string())).await;

    assert!(matches!(result, Err(ChainError::RateLimit(_))));
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&server)
        .await;
    let client = client_for(&server);

    let result = client.open_block_filter().await;

    assert!(matches!(result, Err(ChainError::TransientNetwork(_))));
}

#[tokio::test]
async fn test_expired_filter_is_reported() {
    let server = MockServer::start().await;
    mount(&server, "eth_getFilterChanges", rpc_error(-32000, "filter not found")).await;
    let client = client_for(&server);

    let result = client.poll_new_block_hashes(&FilterHandle("0x1".to_string())).await;

    assert!(matches!(result, Err(ChainError::FilterNotFound(_))));
}

#[tokio::test]
async fn test_garbage_and_missing_results_are_protocol_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_getBlockByHash" })))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;
    mount(&server, "eth_getTransactionReceipt", rpc_result(json!(null))).await;
    mount(&server, "eth_getCode", rpc_result(json!("0xnothex"))).await;
    let client = client_for(&server);

    let block = client.fetch_block(&BlockRef::from_hash("0xblock")).await;
    assert!(matches!(block, Err(ChainError::ProviderProtocol(_))));

    let receipt = client.fetch_transaction_receipt("0xpending").await;
    assert!(matches!(receipt, Err(ChainError::ProviderProtocol(_))));

    let code = client.fetch_code("0xBBB").await;
    assert!(matches!(code, Err(ChainError::ProviderProtocol(_))));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transient() {
    let client = RpcClient::new_with_config(&RpcConfig {
        endpoint: "http://127.0.0.1:9".to_string(),
        timeout_seconds: 2,
        max_requests_per_second: 0,
    })
    .expect("Failed to create client");

    let result = client.open_block_filter().await;

    assert!(matches!(result, Err(ChainError::TransientNetwork(_))));
}
