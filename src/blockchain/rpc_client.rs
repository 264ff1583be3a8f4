use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::blockchain::ChainClient;
use crate::config::RpcConfig;
use crate::error::{ChainError, MonitorError};
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::{Block, BlockRef, FilterHandle, Receipt, Transaction};

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'a str,
    method: &'a str,
    params: Vec<Value>,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcBlock {
    hash: String,
    number: String,
    transactions: Vec<RpcTransaction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransaction {
    hash: String,
    from: String,
    to: Option<String>,
    block_number: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: String,
    contract_address: Option<String>,
}

/// Live chain client speaking JSON-RPC over HTTP.
///
/// Requests are spaced out client-side when `max_requests_per_second` is set,
/// so bursts of receipt and code lookups inside one block stay under the
/// provider's limit.
pub struct RpcClient {
    client: Client,
    endpoint: String,
    min_request_spacing: Option<Duration>,
    last_request: Mutex<Option<Instant>>,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(endpoint: String) -> Result<Self, MonitorError> {
        Self::new_with_config(&RpcConfig {
            endpoint,
            ..RpcConfig::default()
        })
    }

    pub fn new_with_config(config: &RpcConfig) -> Result<Self, MonitorError> {
        let context = LogContext::new("rpc_client", "initialization")
            .with_metadata("endpoint", serde_json::json!(config.endpoint))
            .with_metadata("timeout_seconds", serde_json::json!(config.timeout_seconds))
            .with_metadata("max_requests_per_second", serde_json::json!(config.max_requests_per_second));
        context.info("Initializing RPC client");

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MonitorError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let min_request_spacing = match config.max_requests_per_second {
            0 => None,
            rate => Some(Duration::from_secs(1) / rate),
        };

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            min_request_spacing,
            last_request: Mutex::new(None),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn throttle(&self) {
        let Some(spacing) = self.min_request_spacing else {
            return;
        };

        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < spacing {
                sleep(spacing - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn make_request(&self, method: &str, params: Vec<Value>) -> Result<Value, ChainError> {
        self.throttle().await;

        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let monitor = PerformanceMonitor::new(&format!("rpc_{}", method))
            .with_metadata("request_id", serde_json::json!(request.id));
        let result = self.send(&request).await;
        let duration = monitor.finish_with_result(&result);
        MetricsLogger::log_rpc_call(method, duration, result.is_ok());

        result
    }

    async fn send(&self, request: &JsonRpcRequest<'_>) -> Result<Value, ChainError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ChainError::RateLimit(format!("HTTP {} from provider", status.as_u16())));
        }
        if status.is_server_error() {
            return Err(ChainError::TransientNetwork(format!("HTTP {} from provider", status.as_u16())));
        }
        if !status.is_success() {
            return Err(ChainError::ProviderProtocol(format!(
                "HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body = response.text().await.map_err(classify_transport_error)?;
        let rpc_response: JsonRpcResponse = serde_json::from_str(&body)
            .map_err(|e| ChainError::ProviderProtocol(format!("Invalid JSON-RPC response: {}", e)))?;

        if let Some(error) = rpc_response.error {
            return Err(classify_rpc_error(error.code, &error.message));
        }

        rpc_response.result.ok_or_else(|| {
            ChainError::ProviderProtocol(format!("No result in response to {}", request.method))
        })
    }
}

#[async_trait]
impl ChainClient for RpcClient {
    async fn open_block_filter(&self) -> Result<FilterHandle, ChainError> {
        let result = self.make_request("eth_newBlockFilter", vec![]).await?;
        let id = result
            .as_str()
            .ok_or_else(|| ChainError::ProviderProtocol("Filter id is not a string".to_string()))?;
        Ok(FilterHandle(id.to_string()))
    }

    async fn poll_new_block_hashes(&self, filter: &FilterHandle) -> Result<Vec<BlockRef>, ChainError> {
        let result = self
            .make_request("eth_getFilterChanges", vec![Value::String(filter.0.clone())])
            .await?;
        let hashes: Vec<String> = serde_json::from_value(result)
            .map_err(|e| ChainError::ProviderProtocol(format!("Failed to parse filter changes: {}", e)))?;
        Ok(hashes.into_iter().map(BlockRef::from_hash).collect())
    }

    async fn fetch_block(&self, block: &BlockRef) -> Result<Block, ChainError> {
        let params = vec![
            Value::String(block.hash.clone()),
            Value::Bool(true), // Include full transaction objects
        ];
        let result = self.make_request("eth_getBlockByHash", params).await?;
        let raw: RpcBlock = serde_json::from_value(result)
            .map_err(|e| ChainError::ProviderProtocol(format!("Failed to parse block {}: {}", block.hash, e)))?;

        let number = parse_hex_to_u64(&raw.number)?;
        let transactions = raw
            .transactions
            .into_iter()
            .map(|tx| {
                let block_number = match tx.block_number.as_deref() {
                    Some(hex) => parse_hex_to_u64(hex)?,
                    None => number,
                };
                Ok(Transaction {
                    hash: tx.hash,
                    from: tx.from,
                    to: tx.to,
                    block_number,
                })
            })
            .collect::<Result<Vec<_>, ChainError>>()?;

        Ok(Block {
            hash: raw.hash,
            number,
            transactions,
        })
    }

    async fn fetch_transaction_receipt(&self, transaction_hash: &str) -> Result<Receipt, ChainError> {
        let result = self
            .make_request("eth_getTransactionReceipt", vec![Value::String(transaction_hash.to_string())])
            .await?;
        let raw: RpcReceipt = serde_json::from_value(result)
            .map_err(|e| ChainError::ProviderProtocol(format!("Failed to parse receipt {}: {}", transaction_hash, e)))?;

        Ok(Receipt {
            transaction_hash: raw.transaction_hash,
            contract_address: raw.contract_address,
        })
    }

    async fn fetch_code(&self, address: &str) -> Result<Vec<u8>, ChainError> {
        let params = vec![Value::String(address.to_string()), Value::String("latest".to_string())];
        let result = self.make_request("eth_getCode", params).await?;
        let code = result
            .as_str()
            .ok_or_else(|| ChainError::ProviderProtocol("Code is not a string".to_string()))?;
        decode_hex_bytes(code)
    }
}

fn classify_transport_error(error: reqwest::Error) -> ChainError {
    if error.status() == Some(StatusCode::TOO_MANY_REQUESTS) {
        ChainError::RateLimit(error.to_string())
    } else if error.is_decode() {
        ChainError::ProviderProtocol(error.to_string())
    } else {
        ChainError::TransientNetwork(error.to_string())
    }
}

/// Map a JSON-RPC error object onto the failure taxonomy.
pub fn classify_rpc_error(code: i64, message: &str) -> ChainError {
    let lower = message.to_lowercase();
    let detail = format!("code {}: {}", code, message);

    if code == -32005
        || lower.contains("rate limit")
        || lower.contains("too many requests")
        || lower.contains("limit exceeded")
    {
        ChainError::RateLimit(detail)
    } else if lower.contains("filter not found") || lower.contains("filter does not exist") {
        ChainError::FilterNotFound(detail)
    } else if code == -32603 || lower.contains("timeout") || lower.contains("timed out") {
        ChainError::TransientNetwork(detail)
    } else {
        ChainError::ProviderProtocol(detail)
    }
}

fn parse_hex_to_u64(hex_str: &str) -> Result<u64, ChainError> {
    let hex_without_prefix = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    u64::from_str_radix(hex_without_prefix, 16)
        .map_err(|e| ChainError::ProviderProtocol(format!("Failed to parse hex '{}' to u64: {}", hex_str, e)))
}

fn decode_hex_bytes(hex_str: &str) -> Result<Vec<u8>, ChainError> {
    let hex_without_prefix = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    hex::decode(hex_without_prefix)
        .map_err(|e| ChainError::ProviderProtocol(format!("Failed to decode code bytes: {}", e)))
}
