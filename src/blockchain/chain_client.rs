//! The read-only chain operations the monitor depends on.

use async_trait::async_trait;

use crate::error::ChainError;
use crate::models::{Block, BlockRef, FilterHandle, Receipt};

/// Narrow view of an EVM JSON-RPC provider.
///
/// The concrete implementation is picked when the monitor is built: the live
/// [`RpcClient`](crate::blockchain::RpcClient) in production and the scripted
/// [`MockChainClient`](crate::blockchain::MockChainClient) in tests. Every
/// call is independently retryable.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Install a provider-side filter that accumulates new block hashes.
    async fn open_block_filter(&self) -> Result<FilterHandle, ChainError>;

    /// Block hashes that arrived since the previous poll, in provider order.
    /// The order is not guaranteed to follow block numbers.
    async fn poll_new_block_hashes(&self, filter: &FilterHandle) -> Result<Vec<BlockRef>, ChainError>;

    /// Fetch a block with full transaction objects.
    async fn fetch_block(&self, block: &BlockRef) -> Result<Block, ChainError>;

    async fn fetch_transaction_receipt(&self, transaction_hash: &str) -> Result<Receipt, ChainError>;

    /// Deployed code at `address`; empty when the address is not a contract.
    async fn fetch_code(&self, address: &str) -> Result<Vec<u8>, ChainError>;
}
