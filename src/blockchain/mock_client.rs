//! Scripted in-memory chain client.
//!
//! Serves blocks, receipts and code from maps, replays a queue of poll
//! results and injected failures, and keeps a log of every call so tests can
//! assert on the exact I/O the monitor performed.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::blockchain::{ChainClient, ShutdownSignal};
use crate::error::ChainError;
use crate::models::{normalize_address, Block, BlockRef, FilterHandle, Receipt};

/// One call received by the mock, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCall {
    OpenBlockFilter,
    PollNewBlockHashes(FilterHandle),
    FetchBlock(String),
    FetchTransactionReceipt(String),
    FetchCode(String),
}

#[derive(Default)]
struct MockState {
    blocks: HashMap<String, Block>,
    receipts: HashMap<String, Receipt>,
    code: HashMap<String, Vec<u8>>,
    polls: VecDeque<Result<Vec<BlockRef>, ChainError>>,
    open_failures: VecDeque<ChainError>,
    block_failures: HashMap<String, VecDeque<ChainError>>,
    receipt_failures: HashMap<String, VecDeque<ChainError>>,
    code_failures: HashMap<String, VecDeque<ChainError>>,
    calls: Vec<ClientCall>,
    filters_opened: u64,
    shutdown_when_drained: Option<ShutdownSignal>,
}

#[derive(Default)]
pub struct MockChainClient {
    state: Mutex<MockState>,
}

impl MockChainClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state(self, update: impl FnOnce(&mut MockState)) -> Self {
        if let Ok(mut state) = self.state.lock() {
            update(&mut state);
        }
        self
    }

    pub fn with_block(self, block: Block) -> Self {
        self.with_state(|state| {
            state.blocks.insert(block.hash.clone(), block);
        })
    }

    /// Receipt of a creation transaction deploying `contract_address`
    pub fn with_receipt(self, transaction_hash: &str, contract_address: Option<&str>) -> Self {
        self.with_state(|state| {
            state.receipts.insert(
                transaction_hash.to_string(),
                Receipt {
                    transaction_hash: transaction_hash.to_string(),
                    contract_address: contract_address.map(str::to_string),
                },
            );
        })
    }

    /// Deployed code; addresses without code return empty bytes
    pub fn with_code(self, address: &str, code: Vec<u8>) -> Self {
        self.with_state(|state| {
            state.code.insert(normalize_address(address), code);
        })
    }

    pub fn with_poll(self, hashes: &[&str]) -> Self {
        self.with_state(|state| {
            state
                .polls
                .push_back(Ok(hashes.iter().map(|hash| BlockRef::from_hash(*hash)).collect()));
        })
    }

    pub fn with_poll_error(self, error: ChainError) -> Self {
        self.with_state(|state| state.polls.push_back(Err(error)))
    }

    pub fn with_open_failure(self, error: ChainError) -> Self {
        self.with_state(|state| state.open_failures.push_back(error))
    }

    pub fn with_block_failure(self, block_hash: &str, error: ChainError) -> Self {
        self.with_state(|state| {
            state
                .block_failures
                .entry(block_hash.to_string())
                .or_default()
                .push_back(error);
        })
    }

    pub fn with_receipt_failure(self, transaction_hash: &str, error: ChainError) -> Self {
        self.with_state(|state| {
            state
                .receipt_failures
                .entry(transaction_hash.to_string())
                .or_default()
                .push_back(error);
        })
    }

    pub fn with_code_failure(self, address: &str, error: ChainError) -> Self {
        self.with_state(|state| {
            state
                .code_failures
                .entry(normalize_address(address))
                .or_default()
                .push_back(error);
        })
    }

    /// Trigger `signal` on the first poll after the scripted polls ran out
    pub fn with_shutdown_when_drained(self, signal: ShutdownSignal) -> Self {
        self.with_state(|state| state.shutdown_when_drained = Some(signal))
    }

    pub fn calls(&self) -> Vec<ClientCall> {
        self.state.lock().map(|state| state.calls.clone()).unwrap_or_default()
    }

    pub fn code_fetches(&self, address: &str) -> usize {
        let wanted = normalize_address(address);
        self.calls()
            .iter()
            .filter(|call| matches!(call, ClientCall::FetchCode(a) if normalize_address(a) == wanted))
            .count()
    }

    pub fn filters_opened(&self) -> u64 {
        self.state.lock().map(|state| state.filters_opened).unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MockState>, ChainError> {
        self.state
            .lock()
            .map_err(|_| ChainError::ProviderProtocol("mock state poisoned".to_string()))
    }
}

fn pop_failure(failures: &mut HashMap<String, VecDeque<ChainError>>, key: &str) -> Option<ChainError> {
    failures.get_mut(key).and_then(VecDeque::pop_front)
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn open_block_filter(&self) -> Result<FilterHandle, ChainError> {
        let mut state = self.lock()?;
        state.calls.push(ClientCall::OpenBlockFilter);
        if let Some(error) = state.open_failures.pop_front() {
            return Err(error);
        }
        state.filters_opened += 1;
        Ok(FilterHandle(format!("0x{:x}", state.filters_opened)))
    }

    async fn poll_new_block_hashes(&self, filter: &FilterHandle) -> Result<Vec<BlockRef>, ChainError> {
        let mut state = self.lock()?;
        state.calls.push(ClientCall::PollNewBlockHashes(filter.clone()));
        match state.polls.pop_front() {
            Some(result) => result,
            None => {
                if let Some(signal) = &state.shutdown_when_drained {
                    signal.trigger();
                }
                Ok(Vec::new())
            }
        }
    }

    async fn fetch_block(&self, block: &BlockRef) -> Result<Block, ChainError> {
        let mut state = self.lock()?;
        state.calls.push(ClientCall::FetchBlock(block.hash.clone()));
        if let Some(error) = pop_failure(&mut state.block_failures, &block.hash) {
            return Err(error);
        }
        state
            .blocks
            .get(&block.hash)
            .cloned()
            .ok_or_else(|| ChainError::ProviderProtocol(format!("No result in response to eth_getBlockByHash ({})", block.hash)))
    }

    async fn fetch_transaction_receipt(&self, transaction_hash: &str) -> Result<Receipt, ChainError> {
        let mut state = self.lock()?;
        state.calls.push(ClientCall::FetchTransactionReceipt(transaction_hash.to_string()));
        if let Some(error) = pop_failure(&mut state.receipt_failures, transaction_hash) {
            return Err(error);
        }
        state
            .receipts
            .get(transaction_hash)
            .cloned()
            .ok_or_else(|| ChainError::ProviderProtocol(format!("No result in response to eth_getTransactionReceipt ({})", transaction_hash)))
    }

    async fn fetch_code(&self, address: &str) -> Result<Vec<u8>, ChainError> {
        let mut state = self.lock()?;
        state.calls.push(ClientCall::FetchCode(address.to_string()));
        let key = normalize_address(address);
        if let Some(error) = pop_failure(&mut state.code_failures, &key) {
            return Err(error);
        }
        Ok(state.code.get(&key).cloned().unwrap_or_default())
    }
}
