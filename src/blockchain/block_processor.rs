use std::sync::Arc;

use serde_json::json;

use crate::blockchain::contract_detector::{Classification, ContractDetector};
use crate::blockchain::ChainClient;
use crate::error::MonitorError;
use crate::ledger::Ledger;
use crate::logging::{LogContext, MetricsLogger};
use crate::models::{BlockRef, ContractRecord};

/// What happened to one block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOutcome {
    Processed(BlockSummary),
    /// The provider returned no usable block; nothing was classified
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockSummary {
    pub block_number: u64,
    pub transaction_count: usize,
    pub records: Vec<ContractRecord>,
    pub skipped_transactions: usize,
}

pub struct BlockProcessor<C> {
    client: Arc<C>,
    contract_detector: ContractDetector<C>,
}

impl<C: ChainClient> BlockProcessor<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            contract_detector: ContractDetector::new(Arc::clone(&client)),
            client,
        }
    }

    /// Fetch a block and classify its transactions one by one, in the order
    /// the chain executed them. Rows reach the ledger in that same order.
    ///
    /// Transient and rate-limit failures are returned to the caller; the
    /// block can be processed again later without duplicating rows.
    pub async fn process(&self, block_ref: &BlockRef, ledger: &mut Ledger) -> Result<BlockOutcome, MonitorError> {
        let block = match self.client.fetch_block(block_ref).await {
            Ok(block) => block,
            Err(e) if e.is_protocol() => {
                LogContext::new("block_processor", "fetch_block")
                    .with_block_hash(&block_ref.hash)
                    .warn(&format!("Skipping block {}: {}", block_ref, e));
                return Ok(BlockOutcome::Skipped);
            }
            Err(e) => return Err(e.into()),
        };

        MetricsLogger::log_block_observed(&block.hash, block.number, block.transactions.len());

        let mut summary = BlockSummary {
            block_number: block.number,
            transaction_count: block.transactions.len(),
            ..BlockSummary::default()
        };

        for tx in &block.transactions {
            match self.contract_detector.classify(tx, ledger).await? {
                Classification::Recorded(record) => summary.records.push(record),
                Classification::Skipped => summary.skipped_transactions += 1,
                _ => {}
            }
        }

        LogContext::new("block_processor", "process")
            .with_block_number(block.number)
            .with_metadata("records", json!(summary.records.len()))
            .with_metadata("skipped_transactions", json!(summary.skipped_transactions))
            .debug(&format!(
                "Block {} done: {} new contracts",
                block.number,
                summary.records.len()
            ));

        Ok(BlockOutcome::Processed(summary))
    }
}
