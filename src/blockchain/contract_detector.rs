use std::sync::Arc;

use crate::blockchain::ChainClient;
use crate::error::{ChainError, MonitorError};
use crate::ledger::Ledger;
use crate::logging::{LogContext, MetricsLogger};
use crate::models::{ContractRecord, Transaction};

/// Outcome of classifying one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A new row was written to the ledger
    Recorded(ContractRecord),
    /// Creation of an address that already has a row
    AlreadyRecorded,
    /// Call to an address recorded or checked earlier; no I/O was done
    AlreadySeen,
    /// Call to an address without code
    NotAContract,
    /// The provider answered with something unusable; nothing was marked
    Skipped,
}

/// Decides per transaction whether a contract was discovered.
///
/// A transaction without a destination deploys a contract whose address is
/// read from its receipt. Any other transaction is a candidate call: its
/// destination is checked for code once per run, the first time it shows up.
pub struct ContractDetector<C> {
    client: Arc<C>,
}

impl<C: ChainClient> ContractDetector<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    pub async fn classify(&self, tx: &Transaction, ledger: &mut Ledger) -> Result<Classification, MonitorError> {
        match tx.to.as_deref() {
            None => self.classify_creation(tx, ledger).await,
            Some(destination) => self.classify_call(tx, destination, ledger).await,
        }
    }

    async fn classify_creation(&self, tx: &Transaction, ledger: &mut Ledger) -> Result<Classification, MonitorError> {
        let receipt = match self.client.fetch_transaction_receipt(&tx.hash).await {
            Ok(receipt) => receipt,
            Err(e) if e.is_protocol() => return Ok(skip(tx, None, &e)),
            Err(e) => return Err(e.into()),
        };

        let Some(address) = receipt.contract_address else {
            let missing = ChainError::ProviderProtocol("creation receipt has no contract address".to_string());
            return Ok(skip(tx, None, &missing));
        };

        let record = ContractRecord::created(tx.block_number, &tx.hash, &address);
        if ledger.record(&record)? {
            MetricsLogger::log_contract_discovered(&record);
            Ok(Classification::Recorded(record))
        } else {
            Ok(Classification::AlreadyRecorded)
        }
    }

    async fn classify_call(
        &self,
        tx: &Transaction,
        destination: &str,
        ledger: &mut Ledger,
    ) -> Result<Classification, MonitorError> {
        if ledger.has_seen(destination) {
            return Ok(Classification::AlreadySeen);
        }

        let code = match self.client.fetch_code(destination).await {
            Ok(code) => code,
            Err(e) if e.is_protocol() => return Ok(skip(tx, Some(destination), &e)),
            Err(e) => return Err(e.into()),
        };

        // Marked only once an answer arrived: a failed fetch leaves the address
        // unseen and the retried block fetches it again. Once answered, the
        // code is never fetched again for this address.
        ledger.mark_seen(destination);

        if code.is_empty() {
            LogContext::new("contract_detector", "classify_call")
                .with_address(destination)
                .trace("Destination has no code");
            return Ok(Classification::NotAContract);
        }

        let record = ContractRecord::called_with_code(tx.block_number, &tx.hash, destination);
        if ledger.record(&record)? {
            MetricsLogger::log_contract_discovered(&record);
            Ok(Classification::Recorded(record))
        } else {
            Ok(Classification::AlreadyRecorded)
        }
    }
}

fn skip(tx: &Transaction, address: Option<&str>, error: &ChainError) -> Classification {
    let mut context = LogContext::new("contract_detector", "skip_transaction")
        .with_transaction_hash(&tx.hash)
        .with_block_number(tx.block_number);
    if let Some(address) = address {
        context = context.with_address(address);
    }
    context.warn(&format!("Skipping transaction {}: {}", tx.hash, error));
    Classification::Skipped
}
