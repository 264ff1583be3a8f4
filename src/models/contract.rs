use serde::{Deserialize, Serialize};

/// Why an address ended up in the ledger
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DiscoveryReason {
    /// Deployed by a transaction without a destination
    Created,
    /// Called by a transaction and found to carry code
    CalledWithCode,
}

impl std::fmt::Display for DiscoveryReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryReason::Created => f.write_str("created"),
            DiscoveryReason::CalledWithCode => f.write_str("called_with_code"),
        }
    }
}

/// One discovered contract. Never mutated once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContractRecord {
    pub block_number: u64,
    pub transaction_hash: String,
    /// Exactly as returned by the provider.
    pub address: String,
    pub reason: DiscoveryReason,
}

impl ContractRecord {
    pub fn created(block_number: u64, transaction_hash: &str, address: &str) -> Self {
        Self {
            block_number,
            transaction_hash: transaction_hash.to_string(),
            address: address.to_string(),
            reason: DiscoveryReason::Created,
        }
    }

    pub fn called_with_code(block_number: u64, transaction_hash: &str, address: &str) -> Self {
        Self {
            block_number,
            transaction_hash: transaction_hash.to_string(),
            address: address.to_string(),
            reason: DiscoveryReason::CalledWithCode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_record_serialization() {
        let record = ContractRecord::created(100, "0xh1", "0xAAA");

        let json = serde_json::to_string(&record).expect("Failed to serialize");
        assert!(json.contains("\"block_number\":100"));
        assert!(json.contains("\"reason\":\"Created\""));

        let deserialized: ContractRecord = serde_json::from_str(&json).expect("Failed to deserialize");
        assert_eq!(record, deserialized);
    }

    #[test]
    fn test_constructors_set_reason() {
        assert_eq!(ContractRecord::created(1, "0x1", "0xa").reason, DiscoveryReason::Created);
        assert_eq!(
            ContractRecord::called_with_code(1, "0x1", "0xa").reason,
            DiscoveryReason::CalledWithCode
        );
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(DiscoveryReason::Created.to_string(), "created");
        assert_eq!(DiscoveryReason::CalledWithCode.to_string(), "called_with_code");
    }
}
