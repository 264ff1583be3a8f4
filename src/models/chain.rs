use serde::{Deserialize, Serialize};

/// Provider-side handle of a "new block" filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterHandle(pub String);

impl FilterHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FilterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Block identifier as delivered by a block filter. Only used to fetch the
/// full block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    pub hash: String,
    pub number: Option<u64>,
}

impl BlockRef {
    pub fn from_hash(hash: impl Into<String>) -> Self {
        Self { hash: hash.into(), number: None }
    }
}

impl std::fmt::Display for BlockRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.number {
            Some(number) => write!(f, "#{} ({})", number, self.hash),
            None => f.write_str(&self.hash),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: String,
    pub from: String,
    /// `None` marks a contract creation.
    pub to: Option<String>,
    pub block_number: u64,
}

impl Transaction {
    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }
}

/// A block with its transactions in the order the chain executed them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub hash: String,
    pub number: u64,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub transaction_hash: String,
    /// Present only for contract creations.
    pub contract_address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_creation_detection() {
        let creation = Transaction {
            hash: "0xh1".to_string(),
            from: "0xdeployer".to_string(),
            to: None,
            block_number: 100,
        };
        assert!(creation.is_contract_creation());

        let call = Transaction { to: Some("0xAAA".to_string()), ..creation };
        assert!(!call.is_contract_creation());
    }

    #[test]
    fn test_block_ref_display() {
        assert_eq!(BlockRef::from_hash("0xabc").to_string(), "0xabc");

        let numbered = BlockRef { hash: "0xabc".to_string(), number: Some(100) };
        assert_eq!(numbered.to_string(), "#100 (0xabc)");
    }
}
