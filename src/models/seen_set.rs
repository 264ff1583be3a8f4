use std::collections::HashSet;

/// Canonical form used as the dedup key: trimmed, lowercase, `0x`-prefixed.
/// The ledger itself keeps the provider's spelling.
pub fn normalize_address(address: &str) -> String {
    let trimmed = address.trim();
    let without_prefix = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    format!("0x{}", without_prefix.to_lowercase())
}

/// Every address the monitor has recorded or checked for code.
///
/// Insertion-only: there is no way to remove an address once it has been
/// seen, so a negative code check suppresses rechecks for the rest of the run.
#[derive(Debug, Default, Clone)]
pub struct SeenSet {
    addresses: HashSet<String>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the address was not seen before.
    pub fn insert(&mut self, address: &str) -> bool {
        self.addresses.insert(normalize_address(address))
    }

    pub fn contains(&self, address: &str) -> bool {
        self.addresses.contains(&normalize_address(address))
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.addresses.iter().map(String::as_str)
    }
}
