pub mod chain;
pub mod contract;
pub mod seen_set;

pub use chain::{Block, BlockRef, FilterHandle, Receipt, Transaction};
pub use contract::{ContractRecord, DiscoveryReason};
pub use seen_set::{normalize_address, SeenSet};
