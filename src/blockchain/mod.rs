pub mod block_monitor;
pub mod block_processor;
pub mod chain_client;
pub mod contract_detector;
pub mod mock_client;
pub mod rpc_client;

pub use block_monitor::{BlockMonitor, MonitorStatus, ShutdownSignal, SubscriptionState};
pub use block_processor::{BlockOutcome, BlockProcessor, BlockSummary};
pub use chain_client::ChainClient;
pub use contract_detector::{Classification, ContractDetector};
pub use mock_client::{ClientCall, MockChainClient};
pub use rpc_client::RpcClient;
