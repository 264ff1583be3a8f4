pub mod operations;
pub mod schema;


pub use operations::Ledger;
pub use schema::{format_row, is_header, parse_row, LedgerRow, HEADER};
