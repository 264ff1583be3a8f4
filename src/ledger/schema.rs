use crate::models::ContractRecord;

/// Column names of the ledger file, written once when the file is created
pub const HEADER: [&str; 3] = ["Block", "Transaction Hash", "Contract Address"];

/// A data row read back from the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRow {
    pub block_number: u64,
    pub transaction_hash: String,
    pub address: String,
}

/// Render the header line, terminated by a newline
pub fn header_line() -> String {
    let mut line = HEADER.join(",");
    line.push('\n');
    line
}

/// Serialize a record as one delimited line, terminated by a newline
pub fn format_row(record: &ContractRecord) -> String {
    format!(
        "{},{},{}\n",
        record.block_number,
        escape_field(&record.transaction_hash),
        escape_field(&record.address)
    )
}

/// Whether a line is the header row. Tolerates spaces after the delimiter.
pub fn is_header(line: &str) -> bool {
    let fields = split_fields(line);
    fields.len() == HEADER.len()
        && fields.iter().zip(HEADER.iter()).all(|(field, name)| field == name)
}

/// Parse a data row. Returns `None` when the line does not have the expected
/// shape.
pub fn parse_row(line: &str) -> Option<LedgerRow> {
    let fields = split_fields(line);
    if fields.len() < HEADER.len() {
        return None;
    }

    let block_number = fields[0].parse::<u64>().ok()?;
    let address = fields[2].clone();
    if address.is_empty() {
        return None;
    }

    Some(LedgerRow {
        block_number,
        transaction_hash: fields[1].clone(),
        address,
    })
}

fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.trim_end_matches(['\r', '\n']).chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_line() {
        assert_eq!(header_line(), "Block,Transaction Hash,Contract Address\n");
        assert!(is_header("Block,Transaction Hash,Contract Address"));
        assert!(is_header("Block, Transaction Hash, Contract Address\r"));
        assert!(!is_header("100,0xh1,0xAAA"));
    }

    #[test]
    fn test_format_row() {
        let record = ContractRecord::created(100, "0xh1", "0xAAA");
        assert_eq!(format_row(&record), "100,0xh1,0xAAA\n");
    }

    #[test]
    fn test_parse_row() {
        let row = parse_row("100,0xh1,0xAAA\r\n").expect("row should parse");
        assert_eq!(row.block_number, 100);
        assert_eq!(row.transaction_hash, "0xh1");
        assert_eq!(row.address, "0xAAA");
    }

    #[test]
    fn test_parse_row_rejects_short_or_invalid_rows() {
        assert!(parse_row("100,0xh1").is_none());
        assert!(parse_row("block,0xh1,0xAAA").is_none());
        assert!(parse_row("100,0xh1,").is_none());
    }

    #[test]
    fn test_quoted_fields_survive() {
        let record = ContractRecord::called_with_code(7, "0x\"odd\",hash", "0xBBB");
        let line = format_row(&record);
        let row = parse_row(&line).expect("quoted row should parse");
        assert_eq!(row.transaction_hash, "0x\"odd\",hash");
        assert_eq!(row.address, "0xBBB");
    }
}
