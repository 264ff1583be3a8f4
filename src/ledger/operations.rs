use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::json;

use crate::error::LedgerError;
use crate::ledger::schema::{format_row, header_line, is_header, parse_row, LedgerRow};
use crate::logging::LogContext;
use crate::models::{ContractRecord, SeenSet};

/// Append-only ledger of discovered contracts together with the in-memory
/// dedup state derived from it.
///
/// `seen` holds every address that was recorded or checked for code;
/// `recorded` only the addresses that own a row in the file.
pub struct Ledger {
    path: PathBuf,
    file: File,
    seen: SeenSet,
    recorded: SeenSet,
    rows_appended: u64,
}

impl Ledger {
    /// Open the ledger at `path`, creating it with a header row when it does
    /// not exist yet, or replaying every row into the dedup state when it does.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let context = LogContext::new("ledger", "open")
            .with_metadata("path", json!(path.display().to_string()));

        let existing_len = match fs::metadata(&path) {
            Ok(metadata) => Some(metadata.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(LedgerError::Io(e)),
        };

        let mut recorded = SeenSet::new();
        let mut needs_header = true;
        let mut needs_newline = false;

        if let Some(len) = existing_len.filter(|len| *len > 0) {
            context.info(&format!("Appending to ledger file ({} bytes)", len));
            let content = fs::read_to_string(&path)?;
            let replayed = replay(&content)?;
            for row in &replayed.rows {
                recorded.insert(&row.address);
            }

            match replayed.torn_offset {
                Some(offset) => {
                    // Never acknowledged, so dropping the partial line loses nothing
                    let file = OpenOptions::new().write(true).open(&path)?;
                    file.set_len(offset as u64)?;
                    file.sync_all()?;
                    needs_header = offset == 0;
                }
                None => {
                    needs_header = false;
                    needs_newline = !content.ends_with('\n');
                }
            }
        } else {
            context.info("Creating ledger file");
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if needs_header {
            file.write_all(header_line().as_bytes())?;
            file.sync_data()?;
        } else if needs_newline {
            file.write_all(b"\n")?;
            file.sync_data()?;
        }

        let mut seen = SeenSet::new();
        for address in recorded.iter() {
            seen.insert(address);
        }

        context
            .with_metadata("known_addresses", json!(recorded.len()))
            .info(&format!("Loaded {} known contract addresses", recorded.len()));

        Ok(Ledger {
            path,
            file,
            seen,
            recorded,
            rows_appended: 0,
        })
    }

    /// Read every data row of a ledger file without opening it for writing
    pub fn read_rows(path: impl AsRef<Path>) -> Result<Vec<LedgerRow>, LedgerError> {
        let content = fs::read_to_string(path)?;
        Ok(replay(&content)?.rows)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    pub fn has_seen(&self, address: &str) -> bool {
        self.seen.contains(address)
    }

    /// Returns `true` when the address was not seen before.
    pub fn mark_seen(&mut self, address: &str) -> bool {
        self.seen.insert(address)
    }

    pub fn is_recorded(&self, address: &str) -> bool {
        self.recorded.contains(address)
    }

    pub fn recorded_count(&self) -> usize {
        self.recorded.len()
    }

    /// Rows written by this process, excluding replayed ones
    pub fn rows_appended(&self) -> u64 {
        self.rows_appended
    }

    /// Persist `record` unless its address already has a row. The row is on
    /// stable storage when this returns `Ok(true)`.
    pub fn record(&mut self, record: &ContractRecord) -> Result<bool, LedgerError> {
        if self.recorded.contains(&record.address) {
            LogContext::new("ledger", "record")
                .with_address(&record.address)
                .with_transaction_hash(&record.transaction_hash)
                .debug("Address already recorded, skipping row");
            self.seen.insert(&record.address);
            return Ok(false);
        }

        let row = format_row(record);
        self.file.write_all(row.as_bytes())?;
        self.file.flush()?;
        self.file.sync_data()?;

        self.recorded.insert(&record.address);
        self.seen.insert(&record.address);
        self.rows_appended += 1;
        Ok(true)
    }

    /// Flush everything to stable storage. Called on shutdown.
    pub fn flush(&mut self) -> Result<(), LedgerError> {
        self.file.flush()?;
        self.file.sync_all()?;

        LogContext::new("ledger", "flush")
            .with_metadata("rows_appended", json!(self.rows_appended))
            .info("Ledger flushed");
        Ok(())
    }
}

struct Replay {
    rows: Vec<LedgerRow>,
    /// Byte offset of an incomplete trailing line, if any
    torn_offset: Option<usize>,
}

/// Parse ledger content. A final data line without a newline is a torn write
/// from an interrupted append and is reported through `torn_offset`; any
/// malformed row before it is an error.
fn replay(content: &str) -> Result<Replay, LedgerError> {
    let torn_tail = !content.is_empty() && !content.ends_with('\n');
    let lines: Vec<&str> = content.lines().collect();
    let mut rows = Vec::with_capacity(lines.len());
    let mut torn_offset = None;

    for (index, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if index == 0 && is_header(trimmed) {
            continue;
        }

        // Every append ends with a newline, so a final line without one was
        // cut short even when what remains still parses
        if torn_tail && index + 1 == lines.len() {
            LogContext::new("ledger", "replay")
                .with_metadata("line", json!(index + 1))
                .warn(&format!("Dropping incomplete trailing row: {:?}", trimmed));
            torn_offset = Some(content.rfind('\n').map(|i| i + 1).unwrap_or(0));
            continue;
        }

        if trimmed.is_empty() {
            continue;
        }

        match parse_row(trimmed) {
            Some(row) => rows.push(row),
            None => {
                return Err(LedgerError::MalformedRow {
                    line: index + 1,
                    content: trimmed.to_string(),
                });
            }
        }
    }

    Ok(Replay { rows, torn_offset })
}
