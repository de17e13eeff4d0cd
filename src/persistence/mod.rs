use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::TradeLogError;
use crate::models::ExecutionRecord;

/// Column header written once when the trade log is created
pub const CSV_HEADER: [&str; 8] = [
    "Timestamp", "Coin", "Action", "Price", "Qty", "Balance", "Profit%", "Reason",
];

/// Append-only sink for completed trades
pub trait TradeLog: Send {
    fn append(&mut self, record: &ExecutionRecord) -> Result<(), TradeLogError>;
}

/// CSV trade log, one row per execution record
///
/// The file is opened in append mode on every write so it can be inspected or
/// rotated while the bot runs. A missing file is created with the header row.
pub struct CsvTradeLog {
    path: PathBuf,
}

impl CsvTradeLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TradeLog for CsvTradeLog {
    fn append(&mut self, record: &ExecutionRecord) -> Result<(), TradeLogError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let exists = self.path.is_file() && fs::metadata(&self.path)?.len() > 0;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = csv::Writer::from_writer(file);
        if !exists {
            writer.write_record(CSV_HEADER)?;
        }
        writer.write_record(csv_row(record))?;
        writer.flush()?;

        Ok(())
    }
}

fn csv_row(record: &ExecutionRecord) -> [String; 8] {
    [
        record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
        record.symbol.clone(),
        record.side.as_str().to_string(),
        record.price.to_string(),
        record.quantity.to_string(),
        format!("{:.2}", record.balance),
        record
            .profit_pct
            .map(|p| format!("{:.2}%", p))
            .unwrap_or_default(),
        record.reason.clone(),
    ]
}

/// In-memory trade log; clones share the same records
#[derive(Clone, Default)]
pub struct MemoryTradeLog {
    records: Arc<Mutex<Vec<ExecutionRecord>>>,
}

impl MemoryTradeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TradeLog for MemoryTradeLog {
    fn append(&mut self, record: &ExecutionRecord) -> Result<(), TradeLogError> {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        records.push(record.clone());
        Ok(())
    }
}
