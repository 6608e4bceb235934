//! Append-only trade ledger, one JSON file per UTC day.
//!
//! Records are kept most-recent-first: each append reads the day's file,
//! inserts at the front, and rewrites it whole.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::Signal;

/// What a ledger record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LedgerEvent {
    Entry,
    Exit,
    ForcedExit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRecord {
    /// Milliseconds since epoch.
    pub timestamp: i64,
    pub symbol: String,
    pub event: LedgerEvent,
    pub signal: Signal,
    #[serde(with = "rust_decimal::serde::str")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub balance_before: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub balance_after: Decimal,
    pub reason: String,
}

pub struct TradeLedger {
    dir: PathBuf,
}

impl TradeLedger {
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating ledger dir {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Append a record to the current day's file, newest first.
    pub fn append(&self, record: LedgerRecord) -> Result<()> {
        let day = DateTime::<Utc>::from_timestamp_millis(record.timestamp)
            .unwrap_or_else(Utc::now);
        let path = self.day_file(day);

        let mut records = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("reading ledger file {}", path.display()))?;
            serde_json::from_str::<Vec<LedgerRecord>>(&contents)
                .with_context(|| format!("parsing ledger file {}", path.display()))?
        } else {
            Vec::new()
        };

        info!(
            symbol = %record.symbol,
            event = ?record.event,
            signal = record.signal.as_str(),
            quantity = %record.quantity,
            price = %record.price,
            "ledger append"
        );

        records.insert(0, record);

        // Write-replace so a crash mid-write cannot corrupt the day's file.
        let contents = serde_json::to_string_pretty(&records).context("serialising ledger")?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)
            .with_context(|| format!("writing ledger file {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("replacing ledger file {}", path.display()))?;
        Ok(())
    }

    /// Records for one UTC day, most recent first.
    pub fn read_day(&self, day: DateTime<Utc>) -> Result<Vec<LedgerRecord>> {
        let path = self.day_file(day);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("reading ledger file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("parsing ledger file {}", path.display()))
    }

    fn day_file(&self, day: DateTime<Utc>) -> PathBuf {
        self.dir
            .join(format!("trades_{}.json", day.format("%Y-%m-%d")))
    }
}
