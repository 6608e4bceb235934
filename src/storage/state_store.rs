//! Per-symbol trade state persistence.
//!
//! One JSON file per symbol, replaced wholesale on every mutation. The store
//! also owns the per-symbol async locks that keep the decision cycle and the
//! reconciler mutually exclusive for the same symbol.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tracing::info;

use crate::types::TradeState;

pub struct StateStore {
    dir: PathBuf,
    states: HashMap<String, Arc<Mutex<TradeState>>>,
}

impl StateStore {
    /// Load (or initialise) the state for every configured symbol.
    pub fn open(dir: &Path, symbols: &[String]) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating state dir {}", dir.display()))?;

        let mut states = HashMap::new();
        for symbol in symbols {
            let path = dir.join(file_name(symbol));
            let state = if path.exists() {
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading state file {}", path.display()))?;
                let state: TradeState = serde_json::from_str(&contents)
                    .with_context(|| format!("parsing state file {}", path.display()))?;
                info!(symbol = %symbol, size = %state.size, "loaded trade state");
                state
            } else {
                TradeState::default()
            };
            states.insert(symbol.clone(), Arc::new(Mutex::new(state)));
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            states,
        })
    }

    /// Per-symbol state handle. The embedded mutex is the same-symbol
    /// exclusion point between the cycle controller and the reconciler.
    pub fn state(&self, symbol: &str) -> Option<Arc<Mutex<TradeState>>> {
        self.states.get(symbol).cloned()
    }

    /// Write-replace the state file for `symbol`.
    ///
    /// Writes to a sibling temp file and renames over the target, so readers
    /// never observe a partially written record.
    pub fn persist(&self, symbol: &str, state: &TradeState) -> Result<()> {
        let path = self.dir.join(file_name(symbol));
        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(state)
            .with_context(|| format!("serialising state for {symbol}"))?;
        std::fs::write(&tmp, contents)
            .with_context(|| format!("writing state file {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("replacing state file {}", path.display()))?;
        Ok(())
    }
}

/// `BTC/USDT` -> `BTC-USDT.json`.
fn file_name(symbol: &str) -> String {
    format!("{}.json", symbol.replace('/', "-"))
}
