//! Durable watch-lists and holdings.
//!
//! Each store is a single JSON file. Writes go to a temporary file in the
//! same directory which is fsynced and renamed over the target, so the
//! previous copy survives a crash mid-write. Loads never fail: missing or
//! corrupt files fall back to empty defaults and are logged.

pub mod holdings_text;

use dashboard_core::{normalize_symbol, DashboardError, Holdings, TickerUniverse};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Serialize `value` as pretty JSON and atomically replace `path`.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), DashboardError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let bytes = serde_json::to_vec_pretty(value)?;
    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(&bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| DashboardError::Storage(format!("{}: {}", path.display(), e.error)))?;
    Ok(())
}

fn read_json(path: &Path) -> Result<Option<Value>, DashboardError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Split the comma-separated edit-box form into symbols: trimmed,
/// upper-cased, blanks and repeats removed, order kept.
pub fn parse_ticker_text(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split(',')
        .filter_map(normalize_symbol)
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

#[derive(Debug, Clone)]
pub struct TickerStore {
    path: PathBuf,
}

impl TickerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Strict load; `Ok(None)` when the file does not exist yet.
    pub fn try_load(&self) -> Result<Option<TickerUniverse>, DashboardError> {
        match read_json(&self.path)? {
            Some(value) => {
                let universe: TickerUniverse = serde_json::from_value(value)?;
                Ok(Some(universe.normalized()))
            }
            None => Ok(None),
        }
    }

    pub fn load(&self) -> TickerUniverse {
        match self.try_load() {
            Ok(Some(universe)) => universe,
            Ok(None) => {
                tracing::info!("No ticker list at {}, starting empty", self.path.display());
                TickerUniverse::default()
            }
            Err(e) => {
                tracing::warn!(
                    "Ticker list at {} unreadable ({}), falling back to empty lists",
                    self.path.display(),
                    e
                );
                TickerUniverse::default()
            }
        }
    }

    pub fn save(&self, universe: &TickerUniverse) -> Result<(), DashboardError> {
        write_json_atomic(&self.path, universe)?;
        tracing::info!(
            "Saved {} US / {} KR tickers to {}",
            universe.us.len(),
            universe.kr.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct HoldingsStore {
    path: PathBuf,
}

impl HoldingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Strict load. Entries with a non-numeric or negative quantity are
    /// dropped; a file that is not a JSON object is an error.
    pub fn try_load(&self) -> Result<Option<Holdings>, DashboardError> {
        let value = match read_json(&self.path)? {
            Some(v) => v,
            None => return Ok(None),
        };
        let map = value
            .as_object()
            .ok_or_else(|| DashboardError::Parse("holdings file is not an object".to_string()))?;

        let mut holdings = Holdings::new();
        for (symbol, qty) in map {
            match (normalize_symbol(symbol), qty.as_f64()) {
                (Some(symbol), Some(qty)) if qty.is_finite() && qty >= 0.0 => {
                    holdings.insert(symbol, qty);
                }
                _ => tracing::debug!("Dropping malformed holding {:?}: {}", symbol, qty),
            }
        }
        Ok(Some(holdings))
    }

    pub fn load(&self) -> Holdings {
        match self.try_load() {
            Ok(Some(h)) => h,
            Ok(None) => Holdings::new(),
            Err(e) => {
                tracing::warn!(
                    "Holdings at {} unreadable ({}), falling back to empty",
                    self.path.display(),
                    e
                );
                Holdings::new()
            }
        }
    }

    pub fn save(&self, holdings: &Holdings) -> Result<(), DashboardError> {
        write_json_atomic(&self.path, holdings)?;
        tracing::info!("Saved {} holdings to {}", holdings.len(), self.path.display());
        Ok(())
    }

    /// Parse the edit-box text and save the well-formed subset.
    pub fn save_text(&self, text: &str) -> Result<Holdings, DashboardError> {
        let holdings = holdings_text::parse(text);
        self.save(&holdings)?;
        Ok(holdings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ticker_round_trip_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = TickerStore::new(dir.path().join("tickers.json"));

        let universe = TickerUniverse::new(
            vec!["NVDA", "AAPL", "MSFT", "BRK.B"],
            vec!["005930.KS", "000660.KS", "035720.KQ"],
        );
        store.save(&universe).unwrap();
        assert_eq!(store.load(), universe);
    }

    #[test]
    fn test_save_overwrites_previous_copy() {
        let dir = tempfile::tempdir().unwrap();
        let store = TickerStore::new(dir.path().join("nested/tickers.json"));

        store.save(&TickerUniverse::new(vec!["A", "B"], Vec::<String>::new())).unwrap();
        let second = TickerUniverse::new(vec!["C"], vec!["005930.KS"]);
        store.save(&second).unwrap();
        assert_eq!(store.load(), second);

        // no temp files left next to the store
        let entries: Vec<_> = fs::read_dir(dir.path().join("nested")).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = TickerStore::new(dir.path().join("absent.json"));
        assert!(store.try_load().unwrap().is_none());
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickers.json");
        fs::write(&path, b"{\"US\": [\"AAPL\", ").unwrap();

        let store = TickerStore::new(&path);
        assert!(store.try_load().is_err());
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_parse_ticker_text() {
        assert_eq!(
            parse_ticker_text(" nvda, AAPL ,, msft,NVDA "),
            vec!["NVDA", "AAPL", "MSFT"]
        );
        assert!(parse_ticker_text("").is_empty());
    }

    #[test]
    fn test_holdings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = HoldingsStore::new(dir.path().join("holdings.json"));

        let saved = store.save_text("AAPL:10, BAD, MSFT:5.5").unwrap();
        assert_eq!(saved.len(), 2);

        let loaded = store.load();
        assert_eq!(loaded, saved);
        assert_relative_eq!(loaded["MSFT"], 5.5);
    }

    #[test]
    fn test_holdings_file_with_malformed_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holdings.json");
        fs::write(&path, br#"{"AAPL": 3, "MSFT": "lots", "TSLA": -1, "nvda": 2.5}"#).unwrap();

        let holdings = HoldingsStore::new(&path).load();
        assert_eq!(holdings.len(), 2);
        assert_relative_eq!(holdings["AAPL"], 3.0);
        assert_relative_eq!(holdings["NVDA"], 2.5);
    }

    #[test]
    fn test_holdings_not_an_object_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holdings.json");
        fs::write(&path, b"[1, 2, 3]").unwrap();
        assert!(HoldingsStore::new(&path).load().is_empty());
    }
}
