use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::warn;

/// Default cooldown file path.
pub const COOLDOWN_PATH: &str = "cooldowns.json";

/// Persistent map from account address to next-eligible run time (epoch
/// millis). Absent entries read as 0, i.e. eligible now.
pub struct CooldownStore {
    path: PathBuf,
    entries: BTreeMap<String, u64>,
}

impl CooldownStore {
    /// Open the store at `path`. A missing or corrupt backing file reads as
    /// an empty store — losing a cooldown only makes an account run early.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Cooldown file {} is corrupt ({e}), starting empty", path.display());
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };
        Self { path, entries }
    }

    /// Next-eligible time for `address`, or 0 if never recorded.
    pub fn get(&self, address: &str) -> u64 {
        self.entries.get(&normalize(address)).copied().unwrap_or(0)
    }

    /// Upsert and rewrite the backing file immediately. No batching — a crash
    /// loses at most the in-flight update.
    pub fn set(&mut self, address: &str, next_eligible_ms: u64) -> Result<()> {
        self.entries.insert(normalize(address), next_eligible_ms);
        let json = serde_json::to_string_pretty(&self.entries)
            .context("failed to serialize cooldowns")?;
        let mut file = File::create(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        file.write_all(json.as_bytes())
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        file.sync_all()
            .with_context(|| format!("failed to flush {}", self.path.display()))?;
        Ok(())
    }
}

fn normalize(address: &str) -> String {
    address.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> CooldownStore {
        CooldownStore::open(dir.path().join("cooldowns.json"))
    }

    #[test]
    fn absent_entry_reads_zero() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.get("0xabc"), 0);
    }

    #[test]
    fn set_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.set("0xabc", 1_700_000_000_000).unwrap();
        assert_eq!(store.get("0xabc"), 1_700_000_000_000);
    }

    #[test]
    fn write_through_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cooldowns.json");
        {
            let mut store = CooldownStore::open(&path);
            store.set("0xabc", 42).unwrap();
        }
        let reopened = CooldownStore::open(&path);
        assert_eq!(reopened.get("0xabc"), 42);
    }

    #[test]
    fn keys_are_case_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.set("0xAbCdEf", 7).unwrap();
        assert_eq!(store.get("0xABCDEF"), 7);
        assert_eq!(store.get("0xabcdef"), 7);
    }

    #[test]
    fn corrupt_file_reads_empty_and_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cooldowns.json");
        std::fs::write(&path, "{not json").unwrap();

        let mut store = CooldownStore::open(&path);
        assert_eq!(store.get("0xabc"), 0);

        // A set after corruption rewrites the file wholesale
        store.set("0xabc", 9).unwrap();
        let reopened = CooldownStore::open(&path);
        assert_eq!(reopened.get("0xabc"), 9);
    }
}
