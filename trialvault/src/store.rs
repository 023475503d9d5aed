//! Record store contract and the in-memory reference substrate.
//!
//! The production substrate is an external ordered, versioned ledger. The core
//! only sees it through [`RecordStore`]. [`InMemoryLedger`] honours the same
//! contract for tests and for the operator binary: writes are buffered in a
//! transaction and committed together under one transaction id and timestamp.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::ops::Bound;

use crate::error::{LedgerError, Result};

/// Error types for substrate operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Substrate not reachable
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Key rejected by the substrate
    #[error("Invalid key: '{0}'")]
    InvalidKey(String),

    /// Range bounds out of order
    #[error("Invalid range: start '{start}' is after end '{end}'")]
    InvalidRange { start: String, end: String },
}

/// One commit to a key, as reported by the substrate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Committing transaction
    pub tx_id: String,
    /// Transaction timestamp
    pub timestamp: DateTime<Utc>,
    /// Value written, `None` for a deletion
    #[serde(with = "hex_value")]
    pub value: Option<Vec<u8>>,
}

impl HistoryEntry {
    /// Whether this commit deleted the key.
    pub fn is_delete(&self) -> bool {
        self.value.is_none()
    }
}

/// Versioned key-value store with range scan and per-key history.
///
/// Isolation between concurrent invocations is the implementor's concern.
pub trait RecordStore {
    /// Current value of `key`, if any.
    fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, StoreError>;

    /// Write `value` under `key`.
    fn put(&mut self, key: &str, value: Vec<u8>) -> std::result::Result<(), StoreError>;

    /// Live entries with `start <= key < end`, in key order.
    ///
    /// An empty bound is open on that side; both empty scans everything.
    fn range_scan(
        &self,
        start: &str,
        end: &str,
    ) -> std::result::Result<Vec<(String, Vec<u8>)>, StoreError>;

    /// Every commit to `key`, oldest first.
    fn history(&self, key: &str) -> std::result::Result<Vec<HistoryEntry>, StoreError>;
}

/// Read and decode a JSON value.
pub(crate) fn load_json<T, S>(store: &S, key: &str) -> Result<Option<T>>
where
    T: DeserializeOwned,
    S: RecordStore + ?Sized,
{
    match store.get(key)? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| LedgerError::Codec {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

/// Encode and write a JSON value.
pub(crate) fn save_json<T, S>(store: &mut S, key: &str, value: &T) -> Result<()>
where
    T: Serialize,
    S: RecordStore + ?Sized,
{
    let bytes = serde_json::to_vec(value).map_err(|source| LedgerError::Codec {
        key: key.to_string(),
        source,
    })?;
    store.put(key, bytes)?;
    Ok(())
}

/// In-memory ledger with per-key history.
///
/// Reads inside a transaction observe committed state only; a transaction's
/// writes become visible when it commits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryLedger {
    /// Commit history per key, oldest first
    entries: BTreeMap<String, Vec<HistoryEntry>>,
    /// Number of committed transactions that wrote something
    height: u64,
}

impl InMemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed transactions.
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Current value of `key`.
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries
            .get(key)
            .and_then(|h| h.last())
            .and_then(|e| e.value.as_deref())
    }

    /// Number of commits ever made to `key`.
    pub fn commit_count(&self, key: &str) -> usize {
        self.entries.get(key).map(Vec::len).unwrap_or(0)
    }

    /// Total commits across all keys.
    pub fn total_commits(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Deterministic transaction id for the next commit.
    ///
    /// Derived from the ledger height and `seed`, so every replica computing it
    /// from the same committed state gets the same id.
    pub fn derive_tx_id(&self, seed: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.height.to_be_bytes());
        hasher.update(seed.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Open a transaction.
    pub fn transaction(
        &mut self,
        tx_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> LedgerTransaction<'_> {
        LedgerTransaction {
            ledger: self,
            tx_id: tx_id.into(),
            timestamp,
            writes: BTreeMap::new(),
        }
    }

    /// Run `f` in a transaction, committing only if it returns `Ok`.
    pub fn execute<T, E, F>(
        &mut self,
        tx_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        f: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut LedgerTransaction<'_>) -> std::result::Result<T, E>,
    {
        let mut tx = self.transaction(tx_id, timestamp);
        let out = f(&mut tx)?;
        tx.commit();
        Ok(out)
    }

    fn scan(
        &self,
        start: &str,
        end: &str,
    ) -> std::result::Result<Vec<(String, Vec<u8>)>, StoreError> {
        if !start.is_empty() && !end.is_empty() && start > end {
            return Err(StoreError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        let lower = if start.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Included(start.to_string())
        };
        let upper = if end.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Excluded(end.to_string())
        };

        Ok(self
            .entries
            .range::<String, _>((lower, upper))
            .filter_map(|(key, history)| {
                history
                    .last()
                    .and_then(|e| e.value.clone())
                    .map(|value| (key.clone(), value))
            })
            .collect())
    }
}

/// An open transaction against an [`InMemoryLedger`].
///
/// Dropping it without [`commit`](Self::commit) discards every buffered write.
pub struct LedgerTransaction<'a> {
    ledger: &'a mut InMemoryLedger,
    tx_id: String,
    timestamp: DateTime<Utc>,
    /// Buffered writes; `None` marks a deletion
    writes: BTreeMap<String, Option<Vec<u8>>>,
}

impl<'a> LedgerTransaction<'a> {
    /// Transaction id.
    pub fn tx_id(&self) -> &str {
        &self.tx_id
    }

    /// Buffer a deletion of `key`.
    ///
    /// Only the substrate deletes; the core never calls this.
    pub fn delete(&mut self, key: &str) -> std::result::Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        self.writes.insert(key.to_string(), None);
        Ok(())
    }

    /// Apply buffered writes and return how many keys changed.
    pub fn commit(self) -> usize {
        let written = self.writes.len();
        if written == 0 {
            return 0;
        }
        for (key, value) in self.writes {
            self.ledger.entries.entry(key).or_default().push(HistoryEntry {
                tx_id: self.tx_id.clone(),
                timestamp: self.timestamp,
                value,
            });
        }
        self.ledger.height += 1;
        tracing::debug!(
            tx_id = %self.tx_id,
            keys = written,
            height = self.ledger.height,
            "Committed transaction"
        );
        written
    }
}

impl RecordStore for LedgerTransaction<'_> {
    fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, StoreError> {
        Ok(self.ledger.get(key).map(<[u8]>::to_vec))
    }

    fn put(&mut self, key: &str, value: Vec<u8>) -> std::result::Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        self.writes.insert(key.to_string(), Some(value));
        Ok(())
    }

    fn range_scan(
        &self,
        start: &str,
        end: &str,
    ) -> std::result::Result<Vec<(String, Vec<u8>)>, StoreError> {
        self.ledger.scan(start, end)
    }

    fn history(&self, key: &str) -> std::result::Result<Vec<HistoryEntry>, StoreError> {
        Ok(self.ledger.entries.get(key).cloned().unwrap_or_default())
    }
}

/// Hex encoding of history values in snapshots.
mod hex_value {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => s.serialize_some(&hex::encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(d)?;
        encoded
            .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_commit_records_history() {
        let mut ledger = InMemoryLedger::new();

        let mut tx = ledger.transaction("tx1", ts(1));
        tx.put("a", b"1".to_vec()).unwrap();
        tx.put("b", b"2".to_vec()).unwrap();
        assert_eq!(tx.commit(), 2);

        let mut tx = ledger.transaction("tx2", ts(2));
        tx.put("a", b"3".to_vec()).unwrap();
        tx.commit();

        assert_eq!(ledger.get("a"), Some(&b"3"[..]));
        assert_eq!(ledger.commit_count("a"), 2);
        assert_eq!(ledger.height(), 2);

        let tx = ledger.transaction("tx3", ts(3));
        let history = tx.history("a").unwrap();
        assert_eq!(history[0].tx_id, "tx1");
        assert_eq!(history[1].tx_id, "tx2");
        assert_eq!(history[1].timestamp, ts(2));
    }

    #[test]
    fn test_reads_see_committed_state_only() {
        let mut ledger = InMemoryLedger::new();
        let mut tx = ledger.transaction("tx1", ts(1));
        tx.put("a", b"1".to_vec()).unwrap();
        assert_eq!(tx.get("a").unwrap(), None);
        tx.commit();
        assert!(ledger.get("a").is_some());
    }

    #[test]
    fn test_dropped_transaction_discards_writes() {
        let mut ledger = InMemoryLedger::new();
        {
            let mut tx = ledger.transaction("tx1", ts(1));
            tx.put("a", b"1".to_vec()).unwrap();
        }
        assert_eq!(ledger.get("a"), None);
        assert_eq!(ledger.height(), 0);
    }

    #[test]
    fn test_execute_rolls_back_on_error() {
        let mut ledger = InMemoryLedger::new();
        let result: std::result::Result<(), StoreError> =
            ledger.execute("tx1", ts(1), |tx| {
                tx.put("a", b"1".to_vec())?;
                Err(StoreError::Unavailable("boom".into()))
            });
        assert!(result.is_err());
        assert_eq!(ledger.total_commits(), 0);
    }

    #[test]
    fn test_range_scan_bounds_and_tombstones() {
        let mut ledger = InMemoryLedger::new();
        let mut tx = ledger.transaction("tx1", ts(1));
        for key in ["a", "b", "c", "d"] {
            tx.put(key, key.as_bytes().to_vec()).unwrap();
        }
        tx.commit();
        let mut tx = ledger.transaction("tx2", ts(2));
        tx.delete("c").unwrap();
        tx.commit();

        let tx = ledger.transaction("tx3", ts(3));
        let all: Vec<_> = tx.range_scan("", "").unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(all, vec!["a", "b", "d"]);

        let bounded: Vec<_> = tx.range_scan("b", "d").unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(bounded, vec!["b"]);

        assert!(matches!(
            tx.range_scan("d", "a"),
            Err(StoreError::InvalidRange { .. })
        ));

        let history = tx.history("c").unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[1].is_delete());
    }

    #[test]
    fn test_empty_key_rejected() {
        let mut ledger = InMemoryLedger::new();
        let mut tx = ledger.transaction("tx1", ts(1));
        assert!(matches!(tx.put("", vec![]), Err(StoreError::InvalidKey(_))));
    }

    #[test]
    fn test_snapshot_roundtrip_keeps_history() {
        let mut ledger = InMemoryLedger::new();
        let mut tx = ledger.transaction("tx1", ts(1));
        tx.put("a", br#"{"x":1}"#.to_vec()).unwrap();
        tx.commit();
        let mut tx = ledger.transaction("tx2", ts(2));
        tx.delete("a").unwrap();
        tx.commit();

        let json = serde_json::to_string(&ledger).unwrap();
        let restored: InMemoryLedger = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.height(), 2);
        assert_eq!(restored.commit_count("a"), 2);
        assert_eq!(restored.get("a"), None);
    }

    #[test]
    fn test_derived_tx_id_is_deterministic() {
        let ledger = InMemoryLedger::new();
        assert_eq!(ledger.derive_tx_id("seed"), ledger.derive_tx_id("seed"));
        assert_ne!(ledger.derive_tx_id("seed"), ledger.derive_tx_id("other"));
        assert_eq!(ledger.derive_tx_id("seed").len(), 64);
    }
}
