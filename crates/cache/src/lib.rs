//! In-memory ephemeral cache with per-entry expiry.
//!
//! The cache is a derived, disposable accelerator in front of the persisted
//! store: it may be dropped entirely at any time without data loss, and none
//! of its failure modes are ever surfaced to callers. Entries live under a
//! fixed `gitmemo:` namespace so scans and `clear()` stay scoped even when
//! the process shares storage with unrelated state.
//!
//! Construct one instance per process and hand it to whoever needs it; the
//! clock is injectable so tests control expiry.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

/// Fixed namespace prefix for every cache key.
pub const KEY_PREFIX: &str = "gitmemo:";

/// Envelope schema version. Bumping it invalidates every existing entry.
pub const CACHE_VERSION: &str = "1";

/// Default entry lifetime: 15 minutes.
pub const DEFAULT_TTL_MS: i64 = 15 * 60 * 1000;

/// Category TTLs. All currently share the 15-minute staleness window.
pub const ISSUES_TTL_MS: i64 = DEFAULT_TTL_MS;
pub const LABELS_TTL_MS: i64 = DEFAULT_TTL_MS;
pub const CONFIG_TTL_MS: i64 = DEFAULT_TTL_MS;

const DEFAULT_MAX_ENTRIES: usize = 1024;

/// Per-write options: how long the entry lives and which schema version it
/// was written under.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub expiry_ms: i64,
    pub version: String,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            expiry_ms: DEFAULT_TTL_MS,
            version: CACHE_VERSION.to_string(),
        }
    }
}

impl CacheOptions {
    pub fn with_ttl(expiry_ms: i64) -> Self {
        Self {
            expiry_ms,
            ..Self::default()
        }
    }
}

/// Stored envelope: payload plus the metadata needed to judge freshness.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    data: serde_json::Value,
    timestamp: DateTime<Utc>,
    version: String,
    expiry_ms: i64,
}

/// Snapshot of cache occupancy.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub size: usize,
    pub keys: Vec<String>,
}

type Clock = std::sync::Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Namespaced key-value cache with lazy expiry and a bounded entry count.
///
/// Entries are stored as serialized JSON envelopes; a corrupt envelope is
/// treated as a miss and removed. Writes that hit the capacity bound trigger
/// one expired-entry sweep and a single retry, after which the write is
/// dropped and logged, never an error to the caller.
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
    max_entries: usize,
    clock: Clock,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries,
            clock: std::sync::Arc::new(Utc::now),
        }
    }

    /// Replace the time source. Tests use this to control expiry.
    pub fn with_clock(
        mut self,
        clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static,
    ) -> Self {
        self.clock = std::sync::Arc::new(clock);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().expect("cache mutex poisoned")
    }

    /// Store a value under `key`. Infallible from the caller's perspective.
    pub fn set<T: Serialize>(&self, key: &str, data: &T, options: CacheOptions) {
        debug_assert!(key.starts_with(KEY_PREFIX), "unnamespaced cache key: {key}");

        let payload = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(e) => {
                warn!("cache set {key}: serialize failed, dropping write: {e}");
                return;
            }
        };
        let envelope = Envelope {
            data: payload,
            timestamp: self.now(),
            version: options.version,
            expiry_ms: options.expiry_ms,
        };
        let serialized = match serde_json::to_string(&envelope) {
            Ok(s) => s,
            Err(e) => {
                warn!("cache set {key}: envelope serialize failed, dropping write: {e}");
                return;
            }
        };

        let mut entries = self.entries();
        if entries.len() >= self.max_entries && !entries.contains_key(key) {
            // Capacity hit: sweep expired entries under our prefix, retry once.
            let removed = Self::sweep_expired(&mut entries, self.now());
            debug!("cache full, sweep removed {removed} expired entries");
            if entries.len() >= self.max_entries {
                warn!("cache set {key}: still full after sweep, dropping write");
                return;
            }
        }
        entries.insert(key.to_string(), serialized);
    }

    /// Fetch a value. Expired, corrupt, or version-mismatched entries are
    /// removed and reported as a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut entries = self.entries();
        let serialized = entries.get(key)?;

        let envelope: Envelope = match serde_json::from_str(serialized) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!("cache get {key}: corrupt envelope, removing: {e}");
                entries.remove(key);
                return None;
            }
        };

        if envelope.version != CACHE_VERSION {
            debug!(
                "cache get {key}: version {} != {CACHE_VERSION}, removing",
                envelope.version
            );
            entries.remove(key);
            return None;
        }

        if Self::is_expired(&envelope, self.now()) {
            entries.remove(key);
            return None;
        }

        match serde_json::from_value(envelope.data) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("cache get {key}: corrupt payload, removing: {e}");
                entries.remove(key);
                None
            }
        }
    }

    /// Expiry-aware presence check. An expired entry is removed, not revived.
    pub fn has(&self, key: &str) -> bool {
        let mut entries = self.entries();
        let Some(serialized) = entries.get(key) else {
            return false;
        };
        match serde_json::from_str::<Envelope>(serialized) {
            Ok(envelope)
                if envelope.version == CACHE_VERSION
                    && !Self::is_expired(&envelope, self.now()) =>
            {
                true
            }
            _ => {
                entries.remove(key);
                false
            }
        }
    }

    pub fn remove(&self, key: &str) {
        self.entries().remove(key);
    }

    /// Remove every entry whose key starts with `prefix`. Returns the count.
    pub fn remove_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }

    /// Drop every entry under the `gitmemo:` namespace.
    pub fn clear(&self) {
        self.remove_prefix(KEY_PREFIX);
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries();
        let mut keys: Vec<String> = entries
            .keys()
            .filter(|k| k.starts_with(KEY_PREFIX))
            .cloned()
            .collect();
        keys.sort();
        CacheStats {
            size: keys.len(),
            keys,
        }
    }

    fn is_expired(envelope: &Envelope, now: DateTime<Utc>) -> bool {
        (now - envelope.timestamp).num_milliseconds() > envelope.expiry_ms
    }

    fn sweep_expired(entries: &mut HashMap<String, String>, now: DateTime<Utc>) -> usize {
        let before = entries.len();
        entries.retain(|key, serialized| {
            if !key.starts_with(KEY_PREFIX) {
                return true;
            }
            match serde_json::from_str::<Envelope>(serialized) {
                Ok(envelope) => !Self::is_expired(&envelope, now),
                // Corrupt entries go too.
                Err(_) => false,
            }
        });
        before - entries.len()
    }
}

/// Key builders for every cached category.
pub mod keys {
    use super::KEY_PREFIX;

    pub fn issue_list(owner: &str, repo: &str, page: u32, labels: &[String]) -> String {
        format!(
            "{KEY_PREFIX}issues:{owner}:{repo}:{page}:{}",
            labels.join(",")
        )
    }

    /// Prefix covering every cached issue list for a repository. Used to
    /// invalidate listings after a write.
    pub fn issue_list_prefix(owner: &str, repo: &str) -> String {
        format!("{KEY_PREFIX}issues:{owner}:{repo}:")
    }

    pub fn issue(owner: &str, repo: &str, number: i64) -> String {
        format!("{KEY_PREFIX}issue:{owner}:{repo}:{number}")
    }

    pub fn labels(owner: &str, repo: &str) -> String {
        format!("{KEY_PREFIX}labels:{owner}:{repo}")
    }

    pub fn config(owner: &str, repo: &str) -> String {
        format!("{KEY_PREFIX}config:{owner}:{repo}")
    }
}
