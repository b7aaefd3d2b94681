//! # Cache Module
//!
//! Timestamped JSON blobs, one per data source, shared between concurrent
//! statusline invocations through a well-known directory.
//!
//! Reads never fail outward: a missing file, an unparsable envelope, an
//! expired entry or a schema version mismatch all come back as `None`.
//! Writes are best-effort and swallow I/O errors.

use chrono::TimeDelta;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::clock::Clock;

/// Prefix shared by every cache file name
const FILE_PREFIX: &str = "claude-statusline-";

/// Clock skew tolerated between processes sharing the cache directory
const FUTURE_SKEW_MS: i64 = 60_000;

/// Cache policy for one data source
#[derive(Debug, Clone, Copy)]
pub struct CacheSource {
    pub key: &'static str,
    pub ttl: TimeDelta,
    pub version: Option<&'static str>,
}

pub const WEATHER: CacheSource = CacheSource {
    key: "weather",
    ttl: TimeDelta::minutes(30),
    version: Some("1.0"),
};

pub const BITCOIN: CacheSource = CacheSource {
    key: "bitcoin",
    ttl: TimeDelta::minutes(15),
    version: None,
};

pub const USAGE: CacheSource = CacheSource {
    key: "usage",
    ttl: TimeDelta::seconds(60),
    version: Some("1"),
};

/// On-disk envelope: `{timestamp, version?, data}`
#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    data: T,
}

/// Raw key/value storage behind the cache
pub trait CacheBackend: Send + Sync {
    fn load(&self, key: &str) -> Option<String>;
    fn store(&self, key: &str, contents: &str) -> io::Result<()>;
}

/// One file per key under a shared directory (normally the OS temp dir)
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{key}.json"))
    }
}

impl CacheBackend for FileBackend {
    fn load(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    fn store(&self, key: &str, contents: &str) -> io::Result<()> {
        let target = self.path_for(key);
        // Rename into place so a concurrent reader sees either the old or the new blob
        let staging = self
            .dir
            .join(format!("{FILE_PREFIX}{key}.{}.tmp", std::process::id()));
        fs::write(&staging, contents)?;
        fs::rename(&staging, &target).inspect_err(|_| {
            let _ = fs::remove_file(&staging);
        })
    }
}

/// Process-local storage, used by tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    pub fn insert_raw(&self, key: &str, contents: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), contents.to_string());
        }
    }
}

impl CacheBackend for MemoryBackend {
    fn load(&self, key: &str) -> Option<String> {
        self.raw(key)
    }

    fn store(&self, key: &str, contents: &str) -> io::Result<()> {
        self.entries
            .lock()
            .map_err(|_| io::Error::other("memory cache poisoned"))?
            .insert(key.to_string(), contents.to_string());
        Ok(())
    }
}

/// TTL- and version-aware cache over a [`CacheBackend`]
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    /// Return the cached payload if present, fresh and of the expected version
    pub fn read<T: DeserializeOwned>(&self, source: &CacheSource) -> Option<T> {
        let raw = self.backend.load(source.key)?;
        let envelope: Envelope<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(env) => env,
            Err(err) => {
                tracing::debug!(key = source.key, "unreadable cache entry: {}", err);
                return None;
            }
        };

        if let Some(expected) = source.version {
            if envelope.version.as_deref() != Some(expected) {
                tracing::debug!(
                    key = source.key,
                    found = ?envelope.version,
                    expected,
                    "cache version mismatch"
                );
                return None;
            }
        }

        let Some(age_ms) = self.clock.now_millis().checked_sub(envelope.timestamp) else {
            tracing::debug!(key = source.key, timestamp = envelope.timestamp, "cache timestamp out of range");
            return None;
        };
        if age_ms < -FUTURE_SKEW_MS {
            tracing::debug!(key = source.key, age_ms, "cache entry stamped in the future");
            return None;
        }
        if age_ms >= source.ttl.num_milliseconds() {
            tracing::debug!(key = source.key, age_ms, "cache entry expired");
            return None;
        }

        serde_json::from_value(envelope.data).ok()
    }

    /// Persist a payload stamped with the current time; failures are logged and dropped
    pub fn write<T: Serialize>(&self, source: &CacheSource, payload: &T) {
        let envelope = Envelope {
            timestamp: self.clock.now_millis(),
            version: source.version.map(str::to_string),
            data: payload,
        };
        let encoded = match serde_json::to_string(&envelope) {
            Ok(s) => s,
            Err(err) => {
                tracing::debug!(key = source.key, "cache encode failed: {}", err);
                return;
            }
        };
        if let Err(err) = self.backend.store(source.key, &encoded) {
            tracing::debug!(key = source.key, "cache write failed: {}", err);
        }
    }
}
