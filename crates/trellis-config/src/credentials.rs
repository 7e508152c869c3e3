//! Border Router credential store backed by `border_routers.json`.
//!
//! File format:
//!
//! ```json
//! { "border_routers": { "BR-001": {
//!     "auth_token": "…", "network_prefix": "fd78:8e78:3bfe:1::/64",
//!     "location": "hall", "nodes": ["n01", "n02"] } } }
//! ```
//!
//! Token verification is constant-time. A credential file that cannot
//! be parsed on the *first* load is a startup error; once a snapshot
//! exists, reload failures keep serving the previous snapshot.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use crate::DEFAULT_CACHE_TTL;
use crate::error::ConfigError;

/// One Border Router's configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrEntry {
    /// Shared secret presented at WebSocket connect.
    pub auth_token: String,
    /// Declared Thread network prefix.
    #[serde(default)]
    pub network_prefix: String,
    /// Physical location hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Business names of the nodes this BR fronts.
    #[serde(default)]
    pub nodes: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    border_routers: HashMap<String, BrEntry>,
}

struct Cached {
    snapshot: Arc<HashMap<String, BrEntry>>,
    loaded_at: Instant,
    stale: bool,
}

/// TTL-cached credential table keyed by BR id.
pub struct BrCredentials {
    path: PathBuf,
    ttl: Duration,
    cache: Mutex<Cached>,
    /// Serializes config writes (read-modify-write of the file).
    write_lock: Mutex<()>,
}

impl BrCredentials {
    /// Open the store, eagerly loading the file once.
    ///
    /// A missing file is an empty table; an unparseable file is fatal
    /// here and only here.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the file exists but is not
    /// valid JSON for the schema, [`ConfigError::Io`] on read failure
    /// other than absence.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Self::open_with_ttl(path, DEFAULT_CACHE_TTL)
    }

    /// [`BrCredentials::open`] with an explicit cache TTL.
    ///
    /// # Errors
    ///
    /// See [`BrCredentials::open`].
    pub fn open_with_ttl(path: impl Into<PathBuf>, ttl: Duration) -> Result<Self, ConfigError> {
        let path = path.into();
        let snapshot = Arc::new(read_file_strict(&path)?);
        info!(
            path = %path.display(),
            border_routers = snapshot.len(),
            "BR credential store loaded"
        );
        Ok(Self {
            path,
            ttl,
            cache: Mutex::new(Cached {
                snapshot,
                loaded_at: Instant::now(),
                stale: false,
            }),
            write_lock: Mutex::new(()),
        })
    }

    /// The backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Verify a BR's token in constant time.
    ///
    /// Unknown id, missing token, or empty inputs are all `false`.
    #[must_use]
    pub fn verify(&self, br_id: &str, token: &str) -> bool {
        if br_id.is_empty() || token.is_empty() {
            warn!("BR id or token missing");
            return false;
        }
        let snapshot = self.snapshot();
        let Some(entry) = snapshot.get(br_id) else {
            warn!(br_id, "Unknown Border Router");
            return false;
        };
        if entry.auth_token.is_empty() {
            warn!(br_id, "No token configured for Border Router");
            return false;
        }
        let ok = bool::from(
            token
                .as_bytes()
                .ct_eq(entry.auth_token.as_bytes()),
        );
        if ok {
            debug!(br_id, "BR token verified");
        } else {
            warn!(br_id, "BR token mismatch");
        }
        ok
    }

    /// Full configuration for a BR.
    #[must_use]
    pub fn entry(&self, br_id: &str) -> Option<BrEntry> {
        self.snapshot().get(br_id).cloned()
    }

    /// Declared node names for a BR (empty when unknown).
    #[must_use]
    pub fn nodes_for(&self, br_id: &str) -> Vec<String> {
        self.snapshot()
            .get(br_id)
            .map(|entry| entry.nodes.clone())
            .unwrap_or_default()
    }

    /// Declared network prefix for a BR (empty when unknown).
    #[must_use]
    pub fn network_prefix_for(&self, br_id: &str) -> String {
        self.snapshot()
            .get(br_id)
            .map(|entry| entry.network_prefix.clone())
            .unwrap_or_default()
    }

    /// All configured BR ids.
    #[must_use]
    pub fn all_ids(&self) -> Vec<String> {
        self.snapshot().keys().cloned().collect()
    }

    /// Add or replace a BR entry on disk, then invalidate the cache.
    ///
    /// Writes are serialized; concurrent readers keep the previous
    /// snapshot until the write lands.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be re-read,
    /// re-serialized, or written.
    pub fn add_border_router(&self, br_id: &str, entry: BrEntry) -> Result<(), ConfigError> {
        let _serialized = self.lock(&self.write_lock);

        let mut table = read_file_strict(&self.path)?;
        table.insert(br_id.to_string(), entry);

        let file = CredentialsFile {
            border_routers: table,
        };
        let text = serde_json::to_string_pretty(&file).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, text).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;

        // Swap the fresh table in directly.
        let mut cache = self.lock(&self.cache);
        cache.snapshot = Arc::new(file.border_routers);
        cache.loaded_at = Instant::now();
        cache.stale = false;

        info!(br_id, "Border Router added to credential store");
        Ok(())
    }

    /// Force a reload on the next read.
    pub fn invalidate(&self) {
        self.lock(&self.cache).stale = true;
    }

    fn snapshot(&self) -> Arc<HashMap<String, BrEntry>> {
        {
            let cache = self.lock(&self.cache);
            if !cache.stale && cache.loaded_at.elapsed() < self.ttl {
                return Arc::clone(&cache.snapshot);
            }
        }
        // Stale: reload without holding the lock across file I/O.
        match read_file_strict(&self.path) {
            Ok(table) => {
                let snapshot = Arc::new(table);
                let mut cache = self.lock(&self.cache);
                cache.snapshot = Arc::clone(&snapshot);
                cache.loaded_at = Instant::now();
                cache.stale = false;
                snapshot
            },
            Err(e) => {
                warn!(error = %e, "Credential reload failed; keeping previous snapshot");
                let mut cache = self.lock(&self.cache);
                cache.loaded_at = Instant::now();
                cache.stale = false;
                Arc::clone(&cache.snapshot)
            },
        }
    }

    fn lock<'a, T>(&self, mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
        match mutex.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn read_file_strict(path: &Path) -> Result<HashMap<String, BrEntry>, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "BR credential file not found; empty table");
            return Ok(HashMap::new());
        },
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        },
    };
    let file: CredentialsFile =
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(file.border_routers)
}

/// Generate a fresh random token (64 hex chars).
#[must_use]
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    for byte in &mut bytes {
        *byte = fastrand::u8(..);
    }
    hex::encode(bytes)
}
