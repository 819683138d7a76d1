//! Idempotency lock
//!
//! Each registered intent leaves `{lock_dir}/{identity}.lock.json` holding the
//! declared entry and its content hash. A later run with an identical entry
//! skips the intent without touching the network; any change to the entry
//! changes the hash and triggers a full registration.

use std::fs;
use std::path::{Path, PathBuf};

use helix_chain::sha256_hex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::RegisterError;
use crate::intent::RegistrationIntent;

/// Normalized intent text and its sha256
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentHash {
    pub origin: String,
    pub hash: String,
}

/// Persisted lock document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRecord {
    pub register: Value,
    pub hash: ContentHash,
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Hash an intent: `key=value;` over sorted keys, lower-cased, sha256.
pub fn hash_intent(intent: &RegistrationIntent) -> ContentHash {
    let origin: String = intent
        .raw_fields()
        .iter()
        .map(|(k, v)| format!("{}={};", k, render(v)))
        .collect::<String>()
        .to_lowercase();
    let hash = sha256_hex(origin.as_bytes());
    ContentHash { origin, hash }
}

/// Directory of lock records
#[derive(Debug, Clone)]
pub struct LockStore {
    dir: PathBuf,
}

impl LockStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.lock.json"))
    }

    /// True when a record exists for `name` with the same hash
    pub fn check(&self, name: &str, hash: &ContentHash) -> Result<bool, RegisterError> {
        let path = self.path_for(name);
        if !path.exists() {
            return Ok(false);
        }

        let text = fs::read_to_string(&path).map_err(|e| RegisterError::Lock {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let record: LockRecord = match serde_json::from_str(&text) {
            Ok(r) => r,
            Err(e) => {
                warn!(lock = %path.display(), error = %e, "Unreadable lock record, registering again");
                return Ok(false);
            }
        };

        if record.hash.hash != hash.hash {
            warn!(bridge = name, "Detected changes for bridge, registering again");
            return Ok(false);
        }
        Ok(true)
    }

    /// Persist the record for `name`, replacing any previous one
    pub fn commit(
        &self,
        name: &str,
        hash: &ContentHash,
        payload: Value,
    ) -> Result<PathBuf, RegisterError> {
        let path = self.path_for(name);
        let lock_err = |e: std::io::Error| RegisterError::Lock {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        fs::create_dir_all(&self.dir).map_err(lock_err)?;
        let record = LockRecord {
            register: payload,
            hash: hash.clone(),
        };
        let json = serde_json::to_string_pretty(&record).map_err(|e| RegisterError::Lock {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(lock_err)?;
        fs::rename(&tmp, &path).map_err(lock_err)?;

        info!(lock = %path.display(), "Wrote lock");
        Ok(path)
    }
}
