//! JSON file persistence backend
//!
//! `JsonFileBackend` writes the store as a plain JSON document. The
//! passphrase is only checked against a salted SHA-256 verifier; the content
//! itself is NOT encrypted. It exists for development hosts and tests.
//!
//! Locking is advisory: a sibling `<path>.plk` file holds `user@host:pid` of
//! the process that opened the vault.

use pwledger_core::backends::PersistenceBackend;
use pwledger_core::errors::{Result, VaultError};
use pwledger_core::model::Entry;
use pwledger_core::store::EntryStore;
use pwledger_core_types::Sensitive;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

/// Current on-disk document version
pub const FORMAT_VERSION: u32 = 1;

/// Suffix appended to a vault path to name its lock file
pub const LOCK_SUFFIX: &str = ".plk";

#[derive(Debug, Serialize, Deserialize)]
struct VaultDocument {
    format: u32,
    /// Hex-encoded random salt
    salt: String,
    /// Hex-encoded SHA-256 of salt followed by passphrase
    verifier: String,
    #[serde(default)]
    empty_groups: Vec<String>,
    /// Named password policies, name → encoded policy
    #[serde(default)]
    policies: BTreeMap<String, String>,
    entries: Vec<Entry>,
}

/// Development backend storing one vault per JSON file
#[derive(Debug, Default)]
pub struct JsonFileBackend {
    /// Lock files this backend created and has not yet released
    held: Mutex<HashSet<PathBuf>>,
}

impl JsonFileBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of the lock file guarding `path`
    pub fn lock_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(LOCK_SUFFIX);
        PathBuf::from(name)
    }

    /// Whether this backend holds the lock on `path`
    pub fn holds_lock(&self, path: &Path) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(&Self::lock_path(path)))
            .unwrap_or(false)
    }

    fn held(&self) -> Result<std::sync::MutexGuard<'_, HashSet<PathBuf>>> {
        self.held.lock().map_err(|_| VaultError::Internal {
            message: "lock registry poisoned".to_string(),
        })
    }
}

fn verifier(salt: &[u8], passphrase: &Sensitive<String>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(passphrase.expose().as_bytes());
    hex::encode(hasher.finalize())
}

/// `user@host:pid` for the running process
pub fn lock_holder_identity() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    let host = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "localhost".to_string());
    format!("{}@{}:{}", user, host, std::process::id())
}

fn store_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "current".to_string())
}

fn corrupt(path: &Path, reason: impl Into<String>) -> VaultError {
    VaultError::Corrupt {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

impl PersistenceBackend for JsonFileBackend {
    fn load(&self, path: &Path, passphrase: &Sensitive<String>) -> Result<EntryStore> {
        let content = std::fs::read(path)?;
        let document: VaultDocument = serde_json::from_slice(&content)
            .map_err(|e| corrupt(path, format!("Invalid vault JSON: {e}")))?;

        if document.format != FORMAT_VERSION {
            return Err(corrupt(
                path,
                format!("Unsupported format version {}", document.format),
            ));
        }
        let salt = hex::decode(&document.salt)
            .map_err(|e| corrupt(path, format!("Invalid salt: {e}")))?;
        if verifier(&salt, passphrase) != document.verifier {
            return Err(VaultError::Authentication {
                path: path.display().to_string(),
            });
        }

        let entry_count = document.entries.len();
        let store = EntryStore::from_entries(
            store_name(path),
            document.entries,
            document.empty_groups,
        )
        .map_err(|e| corrupt(path, e.to_string()))?
        .with_policies(document.policies);
        debug!(path = %path.display(), entry_count, "vault loaded");
        Ok(store)
    }

    fn save(&self, store: &EntryStore, path: &Path, passphrase: &Sensitive<String>) -> Result<()> {
        let salt = Uuid::new_v4();
        let snapshot = store.snapshot();
        let document = VaultDocument {
            format: FORMAT_VERSION,
            salt: hex::encode(salt.as_bytes()),
            verifier: verifier(salt.as_bytes(), passphrase),
            empty_groups: snapshot.empty_groups,
            policies: snapshot.policies,
            entries: snapshot.entries,
        };
        let bytes = serde_json::to_vec_pretty(&document)?;

        // A failed write must leave the previous file intact
        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);
        std::fs::write(&tmp_path, &bytes)?;
        if let Err(e) = std::fs::rename(&tmp_path, path) {
            std::fs::remove_file(&tmp_path).ok();
            return Err(e.into());
        }
        debug!(path = %path.display(), entry_count = document.entries.len(), "vault saved");
        Ok(())
    }

    fn lock(&self, path: &Path) -> Result<()> {
        let lock_path = Self::lock_path(path);
        let mut held = self.held()?;
        if held.contains(&lock_path) {
            return Ok(());
        }

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(mut file) => {
                file.write_all(lock_holder_identity().as_bytes())?;
                held.insert(lock_path);
                debug!(path = %path.display(), "lock acquired");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let holder = std::fs::read_to_string(&lock_path)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_else(|_| "unknown".to_string());
                Err(VaultError::Locked {
                    path: path.display().to_string(),
                    holder,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn unlock(&self, path: &Path) -> Result<()> {
        let lock_path = Self::lock_path(path);
        let mut held = self.held()?;
        if !held.remove(&lock_path) {
            return Err(VaultError::LockNotHeld {
                path: path.display().to_string(),
            });
        }
        match std::fs::remove_file(&lock_path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "lock file vanished before unlock");
            }
            Err(e) => return Err(e.into()),
        }
        debug!(path = %path.display(), "lock released");
        Ok(())
    }
}

impl Drop for JsonFileBackend {
    fn drop(&mut self) {
        if let Ok(held) = self.held.get_mut() {
            for lock_path in held.drain() {
                std::fs::remove_file(&lock_path).ok();
            }
        }
    }
}
