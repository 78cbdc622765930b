//! Biometric Vault - Namespaced Preference Storage
//!
//! Small string key-value records grouped into namespaces. The file backend
//! keeps one JSON document per namespace and writes it atomically.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};

use crate::error::{BiometricError, BiometricResult};

/// Namespaced string storage
pub trait PreferenceStore: Send + Sync {
    /// Value stored under `key`, if any
    fn get(&self, namespace: &str, key: &str) -> BiometricResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn put(&self, namespace: &str, key: &str, value: String) -> BiometricResult<()>;

    /// Remove `key`; removing a missing key is not an error
    fn remove(&self, namespace: &str, key: &str) -> BiometricResult<()>;

    /// Drop every key in `namespace`
    fn clear(&self, namespace: &str) -> BiometricResult<()>;
}

// ═══════════════════════════════════════════════════════════════════════════
// IN-MEMORY
// ═══════════════════════════════════════════════════════════════════════════

/// Volatile preference store
#[derive(Default)]
pub struct MemoryPreferences {
    namespaces: RwLock<HashMap<String, BTreeMap<String, String>>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys held in `namespace`
    pub fn namespace_len(&self, namespace: &str) -> usize {
        self.namespaces
            .read()
            .get(namespace)
            .map(|ns| ns.len())
            .unwrap_or(0)
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, namespace: &str, key: &str) -> BiometricResult<Option<String>> {
        Ok(self
            .namespaces
            .read()
            .get(namespace)
            .and_then(|ns| ns.get(key).cloned()))
    }

    fn put(&self, namespace: &str, key: &str, value: String) -> BiometricResult<()> {
        self.namespaces
            .write()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, namespace: &str, key: &str) -> BiometricResult<()> {
        if let Some(ns) = self.namespaces.write().get_mut(namespace) {
            ns.remove(key);
        }
        Ok(())
    }

    fn clear(&self, namespace: &str) -> BiometricResult<()> {
        self.namespaces.write().remove(namespace);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// FILE BACKED
// ═══════════════════════════════════════════════════════════════════════════

/// Preference store persisting each namespace as `<root>/<namespace>.json`
pub struct FilePreferences {
    root: PathBuf,
    // Serializes read-modify-write cycles on namespace files
    lock: Mutex<()>,
}

impl FilePreferences {
    /// Open (and create if needed) a store rooted at `root`
    pub fn open(root: &Path) -> BiometricResult<Self> {
        if !root.exists() {
            fs::create_dir_all(root)?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(root, fs::Permissions::from_mode(0o700))?;
            }
        }

        Ok(Self {
            root: root.to_path_buf(),
            lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_path(&self, namespace: &str) -> PathBuf {
        self.root.join(format!("{}.json", encode_namespace(namespace)))
    }

    fn load(&self, namespace: &str) -> BiometricResult<BTreeMap<String, String>> {
        let path = self.namespace_path(namespace);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let data = fs::read(&path)?;
        serde_json::from_slice(&data).map_err(|e| {
            BiometricError::StorageError(format!("{}: {}", path.display(), e))
        })
    }

    /// Write to a temp file, fsync, then rename over the target
    fn persist(&self, namespace: &str, values: &BTreeMap<String, String>) -> BiometricResult<()> {
        let path = self.namespace_path(namespace);
        let temp_path = path.with_extension("tmp");

        let data = serde_json::to_vec_pretty(values)?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;

        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    /// Overwrite with zeros, then unlink
    fn shred(path: &Path) -> BiometricResult<()> {
        if !path.exists() {
            return Ok(());
        }

        if let Ok(metadata) = fs::metadata(path) {
            let size = metadata.len() as usize;
            if size > 0 {
                if let Ok(mut file) = OpenOptions::new().write(true).open(path) {
                    let _ = file.write_all(&vec![0u8; size]);
                    let _ = file.sync_all();
                }
            }
        }

        fs::remove_file(path)?;
        Ok(())
    }
}

impl PreferenceStore for FilePreferences {
    fn get(&self, namespace: &str, key: &str) -> BiometricResult<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self.load(namespace)?.remove(key))
    }

    fn put(&self, namespace: &str, key: &str, value: String) -> BiometricResult<()> {
        let _guard = self.lock.lock();
        let mut values = self.load(namespace)?;
        values.insert(key.to_string(), value);
        self.persist(namespace, &values)
    }

    fn remove(&self, namespace: &str, key: &str) -> BiometricResult<()> {
        let _guard = self.lock.lock();
        let mut values = self.load(namespace)?;
        if values.remove(key).is_some() {
            self.persist(namespace, &values)?;
        }
        Ok(())
    }

    fn clear(&self, namespace: &str) -> BiometricResult<()> {
        let _guard = self.lock.lock();
        Self::shred(&self.namespace_path(namespace))
    }
}

/// Make a namespace safe as a file stem; unsafe bytes become `%XX`
fn encode_namespace(namespace: &str) -> String {
    let mut out = String::with_capacity(namespace.len());
    for byte in namespace.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'-' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
