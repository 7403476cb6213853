//! Per-image client identity: stable identifiers for the remote service.
//!
//! The remote service has no accounts; it correlates submissions and
//! results through a caller-chosen client identifier. To make repeated
//! runs over the same image land in the same remote job listing, each
//! image name is assigned a 128-bit identifier on first encounter and
//! the mapping is persisted to a shared file.
//!
//! The persisted mapping is read and written as a whole JSON document
//! on every lookup. Within a process a mutex serializes the
//! read-modify-write; two *processes* assigning the same name for the
//! first time can still race and produce different identifiers.
//! Acceptable for a single-user tool: the loser's identifier is
//! simply overwritten and its remote jobs orphaned.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::types::UpscaleError;

/// Length of a client identifier in hex characters (128 bits).
pub const CLIENT_ID_LEN: usize = 32;

/// File name of the shared image-name → client-id mapping, created in
/// the OS temporary directory.
pub const CLIENT_ID_MAP_FILE: &str = "upsize_client_ids.json";

/// Whether a stored value is a well-formed client identifier:
/// exactly 32 lowercase hex characters.
#[must_use]
pub fn is_valid_client_id(id: &str) -> bool {
    id.len() == CLIENT_ID_LEN && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Generate a fresh client identifier: 128 random bits, lowercase hex.
fn generate_client_id() -> Result<String, UpscaleError> {
    let mut bytes = [0u8; CLIENT_ID_LEN / 2];
    getrandom::fill(&mut bytes)
        .map_err(|e| UpscaleError::Io(std::io::Error::other(e.to_string())))?;
    Ok(hex::encode(bytes))
}

/// Key-value store mapping image names to client identifiers.
///
/// [`get_or_create`](IdentityMap::get_or_create) is the operation the
/// orchestrator uses; `get`/`put` are the primitive store operations it
/// is built from.
pub trait IdentityMap {
    /// Look up the identifier stored for `name`, if any.
    fn get(&self, name: &str) -> Option<String>;

    /// Store `id` for `name`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`UpscaleError::Io`] if persisting the mapping fails.
    fn put(&self, name: &str, id: &str) -> Result<(), UpscaleError>;

    /// Return the identifier for `name`, creating and storing a fresh
    /// one if the name is unknown or its stored value is malformed.
    ///
    /// Idempotent: two sequential calls (in the same or different
    /// processes sharing the store) return the same value.
    ///
    /// # Errors
    ///
    /// Returns [`UpscaleError::Io`] if identifier generation or
    /// persistence fails.
    fn get_or_create(&self, name: &str) -> Result<String, UpscaleError> {
        if let Some(id) = self.get(name)
            && is_valid_client_id(&id)
        {
            return Ok(id);
        }
        let id = generate_client_id()?;
        self.put(name, &id)?;
        Ok(id)
    }
}

/// File-backed identity map at a fixed path.
///
/// A missing, empty, or corrupt file is treated as an empty mapping
/// rather than an error; the file is rewritten wholesale on every
/// `put`. The internal mutex gives single-writer discipline within
/// this process only (see the module docs for the cross-process
/// caveat).
#[derive(Debug)]
pub struct FileIdentityMap {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileIdentityMap {
    /// Create a map backed by the given file.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Create a map backed by the well-known shared file in the OS
    /// temporary directory.
    #[must_use]
    pub fn shared() -> Self {
        Self::new(std::env::temp_dir().join(CLIENT_ID_MAP_FILE))
    }

    /// The backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> BTreeMap<String, String> {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default()
    }

    fn store(&self, mapping: &BTreeMap<String, String>) -> Result<(), UpscaleError> {
        let text = serde_json::to_string(mapping)
            .map_err(|e| UpscaleError::Io(std::io::Error::other(e.to_string())))?;
        fs::write(&self.path, text)?;
        Ok(())
    }
}

impl IdentityMap for FileIdentityMap {
    fn get(&self, name: &str) -> Option<String> {
        let _guard = self
            .lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        self.load().get(name).cloned()
    }

    fn put(&self, name: &str, id: &str) -> Result<(), UpscaleError> {
        let _guard = self
            .lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut mapping = self.load();
        mapping.insert(name.to_owned(), id.to_owned());
        self.store(&mapping)
    }
}

/// In-memory identity map, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryIdentityMap {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryIdentityMap {
    /// Create an empty in-memory map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityMap for MemoryIdentityMap {
    fn get(&self, name: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn put(&self, name: &str, id: &str) -> Result<(), UpscaleError> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(name.to_owned(), id.to_owned());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn map_in(dir: &tempfile::TempDir) -> FileIdentityMap {
        FileIdentityMap::new(dir.path().join("ids.json"))
    }

    #[test]
    fn valid_client_id_shape() {
        assert!(is_valid_client_id("0123456789abcdef0123456789abcdef"));
        assert!(!is_valid_client_id("0123456789ABCDEF0123456789ABCDEF"));
        assert!(!is_valid_client_id("0123456789abcdef0123456789abcde"));
        assert!(!is_valid_client_id("0123456789abcdef0123456789abcdefa"));
        assert!(!is_valid_client_id("g123456789abcdef0123456789abcdef"));
        assert!(!is_valid_client_id(""));
    }

    #[test]
    fn generated_ids_are_well_formed_and_distinct() {
        let a = generate_client_id().unwrap();
        let b = generate_client_id().unwrap();
        assert!(is_valid_client_id(&a));
        assert!(is_valid_client_id(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let map = map_in(&dir);
        let first = map.get_or_create("cat.png").unwrap();
        let second = map.get_or_create("cat.png").unwrap();
        assert_eq!(first, second);
        assert!(is_valid_client_id(&first));
    }

    #[test]
    fn get_or_create_survives_a_new_store_instance() {
        let dir = tempfile::tempdir().unwrap();
        let first = map_in(&dir).get_or_create("cat.png").unwrap();
        let second = map_in(&dir).get_or_create("cat.png").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn distinct_names_get_distinct_ids() {
        let dir = tempfile::tempdir().unwrap();
        let map = map_in(&dir);
        let a = map.get_or_create("a.png").unwrap();
        let b = map.get_or_create("b.png").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn missing_file_is_an_empty_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let map = map_in(&dir);
        assert_eq!(map.get("anything"), None);
    }

    #[test]
    fn corrupt_file_is_an_empty_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.json");
        fs::write(&path, "{not json at all").unwrap();
        let map = FileIdentityMap::new(path);
        assert_eq!(map.get("cat.png"), None);
        // And get_or_create recovers by writing a fresh mapping.
        let id = map.get_or_create("cat.png").unwrap();
        assert!(is_valid_client_id(&id));
        assert_eq!(map.get("cat.png"), Some(id));
    }

    #[test]
    fn malformed_stored_value_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let map = map_in(&dir);
        map.put("cat.png", "not-a-hex-id").unwrap();
        let id = map.get_or_create("cat.png").unwrap();
        assert!(is_valid_client_id(&id));
        assert_ne!(id, "not-a-hex-id");
    }

    #[test]
    fn put_preserves_other_entries() {
        let dir = tempfile::tempdir().unwrap();
        let map = map_in(&dir);
        map.put("a.png", "0123456789abcdef0123456789abcdef").unwrap();
        map.put("b.png", "fedcba9876543210fedcba9876543210").unwrap();
        assert_eq!(
            map.get("a.png").as_deref(),
            Some("0123456789abcdef0123456789abcdef"),
        );
    }

    #[test]
    fn memory_map_round_trips() {
        let map = MemoryIdentityMap::new();
        let id = map.get_or_create("cat.png").unwrap();
        assert_eq!(map.get_or_create("cat.png").unwrap(), id);
        assert_eq!(map.get("cat.png"), Some(id));
    }
}
