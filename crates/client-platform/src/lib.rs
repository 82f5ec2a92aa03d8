//! Local persistence facilities for the client: the per-identity
//! pending-contact store, with in-memory and JSON-file backends.
//!
//! Pending contacts are "contacts selected for a conversation that does
//! not yet exist". Writes are always full overwrites of one identity's
//! list; last-writer-wins is acceptable for single-user local data.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
    time::{SystemTime, UNIX_EPOCH},
};

use client_core::ParticipantSummary;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PendingStoreError {
    #[error("pending-contact store unavailable: {0}")]
    Unavailable(String),
    #[error("pending-contact store backend failure: {0}")]
    Backend(String),
}

/// Per-identity persisted pending-contact list.
pub trait PendingContactStore: Send + Sync {
    /// Current list for one identity. Empty when nothing was stored.
    fn get(&self, identity_id: &str) -> Result<Vec<ParticipantSummary>, PendingStoreError>;

    /// Replace the stored list for one identity (full overwrite).
    fn put(
        &self,
        identity_id: &str,
        contacts: &[ParticipantSummary],
    ) -> Result<(), PendingStoreError>;

    /// Drop the stored list for one identity.
    fn clear(&self, identity_id: &str) -> Result<(), PendingStoreError>;
}

/// Volatile store used by tests and the smoke binary.
#[derive(Clone, Default)]
pub struct InMemoryPendingContactStore {
    data: Arc<RwLock<HashMap<String, Vec<ParticipantSummary>>>>,
}

impl PendingContactStore for InMemoryPendingContactStore {
    fn get(&self, identity_id: &str) -> Result<Vec<ParticipantSummary>, PendingStoreError> {
        let data = self
            .data
            .read()
            .map_err(|_| PendingStoreError::Backend("poisoned lock".to_owned()))?;
        Ok(data.get(identity_id).cloned().unwrap_or_default())
    }

    fn put(
        &self,
        identity_id: &str,
        contacts: &[ParticipantSummary],
    ) -> Result<(), PendingStoreError> {
        let mut data = self
            .data
            .write()
            .map_err(|_| PendingStoreError::Backend("poisoned lock".to_owned()))?;
        data.insert(identity_id.to_owned(), contacts.to_vec());
        Ok(())
    }

    fn clear(&self, identity_id: &str) -> Result<(), PendingStoreError> {
        let mut data = self
            .data
            .write()
            .map_err(|_| PendingStoreError::Backend("poisoned lock".to_owned()))?;
        data.remove(identity_id);
        Ok(())
    }
}

/// JSON-file store keeping every identity's list in one file.
///
/// Writes go through a temp file followed by a rename so a crash mid-write
/// never leaves a truncated store on disk.
#[derive(Clone)]
pub struct JsonFilePendingContactStore {
    path: PathBuf,
}

impl JsonFilePendingContactStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<HashMap<String, Vec<ParticipantSummary>>, PendingStoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(HashMap::new());
            }
            Err(err) => {
                return Err(PendingStoreError::Unavailable(format!(
                    "failed reading {}: {err}",
                    self.path.display()
                )));
            }
        };
        serde_json::from_str(&raw).map_err(|err| {
            PendingStoreError::Backend(format!("failed parsing {}: {err}", self.path.display()))
        })
    }

    fn save(
        &self,
        data: &HashMap<String, Vec<ParticipantSummary>>,
    ) -> Result<(), PendingStoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| {
                PendingStoreError::Backend(format!(
                    "failed creating {}: {err}",
                    parent.display()
                ))
            })?;
        }

        let encoded = serde_json::to_vec(data)
            .map_err(|err| PendingStoreError::Backend(err.to_string()))?;
        let temp_path = temp_path_for(&self.path);
        fs::write(&temp_path, encoded).map_err(|err| {
            PendingStoreError::Backend(format!(
                "failed writing temp file {}: {err}",
                temp_path.display()
            ))
        })?;

        if let Err(rename_err) = fs::rename(&temp_path, &self.path) {
            // Windows does not allow replacing existing files via rename.
            match fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    let _ = fs::remove_file(&temp_path);
                    return Err(PendingStoreError::Backend(format!(
                        "failed replacing {} after rename error ({rename_err}): {err}",
                        self.path.display()
                    )));
                }
            }
            fs::rename(&temp_path, &self.path).map_err(|err| {
                let _ = fs::remove_file(&temp_path);
                PendingStoreError::Backend(format!(
                    "failed writing {} after temp write: {err}",
                    self.path.display()
                ))
            })?;
        }
        Ok(())
    }
}

impl PendingContactStore for JsonFilePendingContactStore {
    fn get(&self, identity_id: &str) -> Result<Vec<ParticipantSummary>, PendingStoreError> {
        Ok(self.load()?.remove(identity_id).unwrap_or_default())
    }

    fn put(
        &self,
        identity_id: &str,
        contacts: &[ParticipantSummary],
    ) -> Result<(), PendingStoreError> {
        let mut data = self.load()?;
        data.insert(identity_id.to_owned(), contacts.to_vec());
        self.save(&data)
    }

    fn clear(&self, identity_id: &str) -> Result<(), PendingStoreError> {
        let mut data = self.load()?;
        if data.remove(identity_id).is_some() {
            self.save(&data)?;
        }
        Ok(())
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("pending-contacts.json");
    let now_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos())
        .unwrap_or(0);
    parent.join(format!(".{file_name}.{now_nanos}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn contact(id: &str, name: &str) -> ParticipantSummary {
        ParticipantSummary {
            id: id.to_owned(),
            display_name: name.to_owned(),
            avatar_url: None,
            is_group: false,
            group_name: None,
        }
    }

    fn unique_temp_path(label: &str) -> PathBuf {
        let now_nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        env::temp_dir().join(format!("powwow-{label}-{now_nanos}.json"))
    }

    #[test]
    fn in_memory_store_isolates_identities() {
        let store = InMemoryPendingContactStore::default();
        store
            .put("uid-a", &[contact("uid-x", "Xena")])
            .expect("put a should work");
        store
            .put("uid-b", &[contact("uid-y", "Yuri")])
            .expect("put b should work");

        assert_eq!(store.get("uid-a").expect("get a")[0].id, "uid-x");
        assert_eq!(store.get("uid-b").expect("get b")[0].id, "uid-y");
        assert!(store.get("uid-c").expect("get c").is_empty());
    }

    #[test]
    fn put_is_a_full_overwrite() {
        let store = InMemoryPendingContactStore::default();
        store
            .put("uid-a", &[contact("uid-x", "Xena"), contact("uid-y", "Yuri")])
            .expect("first put should work");
        store
            .put("uid-a", &[contact("uid-y", "Yuri")])
            .expect("second put should work");

        let got = store.get("uid-a").expect("get should work");
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].id, "uid-y");
    }

    #[test]
    fn json_file_round_trip_and_clear() {
        let path = unique_temp_path("pending-store");
        let store = JsonFilePendingContactStore::new(&path);

        assert!(store.get("uid-a").expect("empty get").is_empty());

        store
            .put("uid-a", &[contact("uid-x", "Xena")])
            .expect("put should work");
        let loaded = store.get("uid-a").expect("get should work");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].display_name, "Xena");

        // Reopening the file sees the same data.
        let reopened = JsonFilePendingContactStore::new(&path);
        assert_eq!(reopened.get("uid-a").expect("reopened get"), loaded);

        store.clear("uid-a").expect("clear should work");
        assert!(store.get("uid-a").expect("get after clear").is_empty());
        let _ = fs::remove_file(&path);
    }

    #[derive(Default)]
    struct FailingStore;

    impl PendingContactStore for FailingStore {
        fn get(&self, _id: &str) -> Result<Vec<ParticipantSummary>, PendingStoreError> {
            Err(PendingStoreError::Unavailable("mock outage".to_owned()))
        }

        fn put(
            &self,
            _id: &str,
            _contacts: &[ParticipantSummary],
        ) -> Result<(), PendingStoreError> {
            Err(PendingStoreError::Unavailable("mock outage".to_owned()))
        }

        fn clear(&self, _id: &str) -> Result<(), PendingStoreError> {
            Err(PendingStoreError::Unavailable("mock outage".to_owned()))
        }
    }

    #[test]
    fn mock_failure_surfaces_as_unavailable() {
        let store = FailingStore;
        let err = store.put("uid-a", &[]).expect_err("put must fail");
        assert_eq!(err, PendingStoreError::Unavailable("mock outage".to_owned()));
    }
}
