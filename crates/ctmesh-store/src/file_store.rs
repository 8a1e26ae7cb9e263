//! A record store keeping one JSON document per record.
//!
//! ```text
//! <root>/segmentations/<id>.json
//! <root>/meshes/<id>.json
//! ```
//!
//! Inserts go through a temporary file in the target directory followed by a
//! rename, so readers never observe a half-written record. Deletes are a
//! single unlink.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use ctmesh_core::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::records::{newest_first, MeshArtifact, Record, SegmentationRecord, UserId};
use crate::store::RecordStore;

const SEGMENTATIONS_DIR: &str = "segmentations";
const MESHES_DIR: &str = "meshes";

/// A [`RecordStore`] backed by a directory tree.
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    root: PathBuf,
}

impl FileRecordStore {
    /// Opens (and creates if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(SEGMENTATIONS_DIR))?;
        fs::create_dir_all(root.join(MESHES_DIR))?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, kind: &str, id: Uuid) -> PathBuf {
        self.root.join(kind).join(format!("{id}.json"))
    }

    fn write<R: Record + Serialize>(&self, kind: &str, record: &R) -> Result<()> {
        let dir = self.root.join(kind);
        fs::create_dir_all(&dir)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, record)?;
        tmp.flush()?;
        tmp.persist(self.record_path(kind, record.id()))
            .map_err(|e| e.error)?;
        Ok(())
    }

    fn read<R: DeserializeOwned>(path: &Path) -> Result<Option<R>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn get<R: Record + DeserializeOwned>(
        &self,
        kind: &str,
        id: Uuid,
        user: UserId,
    ) -> Result<Option<R>> {
        let record: Option<R> = Self::read(&self.record_path(kind, id))?;
        Ok(record.filter(|r| r.user_id() == user))
    }

    fn list<R: Record + DeserializeOwned>(
        &self,
        kind: &str,
        session_id: &str,
        user: UserId,
    ) -> Result<Vec<R>> {
        let dir = self.root.join(kind);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read::<R>(&path) {
                Ok(Some(record))
                    if record.session_id() == session_id && record.user_id() == user =>
                {
                    records.push(record);
                }
                Ok(_) => {}
                Err(e) => log::warn!("skipping unreadable record {}: {e}", path.display()),
            }
        }
        records.sort_by(newest_first);
        Ok(records)
    }

    fn remove<R: Record + DeserializeOwned>(
        &self,
        kind: &str,
        id: Uuid,
        user: UserId,
    ) -> Result<Option<R>> {
        let path = self.record_path(kind, id);
        let Some(record) = Self::read::<R>(&path)? else {
            return Ok(None);
        };
        if record.user_id() != user {
            return Ok(None);
        }
        match fs::remove_file(&path) {
            Ok(()) => Ok(Some(record)),
            // Lost a race with a concurrent delete.
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl RecordStore for FileRecordStore {
    fn insert_segmentation(&self, record: &SegmentationRecord) -> Result<()> {
        self.write(SEGMENTATIONS_DIR, record)
    }

    fn get_segmentation(&self, id: Uuid, user: UserId) -> Result<Option<SegmentationRecord>> {
        self.get(SEGMENTATIONS_DIR, id, user)
    }

    fn list_segmentations(
        &self,
        session_id: &str,
        user: UserId,
    ) -> Result<Vec<SegmentationRecord>> {
        self.list(SEGMENTATIONS_DIR, session_id, user)
    }

    fn delete_segmentation(&self, id: Uuid, user: UserId) -> Result<Option<SegmentationRecord>> {
        self.remove(SEGMENTATIONS_DIR, id, user)
    }

    fn insert_mesh(&self, artifact: &MeshArtifact) -> Result<()> {
        self.write(MESHES_DIR, artifact)
    }

    fn get_mesh(&self, id: Uuid, user: UserId) -> Result<Option<MeshArtifact>> {
        self.get(MESHES_DIR, id, user)
    }

    fn list_meshes(&self, session_id: &str, user: UserId) -> Result<Vec<MeshArtifact>> {
        self.list(MESHES_DIR, session_id, user)
    }

    fn delete_mesh(&self, id: Uuid, user: UserId) -> Result<Option<MeshArtifact>> {
        self.remove(MESHES_DIR, id, user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::fixtures;
    use crate::store::conformance;

    fn store() -> (tempfile::TempDir, FileRecordStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecordStore::open(dir.path().join("records")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_scoping_and_ordering() {
        let (_dir, store) = store();
        conformance::scoping_and_ordering(&store);
    }

    #[test]
    fn test_delete_semantics() {
        let (_dir, store) = store();
        conformance::delete_semantics(&store);
    }

    #[test]
    fn test_meshes() {
        let (_dir, store) = store();
        conformance::meshes(&store);
    }

    #[test]
    fn test_layout_on_disk() {
        let (_dir, store) = store();
        let seg = fixtures::segmentation("s1", 1, 0);
        store.insert_segmentation(&seg).unwrap();

        let path = store.root().join("segmentations").join(format!("{}.json", seg.id));
        assert!(path.is_file());
        let names: Vec<_> = fs::read_dir(store.root().join("segmentations"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1, "temporary files must not linger");

        store.delete_segmentation(seg.id, 1).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_records_survive_reopen() {
        let (_dir, store) = store();
        let seg = fixtures::segmentation("s1", 4, 0);
        store.insert_segmentation(&seg).unwrap();

        let reopened = FileRecordStore::open(store.root()).unwrap();
        assert_eq!(reopened.get_segmentation(seg.id, 4).unwrap(), Some(seg));
    }

    #[test]
    fn test_corrupt_record_is_skipped_in_listing() {
        let (_dir, store) = store();
        let seg = fixtures::segmentation("s1", 1, 0);
        store.insert_segmentation(&seg).unwrap();
        fs::write(store.root().join("segmentations").join("junk.json"), b"{not json").unwrap();

        assert_eq!(store.list_segmentations("s1", 1).unwrap().len(), 1);
    }
}
