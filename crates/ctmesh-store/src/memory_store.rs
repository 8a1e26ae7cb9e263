//! In-memory record store.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use ctmesh_core::Result;
use uuid::Uuid;

use crate::records::{newest_first, MeshArtifact, Record, SegmentationRecord, UserId};
use crate::store::RecordStore;

/// A [`RecordStore`] keeping everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    segmentations: RwLock<HashMap<Uuid, SegmentationRecord>>,
    meshes: RwLock<HashMap<Uuid, MeshArtifact>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn get<R: Record + Clone>(map: &RwLock<HashMap<Uuid, R>>, id: Uuid, user: UserId) -> Option<R> {
    let map = map.read().unwrap_or_else(PoisonError::into_inner);
    map.get(&id).filter(|r| r.user_id() == user).cloned()
}

fn list<R: Record + Clone>(
    map: &RwLock<HashMap<Uuid, R>>,
    session_id: &str,
    user: UserId,
) -> Vec<R> {
    let map = map.read().unwrap_or_else(PoisonError::into_inner);
    let mut records: Vec<R> = map
        .values()
        .filter(|r| r.session_id() == session_id && r.user_id() == user)
        .cloned()
        .collect();
    records.sort_by(newest_first);
    records
}

fn remove<R: Record>(map: &RwLock<HashMap<Uuid, R>>, id: Uuid, user: UserId) -> Option<R> {
    let mut map = map.write().unwrap_or_else(PoisonError::into_inner);
    if map.get(&id)?.user_id() != user {
        return None;
    }
    map.remove(&id)
}

impl RecordStore for MemoryRecordStore {
    fn insert_segmentation(&self, record: &SegmentationRecord) -> Result<()> {
        self.segmentations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.id, record.clone());
        Ok(())
    }

    fn get_segmentation(&self, id: Uuid, user: UserId) -> Result<Option<SegmentationRecord>> {
        Ok(get(&self.segmentations, id, user))
    }

    fn list_segmentations(
        &self,
        session_id: &str,
        user: UserId,
    ) -> Result<Vec<SegmentationRecord>> {
        Ok(list(&self.segmentations, session_id, user))
    }

    fn delete_segmentation(&self, id: Uuid, user: UserId) -> Result<Option<SegmentationRecord>> {
        Ok(remove(&self.segmentations, id, user))
    }

    fn insert_mesh(&self, artifact: &MeshArtifact) -> Result<()> {
        self.meshes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(artifact.id, artifact.clone());
        Ok(())
    }

    fn get_mesh(&self, id: Uuid, user: UserId) -> Result<Option<MeshArtifact>> {
        Ok(get(&self.meshes, id, user))
    }

    fn list_meshes(&self, session_id: &str, user: UserId) -> Result<Vec<MeshArtifact>> {
        Ok(list(&self.meshes, session_id, user))
    }

    fn delete_mesh(&self, id: Uuid, user: UserId) -> Result<Option<MeshArtifact>> {
        Ok(remove(&self.meshes, id, user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::conformance;

    #[test]
    fn test_scoping_and_ordering() {
        conformance::scoping_and_ordering(&MemoryRecordStore::new());
    }

    #[test]
    fn test_delete_semantics() {
        conformance::delete_semantics(&MemoryRecordStore::new());
    }

    #[test]
    fn test_meshes() {
        conformance::meshes(&MemoryRecordStore::new());
    }

    #[test]
    fn test_concurrent_inserts() {
        let store = std::sync::Arc::new(MemoryRecordStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let record = crate::records::fixtures::segmentation("s", 1, i);
                    store.insert_segmentation(&record).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.list_segmentations("s", 1).unwrap().len(), 8);
    }
}
