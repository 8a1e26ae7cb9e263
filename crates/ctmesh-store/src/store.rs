//! The record store abstraction.

use ctmesh_core::Result;
use uuid::Uuid;

use crate::records::{MeshArtifact, SegmentationRecord, UserId};

/// Key/value-style persistence for segmentation and mesh records.
///
/// Every lookup is scoped by owner: a record owned by another user behaves
/// exactly like a missing one. Inserts and deletes are atomic per record.
/// Listing results are ordered newest first.
pub trait RecordStore: Send + Sync {
    fn insert_segmentation(&self, record: &SegmentationRecord) -> Result<()>;

    fn get_segmentation(&self, id: Uuid, user: UserId) -> Result<Option<SegmentationRecord>>;

    fn list_segmentations(&self, session_id: &str, user: UserId) -> Result<Vec<SegmentationRecord>>;

    /// Removes the row and returns it, or `None` when it does not exist or
    /// belongs to someone else.
    fn delete_segmentation(&self, id: Uuid, user: UserId) -> Result<Option<SegmentationRecord>>;

    fn insert_mesh(&self, artifact: &MeshArtifact) -> Result<()>;

    fn get_mesh(&self, id: Uuid, user: UserId) -> Result<Option<MeshArtifact>>;

    fn list_meshes(&self, session_id: &str, user: UserId) -> Result<Vec<MeshArtifact>>;

    fn delete_mesh(&self, id: Uuid, user: UserId) -> Result<Option<MeshArtifact>>;

    /// The newest segmentation of `session_id` owned by `user`.
    fn latest_segmentation(
        &self,
        session_id: &str,
        user: UserId,
    ) -> Result<Option<SegmentationRecord>> {
        Ok(self.list_segmentations(session_id, user)?.into_iter().next())
    }
}

/// Shared conformance checks run against every store implementation.
#[cfg(test)]
pub(crate) mod conformance {
    use super::*;
    use crate::records::fixtures;

    pub fn scoping_and_ordering(store: &dyn RecordStore) {
        let old = fixtures::segmentation("s1", 1, 0);
        let new = fixtures::segmentation("s1", 1, 10);
        let other_user = fixtures::segmentation("s1", 2, 20);
        let other_session = fixtures::segmentation("s2", 1, 30);
        for record in [&old, &new, &other_user, &other_session] {
            store.insert_segmentation(record).unwrap();
        }

        let listed = store.list_segmentations("s1", 1).unwrap();
        let ids: Vec<_> = listed.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![new.id, old.id]);
        assert_eq!(store.latest_segmentation("s1", 1).unwrap().unwrap().id, new.id);
        assert!(store.latest_segmentation("s3", 1).unwrap().is_none());

        assert_eq!(store.get_segmentation(old.id, 1).unwrap(), Some(old.clone()));
        assert!(store.get_segmentation(old.id, 2).unwrap().is_none());
    }

    pub fn delete_semantics(store: &dyn RecordStore) {
        let seg = fixtures::segmentation("s1", 1, 0);
        store.insert_segmentation(&seg).unwrap();

        assert!(store.delete_segmentation(seg.id, 2).unwrap().is_none());
        assert!(store.get_segmentation(seg.id, 1).unwrap().is_some());

        let removed = store.delete_segmentation(seg.id, 1).unwrap().unwrap();
        assert_eq!(removed.id, seg.id);
        assert!(store.get_segmentation(seg.id, 1).unwrap().is_none());
        assert!(store.list_segmentations("s1", 1).unwrap().is_empty());
        assert!(store.latest_segmentation("s1", 1).unwrap().is_none());
        assert!(store.delete_segmentation(seg.id, 1).unwrap().is_none());
    }

    pub fn meshes(store: &dyn RecordStore) {
        let seg = fixtures::segmentation("s1", 1, 0);
        let first = fixtures::mesh(&seg, 0);
        let second = fixtures::mesh(&seg, 5);
        store.insert_mesh(&first).unwrap();
        store.insert_mesh(&second).unwrap();

        let ids: Vec<_> = store.list_meshes("s1", 1).unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert!(store.list_meshes("s1", 7).unwrap().is_empty());
        assert_eq!(store.get_mesh(first.id, 1).unwrap(), Some(first.clone()));

        assert!(store.delete_mesh(first.id, 7).unwrap().is_none());
        assert_eq!(store.delete_mesh(first.id, 1).unwrap().map(|m| m.id), Some(first.id));
        let ids: Vec<_> = store.list_meshes("s1", 1).unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![second.id]);
        assert!(store.get_mesh(first.id, 1).unwrap().is_none());

        assert!(store.delete_mesh(second.id, 1).unwrap().is_some());
        assert!(store.list_meshes("s1", 1).unwrap().is_empty());
    }
}
