//! Persistence for ctmesh run outputs.
//!
//! Records describe what a run produced; the artifact layout decides where
//! the produced files live. The record row is the source of truth: deleting
//! it first and cleaning files afterwards means a crash can leave orphaned
//! files but never a record pointing at nothing it once owned.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod file_store;
pub mod layout;
pub mod memory_store;
pub mod records;
pub mod store;
pub mod token;

pub use file_store::FileRecordStore;
pub use layout::{
    remove_dir_if_empty, remove_file_logged, write_into_dir, ArtifactLayout, SegmentationPaths,
};
pub use memory_store::MemoryRecordStore;
pub use records::{new_record_id, newest_first, MeshArtifact, Record, SegmentationRecord, UserId};
pub use store::RecordStore;
pub use token::RunToken;
