//! End-to-end runs: segmentation, mesh export, listing and deletion.

use std::path::Path;

use chrono::Utc;
use ctmesh_core::{
    compute_metrics, validate_session_id, CtmeshError, Mask, Plane, Result, SegmentOptions, Spacing,
    TriangleMesh, Volume,
};
use ctmesh_io::{load_mask, save_mask, save_stl, save_thumbnail, StlFormat};
use ctmesh_processing::{
    extract_surface, DicomSliceDecoder, ExtractionError, Segmenter, SliceCatalogLoader,
    SliceDecoder, VolumeBuilder,
};
use ctmesh_store::{
    new_record_id, remove_dir_if_empty, remove_file_logged, write_into_dir, ArtifactLayout,
    MeshArtifact, RecordStore, RunToken, SegmentationPaths, SegmentationRecord, UserId,
};
use uuid::Uuid;

use crate::config::PipelineConfig;

/// Result of a segmentation run.
#[derive(Debug, Clone)]
pub struct SegmentationOutcome {
    pub record: SegmentationRecord,
    /// The final mask is empty. The record is persisted anyway.
    pub warning: bool,
    /// Skipped slices, threshold fallbacks and similar diagnostics.
    pub notes: Vec<String>,
}

/// Runs the CT-to-mesh pipeline against a [`RecordStore`].
///
/// The pipeline itself holds no mutable state; every operation takes the
/// store handle explicitly so concurrent runs can share one store.
#[derive(Debug, Clone)]
pub struct Pipeline<D = DicomSliceDecoder> {
    config: PipelineConfig,
    loader: SliceCatalogLoader,
    builder: VolumeBuilder<D>,
    layout: ArtifactLayout,
}

impl Pipeline {
    /// A pipeline decoding DICOM slices.
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_decoder(config, DicomSliceDecoder)
    }
}

impl<D: SliceDecoder> Pipeline<D> {
    /// A pipeline with a custom slice decoder.
    pub fn with_decoder(config: PipelineConfig, decoder: D) -> Self {
        Self {
            loader: SliceCatalogLoader::new(&config.series_root),
            builder: VolumeBuilder::with_decoder(decoder),
            layout: ArtifactLayout::new(&config.artifact_root),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[must_use]
    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Loads and assembles the volume of `session_id`.
    pub fn load_volume(&self, session_id: &str) -> Result<Volume> {
        let catalog = self.loader.load(session_id)?;
        self.builder.build(&catalog)
    }

    /// Segments a session with the configured default options.
    pub fn run_default_segmentation(
        &self,
        store: &dyn RecordStore,
        session_id: &str,
        user: UserId,
    ) -> Result<SegmentationOutcome> {
        self.run_segmentation(store, session_id, user, &self.config.segment)
    }

    /// Segments a session, writes the mask and thumbnails and persists a
    /// [`SegmentationRecord`].
    ///
    /// Input errors (missing manifest, no usable slices, invalid options) fail
    /// before anything is written. An empty segmentation is not an error.
    pub fn run_segmentation(
        &self,
        store: &dyn RecordStore,
        session_id: &str,
        user: UserId,
        options: &SegmentOptions,
    ) -> Result<SegmentationOutcome> {
        validate_session_id(session_id)?;
        log::info!("segmenting session {session_id} for user {user}");

        let volume = self.load_volume(session_id)?;
        let segmentation = Segmenter::new(options.clone()).segment(&volume)?;
        let spacing = volume.spacing();
        let metrics = compute_metrics(&segmentation.mask, spacing);

        let surface_mm2 = match extract_surface(&segmentation.mask, spacing) {
            Ok(surface) => Some(surface.area_mm2),
            Err(ExtractionError::NoSurface) => None,
            Err(e) => {
                log::warn!("session {session_id}: surface area unavailable: {e}");
                None
            }
        };

        let token = RunToken::generate();
        let paths = self.layout.segmentation_paths(session_id, &token)?;
        if let Err(e) = write_segmentation_artifacts(&paths, &segmentation.mask) {
            discard_segmentation_artifacts(&paths);
            return Err(e);
        }

        let mut record = SegmentationRecord {
            id: new_record_id(),
            session_id: session_id.to_string(),
            user_id: user,
            n_slices: volume.num_slices(),
            voxel_count: 0,
            volume_mm3: 0.0,
            surface_mm2,
            bbox_x_mm: 0.0,
            bbox_y_mm: 0.0,
            bbox_z_mm: 0.0,
            spacing_mm: spacing.to_array(),
            synthetic: volume.is_synthetic(),
            warning: segmentation.warning,
            threshold: segmentation.window,
            threshold_policy: segmentation.policy.name().to_string(),
            mask_path: paths.mask.clone(),
            thumb_axial: paths.axial.clone(),
            thumb_sagittal: paths.sagittal.clone(),
            thumb_coronal: paths.coronal.clone(),
            created_at: Utc::now(),
        };
        record.apply_metrics(&metrics);

        if let Err(e) = store.insert_segmentation(&record) {
            discard_segmentation_artifacts(&paths);
            return Err(e);
        }

        let mut notes = volume.notes().to_vec();
        notes.extend(segmentation.notes);
        if segmentation.warning {
            log::warn!("session {session_id}: segmentation {} is empty", record.id);
        }
        log::info!(
            "session {session_id}: segmentation {} kept {} voxels ({:.1} mm3) with {} {}",
            record.id,
            record.voxel_count,
            record.volume_mm3,
            record.threshold_policy,
            record.threshold
        );

        Ok(SegmentationOutcome {
            warning: segmentation.warning,
            record,
            notes,
        })
    }

    /// Exports the surface of a segmentation as STL using the configured format.
    pub fn export_mesh(
        &self,
        store: &dyn RecordStore,
        session_id: &str,
        user: UserId,
        segmentation_id: Option<Uuid>,
    ) -> Result<MeshArtifact> {
        self.export_mesh_as(store, session_id, user, segmentation_id, self.config.stl_format)
    }

    /// Exports the surface of a segmentation as STL.
    ///
    /// With an explicit `segmentation_id` the record must belong to this
    /// session and user; otherwise the newest one is used. An empty mask
    /// produces a valid zero-triangle file.
    ///
    /// # Errors
    /// [`CtmeshError::NotFound`] when there is no matching record or its mask
    /// file is gone.
    pub fn export_mesh_as(
        &self,
        store: &dyn RecordStore,
        session_id: &str,
        user: UserId,
        segmentation_id: Option<Uuid>,
        format: StlFormat,
    ) -> Result<MeshArtifact> {
        validate_session_id(session_id)?;
        let record = match segmentation_id {
            Some(id) => store
                .get_segmentation(id, user)?
                .filter(|r| r.session_id == session_id),
            None => store.latest_segmentation(session_id, user)?,
        }
        .ok_or_else(|| match segmentation_id {
            Some(id) => {
                CtmeshError::NotFound(format!("segmentation {id} in session '{session_id}'"))
            }
            None => CtmeshError::NotFound(format!("segmentation for session '{session_id}'")),
        })?;

        let mask = load_mask(&record.mask_path)?;
        let mesh = surface_mesh(&mask, record.spacing())?;

        let token = RunToken::generate();
        let label = format!("seg_{}", record.id);
        let path = self.layout.mesh_path(session_id, &token, &label)?;
        let dir = self.layout.model_dir(session_id)?;
        let written = write_into_dir(&dir, || {
            save_stl(&path, &mesh, &self.config.stl_header_name, format)
        });
        let file_size_bytes = match written {
            Ok(size) => size,
            Err(e) => {
                remove_file_logged(&path);
                return Err(e);
            }
        };

        let artifact = MeshArtifact {
            id: new_record_id(),
            session_id: session_id.to_string(),
            user_id: user,
            segmentation_id: record.id,
            path,
            vertex_count: mesh.num_vertices(),
            face_count: mesh.num_faces(),
            file_size_bytes,
            created_at: Utc::now(),
        };
        if let Err(e) = store.insert_mesh(&artifact) {
            remove_file_logged(&artifact.path);
            return Err(e);
        }

        log::info!(
            "session {session_id}: exported {} faces from segmentation {} to {}",
            artifact.face_count,
            record.id,
            artifact.path.display()
        );
        Ok(artifact)
    }

    /// Segmentations of a session, newest first.
    pub fn list_segmentations(
        &self,
        store: &dyn RecordStore,
        session_id: &str,
        user: UserId,
    ) -> Result<Vec<SegmentationRecord>> {
        validate_session_id(session_id)?;
        store.list_segmentations(session_id, user)
    }

    pub fn get_segmentation(
        &self,
        store: &dyn RecordStore,
        id: Uuid,
        user: UserId,
    ) -> Result<Option<SegmentationRecord>> {
        store.get_segmentation(id, user)
    }

    /// Mesh exports of a session, newest first.
    pub fn list_meshes(
        &self,
        store: &dyn RecordStore,
        session_id: &str,
        user: UserId,
    ) -> Result<Vec<MeshArtifact>> {
        validate_session_id(session_id)?;
        store.list_meshes(session_id, user)
    }

    /// Deletes a segmentation record, then its mask and thumbnails.
    ///
    /// Returns `false` when the record does not exist or belongs to another
    /// user. File cleanup failures are logged, not returned.
    pub fn delete_segmentation(
        &self,
        store: &dyn RecordStore,
        id: Uuid,
        user: UserId,
    ) -> Result<bool> {
        let Some(record) = store.delete_segmentation(id, user)? else {
            return Ok(false);
        };
        for path in record.artifact_paths() {
            remove_file_logged(path);
        }
        remove_parent_if_empty(&record.mask_path);
        log::info!("deleted segmentation {id} of session {}", record.session_id);
        Ok(true)
    }

    /// Deletes a mesh record, then its STL file.
    pub fn delete_mesh(&self, store: &dyn RecordStore, id: Uuid, user: UserId) -> Result<bool> {
        let Some(artifact) = store.delete_mesh(id, user)? else {
            return Ok(false);
        };
        remove_file_logged(&artifact.path);
        remove_parent_if_empty(&artifact.path);
        log::info!("deleted mesh {id} of session {}", artifact.session_id);
        Ok(true)
    }
}

fn write_segmentation_artifacts(paths: &SegmentationPaths, mask: &Mask) -> Result<()> {
    write_into_dir(&paths.dir, || save_mask(&paths.mask, mask))?;
    for plane in Plane::ALL {
        save_thumbnail(paths.thumbnail(plane), mask, plane)?;
    }
    Ok(())
}

fn discard_segmentation_artifacts(paths: &SegmentationPaths) {
    for path in [&paths.mask, &paths.axial, &paths.sagittal, &paths.coronal] {
        remove_file_logged(path);
    }
    remove_dir_if_empty(&paths.dir);
}

fn remove_parent_if_empty(path: &Path) {
    if let Some(dir) = path.parent() {
        remove_dir_if_empty(dir);
    }
}

/// The mesh to export; an empty mask yields an empty mesh.
fn surface_mesh(mask: &Mask, spacing: Spacing) -> Result<TriangleMesh> {
    match extract_surface(mask, spacing) {
        Ok(surface) => Ok(surface.mesh),
        Err(ExtractionError::NoSurface) => Ok(TriangleMesh::default()),
        Err(e @ ExtractionError::TooLarge(_)) => Err(CtmeshError::MalformedVolume(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifacts_survive_swept_session_dir() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let paths = layout.segmentation_paths("s1", &RunToken::generate()).unwrap();

        // A delete elsewhere in the session removes the directory before the write.
        remove_dir_if_empty(&paths.dir);
        assert!(!paths.dir.exists());

        let mask = Mask::from_fn([4, 4, 4], |z, y, x| (1..3).contains(&z) && y == 1 && x == 2);
        write_segmentation_artifacts(&paths, &mask).unwrap();
        assert_eq!(load_mask(&paths.mask).unwrap(), mask);
        for plane in Plane::ALL {
            assert!(paths.thumbnail(plane).is_file());
        }
    }

    #[test]
    fn test_surface_mesh_of_empty_mask() {
        let mesh = surface_mesh(&Mask::new([3, 3, 3]), Spacing::default()).unwrap();
        assert!(mesh.is_empty());
    }

    #[test]
    fn test_surface_mesh_of_single_voxel() {
        let mask = Mask::from_fn([3, 3, 3], |z, y, x| (z, y, x) == (1, 1, 1));
        let mesh = surface_mesh(&mask, Spacing::new(2.0, 1.0, 1.0)).unwrap();
        assert_eq!(mesh.num_faces(), 8);
        let (min, max) = mesh.bounds().unwrap();
        assert!((max.z - min.z - 2.0).abs() < 1e-6);
        assert!((max.x - min.x - 1.0).abs() < 1e-6);
    }
}
