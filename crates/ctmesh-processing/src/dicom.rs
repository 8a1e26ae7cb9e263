//! Decoding of single-frame DICOM slices.

#![allow(clippy::cast_precision_loss)]

use std::path::Path;

use ctmesh_core::Modality;
use dicom_core::Tag;
use dicom_dictionary_std::tags;
use dicom_object::{open_file, InMemDicomObject};
use thiserror::Error;

use crate::catalog::SliceFile;

/// Implicit VR Little Endian.
pub const IMPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2";
/// Explicit VR Little Endian.
pub const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";

/// Reasons a slice is skipped during volume assembly.
#[derive(Error, Debug)]
pub enum SliceDecodeError {
    #[error("cannot read {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("unsupported slice {path}: {reason}")]
    Unsupported { path: String, reason: String },

    #[error("slice {path} is missing {attribute}")]
    MissingAttribute { path: String, attribute: &'static str },
}

/// A decoded 2D slice with the attributes needed for ordering, spacing and
/// calibration. Samples are raw stored values in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceImage {
    pub file_name: String,
    pub rows: usize,
    pub cols: usize,
    pub samples: Vec<f32>,
    pub modality: Modality,
    /// Patient-space Z position (ImagePositionPatient, else SliceLocation).
    pub z_position: Option<f64>,
    pub instance_number: Option<i32>,
    /// `(row spacing, column spacing)` in millimeters.
    pub pixel_spacing: Option<(f64, f64)>,
    pub slice_thickness: Option<f64>,
    pub spacing_between_slices: Option<f64>,
    pub rescale_slope: Option<f64>,
    pub rescale_intercept: Option<f64>,
}

impl SliceImage {
    /// Creates a slice with only pixel data; every optional attribute is absent.
    pub fn new(file_name: impl Into<String>, rows: usize, cols: usize, samples: Vec<f32>) -> Self {
        Self {
            file_name: file_name.into(),
            rows,
            cols,
            samples,
            modality: Modality::Ct,
            z_position: None,
            instance_number: None,
            pixel_spacing: None,
            slice_thickness: None,
            spacing_between_slices: None,
            rescale_slope: None,
            rescale_intercept: None,
        }
    }

    pub fn with_modality(mut self, modality: Modality) -> Self {
        self.modality = modality;
        self
    }

    pub fn with_z(mut self, z: f64) -> Self {
        self.z_position = Some(z);
        self
    }

    pub fn with_instance_number(mut self, n: i32) -> Self {
        self.instance_number = Some(n);
        self
    }

    pub fn with_pixel_spacing(mut self, row: f64, col: f64) -> Self {
        self.pixel_spacing = Some((row, col));
        self
    }

    pub fn with_rescale(mut self, slope: f64, intercept: f64) -> Self {
        self.rescale_slope = Some(slope);
        self.rescale_intercept = Some(intercept);
        self
    }

    /// `(rows, cols)` of the pixel grid.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}

/// Turns slice files into [`SliceImage`]s.
pub trait SliceDecoder {
    fn decode(&self, file: &SliceFile) -> Result<SliceImage, SliceDecodeError>;
}

/// Decoder for uncompressed little-endian DICOM files.
#[derive(Debug, Clone, Copy, Default)]
pub struct DicomSliceDecoder;

impl SliceDecoder for DicomSliceDecoder {
    fn decode(&self, file: &SliceFile) -> Result<SliceImage, SliceDecodeError> {
        decode_dicom_file(&file.path)
    }
}

/// Reads one DICOM file from disk.
pub fn decode_dicom_file(path: &Path) -> Result<SliceImage, SliceDecodeError> {
    let display = path.display().to_string();
    let obj = open_file(path).map_err(|e| SliceDecodeError::Unreadable {
        path: display.clone(),
        reason: e.to_string(),
    })?;

    let ts = obj.meta().transfer_syntax().trim_end_matches('\0');
    if ts != IMPLICIT_VR_LITTLE_ENDIAN && ts != EXPLICIT_VR_LITTLE_ENDIAN {
        return Err(SliceDecodeError::Unsupported {
            path: display,
            reason: format!("transfer syntax {ts} is not native little endian"),
        });
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    decode_object(&obj, &display, file_name)
}

fn decode_object(
    obj: &InMemDicomObject,
    display: &str,
    file_name: String,
) -> Result<SliceImage, SliceDecodeError> {
    let missing = |attribute| SliceDecodeError::MissingAttribute {
        path: display.to_string(),
        attribute,
    };
    let unsupported = |reason: String| SliceDecodeError::Unsupported {
        path: display.to_string(),
        reason,
    };

    let samples_per_pixel = int_attr(obj, tags::SAMPLES_PER_PIXEL).unwrap_or(1);
    if samples_per_pixel != 1 {
        return Err(unsupported(format!("{samples_per_pixel} samples per pixel")));
    }
    let frames = int_attr(obj, tags::NUMBER_OF_FRAMES).unwrap_or(1);
    if frames > 1 {
        return Err(unsupported(format!("{frames} frames")));
    }

    let rows = int_attr(obj, tags::ROWS).ok_or_else(|| missing("Rows"))?;
    let cols = int_attr(obj, tags::COLUMNS).ok_or_else(|| missing("Columns"))?;
    let (Ok(rows), Ok(cols)) = (usize::try_from(rows), usize::try_from(cols)) else {
        return Err(unsupported(format!("invalid dimensions {rows}x{cols}")));
    };
    if rows == 0 || cols == 0 {
        return Err(unsupported(format!("empty image {rows}x{cols}")));
    }
    let bits = int_attr(obj, tags::BITS_ALLOCATED).ok_or_else(|| missing("BitsAllocated"))?;
    let signed = int_attr(obj, tags::PIXEL_REPRESENTATION).unwrap_or(0) == 1;

    let pixel_data = obj.get(tags::PIXEL_DATA).ok_or_else(|| missing("PixelData"))?;
    let bytes = pixel_data
        .to_bytes()
        .map_err(|e| unsupported(format!("pixel data: {e}")))?;
    let samples = decode_native_samples(&bytes, bits, signed, rows * cols).map_err(unsupported)?;

    let z_position = multi_float_attr(obj, tags::IMAGE_POSITION_PATIENT)
        .and_then(|v| v.get(2).copied())
        .or_else(|| float_attr(obj, tags::SLICE_LOCATION))
        .filter(|z| z.is_finite());
    let pixel_spacing = multi_float_attr(obj, tags::PIXEL_SPACING).and_then(|v| match v[..] {
        [row, col, ..] => Some((row, col)),
        _ => None,
    });

    Ok(SliceImage {
        file_name,
        rows,
        cols,
        samples,
        modality: obj
            .get(tags::MODALITY)
            .and_then(|e| e.to_str().ok())
            .map_or(Modality::Other(String::new()), |s| Modality::from_tag(&s)),
        z_position,
        instance_number: int_attr(obj, tags::INSTANCE_NUMBER),
        pixel_spacing,
        slice_thickness: float_attr(obj, tags::SLICE_THICKNESS),
        spacing_between_slices: float_attr(obj, tags::SPACING_BETWEEN_SLICES),
        rescale_slope: float_attr(obj, tags::RESCALE_SLOPE),
        rescale_intercept: float_attr(obj, tags::RESCALE_INTERCEPT),
    })
}

fn int_attr(obj: &InMemDicomObject, tag: Tag) -> Option<i32> {
    obj.get(tag).and_then(|e| e.to_int::<i32>().ok())
}

fn float_attr(obj: &InMemDicomObject, tag: Tag) -> Option<f64> {
    obj.get(tag).and_then(|e| e.to_float64().ok())
}

fn multi_float_attr(obj: &InMemDicomObject, tag: Tag) -> Option<Vec<f64>> {
    obj.get(tag).and_then(|e| e.to_multi_float64().ok())
}

/// Interprets little-endian pixel bytes as `count` scalar samples.
pub fn decode_native_samples(
    bytes: &[u8],
    bits_allocated: i32,
    signed: bool,
    count: usize,
) -> Result<Vec<f32>, String> {
    let width = match bits_allocated {
        8 => 1,
        16 => 2,
        32 => 4,
        other => return Err(format!("{other} bits allocated")),
    };
    let needed = count * width;
    if bytes.len() < needed {
        return Err(format!(
            "pixel data holds {} bytes, expected {needed}",
            bytes.len()
        ));
    }

    let samples = bytes[..needed].chunks_exact(width);
    let decoded = match (width, signed) {
        (1, false) => samples.map(|b| f32::from(b[0])).collect(),
        (1, true) => samples.map(|b| f32::from(i8::from_le_bytes([b[0]]))).collect(),
        (2, false) => samples
            .map(|b| f32::from(u16::from_le_bytes([b[0], b[1]])))
            .collect(),
        (2, true) => samples
            .map(|b| f32::from(i16::from_le_bytes([b[0], b[1]])))
            .collect(),
        (_, false) => samples
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32)
            .collect(),
        (_, true) => samples
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32)
            .collect(),
    };
    Ok(decoded)
}
