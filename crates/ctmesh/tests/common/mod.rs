//! Shared fixtures: synthetic CT series written as real DICOM files.

#![allow(dead_code)]

use std::path::Path;

use dicom_core::{dicom_value, DataElement, PrimitiveValue, VR};
use dicom_dictionary_std::tags;
use dicom_object::meta::FileMetaTableBuilder;
use dicom_object::InMemDicomObject;

pub const AIR_HU: i16 = -1000;
pub const BONE_HU: i16 = 1000;

/// Writes one 16-bit signed CT slice with unit pixel spacing.
pub fn write_ct_slice(
    path: &Path,
    rows: usize,
    cols: usize,
    z: f64,
    instance: usize,
    pixels: &[i16],
) {
    assert_eq!(pixels.len(), rows * cols);
    let bytes: Vec<u8> = pixels.iter().flat_map(|v| v.to_le_bytes()).collect();
    let rows = u16::try_from(rows).unwrap();
    let cols = u16::try_from(cols).unwrap();
    let obj = InMemDicomObject::from_element_iter([
        DataElement::new(tags::MODALITY, VR::CS, PrimitiveValue::from("CT")),
        DataElement::new(tags::INSTANCE_NUMBER, VR::IS, PrimitiveValue::from(instance.to_string())),
        DataElement::new(
            tags::IMAGE_POSITION_PATIENT,
            VR::DS,
            dicom_value!(Strs, ["0.0", "0.0", format!("{z:.1}")]),
        ),
        DataElement::new(tags::SLICE_THICKNESS, VR::DS, PrimitiveValue::from("1.0")),
        DataElement::new(tags::PIXEL_SPACING, VR::DS, dicom_value!(Strs, ["1.0", "1.0"])),
        DataElement::new(tags::SAMPLES_PER_PIXEL, VR::US, PrimitiveValue::from(1_u16)),
        DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(rows)),
        DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(cols)),
        DataElement::new(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(16_u16)),
        DataElement::new(tags::BITS_STORED, VR::US, PrimitiveValue::from(16_u16)),
        DataElement::new(tags::PIXEL_REPRESENTATION, VR::US, PrimitiveValue::from(1_u16)),
        DataElement::new(tags::RESCALE_INTERCEPT, VR::DS, PrimitiveValue::from("0")),
        DataElement::new(tags::RESCALE_SLOPE, VR::DS, PrimitiveValue::from("1")),
        DataElement::new(tags::PIXEL_DATA, VR::OB, PrimitiveValue::from(bytes)),
    ]);
    obj.with_meta(
        FileMetaTableBuilder::new()
            .transfer_syntax("1.2.840.10008.1.2.1")
            .media_storage_sop_class_uid("1.2.840.10008.5.1.4.1.1.2")
            .media_storage_sop_instance_uid(format!("1.2.826.0.1.3680043.2.1125.{instance}")),
    )
    .unwrap()
    .write_to_file(path)
    .unwrap();
}

/// Writes a `shape = [nz, ny, nx]` series for `session` whose voxel values
/// come from `f(z, y, x)`, plus its `mapping.json`.
///
/// Slices are listed in the manifest in reverse order so ordering by
/// position is exercised.
pub fn write_series(
    series_root: &Path,
    session: &str,
    shape: [usize; 3],
    f: impl Fn(usize, usize, usize) -> i16,
) {
    let [nz, ny, nx] = shape;
    let dir = series_root.join(session);
    std::fs::create_dir_all(&dir).unwrap();

    let mut manifest = serde_json::Map::new();
    for z in (0..nz).rev() {
        let name = format!("slice_{z:03}.dcm");
        let pixels: Vec<i16> = (0..ny)
            .flat_map(|y| (0..nx).map(move |x| (y, x)))
            .map(|(y, x)| f(z, y, x))
            .collect();
        let position = f64::from(u32::try_from(z).unwrap());
        write_ct_slice(&dir.join(&name), ny, nx, position, z + 1, &pixels);
        manifest.insert(
            format!("Slice {z}"),
            serde_json::json!({ "dicom_name": name, "archivodicomid": z }),
        );
    }
    std::fs::write(
        dir.join("mapping.json"),
        serde_json::to_string_pretty(&manifest).unwrap(),
    )
    .unwrap();
}

/// A 30^3 series holding a 10^3 bone cube at `[10, 20)` on every axis.
pub fn write_cube_series(series_root: &Path, session: &str) {
    let inside = |v: usize| (10..20).contains(&v);
    write_series(series_root, session, [30, 30, 30], |z, y, x| {
        if inside(z) && inside(y) && inside(x) {
            BONE_HU
        } else {
            AIR_HU
        }
    });
}
