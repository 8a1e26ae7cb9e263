//! File formats for ctmesh.
//!
//! - [`stl`]: binary and ASCII STL writers with a bit-exact binary layout
//! - [`mask_file`]: NumPy `.npy` dumps of segmentation masks
//! - [`thumbnail`]: PNG previews of the middle mask slices

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod mask_file;
pub mod stl;
pub mod thumbnail;

pub use mask_file::{load_mask, read_mask, save_mask, write_mask};
pub use stl::{binary_stl_size, save_stl, write_ascii_stl, write_binary_stl, write_stl, StlFormat};
pub use thumbnail::{encode_thumbnail, save_thumbnail};
