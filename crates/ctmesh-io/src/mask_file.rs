//! Mask persistence in the NumPy `.npy` format.
//!
//! Masks are written as version 1.0 files with dtype `|u1` in C order, shape
//! `(nz, ny, nx)`, one byte per voxel (0 or 1). The reader also accepts
//! version 2.0/3.0 headers and the `|b1` boolean dtype.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use ctmesh_core::{CtmeshError, Mask, Result};

const MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Header blocks are padded so the data starts on this alignment.
const HEADER_ALIGN: usize = 64;

fn invalid(msg: impl Into<String>) -> CtmeshError {
    CtmeshError::InvalidMaskFile(msg.into())
}

/// Serializes `mask` as an `.npy` byte stream.
pub fn write_mask<W: Write>(mask: &Mask, mut writer: W) -> Result<()> {
    let [nz, ny, nx] = mask.shape();
    let mut header = format!(
        "{{'descr': '|u1', 'fortran_order': False, 'shape': ({nz}, {ny}, {nx}), }}"
    );
    // magic (6) + version (2) + header length (2) + header + '\n'
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    header.extend(std::iter::repeat(' ').take(padding));
    header.push('\n');

    let header_len = u16::try_from(header.len()).map_err(|_| invalid("header too long"))?;
    writer.write_all(MAGIC)?;
    writer.write_all(&[1, 0])?;
    writer.write_all(&header_len.to_le_bytes())?;
    writer.write_all(header.as_bytes())?;

    let bytes: Vec<u8> = mask.data().iter().map(|&v| u8::from(v)).collect();
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Parses an `.npy` byte stream holding a 3D `u1`/`b1` array.
pub fn read_mask<R: Read>(mut reader: R) -> Result<Mask> {
    let mut preamble = [0_u8; 8];
    reader
        .read_exact(&mut preamble)
        .map_err(|_| invalid("truncated preamble"))?;
    if &preamble[..6] != MAGIC {
        return Err(invalid("missing NUMPY magic"));
    }

    let header_len = match preamble[6] {
        1 => {
            let mut len = [0_u8; 2];
            reader.read_exact(&mut len)?;
            usize::from(u16::from_le_bytes(len))
        }
        2 | 3 => {
            let mut len = [0_u8; 4];
            reader.read_exact(&mut len)?;
            usize::try_from(u32::from_le_bytes(len)).map_err(|_| invalid("header too long"))?
        }
        v => return Err(invalid(format!("unsupported format version {v}"))),
    };

    let mut header = vec![0_u8; header_len];
    reader
        .read_exact(&mut header)
        .map_err(|_| invalid("truncated header"))?;
    let header = String::from_utf8(header).map_err(|_| invalid("header is not UTF-8"))?;
    let shape = parse_header(&header)?;

    let expected = shape
        .iter()
        .try_fold(1_usize, |acc, &n| acc.checked_mul(n))
        .ok_or_else(|| invalid(format!("shape {shape:?} overflows")))?;
    let limit = u64::try_from(expected)
        .ok()
        .and_then(|n| n.checked_add(1))
        .ok_or_else(|| invalid(format!("shape {shape:?} overflows")))?;
    // The header is untrusted: read at most one byte past the declared size.
    let mut data = Vec::new();
    reader.take(limit).read_to_end(&mut data)?;
    if data.len() != expected {
        return Err(invalid(format!(
            "expected {expected} voxels, found {} bytes",
            data.len()
        )));
    }
    Mask::from_vec(data.into_iter().map(|b| b != 0).collect(), shape)
}

/// Validates dtype and order and returns the shape.
fn parse_header(header: &str) -> Result<[usize; 3]> {
    let descr = dict_value(header, "descr").ok_or_else(|| invalid("missing descr"))?;
    let descr = descr.trim_matches(|c| c == '\'' || c == '"');
    if !matches!(descr, "|u1" | "<u1" | ">u1" | "u1" | "|b1") {
        return Err(invalid(format!("unsupported dtype {descr}")));
    }

    let fortran =
        dict_value(header, "fortran_order").ok_or_else(|| invalid("missing fortran_order"))?;
    if fortran != "False" {
        return Err(invalid("Fortran-ordered arrays are not supported"));
    }

    let shape = dict_value(header, "shape").ok_or_else(|| invalid("missing shape"))?;
    let dims: Vec<usize> = shape
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().map_err(|_| invalid(format!("bad shape {shape}"))))
        .collect::<Result<_>>()?;
    match dims[..] {
        [nz, ny, nx] => Ok([nz, ny, nx]),
        _ => Err(invalid(format!("expected a 3D array, got shape {shape}"))),
    }
}

/// Extracts the raw text of `key`'s value from a Python dict literal.
fn dict_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let start = header.find(&format!("'{key}'"))? + key.len() + 2;
    let rest = header[start..].trim_start().strip_prefix(':')?.trim_start();
    let end = if rest.starts_with('(') {
        rest.find(')')? + 1
    } else {
        rest.find([',', '}'])?
    };
    Some(rest[..end].trim())
}

/// Writes `mask` to `path`.
pub fn save_mask<P: AsRef<Path>>(path: P, mask: &Mask) -> Result<()> {
    let file = File::create(path.as_ref())?;
    write_mask(mask, BufWriter::new(file))
}

/// Reads a mask from `path`.
pub fn load_mask<P: AsRef<Path>>(path: P) -> Result<Mask> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CtmeshError::NotFound(format!("mask file {}", path.display()))
        } else {
            CtmeshError::IoError(e)
        }
    })?;
    read_mask(BufReader::new(file))
}
