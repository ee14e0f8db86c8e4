//! Binary layout of the vector file.
//!
//! # File Structure
//!
//! ```text
//! Offset   Size    Type        Description
//! ─────────────────────────────────────────────
//! 0x00     4       [u8; 4]     Magic: "IVEC"
//! 0x04     4       u32 LE      Format version (1)
//! 0x08     4       u32 LE      D: dimension
//! 0x0C     4       u32 LE      N: number of vectors
//! 0x10     N*D*4   [f32]       Row-major vector data (little-endian)
//! ```
//!
//! Position `i` in the data block is record `i` of the metadata file; the
//! file stores no ids.

use std::io::{self, Write};

use sha2::{Digest, Sha256};

use crate::vector::{FlatIndex, VectorDimension};

/// Magic bytes identifying a vector file.
pub const MAGIC: &[u8; 4] = b"IVEC";

/// Current vector file format version.
pub const FORMAT_VERSION: u32 = 1;

/// Size of the header in bytes.
pub const HEADER_SIZE: usize = 16;

const BYTES_PER_F32: usize = 4;

/// Parsed vector file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorFileHeader {
    pub version: u32,
    pub dimension: u32,
    pub count: u32,
}

impl VectorFileHeader {
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(MAGIC);
        buf[4..8].copy_from_slice(&self.version.to_le_bytes());
        buf[8..12].copy_from_slice(&self.dimension.to_le_bytes());
        buf[12..16].copy_from_slice(&self.count.to_le_bytes());
        buf
    }

    /// Parse the first [`HEADER_SIZE`] bytes. Errors are corruption reasons.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() < HEADER_SIZE {
            return Err(format!(
                "file is {} bytes, too small to contain a header",
                bytes.len()
            ));
        }
        if &bytes[0..4] != MAGIC {
            return Err("invalid magic bytes".to_string());
        }
        let word = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        Ok(Self {
            version: word(4),
            dimension: word(8),
            count: word(12),
        })
    }

    /// Exact file size implied by the header, `None` if it overflows `u64`.
    pub fn file_len(&self) -> Option<u64> {
        (self.count as u64)
            .checked_mul(self.dimension as u64)?
            .checked_mul(BYTES_PER_F32 as u64)?
            .checked_add(HEADER_SIZE as u64)
    }
}

/// Write header and vector data.
pub fn write_vectors<W: Write + ?Sized>(writer: &mut W, index: &FlatIndex) -> io::Result<()> {
    let too_large = |what: &str| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{what} does not fit the u32 header field"),
        )
    };
    let header = VectorFileHeader {
        version: FORMAT_VERSION,
        dimension: u32::try_from(index.dimension().get()).map_err(|_| too_large("dimension"))?,
        count: u32::try_from(index.len()).map_err(|_| too_large("vector count"))?,
    };
    writer.write_all(&header.to_bytes())?;

    for &value in index.as_slice() {
        writer.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

/// Decode a complete vector file. Errors are corruption reasons.
pub fn read_vectors(bytes: &[u8]) -> Result<(VectorFileHeader, FlatIndex), String> {
    let header = VectorFileHeader::from_bytes(bytes)?;
    if header.version != FORMAT_VERSION {
        return Err(format!(
            "unsupported vector format version {} (supported: {FORMAT_VERSION})",
            header.version
        ));
    }
    let Some(expected) = header.file_len() else {
        return Err(format!(
            "header declares {} vectors of dimension {}, larger than any file",
            header.count, header.dimension
        ));
    };
    if bytes.len() as u64 != expected {
        return Err(format!(
            "vector file is {} bytes but header declares {} vectors of dimension {} ({expected} bytes)",
            bytes.len(),
            header.count,
            header.dimension,
        ));
    }

    let dimension = VectorDimension::new(header.dimension as usize).map_err(|e| e.to_string())?;
    let data: Vec<f32> = bytes[HEADER_SIZE..]
        .chunks_exact(BYTES_PER_F32)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    let index = FlatIndex::from_raw(dimension, data).map_err(|e| e.to_string())?;
    Ok((header, index))
}

/// Writer adapter that hashes everything passing through it.
pub struct HashingWriter<W: Write> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> HashingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    /// Returns the inner writer and the hex SHA-256 of the bytes written.
    pub fn finish(self) -> (W, String) {
        (self.inner, format!("{:x}", self.hasher.finalize()))
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Hex SHA-256 of a byte slice.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
