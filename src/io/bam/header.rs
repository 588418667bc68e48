//! BAM header parsing.
//!
//! The BAM header consists of:
//! 1. Magic bytes ("BAM\1")
//! 2. SAM header text (length-prefixed)
//! 3. Reference sequence dictionary
//!
//! # Format
//!
//! ```text
//! BAM Header:
//! - 4 bytes: Magic ("BAM\1")
//! - 4 bytes: SAM header text length (l_text, int32)
//! - l_text bytes: SAM header text
//! - 4 bytes: Number of reference sequences (n_ref, int32)
//! - For each reference:
//!   - 4 bytes: Reference name length (l_name, int32, includes null terminator)
//!   - l_name bytes: Reference name (null-terminated)
//!   - 4 bytes: Reference length (int32)
//! ```
//!
//! The header is read straight out of the decompressed [`BlockStream`]
//! address space, so it may span any number of BGZF blocks.

use super::error::BamDecodeError;
use crate::error::Result;
use crate::io::compression::BlockStream;
use std::io::Read;
use std::sync::Arc;

/// BAM magic bytes.
pub const BAM_MAGIC: &[u8; 4] = b"BAM\x01";

/// Reference sequence information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Reference sequence name (e.g., "1", "chrX")
    ///
    /// Shared with every record aligned to it.
    pub name: Arc<str>,
    /// Reference sequence length in bases
    pub length: u32,
}

impl Reference {
    /// Create a new reference.
    pub fn new(name: impl Into<Arc<str>>, length: u32) -> Self {
        Self {
            name: name.into(),
            length,
        }
    }
}

/// BAM file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// SAM header text (includes @HD, @SQ, @RG, @PG lines)
    pub text: String,
    /// Reference sequences (chromosomes/contigs)
    pub references: Vec<Reference>,
}

impl Header {
    /// Create a new header.
    pub fn new(text: String, references: Vec<Reference>) -> Self {
        Self { text, references }
    }

    /// Get reference by ID.
    pub fn reference(&self, id: usize) -> Option<&Reference> {
        self.references.get(id)
    }

    /// Get reference name by ID.
    pub fn reference_name(&self, id: usize) -> Option<&Arc<str>> {
        self.reference(id).map(|r| &r.name)
    }

    /// Get number of reference sequences.
    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    /// Reference names indexed by reference ID.
    pub fn reference_names(&self) -> Vec<Arc<str>> {
        self.references.iter().map(|r| Arc::clone(&r.name)).collect()
    }
}

/// Fetch `len` bytes at `*offset` and advance it.
fn take<'a, R: Read>(
    stream: &'a mut BlockStream<R>,
    offset: &mut u64,
    len: usize,
    context: &'static str,
) -> Result<&'a [u8]> {
    let at = *offset;
    match stream.get_block(at, len)? {
        Some(bytes) => {
            *offset += len as u64;
            Ok(bytes)
        }
        None => Err(BamDecodeError::UnexpectedEof {
            context,
            expected: len,
            actual: 0,
        }
        .into()),
    }
}

fn take_i32<R: Read>(
    stream: &mut BlockStream<R>,
    offset: &mut u64,
    context: &'static str,
) -> Result<i32> {
    let bytes = take(stream, offset, 4, context)?;
    Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn non_negative(value: i32, field: &'static str) -> std::result::Result<usize, BamDecodeError> {
    usize::try_from(value).map_err(|_| BamDecodeError::InvalidHeaderLength { field, value })
}

/// Read the complete BAM header starting at logical offset 0.
///
/// Returns the header and the logical offset of the first alignment record.
///
/// # Errors
///
/// Returns error if the magic bytes are wrong, a length is negative, a name
/// is not NUL-terminated UTF-8, or the stream ends inside the header.
pub fn read_header<R: Read>(stream: &mut BlockStream<R>) -> Result<(Header, u64)> {
    let mut offset = 0u64;

    let magic = take(stream, &mut offset, 4, "BAM magic")?;
    if magic != BAM_MAGIC {
        return Err(BamDecodeError::InvalidMagic {
            actual: [magic[0], magic[1], magic[2], magic[3]],
        }
        .into());
    }

    let l_text = non_negative(take_i32(stream, &mut offset, "header text length")?, "l_text")?;
    let text_bytes = take(stream, &mut offset, l_text, "header text")?;
    // Header text is often NUL-padded
    let text_end = text_bytes
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(text_bytes.len());
    let text = String::from_utf8(text_bytes[..text_end].to_vec()).map_err(|source| {
        BamDecodeError::InvalidUtf8 {
            field: "header text",
            source,
        }
    })?;

    let n_ref = non_negative(take_i32(stream, &mut offset, "reference count")?, "n_ref")?;
    let mut references = Vec::with_capacity(n_ref.min(1 << 16));

    for _ in 0..n_ref {
        let l_name = take_i32(stream, &mut offset, "reference name length")?;
        if l_name <= 0 {
            return Err(BamDecodeError::InvalidHeaderLength {
                field: "l_name",
                value: l_name,
            }
            .into());
        }

        let name_offset = offset;
        let name_bytes = take(stream, &mut offset, l_name as usize, "reference name")?;
        let (last, name) = name_bytes
            .split_last()
            .ok_or(BamDecodeError::MissingNulTerminator {
                field: "reference name",
                offset: name_offset,
            })?;
        if *last != 0 {
            return Err(BamDecodeError::MissingNulTerminator {
                field: "reference name",
                offset: name_offset,
            }
            .into());
        }
        let name = String::from_utf8(name.to_vec()).map_err(|source| {
            BamDecodeError::InvalidUtf8 {
                field: "reference name",
                source,
            }
        })?;

        let length = non_negative(take_i32(stream, &mut offset, "reference length")?, "l_ref")?;
        references.push(Reference::new(name, length as u32));
    }

    Ok((Header::new(text, references), offset))
}
