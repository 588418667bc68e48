//! Binary reference cache.
//!
//! A compact on-disk form of a whole genome that loads without parsing text
//! and can be scanned chromosome by chromosome.
//!
//! # Format
//!
//! ```text
//! - 4 bytes: signature 0xFFEECCAA (u32, little-endian)
//! - 4 bytes: chromosome count (u32)
//! - For each chromosome:
//!   - name bytes, NUL-terminated
//!   - 4 bytes: packed byte length (u32)
//!   - packed bytes: two one-hot nucleotide nibbles per byte, low nibble first
//! ```

use crate::error::{BamgenoError, Result};
use crate::types::PackedSequence;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Cache file signature.
pub const CACHE_SIGNATURE: u32 = 0xFFEE_CCAA;

/// True when the file at `path` starts with the cache signature.
pub fn is_reference_cache<P: AsRef<Path>>(path: P) -> Result<bool> {
    let mut file = File::open(path)?;
    let mut signature = [0u8; 4];
    let mut filled = 0;
    while filled < 4 {
        match file.read(&mut signature[filled..])? {
            0 => return Ok(false),
            n => filled += n,
        }
    }
    Ok(u32::from_le_bytes(signature) == CACHE_SIGNATURE)
}

fn read_u32<R: Read>(reader: &mut R, what: &str) -> Result<u32> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            BamgenoError::InvalidReferenceCache(format!("truncated {}", what))
        } else {
            BamgenoError::Io(e)
        }
    })?;
    Ok(u32::from_le_bytes(bytes))
}

/// Read the signature and chromosome count.
fn read_preamble<R: Read>(reader: &mut R) -> Result<u32> {
    let signature = read_u32(reader, "signature")?;
    if signature != CACHE_SIGNATURE {
        return Err(BamgenoError::InvalidReferenceCache(format!(
            "bad signature {:#010x}",
            signature
        )));
    }
    read_u32(reader, "chromosome count")
}

/// Read one NUL-terminated name and the packed length that follows it.
fn read_entry_header<R: BufRead>(reader: &mut R) -> Result<(String, usize)> {
    let mut name = Vec::new();
    reader.read_until(0, &mut name)?;
    if name.pop() != Some(0) {
        return Err(BamgenoError::InvalidReferenceCache(
            "chromosome name not NUL-terminated".to_string(),
        ));
    }
    let name = String::from_utf8(name).map_err(|e| {
        BamgenoError::InvalidReferenceCache(format!("chromosome name is not UTF-8: {}", e))
    })?;
    let length = read_u32(reader, "sequence length")? as usize;
    Ok((name, length))
}

fn read_payload<R: Read>(reader: &mut R, length: usize, name: &str) -> Result<PackedSequence> {
    let mut bytes = vec![0u8; length];
    reader.read_exact(&mut bytes).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            BamgenoError::InvalidReferenceCache(format!("truncated sequence for '{}'", name))
        } else {
            BamgenoError::Io(e)
        }
    })?;
    Ok(PackedSequence::from_packed(bytes))
}

/// Load every chromosome of a cache.
pub fn read_cache<R: BufRead>(mut reader: R) -> Result<BTreeMap<String, PackedSequence>> {
    let count = read_preamble(&mut reader)?;
    let mut genome = BTreeMap::new();
    for _ in 0..count {
        let (name, length) = read_entry_header(&mut reader)?;
        let sequence = read_payload(&mut reader, length, &name)?;
        genome.insert(name, sequence);
    }
    Ok(genome)
}

/// Load every chromosome of the cache file at `path`.
pub fn read_cache_file<P: AsRef<Path>>(path: P) -> Result<BTreeMap<String, PackedSequence>> {
    read_cache(BufReader::new(File::open(path)?))
}

/// Scan the cache linearly for one chromosome, skipping the others' payloads.
///
/// Returns `Ok(None)` when the chromosome is not present.
pub fn find_chromosome<R: BufRead + Seek>(
    mut reader: R,
    chromosome: &str,
) -> Result<Option<PackedSequence>> {
    let count = read_preamble(&mut reader)?;
    for _ in 0..count {
        let (name, length) = read_entry_header(&mut reader)?;
        if name == chromosome {
            return read_payload(&mut reader, length, &name).map(Some);
        }
        reader.seek(SeekFrom::Current(length as i64))?;
    }
    Ok(None)
}

/// Write a genome in cache format, chromosomes in name order.
pub fn write_cache<W: Write>(
    mut writer: W,
    genome: &BTreeMap<String, PackedSequence>,
) -> Result<()> {
    writer.write_all(&CACHE_SIGNATURE.to_le_bytes())?;
    writer.write_all(&(genome.len() as u32).to_le_bytes())?;
    for (name, sequence) in genome {
        writer.write_all(name.as_bytes())?;
        writer.write_all(&[0])?;
        writer.write_all(&(sequence.as_bytes().len() as u32).to_le_bytes())?;
        writer.write_all(sequence.as_bytes())?;
    }
    writer.flush()?;
    Ok(())
}
