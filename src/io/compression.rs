//! BGZF block decoding and the block-addressed decompressed stream.
//!
//! # Block Structure
//!
//! Each BGZF block is an independent gzip member:
//! - Bytes 0-9: gzip header (ID1=31, ID2=139, CM=8, FLG=4, MTIME, XFL, OS)
//! - Bytes 10-11: XLEN (extra field length)
//! - Extra subfields, including BSIZE
//!   - SI1=66 ('B'), SI2=67 ('C')
//!   - SLEN=2 (2-byte BSIZE field)
//!   - BSIZE (little-endian u16): total block size - 1
//! - CDATA: raw deflate payload of `BSIZE - XLEN - 19` bytes
//! - CRC32 and ISIZE (little-endian u32 each)
//!
//! A container ends with a fixed 28-byte empty block ([`EOF_BLOCK`]).
//!
//! # Addressing
//!
//! [`BlockStream`] exposes the concatenation of all decompressed payloads as
//! one logical address space. Callers ask for `(offset, length)` ranges and
//! the stream inflates as many blocks as needed to satisfy them. Reads are
//! expected to move forward: bytes before the requested offset are dropped
//! whenever more blocks have to be appended, so memory stays proportional
//! to the largest record rather than to the file.

use crate::error::{BgzfError, Result};
use flate2::read::DeflateDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

/// Fixed part of the gzip header preceding the extra field
pub const GZIP_FIXED_HEADER_SIZE: usize = 12;

/// Header size of a standard BGZF block (fixed header + 6-byte BC subfield)
pub const BGZF_HEADER_SIZE: usize = GZIP_FIXED_HEADER_SIZE + 6;

/// CRC32 + ISIZE
pub const BGZF_FOOTER_SIZE: usize = 8;

/// End-of-file sentinel block.
///
/// Its payload is the two-byte empty deflate stream `[0x03, 0x00]`.
pub const EOF_BLOCK: [u8; 28] = [
    0x1f, 0x8b, 0x08, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x06, 0x00, 0x42, 0x43, 0x02,
    0x00, 0x1b, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Largest inflated payload a BGZF block may carry.
pub const MAX_BLOCK_PAYLOAD: usize = 65_536;

const GZIP_ID1: u8 = 31;
const GZIP_ID2: u8 = 139;
const FLG_FEXTRA: u8 = 0x04;
const BC_SI1: u8 = 66;
const BC_SI2: u8 = 67;

/// One compressed BGZF block as read from disk.
#[derive(Debug, Clone)]
pub struct BgzfBlock {
    /// Compressed file offset of the block's first byte
    pub offset: u64,
    /// gzip FLG byte
    pub flags: u8,
    /// gzip MTIME
    pub mtime: u32,
    /// gzip XFL byte
    pub extra_flags: u8,
    /// gzip OS byte
    pub os: u8,
    /// Extra field bytes (contains the BC subfield)
    pub extra: Vec<u8>,
    /// BSIZE as stored (total block size - 1)
    pub bsize: u16,
    /// Raw deflate payload
    pub cdata: Vec<u8>,
    /// Footer CRC32 of the decompressed payload
    pub crc32: u32,
    /// Footer ISIZE: decompressed payload length
    pub isize: u32,
}

impl BgzfBlock {
    /// Total on-disk size of the block.
    pub fn block_size(&self) -> usize {
        self.bsize as usize + 1
    }

    /// True when this is the empty end-of-file sentinel block.
    ///
    /// Every header and footer field must match the sentinel exactly and
    /// the payload must be the empty deflate stream.
    pub fn is_eof(&self) -> bool {
        self.flags == EOF_BLOCK[3]
            && self.mtime == 0
            && self.extra_flags == 0
            && self.os == 0xff
            && self.extra == EOF_BLOCK[GZIP_FIXED_HEADER_SIZE..BGZF_HEADER_SIZE]
            && self.crc32 == 0
            && self.isize == 0
            && self.cdata == [0x03, 0x00]
    }

    /// Inflate the payload into `out`, replacing its contents.
    ///
    /// # Errors
    ///
    /// Fails when the deflate stream is corrupt, or when the inflated byte
    /// count or checksum disagree with the footer.
    pub fn decompress_into(&self, out: &mut Vec<u8>) -> std::result::Result<(), BgzfError> {
        out.clear();
        if self.isize as usize > MAX_BLOCK_PAYLOAD {
            return Err(BgzfError::PayloadTooLarge {
                offset: self.offset,
                declared: self.isize,
            });
        }
        out.reserve(self.isize as usize);

        let mut decoder = DeflateDecoder::new(&self.cdata[..]);
        decoder
            .read_to_end(out)
            .map_err(|source| BgzfError::Inflate {
                offset: self.offset,
                source,
            })?;

        if out.len() != self.isize as usize {
            return Err(BgzfError::SizeMismatch {
                offset: self.offset,
                declared: self.isize,
                actual: out.len(),
            });
        }

        let actual = crc32fast::hash(out);
        if actual != self.crc32 {
            return Err(BgzfError::ChecksumMismatch {
                offset: self.offset,
                expected: self.crc32,
                actual,
            });
        }

        Ok(())
    }

    /// Inflate the payload into a fresh buffer.
    pub fn decompress(&self) -> std::result::Result<Vec<u8>, BgzfError> {
        let mut out = Vec::new();
        self.decompress_into(&mut out)?;
        Ok(out)
    }
}

/// Fill `buf` completely, mapping a short read to [`BgzfError::Truncated`].
fn read_exact_or_truncated<R: Read>(reader: &mut R, buf: &mut [u8], offset: u64) -> Result<()> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            Err(BgzfError::Truncated { offset }.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Read the next BGZF block from `reader`.
///
/// `offset` is the compressed offset of the block and is only used for
/// diagnostics.
///
/// # Returns
///
/// - `Ok(Some(block))` - a complete block
/// - `Ok(None)` - the reader is exhausted exactly at a block boundary
/// - `Err(_)` - malformed or partial block
pub fn read_block<R: Read>(reader: &mut R, offset: u64) -> Result<Option<BgzfBlock>> {
    let mut fixed = [0u8; GZIP_FIXED_HEADER_SIZE];

    // Distinguish a clean end (zero bytes) from a partial header
    let mut filled = 0;
    while filled < fixed.len() {
        match reader.read(&mut fixed[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(BgzfError::Truncated { offset }.into()),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    if fixed[0] != GZIP_ID1 || fixed[1] != GZIP_ID2 {
        return Err(BgzfError::InvalidMagic {
            offset,
            id1: fixed[0],
            id2: fixed[1],
        }
        .into());
    }

    let flags = fixed[3];
    if flags & FLG_FEXTRA == 0 {
        return Err(BgzfError::MissingBlockSize { offset }.into());
    }

    let mtime = u32::from_le_bytes([fixed[4], fixed[5], fixed[6], fixed[7]]);
    let extra_flags = fixed[8];
    let os = fixed[9];
    let xlen = u16::from_le_bytes([fixed[10], fixed[11]]) as usize;

    let mut extra = vec![0u8; xlen];
    read_exact_or_truncated(reader, &mut extra, offset)?;

    // Walk the extra subfields looking for BC
    let mut bsize: Option<u16> = None;
    let mut pos = 0;
    while pos + 4 <= xlen {
        let si1 = extra[pos];
        let si2 = extra[pos + 1];
        let slen = u16::from_le_bytes([extra[pos + 2], extra[pos + 3]]) as usize;

        if si1 == BC_SI1 && si2 == BC_SI2 && slen == 2 && pos + 6 <= xlen {
            bsize = Some(u16::from_le_bytes([extra[pos + 4], extra[pos + 5]]));
            break;
        }

        pos += 4 + slen;
    }

    let bsize = bsize.ok_or(BgzfError::MissingBlockSize { offset })?;
    let block_size = bsize as usize + 1;

    let overhead = GZIP_FIXED_HEADER_SIZE + xlen + BGZF_FOOTER_SIZE;
    if block_size < overhead {
        return Err(BgzfError::InvalidBlockSize { offset, block_size }.into());
    }

    let cdata_len = block_size - overhead;
    let mut cdata = vec![0u8; cdata_len];
    read_exact_or_truncated(reader, &mut cdata, offset)?;

    let mut footer = [0u8; BGZF_FOOTER_SIZE];
    read_exact_or_truncated(reader, &mut footer, offset)?;

    Ok(Some(BgzfBlock {
        offset,
        flags,
        mtime,
        extra_flags,
        os,
        extra,
        bsize,
        cdata,
        crc32: u32::from_le_bytes([footer[0], footer[1], footer[2], footer[3]]),
        isize: u32::from_le_bytes([footer[4], footer[5], footer[6], footer[7]]),
    }))
}

/// Decompressed view over a BGZF container, addressed by logical offset.
///
/// # Example
///
/// ```no_run
/// use bamgeno::io::BlockStream;
///
/// # fn main() -> bamgeno::Result<()> {
/// let mut stream = BlockStream::from_path("alignments.bam")?;
/// if let Some(magic) = stream.get_block(0, 4)? {
///     assert_eq!(magic, b"BAM\x01");
/// }
/// # Ok(())
/// # }
/// ```
pub struct BlockStream<R> {
    reader: R,
    /// Compressed offset of the next block to read
    compressed_offset: u64,
    /// Decompressed bytes currently retained
    buffer: Vec<u8>,
    /// Logical offset of `buffer[0]`
    buffer_start: u64,
    /// Scratch space for inflating one block
    scratch: Vec<u8>,
    started: bool,
    eof: bool,
    blocks_read: u64,
}

impl BlockStream<BufReader<File>> {
    /// Open a BGZF container from a path.
    ///
    /// The file is opened immediately; the first block is inflated on the
    /// first [`get_block`](Self::get_block) call.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> BlockStream<R> {
    /// Wrap a reader positioned at the first block of a container.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            compressed_offset: 0,
            buffer: Vec::new(),
            buffer_start: 0,
            scratch: Vec::new(),
            started: false,
            eof: false,
            blocks_read: 0,
        }
    }

    /// True once the end-of-file block has been reached.
    pub fn is_end_of_stream(&self) -> bool {
        self.eof
    }

    /// Number of non-sentinel blocks inflated so far.
    pub fn blocks_read(&self) -> u64 {
        self.blocks_read
    }

    /// Get `length` decompressed bytes starting at logical `offset`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(bytes))` - the requested range
    /// - `Ok(None)` - `offset` is exactly the end of the data, including when
    ///   the blocks between the retained window and `offset` were never
    ///   requested; [`is_end_of_stream`](Self::is_end_of_stream) is now true
    ///
    /// # Errors
    ///
    /// Any decode failure is fatal, as is a range that starts inside the data
    /// but runs past the sentinel, or one that starts before the retained window.
    pub fn get_block(&mut self, offset: u64, length: usize) -> Result<Option<&[u8]>> {
        if self.eof {
            return Ok(None);
        }

        if !self.started {
            self.started = true;
            if !self.next_payload()? {
                self.eof = true;
                return Ok(None);
            }
            std::mem::swap(&mut self.buffer, &mut self.scratch);
            self.buffer_start = 0;
        }

        if offset < self.buffer_start {
            return Err(BgzfError::BackwardRead {
                requested: offset,
                window_start: self.buffer_start,
            }
            .into());
        }

        if length == 0 && offset <= self.buffer_end() {
            return Ok(Some(&[]));
        }

        // Request starts right where the data ends: move on to the next block
        if offset == self.buffer_end() {
            if !self.next_payload()? {
                self.eof = true;
                return Ok(None);
            }
            std::mem::swap(&mut self.buffer, &mut self.scratch);
            self.buffer_start = offset;
        }

        let wanted_end = offset + length as u64;
        while self.buffer_end() < wanted_end {
            // Drop what the caller has already moved past
            let consumed = ((offset - self.buffer_start) as usize).min(self.buffer.len());
            if consumed > 0 {
                self.buffer.drain(..consumed);
                self.buffer_start += consumed as u64;
            }

            if !self.next_payload()? {
                self.eof = true;
                // Bytes skipped without being fetched (e.g. aux tags) ended the data
                if offset == self.buffer_end() {
                    return Ok(None);
                }
                return Err(BgzfError::RangePastEnd { offset, length }.into());
            }
            self.buffer.extend_from_slice(&self.scratch);
        }

        let start = (offset - self.buffer_start) as usize;
        Ok(Some(&self.buffer[start..start + length]))
    }

    fn buffer_end(&self) -> u64 {
        self.buffer_start + self.buffer.len() as u64
    }

    /// Inflate the next block into `scratch`.
    ///
    /// Returns false at the sentinel block, or when the file ends on a block
    /// boundary without one.
    fn next_payload(&mut self) -> Result<bool> {
        let block = match read_block(&mut self.reader, self.compressed_offset)? {
            Some(block) => block,
            None => {
                warn!(
                    offset = self.compressed_offset,
                    "container ended without an end-of-file block"
                );
                return Ok(false);
            }
        };
        self.compressed_offset += block.block_size() as u64;

        if block.is_eof() {
            debug!(blocks = self.blocks_read, "reached end-of-file block");
            return Ok(false);
        }

        block.decompress_into(&mut self.scratch)?;
        self.blocks_read += 1;
        Ok(true)
    }
}

/// Helpers for building BGZF containers in unit tests.
#[cfg(test)]
pub(crate) mod test_support {
    use super::EOF_BLOCK;
    use flate2::write::DeflateEncoder;
    use flate2::Compression;
    use std::io::Write;

    /// Compress `data` into a single BGZF block.
    pub(crate) fn compress_block(data: &[u8]) -> Vec<u8> {
        let mut deflate = DeflateEncoder::new(Vec::new(), Compression::default());
        deflate.write_all(data).unwrap();
        let deflated = deflate.finish().unwrap();

        let mut block = vec![31, 139, 8, 4, 0, 0, 0, 0, 0, 255];
        block.extend_from_slice(&6u16.to_le_bytes());
        block.extend_from_slice(&[66, 67]);
        block.extend_from_slice(&2u16.to_le_bytes());
        let bsize_pos = block.len();
        block.extend_from_slice(&0u16.to_le_bytes());
        block.extend_from_slice(&deflated);
        block.extend_from_slice(&crc32fast::hash(data).to_le_bytes());
        block.extend_from_slice(&(data.len() as u32).to_le_bytes());

        let bsize = (block.len() - 1) as u16;
        block[bsize_pos..bsize_pos + 2].copy_from_slice(&bsize.to_le_bytes());
        block
    }

    /// Split `data` into blocks of at most `block_len` bytes and append the sentinel.
    pub(crate) fn bgzf_container(data: &[u8], block_len: usize) -> Vec<u8> {
        let mut out = Vec::new();
        for chunk in data.chunks(block_len) {
            out.extend_from_slice(&compress_block(chunk));
        }
        out.extend_from_slice(&EOF_BLOCK);
        out
    }
}
