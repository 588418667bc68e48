//! Error types for bamgeno

use crate::io::bam::BamDecodeError;
use thiserror::Error;

/// Result type alias for bamgeno operations
pub type Result<T> = std::result::Result<T, BamgenoError>;

/// Error types that can occur in bamgeno
#[derive(Debug, Error)]
pub enum BamgenoError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Corrupt or truncated BGZF container
    #[error("BGZF error: {0}")]
    Bgzf(#[from] BgzfError),

    /// Malformed BAM header or alignment record
    #[error("BAM decode error: {0}")]
    BamDecode(#[from] BamDecodeError),

    /// Invalid plain-text alignment line
    #[error("Invalid SAM format at line {line}: {msg}")]
    InvalidSamFormat {
        /// Line number where error occurred
        line: usize,
        /// Error message
        msg: String,
    },

    /// Invalid FASTA format
    #[error("Invalid FASTA format at line {line}: {msg}")]
    InvalidFastaFormat {
        /// Line number where error occurred
        line: usize,
        /// Error message
        msg: String,
    },

    /// Binary reference cache is malformed
    #[error("Invalid reference cache: {0}")]
    InvalidReferenceCache(String),

    /// Invalid region of interest
    #[error("Invalid region at line {line}: {msg}")]
    InvalidRegion {
        /// Line number where error occurred
        line: usize,
        /// Error message
        msg: String,
    },

    /// Malformed genotype stream
    #[error("Invalid genotype stream: {0}")]
    InvalidGenotypeStream(String),
}

/// Failures while decoding BGZF blocks.
///
/// None of these are recoverable: a container that trips one of them is
/// corrupt and the run stops.
#[derive(Debug, Error)]
pub enum BgzfError {
    /// Block does not start with the gzip magic bytes
    #[error("invalid gzip magic at block offset {offset}: [{id1}, {id2}]")]
    InvalidMagic {
        /// Compressed offset of the block
        offset: u64,
        /// First magic byte found
        id1: u8,
        /// Second magic byte found
        id2: u8,
    },

    /// FEXTRA flag or BC subfield absent
    #[error("missing BSIZE subfield in block at offset {offset}")]
    MissingBlockSize {
        /// Compressed offset of the block
        offset: u64,
    },

    /// BSIZE smaller than the header and footer it must contain
    #[error("invalid block size {block_size} at offset {offset}")]
    InvalidBlockSize {
        /// Compressed offset of the block
        offset: u64,
        /// Declared total block size
        block_size: usize,
    },

    /// Deflate stream could not be inflated
    #[error("inflate failed for block at offset {offset}: {source}")]
    Inflate {
        /// Compressed offset of the block
        offset: u64,
        /// Underlying zlib error
        source: std::io::Error,
    },

    /// Footer ISIZE disagrees with the inflated byte count
    #[error("block at offset {offset} declares {declared} bytes but inflated to {actual}")]
    SizeMismatch {
        /// Compressed offset of the block
        offset: u64,
        /// ISIZE from the footer
        declared: u32,
        /// Bytes actually produced
        actual: usize,
    },

    /// Footer ISIZE exceeds the BGZF block payload limit
    #[error("block at offset {offset} declares {declared} bytes, more than a BGZF block holds")]
    PayloadTooLarge {
        /// Compressed offset of the block
        offset: u64,
        /// ISIZE from the footer
        declared: u32,
    },

    /// Footer CRC32 disagrees with the inflated payload
    #[error("CRC32 mismatch in block at offset {offset}: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Compressed offset of the block
        offset: u64,
        /// CRC32 from the footer
        expected: u32,
        /// CRC32 of the inflated payload
        actual: u32,
    },

    /// Container ended without the end-of-file sentinel block
    #[error("container truncated at compressed offset {offset}")]
    Truncated {
        /// Compressed offset where data ran out
        offset: u64,
    },

    /// A record ran past the end-of-file sentinel
    #[error("range {offset}+{length} runs past the end-of-file block")]
    RangePastEnd {
        /// Requested logical offset
        offset: u64,
        /// Requested length
        length: usize,
    },

    /// Requested range starts before the retained window
    #[error("cannot read offset {requested}: window starts at {window_start}")]
    BackwardRead {
        /// Requested logical offset
        requested: u64,
        /// Logical offset of the first retained byte
        window_start: u64,
    },
}
