//! BAM streaming reader.
//!
//! Reads records straight out of a [`BlockStream`] by logical offset: the
//! fixed 36-byte header of each record is fetched first, the lengths it
//! declares give the size of the name, CIGAR, sequence and quality fields,
//! and the next record starts `4 + block_size` bytes later.
//!
//! # Usage
//!
//! ```no_run
//! use bamgeno::io::bam::BamReader;
//!
//! # fn main() -> bamgeno::Result<()> {
//! let mut bam = BamReader::from_path("alignments.bam")?;
//! println!("Header: {} references", bam.header().reference_count());
//!
//! for result in bam.records() {
//!     let record = result?;
//!     println!("{} at {}", record.name, record.position);
//! }
//! # Ok(())
//! # }
//! ```

use super::error::BamDecodeError;
use super::header::{read_header, Header};
use super::record::{decode_record, AlignmentRecord, RecordHeader, RECORD_HEADER_SIZE};
use crate::error::Result;
use crate::io::compression::BlockStream;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

/// BAM file reader with streaming interface.
///
/// The header is read once during construction, then records are streamed.
pub struct BamReader<R> {
    stream: BlockStream<R>,
    header: Header,
    /// Reference names indexed by refID, shared with every record
    reference_names: Vec<Arc<str>>,
    /// Logical offset of the next record
    offset: u64,
    records_read: u64,
}

impl BamReader<BufReader<File>> {
    /// Open a BAM file from a path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(BlockStream::from_path(path)?)
    }
}

impl<R: Read> BamReader<R> {
    /// Create a new BAM reader over a block stream.
    ///
    /// Reads and validates the BAM header immediately.
    pub fn new(mut stream: BlockStream<R>) -> Result<Self> {
        let (header, offset) = read_header(&mut stream)?;
        let reference_names = header.reference_names();
        Ok(Self {
            stream,
            header,
            reference_names,
            offset,
            records_read: 0,
        })
    }

    /// Get a reference to the BAM header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Number of records decoded so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Create an iterator over BAM records.
    pub fn records(&mut self) -> Records<'_, R> {
        Records {
            reader: self,
            failed: false,
        }
    }

    /// Read a single record.
    ///
    /// Returns `Ok(None)` once the end-of-file block is reached.
    pub fn read_record(&mut self) -> Result<Option<AlignmentRecord>> {
        let offset = self.offset;

        let record_header = match self.stream.get_block(offset, RECORD_HEADER_SIZE)? {
            Some(bytes) => RecordHeader::parse(bytes, offset)?,
            None => return Ok(None),
        };

        let fields_length = RECORD_HEADER_SIZE + record_header.variable_length();
        let bytes = self
            .stream
            .get_block(offset, fields_length)?
            .ok_or(BamDecodeError::UnexpectedEof {
                context: "record fields",
                expected: fields_length,
                actual: 0,
            })?;
        let record = decode_record(bytes, &self.reference_names, offset)?;

        self.offset += record_header.record_length() as u64;
        self.records_read += 1;
        Ok(Some(record))
    }
}

/// Iterator over BAM records.
///
/// Stops after the first error.
pub struct Records<'a, R> {
    reader: &'a mut BamReader<R>,
    failed: bool,
}

impl<R: Read> Iterator for Records<'_, R> {
    type Item = Result<AlignmentRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let result = self.reader.read_record().transpose();
        self.failed = matches!(result, Some(Err(_)));
        result
    }
}
