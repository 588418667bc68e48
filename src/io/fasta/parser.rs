//! FASTA streaming parser with constant memory
//!
//! # Format
//!
//! FASTA format consists of:
//! - Header line starting with '>' followed by sequence identifier
//! - One or more sequence lines (can be wrapped)
//!
//! Example:
//! ```text
//! >1 dna:chromosome
//! GATTACAGATTACA
//! TGCATGCA
//! >2
//! ACGTACGT
//! ```
//!
//! Gzip-compressed files (plain gzip or BGZF) are detected from their first
//! two bytes and decompressed transparently.

use crate::error::{BamgenoError, Result};
use crate::types::FastaRecord;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Open `path` for line reading, inflating it when it starts with the gzip magic.
pub fn open_maybe_gzip<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let mut reader = BufReader::new(File::open(path)?);
    let is_gzip = reader.fill_buf()?.starts_with(&[0x1f, 0x8b]);
    if is_gzip {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

/// FASTA streaming parser
///
/// Records can span multiple lines; line buffers are reused across records.
///
/// # Example
///
/// ```no_run
/// use bamgeno::io::fasta::FastaStream;
///
/// let stream = FastaStream::from_path("genome.fa.gz")?;
/// for record in stream {
///     let record = record?;
///     println!("{}: {} bp", record.id, record.sequence.len());
/// }
/// # Ok::<(), bamgeno::BamgenoError>(())
/// ```
pub struct FastaStream<R: BufRead> {
    reader: R,
    line_buffer: String,
    line_number: usize,
    finished: bool,
    /// Peek buffer for look-ahead (to detect next record start)
    next_line: Option<String>,
}

impl FastaStream<Box<dyn BufRead>> {
    /// Create a FASTA stream from a local file path, compressed or not
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_reader(open_maybe_gzip(path)?))
    }
}

impl<R: BufRead> FastaStream<R> {
    /// Create a FASTA stream from any buffered reader
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader,
            line_buffer: String::with_capacity(256),
            line_number: 0,
            finished: false,
            next_line: None,
        }
    }

    /// Read a single FASTA record
    fn read_record(&mut self) -> Result<Option<FastaRecord>> {
        // Header line, skipping blank lines
        let header = loop {
            if let Some(peeked) = self.next_line.take() {
                break peeked;
            }
            if self.finished {
                return Ok(None);
            }

            self.line_buffer.clear();
            if self.reader.read_line(&mut self.line_buffer)? == 0 {
                self.finished = true;
                return Ok(None);
            }
            self.line_number += 1;

            let line = self.line_buffer.trim_end();
            if !line.is_empty() {
                break line.to_string();
            }
        };

        if !header.starts_with('>') {
            return Err(BamgenoError::InvalidFastaFormat {
                line: self.line_number,
                msg: format!("Expected '>' at start of header, got: {}", header),
            });
        }

        // ID is everything after '>' up to the first whitespace
        let id = header[1..]
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_string();

        let mut sequence = Vec::new();

        loop {
            self.line_buffer.clear();
            if self.reader.read_line(&mut self.line_buffer)? == 0 {
                self.finished = true;
                break;
            }
            self.line_number += 1;

            let line = self.line_buffer.trim();
            if line.is_empty() {
                continue;
            }

            if line.starts_with('>') {
                self.next_line = Some(line.to_string());
                break;
            }

            sequence.extend_from_slice(line.as_bytes());
        }

        if sequence.is_empty() {
            return Err(BamgenoError::InvalidFastaFormat {
                line: self.line_number,
                msg: format!("Record '{}' has no sequence", id),
            });
        }

        Ok(Some(FastaRecord::new(id, sequence)))
    }
}

impl<R: BufRead> Iterator for FastaStream<R> {
    type Item = Result<FastaRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}
