//! SAM text alignment reader.
//!
//! Produces the same [`AlignmentRecord`] shape as the BAM decoder, so the
//! pipeline can consume either input.
//!
//! # Format
//!
//! Header lines start with `@` and are skipped. Each alignment line has at
//! least eleven tab-separated fields:
//!
//! ```text
//! QNAME FLAG RNAME POS MAPQ CIGAR RNEXT PNEXT TLEN SEQ QUAL [TAGS...]
//! ```
//!
//! POS and PNEXT are 1-based; `*` marks an unavailable string field and
//! `=` in RNEXT repeats RNAME. Optional tags are ignored.

use crate::error::{BamgenoError, Result};
use crate::io::bam::{parse_cigar_str, AlignmentRecord};
use crate::io::fasta::open_maybe_gzip;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

const MANDATORY_FIELDS: usize = 11;

/// Streaming SAM reader.
///
/// # Example
///
/// ```no_run
/// use bamgeno::io::SamReader;
///
/// # fn main() -> bamgeno::Result<()> {
/// let reader = SamReader::from_path("alignments.sam")?;
/// for record in reader {
///     let record = record?;
///     println!("{} {:?}", record.name, record.reference_name);
/// }
/// # Ok(())
/// # }
/// ```
pub struct SamReader<R: BufRead> {
    reader: R,
    line: String,
    line_number: usize,
    /// Interned reference names
    names: HashMap<String, Arc<str>>,
    failed: bool,
}

impl SamReader<Box<dyn BufRead>> {
    /// Open a SAM file (optionally gzip-compressed).
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(open_maybe_gzip(path)?))
    }
}

impl<R: BufRead> SamReader<R> {
    /// Wrap any buffered reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::with_capacity(512),
            line_number: 0,
            names: HashMap::new(),
            failed: false,
        }
    }

    /// Read the next alignment line.
    pub fn read_record(&mut self) -> Result<Option<AlignmentRecord>> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let trimmed = self.line.trim_end_matches(&['\n', '\r'][..]);
            if trimmed.is_empty() || trimmed.starts_with('@') {
                continue;
            }

            let line = trimmed.to_string();
            return self.parse_line(&line).map(Some);
        }
    }

    fn error(&self, msg: impl Into<String>) -> BamgenoError {
        BamgenoError::InvalidSamFormat {
            line: self.line_number,
            msg: msg.into(),
        }
    }

    fn number<T: FromStr>(&self, field: &str, what: &str) -> Result<T> {
        field
            .parse()
            .map_err(|_| self.error(format!("invalid {}: {:?}", what, field)))
    }

    fn intern(&mut self, name: &str) -> Option<Arc<str>> {
        if name == "*" {
            return None;
        }
        if let Some(existing) = self.names.get(name) {
            return Some(Arc::clone(existing));
        }
        let interned: Arc<str> = Arc::from(name);
        self.names.insert(name.to_string(), Arc::clone(&interned));
        Some(interned)
    }

    fn parse_line(&mut self, line: &str) -> Result<AlignmentRecord> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < MANDATORY_FIELDS {
            return Err(self.error(format!(
                "expected at least {} fields, got {}",
                MANDATORY_FIELDS,
                fields.len()
            )));
        }

        let flags: u16 = self.number(fields[1], "FLAG")?;
        let position: i64 = self.number(fields[3], "POS")?;
        let mapq: u8 = self.number(fields[4], "MAPQ")?;
        let cigar = parse_cigar_str(fields[5]).map_err(|e| self.error(e.to_string()))?;
        let mate_position: i64 = self.number(fields[7], "PNEXT")?;
        let template_length: i32 = self.number(fields[8], "TLEN")?;

        let reference_name = self.intern(fields[2]);
        let mate_reference_name = match fields[6] {
            "=" => reference_name.clone(),
            other => self.intern(other),
        };

        let sequence = match fields[9] {
            "*" => Vec::new(),
            seq => seq.as_bytes().to_vec(),
        };
        let quality = match fields[10] {
            "*" => Vec::new(),
            qual => qual.as_bytes().to_vec(),
        };

        Ok(AlignmentRecord {
            name: fields[0].to_string(),
            reference_name,
            position,
            mapq,
            flags,
            cigar,
            sequence,
            quality,
            mate_reference_name,
            mate_position,
            template_length,
        })
    }
}

impl<R: BufRead> Iterator for SamReader<R> {
    type Item = Result<AlignmentRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let result = self.read_record().transpose();
        self.failed = matches!(result, Some(Err(_)));
        result
    }
}
