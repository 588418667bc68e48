//! Native BAM (Binary Alignment Map) decoding for bamgeno.
//!
//! Records are decoded from the decompressed address space exposed by
//! [`BlockStream`](crate::io::BlockStream):
//! - the header (magic, SAM text, reference dictionary) is read from offset 0
//! - each record's fixed 36-byte header determines where its name, CIGAR,
//!   packed sequence and quality fields start and end
//! - optional tag fields are skipped
//!
//! The decoded [`AlignmentRecord`] is the same shape the SAM text reader
//! produces, with 1-based positions.
//!
//! # Example
//!
//! ```no_run
//! use bamgeno::io::bam::BamReader;
//!
//! # fn main() -> bamgeno::Result<()> {
//! let mut bam = BamReader::from_path("alignments.bam")?;
//!
//! for record in bam.records() {
//!     let record = record?;
//!     println!(
//!         "{} starts at {} and spans {} bases",
//!         record.name,
//!         record.clipped_start(),
//!         record.reference_span()
//!     );
//! }
//! # Ok(())
//! # }
//! ```

pub mod cigar;
pub mod error;
pub mod header;
pub mod reader;
pub mod record;
pub mod sequence;

#[cfg(test)]
pub(crate) mod test_support;

pub use cigar::{parse_cigar, parse_cigar_str, CigarOp};
pub use error::BamDecodeError;
pub use header::{read_header, Header, Reference};
pub use reader::{BamReader, Records};
pub use record::{decode_record, flags, AlignmentRecord, RecordHeader};
pub use sequence::decode_sequence;
