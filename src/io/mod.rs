//! I/O module: BGZF block stream, alignment readers and reference input
//!
//! Every reader here streams: alignment records are decoded one at a time
//! and nothing is accumulated beyond the current record.

pub mod bam;
pub mod compression;
pub mod fasta;
pub mod sam;

pub use bam::BamReader;
pub use compression::BlockStream;
pub use fasta::FastaStream;
pub use sam::SamReader;
