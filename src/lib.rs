//! bamgeno: streaming genotype extraction from aligned reads
//!
//! # Overview
//!
//! bamgeno reads BGZF-compressed BAM (or plain SAM) alignments one record at
//! a time, walks each accepted read over the reference, and writes a compact
//! per-chromosome genotype stream: runs of consecutive biallelic loci with
//! their genotype codes packed two bits each.
//!
//! ## Key Features
//!
//! - **Streaming**: one record and one chromosome of loci in memory at a time
//! - **Two input formats**: BAM and SAM decode to the same record shape
//! - **Two reference strategies**: whole genome in memory, or one chromosome
//!   at a time from a binary cache
//!
//! ## Quick Start
//!
//! ```no_run
//! use bamgeno::io::BamReader;
//! use bamgeno::pipeline::{self, PipelineOptions};
//! use bamgeno::reference::ReferenceStore;
//!
//! # fn main() -> bamgeno::Result<()> {
//! let mut reference = ReferenceStore::open("genome.fa", false)?;
//! let mut reader = BamReader::from_path("sample.bam")?;
//! let mut output = std::fs::File::create("sample.bam.gtp")?;
//!
//! let summary = pipeline::run(
//!     reader.records(),
//!     &mut reference,
//!     &mut output,
//!     &PipelineOptions::default(),
//! )?;
//! println!("{} chromosomes", summary.chromosomes_written);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`io`]: BGZF block stream, BAM/SAM readers, FASTA and reference cache
//! - [`reference`]: nucleotide lookup (eager and lazy)
//! - [`filter`]: alignment filter and regions of interest
//! - [`genotype`]: locus accumulator and genotype stream codec
//! - [`pipeline`]: alignment stream to genotype stream

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod filter;
pub mod genotype;
pub mod io;
pub mod pipeline;
pub mod reference;
pub mod types;

// Re-export commonly used types
pub use error::{BamgenoError, BgzfError, Result};
pub use genotype::{GenotypeList, GenotypeReader};
pub use io::bam::{AlignmentRecord, CigarOp};
pub use io::{BamReader, BlockStream, FastaStream, SamReader};
pub use pipeline::{PipelineOptions, PipelineSummary};
pub use reference::{NucleotideLookup, ReferenceStore};
pub use types::{FastaRecord, Nucleotide, PackedSequence};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
