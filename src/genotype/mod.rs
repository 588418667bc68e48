//! Genotype accumulation and the genotype stream format
//!
//! [`GenotypeList`] collects per-locus nucleotide calls for one chromosome.
//! [`codec`] serializes it as run-length encoded, bit-packed genotype codes
//! (or as text for inspection) and reads the compressed form back.
//!
//! # Example
//!
//! ```
//! use bamgeno::genotype::{GenotypeList, GenotypeReader, write_chromosome};
//! use bamgeno::io::bam::CigarOp;
//! use bamgeno::reference::EagerReference;
//! use bamgeno::types::Nucleotide;
//! use std::io::Cursor;
//!
//! let mut reference = EagerReference::new();
//! reference.insert("1", b"ACGT");
//!
//! let mut list = GenotypeList::with_capacity(16);
//! list.add(2, Nucleotide::C, CigarOp::Match(1), "1", &mut reference);
//! list.add(2, Nucleotide::T, CigarOp::Match(1), "1", &mut reference);
//!
//! let mut out = Vec::new();
//! write_chromosome(&mut out, "1", &list).unwrap();
//!
//! let block = GenotypeReader::new(Cursor::new(out)).read_chromosome().unwrap().unwrap();
//! assert_eq!(block.genotype_at(2), Some(1));
//! ```

pub mod accumulator;
pub mod codec;
pub mod locus;

pub use accumulator::{GenotypeList, DEFAULT_LOCUS_CAPACITY};
pub use codec::{
    write_chromosome, write_text_chromosome, ChromosomeBlock, GenotypeReader, GenotypeRun,
};
pub use locus::GenotypeLocus;
