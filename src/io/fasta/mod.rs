//! Reference genome input: streaming FASTA parser and binary cache
//!
//! # Basic Usage
//!
//! ```no_run
//! use bamgeno::io::fasta::FastaStream;
//!
//! let stream = FastaStream::from_path("genome.fa.gz")?;
//! for record in stream {
//!     let record = record?;
//!     println!("{}: {} bp", record.id, record.sequence.len());
//! }
//! # Ok::<(), bamgeno::BamgenoError>(())
//! ```

pub mod cache;
mod parser;

pub use cache::{
    find_chromosome, is_reference_cache, read_cache, read_cache_file, write_cache,
    CACHE_SIGNATURE,
};
pub use parser::{open_maybe_gzip, FastaStream};
