//! Reference sequence store.
//!
//! Nucleotide lookup by chromosome name and 1-based position, backed by one
//! of two strategies chosen when the store is built:
//!
//! - [`EagerReference`]: the whole genome in memory, loaded from FASTA text
//!   (plain or gzip) or from the binary cache
//! - [`LazyReference`]: one chromosome at a time, pulled from the binary
//!   cache on the first lookup that names it
//!
//! Misses are never fatal. A position past the end of a chromosome, or a
//! chromosome the reference does not have, logs a warning and yields
//! [`Nucleotide::N`].

use crate::error::{BamgenoError, Result};
use crate::io::fasta::{self, FastaStream};
use crate::types::{Nucleotide, PackedSequence};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Chromosome the FASTA loader leaves out.
pub const MITOCHONDRIAL: &str = "MT";

/// Nucleotide lookup by chromosome and 1-based position.
pub trait NucleotideLookup {
    /// Reference nucleotide at `position` on `chromosome`.
    ///
    /// Returns [`Nucleotide::N`] when either is unknown.
    fn lookup(&mut self, chromosome: &str, position: u32) -> Nucleotide;
}

fn lookup_in(sequence: &PackedSequence, chromosome: &str, position: u32) -> Nucleotide {
    match sequence.get(position) {
        Some(nucleotide) => nucleotide,
        None => {
            warn!(
                chromosome,
                position,
                length = sequence.len(),
                "position outside reference sequence"
            );
            Nucleotide::N
        }
    }
}

/// Whole genome held in memory.
#[derive(Debug, Default)]
pub struct EagerReference {
    chromosomes: BTreeMap<String, PackedSequence>,
    /// Chromosomes already reported missing
    missing: HashSet<String>,
}

impl EagerReference {
    /// Empty reference.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a FASTA file or a binary cache, detected by signature.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if fasta::is_reference_cache(path)? {
            Self::from_cache(path)
        } else {
            Self::from_fasta(path)
        }
    }

    /// Load every chromosome of a FASTA file except `MT`.
    pub fn from_fasta<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!(path = %path.as_ref().display(), "reading FASTA reference");
        Self::from_fasta_reader(fasta::open_maybe_gzip(path)?)
    }

    /// Load every chromosome from FASTA text except `MT`.
    pub fn from_fasta_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut reference = Self::new();
        for record in FastaStream::from_reader(reader) {
            let record = record?;
            if record.id == MITOCHONDRIAL {
                info!("skipping MT chromosome");
                continue;
            }
            debug!(chromosome = %record.id, length = record.sequence.len(), "loaded chromosome");
            reference.insert(record.id, &record.sequence);
        }
        Ok(reference)
    }

    /// Load a binary cache.
    pub fn from_cache<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!(path = %path.as_ref().display(), "reading binary reference cache");
        Ok(Self {
            chromosomes: fasta::read_cache_file(path)?,
            missing: HashSet::new(),
        })
    }

    /// Add or replace a chromosome from ASCII bases.
    pub fn insert(&mut self, name: impl Into<String>, bases: &[u8]) {
        self.chromosomes
            .insert(name.into(), PackedSequence::from_bases(bases));
    }

    /// Packed sequence of one chromosome.
    pub fn chromosome(&self, name: &str) -> Option<&PackedSequence> {
        self.chromosomes.get(name)
    }

    /// Number of chromosomes.
    pub fn len(&self) -> usize {
        self.chromosomes.len()
    }

    /// True when no chromosome is loaded.
    pub fn is_empty(&self) -> bool {
        self.chromosomes.is_empty()
    }

    /// Packed bytes held across all chromosomes.
    pub fn total_bytes(&self) -> usize {
        self.chromosomes.values().map(|s| s.as_bytes().len()).sum()
    }

    /// Write the genome as a binary cache.
    pub fn write_cache<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        info!(
            path = %path.as_ref().display(),
            chromosomes = self.len(),
            "writing binary reference cache"
        );
        let writer = BufWriter::new(File::create(path)?);
        fasta::write_cache(writer, &self.chromosomes)
    }
}

impl NucleotideLookup for EagerReference {
    fn lookup(&mut self, chromosome: &str, position: u32) -> Nucleotide {
        match self.chromosomes.get(chromosome) {
            Some(sequence) => lookup_in(sequence, chromosome, position),
            None => {
                if self.missing.insert(chromosome.to_string()) {
                    warn!(chromosome, "chromosome not found in reference");
                }
                Nucleotide::N
            }
        }
    }
}

/// One chromosome at a time from a binary cache.
///
/// Lookups for a new chromosome rescan the cache file and replace the held
/// sequence, so callers should group lookups by chromosome.
///
/// The cache stores whole bytes, so an odd-length chromosome reports one
/// extra position whose padding nibble reads as `N` without a warning.
#[derive(Debug)]
pub struct LazyReference {
    path: PathBuf,
    /// Chromosome last requested, with its sequence if the cache had it
    current: Option<(String, Option<PackedSequence>)>,
    loads: usize,
}

impl LazyReference {
    /// Open a binary cache for lazy loading.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be opened or is not a reference cache.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !fasta::is_reference_cache(&path)? {
            return Err(BamgenoError::InvalidReferenceCache(format!(
                "{} is not a binary reference cache",
                path.display()
            )));
        }
        Ok(Self {
            path,
            current: None,
            loads: 0,
        })
    }

    /// Number of times a chromosome was loaded from disk.
    pub fn loads(&self) -> usize {
        self.loads
    }

    fn load(&mut self, chromosome: &str) -> Option<PackedSequence> {
        info!(chromosome, "loading chromosome from reference cache");
        self.loads += 1;
        let found = File::open(&self.path)
            .map_err(BamgenoError::from)
            .and_then(|file| fasta::find_chromosome(BufReader::new(file), chromosome));
        match found {
            Ok(Some(sequence)) => {
                debug!(chromosome, bytes = sequence.as_bytes().len(), "chromosome loaded");
                Some(sequence)
            }
            Ok(None) => {
                warn!(chromosome, "chromosome not found in reference cache");
                None
            }
            Err(error) => {
                warn!(chromosome, %error, "failed to read reference cache");
                None
            }
        }
    }
}

impl NucleotideLookup for LazyReference {
    fn lookup(&mut self, chromosome: &str, position: u32) -> Nucleotide {
        let cached = matches!(&self.current, Some((name, _)) if name == chromosome);
        if !cached {
            // Drop the previous chromosome before loading the next one
            self.current = None;
            let sequence = self.load(chromosome);
            self.current = Some((chromosome.to_string(), sequence));
        }

        match &self.current {
            Some((_, Some(sequence))) => lookup_in(sequence, chromosome, position),
            _ => Nucleotide::N,
        }
    }
}

/// Reference store with its loading strategy fixed at construction.
#[derive(Debug)]
pub enum ReferenceStore {
    /// Whole genome in memory
    Eager(EagerReference),
    /// One chromosome at a time
    Lazy(LazyReference),
}

impl ReferenceStore {
    /// Open a reference, lazily (binary cache only) or eagerly.
    pub fn open<P: AsRef<Path>>(path: P, lazy: bool) -> Result<Self> {
        if lazy {
            Ok(Self::Lazy(LazyReference::open(path)?))
        } else {
            let reference = EagerReference::load(path)?;
            info!(
                chromosomes = reference.len(),
                bytes = reference.total_bytes(),
                "reference loaded"
            );
            Ok(Self::Eager(reference))
        }
    }
}

impl NucleotideLookup for ReferenceStore {
    fn lookup(&mut self, chromosome: &str, position: u32) -> Nucleotide {
        match self {
            ReferenceStore::Eager(reference) => reference.lookup(chromosome, position),
            ReferenceStore::Lazy(reference) => reference.lookup(chromosome, position),
        }
    }
}
