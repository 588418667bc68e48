//! Position-sorted genotype accumulator for one chromosome.

use super::codec;
use super::locus::GenotypeLocus;
use crate::error::Result;
use crate::io::bam::CigarOp;
use crate::reference::NucleotideLookup;
use crate::types::Nucleotide;
use std::io::Write;
use std::mem;

/// Aligned loci reserved up front by [`GenotypeList::new`].
pub const DEFAULT_LOCUS_CAPACITY: usize = 1 << 22;

/// Aligned and inserted loci observed on the active chromosome.
///
/// Both lists stay sorted by position. Aligned positions are unique; inserted
/// bases share the position preceding the insertion and are ordered by their
/// offset within it.
#[derive(Debug, Clone, Default)]
pub struct GenotypeList {
    aligned: Vec<GenotypeLocus>,
    inserted: Vec<GenotypeLocus>,
}

/// `M` and `=` validate against the reference; `X` never does.
#[inline]
fn is_match_kind(op: CigarOp) -> bool {
    matches!(op, CigarOp::Match(_) | CigarOp::SeqMatch(_))
}

impl GenotypeList {
    /// Accumulator with [`DEFAULT_LOCUS_CAPACITY`] aligned loci reserved.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LOCUS_CAPACITY)
    }

    /// Accumulator with `capacity` aligned loci reserved.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            aligned: Vec::with_capacity(capacity),
            inserted: Vec::new(),
        }
    }

    /// Record a base aligned at a reference position.
    ///
    /// For match-kind operations the locus is marked as matching the
    /// reference once the reference nucleotide is among its observed calls.
    /// The mark is never cleared.
    pub fn add<L: NucleotideLookup + ?Sized>(
        &mut self,
        position: u32,
        nucleotide: Nucleotide,
        op: CigarOp,
        chromosome: &str,
        reference: &mut L,
    ) {
        let idx = match self.aligned.binary_search_by_key(&position, |l| l.position) {
            Ok(idx) => {
                self.aligned[idx].add_nucleotide(nucleotide);
                idx
            }
            Err(idx) => {
                self.aligned
                    .insert(idx, GenotypeLocus::new(position, nucleotide));
                idx
            }
        };

        let locus = &mut self.aligned[idx];
        if is_match_kind(op) && !locus.is_matched() {
            let expected = reference.lookup(chromosome, position);
            if locus.has_nucleotide(expected) {
                locus.mark_matched();
            }
        }
    }

    /// Record the `offset`-th base of an insertion that follows `position - 1`.
    ///
    /// Entries for every offset up to `offset` are created on demand.
    pub fn add_insert(&mut self, position: u32, offset: u32, nucleotide: Nucleotide) {
        let key = position.saturating_sub(1);
        let mut idx = self.inserted.partition_point(|l| l.position < key);

        for _ in 0..offset {
            self.ensure_insert(idx, key);
            idx += 1;
        }
        self.ensure_insert(idx, key);
        self.inserted[idx].add_nucleotide(nucleotide);
    }

    fn ensure_insert(&mut self, idx: usize, key: u32) {
        if self.inserted.get(idx).map(|l| l.position) != Some(key) {
            self.inserted.insert(idx, GenotypeLocus::empty(key));
        }
    }

    /// Discard both lists, keeping the reserved capacity.
    pub fn reset(&mut self) {
        self.aligned.clear();
        self.inserted.clear();
    }

    /// Aligned loci, strictly increasing by position.
    pub fn aligned(&self) -> &[GenotypeLocus] {
        &self.aligned
    }

    /// Inserted-base loci, non-decreasing by position.
    pub fn inserted(&self) -> &[GenotypeLocus] {
        &self.inserted
    }

    /// Loci across both lists.
    pub fn num_loci(&self) -> usize {
        self.aligned.len() + self.inserted.len()
    }

    /// Bytes held by the tracked loci.
    pub fn memory_size(&self) -> usize {
        self.num_loci() * mem::size_of::<GenotypeLocus>()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.aligned.is_empty() && self.inserted.is_empty()
    }

    /// Write the compressed genotype block (counts, runs, sentinel).
    pub fn dump<W: Write>(&self, writer: &mut W) -> Result<()> {
        codec::write_genotypes(writer, self)
    }

    /// Write every locus of both lists as text, merged by position.
    pub fn dump_text<W: Write>(&self, writer: &mut W) -> Result<()> {
        codec::write_loci_text(writer, self)
    }
}
