//! Per-locus nucleotide presence flags and genotype classification.

use crate::types::Nucleotide;
use std::fmt;

/// Adenine observed
pub const FLAG_A: u32 = 0x01;
/// Cytosine observed
pub const FLAG_C: u32 = 0x02;
/// Guanine observed
pub const FLAG_G: u32 = 0x04;
/// Thymine observed
pub const FLAG_T: u32 = 0x08;
/// Unknown base observed
pub const FLAG_N: u32 = 0x10;
/// An observed base agrees with the reference
pub const FLAG_MATCHED: u32 = 0x1000_0000;

const ALLELE_FLAGS: [u32; 4] = [FLAG_A, FLAG_C, FLAG_G, FLAG_T];

/// Genotype: homozygous reference.
pub const HOMOZYGOUS_REFERENCE: u8 = 0;
/// Genotype: heterozygous.
pub const HETEROZYGOUS: u8 = 1;
/// Genotype: homozygous alternate.
pub const HOMOZYGOUS_ALTERNATE: u8 = 2;

/// Presence flag for a nucleotide.
#[inline]
pub fn nucleotide_flag(nucleotide: Nucleotide) -> u32 {
    match nucleotide {
        Nucleotide::N => FLAG_N,
        other => u32::from(other.bits()),
    }
}

/// One tracked reference coordinate.
///
/// Flags form a set: adding the same nucleotide twice changes nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenotypeLocus {
    /// 1-based reference position (or, for inserted bases, the position
    /// immediately before the insertion)
    pub position: u32,
    /// Presence bitmask
    pub flags: u32,
}

impl GenotypeLocus {
    /// Locus with one observed nucleotide.
    pub fn new(position: u32, nucleotide: Nucleotide) -> Self {
        Self {
            position,
            flags: nucleotide_flag(nucleotide),
        }
    }

    /// Locus with nothing observed yet.
    pub fn empty(position: u32) -> Self {
        Self { position, flags: 0 }
    }

    /// OR a nucleotide into the presence set.
    #[inline]
    pub fn add_nucleotide(&mut self, nucleotide: Nucleotide) {
        self.flags |= nucleotide_flag(nucleotide);
    }

    /// True when the nucleotide has been observed.
    #[inline]
    pub fn has_nucleotide(&self, nucleotide: Nucleotide) -> bool {
        let flag = nucleotide_flag(nucleotide);
        self.flags & flag == flag
    }

    /// Mark the locus as agreeing with the reference.
    #[inline]
    pub fn mark_matched(&mut self) {
        self.flags |= FLAG_MATCHED;
    }

    /// True when an observed base agrees with the reference.
    #[inline]
    pub fn is_matched(&self) -> bool {
        self.flags & FLAG_MATCHED != 0
    }

    /// Number of distinct A/C/G/T calls.
    #[inline]
    pub fn allele_count(&self) -> u32 {
        ALLELE_FLAGS
            .iter()
            .filter(|&&flag| self.flags & flag != 0)
            .count() as u32
    }

    /// One or two of A/C/G/T observed, and not a pure N call.
    pub fn is_biallelic(&self) -> bool {
        let count = self.allele_count();
        count != 0 && self.flags != FLAG_N && count <= 2
    }

    /// 0 homozygous reference, 1 heterozygous, 2 homozygous alternate.
    pub fn genotype_code(&self) -> u8 {
        match self.allele_count() {
            2 => HETEROZYGOUS,
            1 if self.is_matched() => HOMOZYGOUS_REFERENCE,
            _ => HOMOZYGOUS_ALTERNATE,
        }
    }

    /// Observed letters in `ACGTN` order.
    pub fn letters(&self) -> String {
        [
            (FLAG_A, 'A'),
            (FLAG_C, 'C'),
            (FLAG_G, 'G'),
            (FLAG_T, 'T'),
            (FLAG_N, 'N'),
        ]
        .iter()
        .filter(|(flag, _)| self.flags & flag != 0)
        .map(|&(_, letter)| letter)
        .collect()
    }
}

impl fmt::Display for GenotypeLocus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.position, self.letters())
    }
}
