//! Common types used throughout bamgeno

/// A FASTA record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    /// Sequence identifier (without '>' prefix)
    pub id: String,
    /// Nucleotide sequence
    pub sequence: Vec<u8>,
}

impl FastaRecord {
    /// Create a new FASTA record
    pub fn new(id: String, sequence: Vec<u8>) -> Self {
        Self { id, sequence }
    }
}

/// One reference nucleotide.
///
/// Discriminants are the one-hot nibbles used by the packed reference
/// layout, so `N` is the empty nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Nucleotide {
    /// Unknown or ambiguous
    N = 0,
    /// Adenine
    A = 1,
    /// Cytosine
    C = 2,
    /// Guanine
    G = 4,
    /// Thymine
    T = 8,
}

impl Nucleotide {
    /// Map an ASCII base (either case) to a nucleotide; anything else is `N`.
    pub fn from_base(base: u8) -> Self {
        match base {
            b'A' | b'a' => Nucleotide::A,
            b'C' | b'c' => Nucleotide::C,
            b'G' | b'g' => Nucleotide::G,
            b'T' | b't' => Nucleotide::T,
            _ => Nucleotide::N,
        }
    }

    /// Decode a packed nibble; anything but a single one-hot bit is `N`.
    pub fn from_nibble(nibble: u8) -> Self {
        match nibble & 0x0F {
            1 => Nucleotide::A,
            2 => Nucleotide::C,
            4 => Nucleotide::G,
            8 => Nucleotide::T,
            _ => Nucleotide::N,
        }
    }

    /// The one-hot nibble.
    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Upper-case letter.
    pub fn as_char(self) -> char {
        match self {
            Nucleotide::A => 'A',
            Nucleotide::C => 'C',
            Nucleotide::G => 'G',
            Nucleotide::T => 'T',
            Nucleotide::N => 'N',
        }
    }
}

impl std::fmt::Display for Nucleotide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Reference sequence packed two nucleotides per byte, low nibble first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackedSequence {
    bytes: Vec<u8>,
    len: usize,
}

impl PackedSequence {
    /// Pack ASCII bases.
    ///
    /// # Example
    ///
    /// ```
    /// use bamgeno::types::{Nucleotide, PackedSequence};
    ///
    /// let seq = PackedSequence::from_bases(b"ACGTN");
    /// assert_eq!(seq.len(), 5);
    /// assert_eq!(seq.as_bytes(), &[0x21, 0x84, 0x00]);
    /// assert_eq!(seq.get(4), Some(Nucleotide::T));
    /// ```
    pub fn from_bases(bases: &[u8]) -> Self {
        let mut bytes = vec![0u8; bases.len().div_ceil(2)];
        for (i, &base) in bases.iter().enumerate() {
            let bits = Nucleotide::from_base(base).bits();
            bytes[i / 2] |= if i % 2 == 0 { bits } else { bits << 4 };
        }
        Self {
            bytes,
            len: bases.len(),
        }
    }

    /// Wrap already-packed bytes holding `bytes.len() * 2` nucleotides.
    pub fn from_packed(bytes: Vec<u8>) -> Self {
        let len = bytes.len() * 2;
        Self { bytes, len }
    }

    /// Nucleotide at 1-based `position`, or None outside `1..=len`.
    pub fn get(&self, position: u32) -> Option<Nucleotide> {
        let index = (position as usize).checked_sub(1)?;
        if index >= self.len {
            return None;
        }
        let byte = self.bytes[index / 2];
        let nibble = if index % 2 == 0 { byte } else { byte >> 4 };
        Some(Nucleotide::from_nibble(nibble))
    }

    /// Number of nucleotides.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no nucleotides are stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Packed bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}
