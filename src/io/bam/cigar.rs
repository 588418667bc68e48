//! CIGAR (Compact Idiosyncratic Gapped Alignment Report) parsing.
//!
//! CIGAR strings describe how a read aligns to the reference, including
//! matches, insertions, deletions, and other operations.
//!
//! # BAM Format
//!
//! In BAM, CIGAR is stored as 32-bit integers:
//! - Low 4 bits: operation type (0-8)
//! - High 28 bits: operation length (0 to 268,435,455)
//!
//! # SAM Format
//!
//! In SAM, CIGAR is a string of `<length><op>` pairs such as `3S2M1I2M`,
//! or `*` when unavailable.
//!
//! # Operations
//!
//! | Code | Char | Read | Reference |
//! |------|------|------|-----------|
//! | 0 | M | yes | yes |
//! | 1 | I | yes | no |
//! | 2 | D | no | yes |
//! | 3 | N | no | yes |
//! | 4 | S | yes | no |
//! | 5 | H | no | no |
//! | 6 | P | no | no |
//! | 7 | = | yes | yes |
//! | 8 | X | yes | yes |

use super::error::BamDecodeError;

/// CIGAR operation types.
///
/// Each operation describes a type of alignment event and its length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CigarOp {
    /// Match or mismatch (M)
    Match(u32),
    /// Insertion to reference (I)
    Insertion(u32),
    /// Deletion from reference (D)
    Deletion(u32),
    /// Skipped region from reference (N)
    RefSkip(u32),
    /// Soft clipping (S)
    SoftClip(u32),
    /// Hard clipping (H)
    HardClip(u32),
    /// Padding (P)
    Padding(u32),
    /// Sequence match (=)
    SeqMatch(u32),
    /// Sequence mismatch (X)
    SeqMismatch(u32),
}

impl CigarOp {
    /// Build an operation from its BAM code (0-8) and length.
    pub fn from_code(code: u32, length: u32) -> Option<Self> {
        let op = match code {
            0 => CigarOp::Match(length),
            1 => CigarOp::Insertion(length),
            2 => CigarOp::Deletion(length),
            3 => CigarOp::RefSkip(length),
            4 => CigarOp::SoftClip(length),
            5 => CigarOp::HardClip(length),
            6 => CigarOp::Padding(length),
            7 => CigarOp::SeqMatch(length),
            8 => CigarOp::SeqMismatch(length),
            _ => return None,
        };
        Some(op)
    }

    /// Build an operation from its SAM character and length.
    pub fn from_char(op: char, length: u32) -> Option<Self> {
        let code = match op {
            'M' => 0,
            'I' => 1,
            'D' => 2,
            'N' => 3,
            'S' => 4,
            'H' => 5,
            'P' => 6,
            '=' => 7,
            'X' => 8,
            _ => return None,
        };
        Self::from_code(code, length)
    }

    /// BAM operation code.
    pub fn code(&self) -> u32 {
        match self {
            CigarOp::Match(_) => 0,
            CigarOp::Insertion(_) => 1,
            CigarOp::Deletion(_) => 2,
            CigarOp::RefSkip(_) => 3,
            CigarOp::SoftClip(_) => 4,
            CigarOp::HardClip(_) => 5,
            CigarOp::Padding(_) => 6,
            CigarOp::SeqMatch(_) => 7,
            CigarOp::SeqMismatch(_) => 8,
        }
    }

    /// Get the operation count/length.
    pub fn length(&self) -> u32 {
        match self {
            CigarOp::Match(len)
            | CigarOp::Insertion(len)
            | CigarOp::Deletion(len)
            | CigarOp::RefSkip(len)
            | CigarOp::SoftClip(len)
            | CigarOp::HardClip(len)
            | CigarOp::Padding(len)
            | CigarOp::SeqMatch(len)
            | CigarOp::SeqMismatch(len) => *len,
        }
    }

    /// Check if this operation has zero length.
    pub fn is_empty(&self) -> bool {
        self.length() == 0
    }

    /// Get the operation type as a character (for SAM format).
    pub fn as_char(&self) -> char {
        match self {
            CigarOp::Match(_) => 'M',
            CigarOp::Insertion(_) => 'I',
            CigarOp::Deletion(_) => 'D',
            CigarOp::RefSkip(_) => 'N',
            CigarOp::SoftClip(_) => 'S',
            CigarOp::HardClip(_) => 'H',
            CigarOp::Padding(_) => 'P',
            CigarOp::SeqMatch(_) => '=',
            CigarOp::SeqMismatch(_) => 'X',
        }
    }

    /// True for soft and hard clips.
    pub fn is_clip(&self) -> bool {
        matches!(self, CigarOp::SoftClip(_) | CigarOp::HardClip(_))
    }

    /// True when the operation advances the reference coordinate.
    pub fn consumes_reference(&self) -> bool {
        matches!(
            self,
            CigarOp::Match(_)
                | CigarOp::Deletion(_)
                | CigarOp::RefSkip(_)
                | CigarOp::SeqMatch(_)
                | CigarOp::SeqMismatch(_)
        )
    }

    /// True when the operation consumes bases of the stored read sequence.
    pub fn consumes_read(&self) -> bool {
        matches!(
            self,
            CigarOp::Match(_)
                | CigarOp::Insertion(_)
                | CigarOp::SoftClip(_)
                | CigarOp::SeqMatch(_)
                | CigarOp::SeqMismatch(_)
        )
    }
}

impl std::fmt::Display for CigarOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.length(), self.as_char())
    }
}

/// Parse BAM CIGAR operations from binary format.
///
/// Each CIGAR operation is encoded as a 32-bit little-endian integer:
/// - Bits 0-3: operation type (0-8)
/// - Bits 4-31: operation length
///
/// # Errors
///
/// Returns error if:
/// - Data is too short for specified number of operations
/// - Invalid operation code encountered (not 0-8)
///
/// # Example
///
/// ```
/// use bamgeno::io::bam::{parse_cigar, CigarOp};
///
/// // 100M = 100 << 4 | 0 = 1600 = 0x00000640 (little-endian)
/// let data = vec![0x40, 0x06, 0x00, 0x00];
/// let cigar = parse_cigar(&data, 1).unwrap();
/// assert_eq!(cigar, vec![CigarOp::Match(100)]);
/// ```
pub fn parse_cigar(data: &[u8], n_ops: usize) -> Result<Vec<CigarOp>, BamDecodeError> {
    let required_bytes = n_ops * 4;
    if data.len() < required_bytes {
        return Err(BamDecodeError::UnexpectedEof {
            context: "CIGAR operations",
            expected: required_bytes,
            actual: data.len(),
        });
    }

    data[..required_bytes]
        .chunks_exact(4)
        .map(|chunk| {
            let value = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            CigarOp::from_code(value & 0x0F, value >> 4)
                .ok_or(BamDecodeError::InvalidCigarOp { value: value & 0x0F })
        })
        .collect()
}

/// Split a SAM CIGAR string into operations.
///
/// `*` (unavailable) yields an empty list.
///
/// # Example
///
/// ```
/// use bamgeno::io::bam::{parse_cigar_str, CigarOp};
///
/// let ops = parse_cigar_str("3S2M1I2M").unwrap();
/// assert_eq!(
///     ops,
///     vec![
///         CigarOp::SoftClip(3),
///         CigarOp::Match(2),
///         CigarOp::Insertion(1),
///         CigarOp::Match(2),
///     ]
/// );
/// ```
pub fn parse_cigar_str(text: &str) -> Result<Vec<CigarOp>, BamDecodeError> {
    if text == "*" {
        return Ok(Vec::new());
    }

    let invalid = || BamDecodeError::InvalidCigarString {
        text: text.to_string(),
    };

    let mut ops = Vec::new();
    let mut length: Option<u32> = None;

    for c in text.chars() {
        if let Some(digit) = c.to_digit(10) {
            let current = length.unwrap_or(0);
            length = Some(
                current
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(digit))
                    .ok_or_else(invalid)?,
            );
        } else {
            let len = length.take().ok_or_else(invalid)?;
            ops.push(CigarOp::from_char(c, len).ok_or_else(invalid)?);
        }
    }

    // Trailing digits without an operation
    if length.is_some() {
        return Err(invalid());
    }

    Ok(ops)
}
