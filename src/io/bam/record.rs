//! Alignment record structure and BAM record decoding.
//!
//! [`AlignmentRecord`] is the logical record shape shared by the BAM decoder
//! and the SAM text reader. Positions are 1-based in both.
//!
//! # Binary Format
//!
//! ```text
//! BAM Record (binary, little-endian):
//! - block_size (int32): Total record size in bytes (excluding this field)
//! - refID (int32): Reference sequence ID (-1 for unmapped)
//! - pos (int32): 0-based leftmost position (-1 for unmapped)
//! - l_read_name (uint8): Length of read name (includes null terminator)
//! - mapq (uint8): Mapping quality (255 = unavailable)
//! - bin (uint16): BAI index bin
//! - n_cigar_op (uint16): Number of CIGAR operations
//! - flag (uint16): Bitwise FLAGS
//! - l_seq (int32): Sequence length
//! - next_refID (int32): Reference ID of mate/next read
//! - next_pos (int32): Position of mate/next read
//! - tlen (int32): Template length
//! - read_name (char[l_read_name]): Null-terminated read name
//! - cigar (uint32[n_cigar_op]): CIGAR operations
//! - seq (uint8[(l_seq+1)/2]): 4-bit encoded sequence
//! - qual (char[l_seq]): Phred quality scores
//! - tags: optional fields, skipped
//! ```

use super::cigar::{parse_cigar, CigarOp};
use super::error::BamDecodeError;
use super::sequence::decode_sequence;
use std::sync::Arc;

/// Size of the fixed record header, including the block_size field.
pub const RECORD_HEADER_SIZE: usize = 36;

/// SAM flag bits consulted by the genotyping filter.
pub mod flags {
    /// Read is paired
    pub const PAIRED: u16 = 0x1;
    /// Segment unmapped
    pub const UNMAPPED: u16 = 0x4;
    /// Next segment unmapped
    pub const MATE_UNMAPPED: u16 = 0x8;
    /// Reverse complemented
    pub const REVERSE: u16 = 0x10;
    /// Secondary alignment
    pub const SECONDARY: u16 = 0x100;
    /// Supplementary alignment
    pub const SUPPLEMENTARY: u16 = 0x800;
}

/// Mapping quality value meaning "unavailable".
pub const MAPQ_UNAVAILABLE: u8 = 255;

fn read_i32_le(data: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn read_u16_le(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

/// Fixed 36-byte header of a BAM record.
///
/// Decoding it first tells the reader how many bytes the variable fields
/// occupy, so the rest of the record can be fetched in one range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Bytes following the block_size field
    pub block_size: usize,
    /// refID
    pub reference_id: i32,
    /// 0-based pos
    pub position: i32,
    /// l_read_name
    pub read_name_length: u8,
    /// MAPQ
    pub mapq: u8,
    /// BAI bin
    pub bin: u16,
    /// n_cigar_op
    pub cigar_count: u16,
    /// FLAG
    pub flags: u16,
    /// l_seq
    pub sequence_length: usize,
    /// next_refID
    pub mate_reference_id: i32,
    /// next_pos
    pub mate_position: i32,
    /// TLEN
    pub template_length: i32,
}

impl RecordHeader {
    /// Decode the fixed header from the first 36 bytes of `data`.
    ///
    /// `offset` is the logical stream offset of the record, for diagnostics.
    pub fn parse(data: &[u8], offset: u64) -> Result<Self, BamDecodeError> {
        if data.len() < RECORD_HEADER_SIZE {
            return Err(BamDecodeError::UnexpectedEof {
                context: "record header",
                expected: RECORD_HEADER_SIZE,
                actual: data.len(),
            });
        }

        let block_size = read_i32_le(data, 0);
        if block_size < (RECORD_HEADER_SIZE - 4) as i32 {
            return Err(BamDecodeError::InvalidBlockSize { value: block_size });
        }

        let read_name_length = data[12];
        if read_name_length == 0 {
            return Err(BamDecodeError::InvalidReadNameLength {
                length: 0,
                offset,
            });
        }

        let sequence_length = read_i32_le(data, 20);
        if sequence_length < 0 {
            return Err(BamDecodeError::NegativeSequenceLength {
                length: sequence_length,
            });
        }

        Ok(Self {
            block_size: block_size as usize,
            reference_id: read_i32_le(data, 4),
            position: read_i32_le(data, 8),
            read_name_length,
            mapq: data[13],
            bin: read_u16_le(data, 14),
            cigar_count: read_u16_le(data, 16),
            flags: read_u16_le(data, 18),
            sequence_length: sequence_length as usize,
            mate_reference_id: read_i32_le(data, 24),
            mate_position: read_i32_le(data, 28),
            template_length: read_i32_le(data, 32),
        })
    }

    /// Bytes taken by name, CIGAR, packed sequence and quality.
    pub fn variable_length(&self) -> usize {
        self.read_name_length as usize
            + 4 * self.cigar_count as usize
            + self.sequence_length.div_ceil(2)
            + self.sequence_length
    }

    /// Total bytes of the record in the stream, including block_size.
    pub fn record_length(&self) -> usize {
        4 + self.block_size
    }
}

/// One alignment in the logical shape shared by BAM and SAM input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentRecord {
    /// Read name/query name
    pub name: String,

    /// Reference sequence name; None when refID = -1 or RNAME = `*`
    pub reference_name: Option<Arc<str>>,

    /// 1-based leftmost mapping position (0 when unavailable)
    pub position: i64,

    /// Mapping quality (255 = unavailable)
    pub mapq: u8,

    /// Bitwise FLAGS
    pub flags: u16,

    /// Alignment operations
    pub cigar: Vec<CigarOp>,

    /// Sequence bases (ASCII)
    pub sequence: Vec<u8>,

    /// Quality scores as stored (raw Phred in BAM, Phred+33 in SAM)
    pub quality: Vec<u8>,

    /// Mate reference name
    pub mate_reference_name: Option<Arc<str>>,

    /// Mate 1-based position (0 when unavailable)
    pub mate_position: i64,

    /// Template length (TLEN)
    pub template_length: i32,
}

impl AlignmentRecord {
    /// Start adjusted for a leading soft clip.
    ///
    /// # Example
    ///
    /// ```
    /// use bamgeno::io::bam::{parse_cigar_str, AlignmentRecord};
    ///
    /// let mut record = AlignmentRecord::default();
    /// record.position = 10;
    /// record.cigar = parse_cigar_str("3S2M1I2M").unwrap();
    /// assert_eq!(record.clipped_start(), 7);
    /// ```
    pub fn clipped_start(&self) -> i64 {
        match self.cigar.first() {
            Some(CigarOp::SoftClip(len)) => self.position - *len as i64,
            _ => self.position,
        }
    }

    /// Reference span: read length plus deletions and skips, minus insertions.
    pub fn reference_span(&self) -> i64 {
        self.cigar
            .iter()
            .fold(self.sequence.len() as i64, |span, op| match op {
                CigarOp::Deletion(len) | CigarOp::RefSkip(len) => span + *len as i64,
                CigarOp::Insertion(len) => span - *len as i64,
                _ => span,
            })
    }

    /// Probability that the read is placed wrongly: `10^(-mapq/10)`.
    pub fn mapping_error_probability(&self) -> f64 {
        10f64.powf(-(self.mapq as f64) / 10.0)
    }

    /// True unless the placement error probability exceeds `max_probability`.
    pub fn passes_mapping_confidence(&self, max_probability: f64) -> bool {
        self.mapping_error_probability() <= max_probability
    }

    /// Unmapped or mate-unmapped.
    pub fn is_unmapped(&self) -> bool {
        self.flags & (flags::UNMAPPED | flags::MATE_UNMAPPED) != 0
    }

    /// Secondary or supplementary.
    pub fn is_secondary(&self) -> bool {
        self.flags & (flags::SECONDARY | flags::SUPPLEMENTARY) != 0
    }

    /// Any soft or hard clip in the operation list.
    pub fn has_clipping(&self) -> bool {
        self.cigar.iter().any(CigarOp::is_clip)
    }

    /// Is this read reverse complemented?
    pub fn is_reverse_complement(&self) -> bool {
        self.flags & flags::REVERSE != 0
    }
}

impl Default for AlignmentRecord {
    fn default() -> Self {
        Self {
            name: String::new(),
            reference_name: None,
            position: 0,
            mapq: MAPQ_UNAVAILABLE,
            flags: 0,
            cigar: Vec::new(),
            sequence: Vec::new(),
            quality: Vec::new(),
            mate_reference_name: None,
            mate_position: 0,
            template_length: 0,
        }
    }
}

/// Resolve a refID against the header dictionary.
fn resolve_reference(
    id: i32,
    references: &[Arc<str>],
    field: &'static str,
) -> Result<Option<Arc<str>>, BamDecodeError> {
    match id {
        -1 => Ok(None),
        n if n >= 0 => references
            .get(n as usize)
            .map(|name| Some(Arc::clone(name)))
            .ok_or(BamDecodeError::InvalidReferenceId { value: n, field }),
        invalid => Err(BamDecodeError::InvalidReferenceId {
            value: invalid,
            field,
        }),
    }
}

/// Decode one record.
///
/// `data` starts at the block_size field and must hold at least the fixed
/// header plus [`RecordHeader::variable_length`] bytes. Field boundaries are
/// derived from the decoded lengths; trailing optional fields are ignored.
///
/// # Errors
///
/// Fails on truncated data, a read name without its NUL terminator or with
/// invalid UTF-8, an unknown CIGAR code, or a reference ID outside the
/// dictionary.
pub fn decode_record(
    data: &[u8],
    references: &[Arc<str>],
    offset: u64,
) -> Result<AlignmentRecord, BamDecodeError> {
    let header = RecordHeader::parse(data, offset)?;

    let required = header.variable_length();
    if RECORD_HEADER_SIZE - 4 + required > header.block_size {
        return Err(BamDecodeError::FieldsExceedBlock {
            required: RECORD_HEADER_SIZE - 4 + required,
            block_size: header.block_size,
        });
    }
    if data.len() < RECORD_HEADER_SIZE + required {
        return Err(BamDecodeError::UnexpectedEof {
            context: "record fields",
            expected: RECORD_HEADER_SIZE + required,
            actual: data.len(),
        });
    }

    let name_start = RECORD_HEADER_SIZE;
    let cigar_start = name_start + header.read_name_length as usize;
    let seq_start = cigar_start + 4 * header.cigar_count as usize;
    let qual_start = seq_start + header.sequence_length.div_ceil(2);
    let qual_end = qual_start + header.sequence_length;

    let name_bytes = &data[name_start..cigar_start];
    let (last, name) = name_bytes
        .split_last()
        .ok_or(BamDecodeError::InvalidReadNameLength { length: 0, offset })?;
    if *last != 0 {
        return Err(BamDecodeError::MissingNulTerminator {
            field: "read name",
            offset,
        });
    }
    let name = String::from_utf8(name.to_vec()).map_err(|source| {
        BamDecodeError::InvalidUtf8 {
            field: "read name",
            source,
        }
    })?;

    let cigar = parse_cigar(&data[cigar_start..seq_start], header.cigar_count as usize)?;
    let sequence = decode_sequence(&data[seq_start..qual_start], header.sequence_length)?;
    let quality = data[qual_start..qual_end].to_vec();

    Ok(AlignmentRecord {
        name,
        reference_name: resolve_reference(header.reference_id, references, "read")?,
        position: header.position as i64 + 1,
        mapq: header.mapq,
        flags: header.flags,
        cigar,
        sequence,
        quality,
        mate_reference_name: resolve_reference(header.mate_reference_id, references, "mate")?,
        mate_position: header.mate_position as i64 + 1,
        template_length: header.template_length,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::bam::parse_cigar_str;
    use crate::io::bam::test_support::{record_bytes, RecordFields};
    use proptest::prelude::*;

    fn refs() -> Vec<Arc<str>> {
        vec![Arc::from("1"), Arc::from("2")]
    }

    fn record_with(position: i64, cigar: &str, seq: &str) -> AlignmentRecord {
        AlignmentRecord {
            position,
            cigar: parse_cigar_str(cigar).unwrap(),
            sequence: seq.as_bytes().to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_record_fields() {
        let data = record_bytes(&RecordFields {
            ref_id: 1,
            pos: 99,
            name: "read1",
            mapq: 37,
            flag: flags::PAIRED | flags::REVERSE,
            cigar: &[(0, 4)],
            seq: "ACGT",
            aux: b"NMC\x01",
            ..Default::default()
        });
        let record = decode_record(&data, &refs(), 0).unwrap();

        assert_eq!(record.name, "read1");
        assert_eq!(record.reference_name.as_deref(), Some("2"));
        assert_eq!(record.position, 100);
        assert_eq!(record.mapq, 37);
        assert!(record.is_reverse_complement());
        assert_eq!(record.cigar, vec![CigarOp::Match(4)]);
        assert_eq!(record.sequence, b"ACGT");
        assert_eq!(record.quality, vec![30; 4]);
        assert!(record.mate_reference_name.is_none());
        assert_eq!(record.mate_position, 0);
    }

    #[test]
    fn test_header_variable_length() {
        let data = record_bytes(&RecordFields {
            name: "abc",
            cigar: &[(0, 3), (1, 2)],
            seq: "ACGTA",
            ..Default::default()
        });
        let header = RecordHeader::parse(&data, 0).unwrap();
        // name 4 + cigar 8 + seq 3 + qual 5
        assert_eq!(header.variable_length(), 20);
        assert_eq!(header.record_length(), data.len());
    }

    #[test]
    fn test_unmapped_reference_id() {
        let data = record_bytes(&RecordFields {
            ref_id: -1,
            pos: -1,
            ..Default::default()
        });
        let record = decode_record(&data, &refs(), 0).unwrap();
        assert!(record.reference_name.is_none());
        assert_eq!(record.position, 0);
    }

    #[test]
    fn test_invalid_reference_ids() {
        for ref_id in [-2, 2, 1000] {
            let data = record_bytes(&RecordFields {
                ref_id,
                ..Default::default()
            });
            assert!(matches!(
                decode_record(&data, &refs(), 0),
                Err(BamDecodeError::InvalidReferenceId { field: "read", .. })
            ));
        }
    }

    #[test]
    fn test_truncated_record() {
        let data = record_bytes(&RecordFields {
            seq: "ACGTACGT",
            ..Default::default()
        });
        assert!(matches!(
            decode_record(&data[..data.len() - 2], &refs(), 0),
            Err(BamDecodeError::UnexpectedEof { .. })
        ));
        assert!(RecordHeader::parse(&data[..20], 0).is_err());
    }

    #[test]
    fn test_missing_null_terminator_in_name() {
        let mut data = record_bytes(&RecordFields {
            name: "ab",
            ..Default::default()
        });
        data[RECORD_HEADER_SIZE + 2] = b'c';
        assert!(matches!(
            decode_record(&data, &refs(), 0),
            Err(BamDecodeError::MissingNulTerminator { .. })
        ));
    }

    #[test]
    fn test_negative_sequence_length() {
        let mut data = record_bytes(&RecordFields::default());
        data[20..24].copy_from_slice(&(-5i32).to_le_bytes());
        assert!(matches!(
            decode_record(&data, &refs(), 0),
            Err(BamDecodeError::NegativeSequenceLength { length: -5 })
        ));
    }

    #[test]
    fn test_fields_exceeding_block_size() {
        let mut data = record_bytes(&RecordFields {
            seq: "ACGT",
            ..Default::default()
        });
        let shrunk = (data.len() - 4 - 3) as i32;
        data[0..4].copy_from_slice(&shrunk.to_le_bytes());
        assert!(matches!(
            decode_record(&data, &refs(), 0),
            Err(BamDecodeError::FieldsExceedBlock { .. })
        ));
    }

    #[test]
    fn test_zero_read_name_length() {
        let mut data = record_bytes(&RecordFields::default());
        data[12] = 0;
        assert!(matches!(
            RecordHeader::parse(&data, 0),
            Err(BamDecodeError::InvalidReadNameLength { .. })
        ));
    }

    #[test]
    fn test_clipped_start_and_span() {
        let record = record_with(10, "3S2M1I2M", "AAACCGTT");
        assert_eq!(record.clipped_start(), 7);
        assert_eq!(record.reference_span(), 7);
        assert!(record.has_clipping());

        let spliced = record_with(10, "2M5N2D2M", "ACGT");
        assert_eq!(spliced.clipped_start(), 10);
        assert_eq!(spliced.reference_span(), 11);
        assert!(!spliced.has_clipping());
    }

    #[test]
    fn test_hard_clip_does_not_shift_start() {
        let record = record_with(10, "5H4M", "ACGT");
        assert_eq!(record.clipped_start(), 10);
        assert!(record.has_clipping());
    }

    #[test]
    fn test_mapping_confidence() {
        let mut record = AlignmentRecord {
            mapq: 30,
            ..Default::default()
        };
        assert!(record.passes_mapping_confidence(0.01));
        record.mapq = 10;
        assert!(!record.passes_mapping_confidence(0.01));
        record.mapq = MAPQ_UNAVAILABLE;
        assert!(record.passes_mapping_confidence(0.01));
    }

    #[test]
    fn test_flag_predicates() {
        let mut record = AlignmentRecord::default();
        assert!(!record.is_unmapped());
        record.flags = flags::MATE_UNMAPPED;
        assert!(record.is_unmapped());
        record.flags = flags::SUPPLEMENTARY;
        assert!(record.is_secondary());
        assert!(!record.is_unmapped());
    }

    proptest! {
        #[test]
        fn prop_span_counts_reference_bases_for_unclipped_reads(
            ops in prop::collection::vec(
                (prop::sample::select(vec![0u32, 1, 2, 3, 7, 8]), 1u32..50),
                1..10,
            )
        ) {
            let cigar: Vec<CigarOp> = ops
                .iter()
                .map(|(code, len)| CigarOp::from_code(*code, *len).unwrap())
                .collect();
            let read_len: u32 = cigar
                .iter()
                .filter(|op| op.consumes_read())
                .map(|op| op.length())
                .sum();
            let ref_len: u32 = cigar
                .iter()
                .filter(|op| op.consumes_reference())
                .map(|op| op.length())
                .sum();
            let record = AlignmentRecord {
                position: 1,
                cigar,
                sequence: vec![b'A'; read_len as usize],
                ..Default::default()
            };
            prop_assert_eq!(record.reference_span(), ref_len as i64);
        }
    }
}
