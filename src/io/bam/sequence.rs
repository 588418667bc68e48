//! 4-bit BAM sequence decoding.
//!
//! BAM stores sequences in 4-bit encoding (2 bases per byte), high nibble
//! first. Each nibble indexes `=ACMGRSVTWYHKDBN`.

use super::error::BamDecodeError;

/// BAM 4-bit to ASCII base lookup table.
const SEQ_LOOKUP: [u8; 16] = [
    b'=', b'A', b'C', b'M', // 0-3
    b'G', b'R', b'S', b'V', // 4-7
    b'T', b'W', b'Y', b'H', // 8-11
    b'K', b'D', b'B', b'N', // 12-15
];

/// Decode a 4-bit encoded BAM sequence to ASCII.
///
/// # Errors
///
/// Returns error if `data` is too short for the specified `length`.
///
/// # Example
///
/// ```
/// use bamgeno::io::bam::decode_sequence;
///
/// // Byte 0x12 encodes bases at indices 1 ('A') and 2 ('C')
/// let sequence = decode_sequence(&[0x12], 2).unwrap();
/// assert_eq!(sequence, b"AC");
/// ```
pub fn decode_sequence(data: &[u8], length: usize) -> Result<Vec<u8>, BamDecodeError> {
    let required_bytes = length.div_ceil(2);
    if data.len() < required_bytes {
        return Err(BamDecodeError::UnexpectedEof {
            context: "packed sequence",
            expected: required_bytes,
            actual: data.len(),
        });
    }

    let mut sequence = Vec::with_capacity(length);
    for &byte in &data[..length / 2] {
        sequence.push(SEQ_LOOKUP[(byte >> 4) as usize]);
        sequence.push(SEQ_LOOKUP[(byte & 0x0F) as usize]);
    }
    if length % 2 == 1 {
        sequence.push(SEQ_LOOKUP[(data[length / 2] >> 4) as usize]);
    }

    Ok(sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_odd_length_ignores_trailing_nibble() {
        // 0x1F: 'A' then padding nibble
        assert_eq!(decode_sequence(&[0x1F], 1).unwrap(), b"A");
    }

    #[test]
    fn test_decode_all_codes() {
        let data = [0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF];
        assert_eq!(decode_sequence(&data, 16).unwrap(), b"=ACMGRSVTWYHKDBN");
    }

    #[test]
    fn test_insufficient_data() {
        assert!(decode_sequence(&[0x12], 3).is_err());
    }

    #[test]
    fn test_empty() {
        assert!(decode_sequence(&[], 0).unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn prop_decode_matches_nibbles(codes in prop::collection::vec(0u8..16, 0..200)) {
            let mut packed = vec![0u8; codes.len().div_ceil(2)];
            for (i, code) in codes.iter().enumerate() {
                packed[i / 2] |= if i % 2 == 0 { code << 4 } else { *code };
            }
            let decoded = decode_sequence(&packed, codes.len()).unwrap();
            let expected: Vec<u8> = codes.iter().map(|c| SEQ_LOOKUP[*c as usize]).collect();
            prop_assert_eq!(decoded, expected);
        }
    }
}
