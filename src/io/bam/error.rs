//! BAM decoding error types.
//!
//! Structured variants so callers can match on the specific layout violation
//! rather than parse a message string.

use std::{error, fmt};

/// Errors that can occur while decoding the BAM header or an alignment record.
///
/// # Example
///
/// ```
/// use bamgeno::io::bam::BamDecodeError;
///
/// fn describe(err: &BamDecodeError) -> String {
///     match err {
///         BamDecodeError::InvalidReferenceId { value, field } => {
///             format!("bad {} reference id {}", field, value)
///         }
///         other => other.to_string(),
///     }
/// }
/// ```
#[derive(Debug)]
pub enum BamDecodeError {
    /// Invalid BAM magic bytes
    InvalidMagic {
        /// The actual bytes found
        actual: [u8; 4],
    },

    /// A length field in the header is negative
    InvalidHeaderLength {
        /// Which header field
        field: &'static str,
        /// The invalid value
        value: i32,
    },

    /// Invalid reference sequence ID (must be -1 or a dictionary index)
    InvalidReferenceId {
        /// The invalid reference ID value
        value: i32,
        /// Which field had the invalid ID ("read" or "mate")
        field: &'static str,
    },

    /// Record block size smaller than the fixed record header
    InvalidBlockSize {
        /// The declared block size
        value: i32,
    },

    /// Invalid read name length (must be >= 1)
    InvalidReadNameLength {
        /// The invalid length value
        length: u8,
        /// Logical stream offset of the record
        offset: u64,
    },

    /// Missing NUL terminator in string field
    MissingNulTerminator {
        /// Which field was missing the terminator
        field: &'static str,
        /// Logical stream offset of the record or header field
        offset: u64,
    },

    /// Invalid UTF-8 in string field
    InvalidUtf8 {
        /// Which field had invalid UTF-8
        field: &'static str,
        /// The underlying UTF-8 error
        source: std::string::FromUtf8Error,
    },

    /// Invalid CIGAR operation code
    InvalidCigarOp {
        /// The invalid operation value
        value: u32,
    },

    /// Malformed textual operation string
    InvalidCigarString {
        /// The offending text
        text: String,
    },

    /// Negative sequence length
    NegativeSequenceLength {
        /// The negative length value
        length: i32,
    },

    /// Variable-length fields extend past the record's declared size
    FieldsExceedBlock {
        /// Bytes required by the decoded field lengths
        required: usize,
        /// Bytes declared by block_size
        block_size: usize,
    },

    /// Insufficient data for parsing
    UnexpectedEof {
        /// What was being parsed
        context: &'static str,
        /// Expected number of bytes
        expected: usize,
        /// Actual number of bytes available
        actual: usize,
    },
}

impl error::Error for BamDecodeError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::InvalidUtf8 { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for BamDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMagic { actual } => {
                write!(
                    f,
                    "Invalid BAM magic bytes: expected [BAM\\x01], got {:?}",
                    actual
                )
            }

            Self::InvalidHeaderLength { field, value } => {
                write!(f, "Invalid {} in BAM header: {}", field, value)
            }

            Self::InvalidReferenceId { value, field } => {
                write!(
                    f,
                    "Invalid {} reference ID: {} (must be -1 or a known reference)",
                    field, value
                )
            }

            Self::InvalidBlockSize { value } => {
                write!(f, "Invalid record block size: {}", value)
            }

            Self::InvalidReadNameLength { length, offset } => {
                write!(
                    f,
                    "Invalid read name length at offset {}: {} (must be >= 1)",
                    offset, length
                )
            }

            Self::MissingNulTerminator { field, offset } => {
                write!(f, "Missing NUL terminator in {} at offset {}", field, offset)
            }

            Self::InvalidUtf8 { field, source } => {
                write!(f, "Invalid UTF-8 in {}: {}", field, source)
            }

            Self::InvalidCigarOp { value } => {
                write!(f, "Invalid CIGAR operation: {}", value)
            }

            Self::InvalidCigarString { text } => {
                write!(f, "Invalid CIGAR string: {:?}", text)
            }

            Self::NegativeSequenceLength { length } => {
                write!(f, "Invalid negative sequence length: {}", length)
            }

            Self::FieldsExceedBlock {
                required,
                block_size,
            } => {
                write!(
                    f,
                    "Record fields need {} bytes but block size is {}",
                    required, block_size
                )
            }

            Self::UnexpectedEof {
                context,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Unexpected end of data while parsing {}: expected {} bytes, got {}",
                    context, expected, actual
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = BamDecodeError::UnexpectedEof {
            context: "record header",
            expected: 36,
            actual: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("record header"));
        assert!(msg.contains("36"));
    }

    #[test]
    fn test_utf8_source_is_exposed() {
        let source = String::from_utf8(vec![0xFF]).unwrap_err();
        let err = BamDecodeError::InvalidUtf8 {
            field: "read name",
            source,
        };
        assert!(error::Error::source(&err).is_some());
    }
}
