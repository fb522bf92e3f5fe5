//! Error types for JBIG2 segment reading.

use core::fmt;

/// The error type for JBIG2 segment reading operations.
///
/// Every error is fatal to the read pass that produced it: the reader
/// discards the partially built catalog and refuses further reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The file does not start with the JBIG2 ID string. Carries the
    /// offset of the first mismatching byte.
    BadMagic(usize),
    /// Reserved bits in the file header flags byte are not zero.
    ReservedBitsSet,
    /// The referred-to segment count field decoded as 5 or 6, which the
    /// format reserves (7.2.4).
    InvalidReferredCount {
        /// The number of the segment whose header was being decoded.
        segment: u32,
        /// The offset of the count field within the stream.
        offset: usize,
    },
    /// The page association field decodes to a value outside the valid
    /// page number range.
    InvalidPageAssociation(u32),
    /// A segment declared the indeterminate data length 0xFFFFFFFF
    /// (7.2.7), which this reader does not support.
    IndeterminateLength(u32),
    /// Two segments carry the same segment number.
    DuplicateSegment(u32),
    /// The stream ended in the middle of a header or payload.
    UnexpectedEof,
    /// `read` was called on a reader that already completed a read.
    AlreadyRead,
    /// `read` was called on a reader whose previous read failed.
    PreviouslyFailed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic(offset) => {
                write!(f, "file header ID string mismatch at byte {offset}")
            }
            Self::ReservedBitsSet => write!(f, "reserved file header flag bits must be zero"),
            Self::InvalidReferredCount { segment, offset } => write!(
                f,
                "invalid referred-to segment count in header for segment {segment} at offset {offset}"
            ),
            Self::InvalidPageAssociation(segment) => {
                write!(f, "invalid page association for segment {segment}")
            }
            Self::IndeterminateLength(segment) => write!(
                f,
                "segment {segment} has indeterminate data length, which is not supported"
            ),
            Self::DuplicateSegment(segment) => {
                write!(f, "duplicate segment number {segment}")
            }
            Self::UnexpectedEof => write!(f, "unexpected end of input"),
            Self::AlreadyRead => write!(f, "already attempted a read on this JBIG2 file"),
            Self::PreviouslyFailed => write!(f, "a previous read on this JBIG2 file failed"),
        }
    }
}

impl core::error::Error for Error {}

/// Result type for JBIG2 segment reading operations.
pub type Result<T> = core::result::Result<T, Error>;
