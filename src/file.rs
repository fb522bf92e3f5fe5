//! File header parsing for JBIG2 bitstreams (Annex D of ITU-T T.88).

use crate::error::{Error, Result};
use crate::reader::Reader;

/// "There are two standalone file organizations possible for a JBIG2 bitstream."
/// (Annex D)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOrganization {
    /// Segments are stored header and data together, in order (D.1).
    Sequential,
    /// All segment headers are stored first, followed by all segment data,
    /// in the same order (D.2).
    RandomAccess,
}

/// Parsed file header (D.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// The file organization type.
    pub organization: FileOrganization,
    /// The number of pages declared by the file header, if known.
    ///
    /// This value is advisory. The page count observed while cataloguing
    /// segments is authoritative and may differ on malformed input; no
    /// reconciliation is attempted.
    pub number_of_pages: Option<u32>,
}

/// "This is an 8-byte sequence containing 0x97 0x4A 0x42 0x32 0x0D 0x0A 0x1A 0x0A."
/// (D.4.1)
const FILE_HEADER_ID: [u8; 8] = [0x97, 0x4A, 0x42, 0x32, 0x0D, 0x0A, 0x1A, 0x0A];

/// Parse the file header at the start of the stream.
pub(crate) fn parse_file_header(reader: &mut Reader<'_>) -> Result<FileHeader> {
    // D.4.1: ID string
    let id = reader.read_bytes(8).ok_or(Error::UnexpectedEof)?;
    for (offset, (actual, expected)) in id.iter().zip(FILE_HEADER_ID).enumerate() {
        if *actual != expected {
            return Err(Error::BadMagic(offset));
        }
    }

    // D.4.2: File header flags
    let flags = reader.read_byte().ok_or(Error::UnexpectedEof)?;

    // "Bit 0: File organization type. If this bit is 0, the file uses the
    // random-access organization. If this bit is 1, the file uses the
    // sequential organization." (D.4.2)
    let organization = if flags & 0x01 != 0 {
        FileOrganization::Sequential
    } else {
        FileOrganization::RandomAccess
    };

    // "Bit 1: Unknown number of pages. If this bit is 0, then the number of
    // pages contained in the file is known." (D.4.2)
    let number_of_pages_known = flags & 0x02 == 0;

    // Bits 2-7 are reserved and must be zero.
    if flags & 0xFC != 0 {
        return Err(Error::ReservedBitsSet);
    }

    // D.4.3: Number of pages
    // "This is a 4-byte field, and is not present if the 'unknown number of
    // pages' bit was 1." (D.4.3)
    let number_of_pages = if number_of_pages_known {
        Some(reader.read_u32().ok_or(Error::UnexpectedEof)?)
    } else {
        None
    };

    Ok(FileHeader {
        organization,
        number_of_pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(flags: u8, rest: &[u8]) -> Vec<u8> {
        let mut data = FILE_HEADER_ID.to_vec();
        data.push(flags);
        data.extend_from_slice(rest);
        data
    }

    #[test]
    fn sequential_with_known_page_count() {
        let data = header(0x01, &[0x00, 0x00, 0x00, 0x02]);
        let mut reader = Reader::new(&data);
        let parsed = parse_file_header(&mut reader).unwrap();

        assert_eq!(parsed.organization, FileOrganization::Sequential);
        assert_eq!(parsed.number_of_pages, Some(2));
        assert!(reader.at_end());
    }

    #[test]
    fn random_access_with_unknown_page_count() {
        let data = header(0x02, &[]);
        let mut reader = Reader::new(&data);
        let parsed = parse_file_header(&mut reader).unwrap();

        assert_eq!(parsed.organization, FileOrganization::RandomAccess);
        assert_eq!(parsed.number_of_pages, None);
    }

    #[test]
    fn bad_magic_reports_mismatch_offset() {
        let mut data = header(0x01, &[0x00, 0x00, 0x00, 0x01]);
        data[2] = b'X';
        let mut reader = Reader::new(&data);

        assert_eq!(parse_file_header(&mut reader), Err(Error::BadMagic(2)));
    }

    #[test]
    fn reserved_flag_bits_rejected() {
        let data = header(0x05, &[0x00, 0x00, 0x00, 0x01]);
        let mut reader = Reader::new(&data);

        assert_eq!(parse_file_header(&mut reader), Err(Error::ReservedBitsSet));
    }

    #[test]
    fn truncated_header_is_eof() {
        let data = &FILE_HEADER_ID[..5];
        let mut reader = Reader::new(data);

        assert_eq!(parse_file_header(&mut reader), Err(Error::UnexpectedEof));
    }
}
