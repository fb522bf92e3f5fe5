//! Segment header and payload parsing (Section 7.2 of ITU-T T.88).
//!
//! Only the container structure of a segment is decoded here. Payloads are
//! carried as raw bytes; the arithmetic-coded contents of region segments
//! are never interpreted.

use crate::error::{Error, Result};
use crate::reader::Reader;

/// "The segment type is a number between 0 and 63, inclusive. Not all values
/// are allowed." (7.3)
///
/// Codes this reader does not name are preserved in [`SegmentKind::Reserved`]
/// rather than rejected, so that unknown segments still round-trip through
/// the catalog byte for byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Symbol dictionary – see 7.4.2. (type 0)
    SymbolDictionary,
    /// Intermediate text region – see 7.4.3. (type 4)
    IntermediateTextRegion,
    /// Immediate text region – see 7.4.3. (type 6)
    ImmediateTextRegion,
    /// Immediate lossless text region – see 7.4.3. (type 7)
    ImmediateLosslessTextRegion,
    /// Pattern dictionary – see 7.4.4. (type 16)
    PatternDictionary,
    /// Intermediate halftone region – see 7.4.5. (type 20)
    IntermediateHalftoneRegion,
    /// Immediate halftone region – see 7.4.5. (type 22)
    ImmediateHalftoneRegion,
    /// Immediate lossless halftone region – see 7.4.5. (type 23)
    ImmediateLosslessHalftoneRegion,
    /// Intermediate generic region – see 7.4.6. (type 36)
    IntermediateGenericRegion,
    /// Immediate generic region – see 7.4.6. (type 38)
    ImmediateGenericRegion,
    /// Immediate lossless generic region – see 7.4.6. (type 39)
    ImmediateLosslessGenericRegion,
    /// Intermediate generic refinement region – see 7.4.7. (type 40)
    IntermediateGenericRefinementRegion,
    /// Immediate generic refinement region – see 7.4.7. (type 42)
    ImmediateGenericRefinementRegion,
    /// Immediate lossless generic refinement region – see 7.4.7. (type 43)
    ImmediateLosslessGenericRefinementRegion,
    /// Page information – see 7.4.8. (type 48)
    PageInformation,
    /// End of page – see 7.4.9. (type 49)
    EndOfPage,
    /// End of stripe – see 7.4.10. (type 50)
    EndOfStripe,
    /// End of file – see 7.4.11. (type 51)
    EndOfFile,
    /// Profiles – see 7.4.12. (type 52)
    Profiles,
    /// Tables – see 7.4.13. (type 53)
    Tables,
    /// Colour palette – see 7.4.16. (type 54)
    ColourPalette,
    /// Extension – see 7.4.14. (type 62)
    Extension,
    /// A reserved type code, preserved verbatim.
    Reserved(u8),
}

impl SegmentKind {
    fn from_code(code: u8) -> Self {
        match code {
            0 => Self::SymbolDictionary,
            4 => Self::IntermediateTextRegion,
            6 => Self::ImmediateTextRegion,
            7 => Self::ImmediateLosslessTextRegion,
            16 => Self::PatternDictionary,
            20 => Self::IntermediateHalftoneRegion,
            22 => Self::ImmediateHalftoneRegion,
            23 => Self::ImmediateLosslessHalftoneRegion,
            36 => Self::IntermediateGenericRegion,
            38 => Self::ImmediateGenericRegion,
            39 => Self::ImmediateLosslessGenericRegion,
            40 => Self::IntermediateGenericRefinementRegion,
            42 => Self::ImmediateGenericRefinementRegion,
            43 => Self::ImmediateLosslessGenericRefinementRegion,
            48 => Self::PageInformation,
            49 => Self::EndOfPage,
            50 => Self::EndOfStripe,
            51 => Self::EndOfFile,
            52 => Self::Profiles,
            53 => Self::Tables,
            54 => Self::ColourPalette,
            62 => Self::Extension,
            _ => {
                log::warn!("reserved segment type code {code}");
                Self::Reserved(code)
            }
        }
    }

    /// The 6-bit type code for this kind.
    pub fn code(self) -> u8 {
        match self {
            Self::SymbolDictionary => 0,
            Self::IntermediateTextRegion => 4,
            Self::ImmediateTextRegion => 6,
            Self::ImmediateLosslessTextRegion => 7,
            Self::PatternDictionary => 16,
            Self::IntermediateHalftoneRegion => 20,
            Self::ImmediateHalftoneRegion => 22,
            Self::ImmediateLosslessHalftoneRegion => 23,
            Self::IntermediateGenericRegion => 36,
            Self::ImmediateGenericRegion => 38,
            Self::ImmediateLosslessGenericRegion => 39,
            Self::IntermediateGenericRefinementRegion => 40,
            Self::ImmediateGenericRefinementRegion => 42,
            Self::ImmediateLosslessGenericRefinementRegion => 43,
            Self::PageInformation => 48,
            Self::EndOfPage => 49,
            Self::EndOfStripe => 50,
            Self::EndOfFile => 51,
            Self::Profiles => 52,
            Self::Tables => 53,
            Self::ColourPalette => 54,
            Self::Extension => 62,
            Self::Reserved(code) => code,
        }
    }

    /// Whether this segment must be dropped from an embedded stream
    /// (PDF 32000-1, 7.4.7: Embedded organization carries neither end of
    /// file nor end of page segments).
    pub(crate) fn excluded_from_embedding(self) -> bool {
        matches!(self, Self::EndOfFile | Self::EndOfPage)
    }
}

/// "This field encodes the number of the page to which this segment belongs.
/// The first page must be numbered '1'. This field may contain a value of
/// zero; this value indicates that this segment is not associated with any
/// page." (7.2.6)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Association {
    /// Page association zero: the segment is shared across all pages.
    Global,
    /// The segment belongs to the given page. Always nonzero.
    Page(u32),
}

/// A catalogued segment: its decoded header fields, the verbatim header
/// bytes, and (once read) its raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// "This four-byte field contains the segment's segment number." (7.2.2)
    pub number: u32,
    /// "Bits 0-5: Segment type. See 7.3." (7.2.3)
    pub kind: SegmentKind,
    /// "Bit 7: Deferred non-retain. If this bit is 1, this segment is flagged
    /// as retained only by itself and its attached extension segments." (7.2.3)
    pub deferred_non_retain: bool,
    /// The page this segment belongs to, or global.
    pub association: Association,
    /// "This field contains the segment numbers of the segments that this
    /// segment refers to, if any." (7.2.5)
    pub referred_to: Vec<u32>,
    /// Retention flags for this segment and each referred-to segment, in
    /// flag index order; always `referred_to.len() + 1` entries (7.2.4).
    pub retention_flags: Vec<bool>,
    /// "This 4-byte field contains the length of the segment's segment data
    /// part, in bytes." (7.2.7)
    pub data_length: u32,
    /// The verbatim header bytes, from the segment number through the data
    /// length field.
    pub header_bytes: Vec<u8>,
    /// The raw segment data part. Empty until the data part is read.
    pub payload: Vec<u8>,
    /// Offset of the page association field within `header_bytes`.
    pub(crate) assoc_offset: usize,
    /// "Bit 6: Page association field size." (7.2.3) True if four bytes.
    pub(crate) assoc_is_4_bytes: bool,
}

/// Parse one segment header at the current position (7.2).
///
/// Consumes exactly the header; the segment's payload is left empty for a
/// later [`read_payload`] call.
pub(crate) fn parse_segment_header(reader: &mut Reader<'_>) -> Result<Segment> {
    let start = reader.offset();

    // 7.2.2: Segment number
    let number = reader.read_u32().ok_or(Error::UnexpectedEof)?;

    // 7.2.3: Segment header flags
    let flags = reader.read_byte().ok_or(Error::UnexpectedEof)?;
    let kind = SegmentKind::from_code(flags & 0x3F);
    let assoc_is_4_bytes = flags & 0x40 != 0;
    let deferred_non_retain = flags & 0x80 != 0;

    // 7.2.4: Referred-to segment count and retention flags
    // "The three most significant bits of the first byte in this field
    // determine the length of the field. If the value of this three-bit
    // subfield is between 0 and 4, then the field is one byte long. If the
    // value of this three-bit subfield is 7, then the field is at least five
    // bytes long. This three-bit subfield must not contain values of 5 and 6."
    let count_offset = reader.offset();
    let count_byte = reader.read_byte().ok_or(Error::UnexpectedEof)?;
    let count_field = count_byte >> 5;

    let (referred_count, retention_flags) = match count_field {
        0..=4 => {
            // Short form: the same byte carries the retention flags for this
            // segment and up to four referred-to segments in its low 5 bits,
            // flag i in bit i.
            let count = count_field as usize;
            let retention = (0..=count)
                .map(|i| (count_byte >> i) & 0x01 == 0x01)
                .collect();

            (count, retention)
        }
        7 => {
            // Long form: the count byte is the first byte of a four-byte
            // field whose low 29 bits hold the count, followed by one
            // retention flag per segment, packed eight to a byte starting
            // from the least significant bit.
            let rest = reader.read_bytes(3).ok_or(Error::UnexpectedEof)?;
            let count =
                u32::from_be_bytes([count_byte & 0x1F, rest[0], rest[1], rest[2]]) as usize;

            let flag_bytes = reader
                .read_bytes((count + 1).div_ceil(8))
                .ok_or(Error::UnexpectedEof)?;
            let retention = (0..=count)
                .map(|i| (flag_bytes[i / 8] >> (i % 8)) & 0x01 == 0x01)
                .collect();

            (count, retention)
        }
        _ => {
            return Err(Error::InvalidReferredCount {
                segment: number,
                offset: count_offset,
            });
        }
    };

    // 7.2.5: Referred-to segment numbers
    // "When the current segment's number is 256 or less, then each referred-to
    // segment number is one byte long. Otherwise, when the current segment's
    // number is 65536 or less, each referred-to segment number is two bytes
    // long. Otherwise, each referred-to segment number is four bytes long."
    if referred_count > reader.remaining() {
        return Err(Error::UnexpectedEof);
    }
    let mut referred_to = Vec::with_capacity(referred_count);
    for _ in 0..referred_count {
        let referred = if number <= 256 {
            reader.read_byte().ok_or(Error::UnexpectedEof)? as u32
        } else if number <= 65536 {
            reader.read_u16().ok_or(Error::UnexpectedEof)? as u32
        } else {
            reader.read_u32().ok_or(Error::UnexpectedEof)?
        };

        referred_to.push(referred);
    }

    // 7.2.6: Segment page association
    // The offset is recorded so the field can be rewritten in place when the
    // segment is re-emitted for embedding.
    let assoc_offset = reader.offset() - start;
    let page = if assoc_is_4_bytes {
        let page = reader.read_u32().ok_or(Error::UnexpectedEof)?;
        if page > i32::MAX as u32 {
            return Err(Error::InvalidPageAssociation(number));
        }
        page
    } else {
        reader.read_byte().ok_or(Error::UnexpectedEof)? as u32
    };
    let association = if page == 0 {
        Association::Global
    } else {
        Association::Page(page)
    };

    // 7.2.7: Segment data length
    // "If the segment's type is 'Immediate generic region', then the length
    // field may contain the value 0xFFFFFFFF. This value is intended to mean
    // that the length of the segment's data part is unknown at the time that
    // the segment header is written." Such segments cannot be catalogued
    // without decoding region contents, so they are rejected outright.
    let data_length = reader.read_u32().ok_or(Error::UnexpectedEof)?;
    if data_length == 0xFFFF_FFFF {
        return Err(Error::IndeterminateLength(number));
    }

    let header_bytes = reader.span_from(start).to_vec();

    Ok(Segment {
        number,
        kind,
        deferred_non_retain,
        association,
        referred_to,
        retention_flags,
        data_length,
        header_bytes,
        payload: Vec::new(),
        assoc_offset,
        assoc_is_4_bytes,
    })
}

/// Read the segment's data part, exactly `data_length` bytes, into an owned
/// payload.
pub(crate) fn read_payload(segment: &mut Segment, reader: &mut Reader<'_>) -> Result<()> {
    let data = reader
        .read_bytes(segment.data_length as usize)
        .ok_or(Error::UnexpectedEof)?;
    segment.payload = data.to_vec();

    Ok(())
}

/// The page bitmap width and height carried by a page information segment's
/// data part (7.4.8.1, 7.4.8.2).
pub(crate) fn page_bitmap_size(segment: &Segment) -> Result<(u32, u32)> {
    let mut reader = Reader::new(&segment.payload);
    let width = reader.read_u32().ok_or(Error::UnexpectedEof)?;
    let height = reader.read_u32().ok_or(Error::UnexpectedEof)?;

    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_header_example_1() {
        // 7.2.8 Segment header example, EXAMPLE 1:
        // "A segment header consisting of the sequence of bytes:
        // 0x00 0x00 0x00 0x20 0x86 0x6B 0x02 0x1E 0x05 0x04"
        //
        // Plus 4 bytes for data length (not shown in example).
        let data = [
            0x00, 0x00, 0x00, 0x20, // Segment number = 32
            0x86, // Flags: type 6, page assoc 1 byte, deferred non-retain
            0x6B, // Refers to 3 segments, retention flags
            0x02, 0x1E, 0x05, // Referred segments: 2, 30, 5
            0x04, // Page association = 4
            0x00, 0x00, 0x00, 0x10, // Data length = 16 (added for complete header)
        ];

        let mut reader = Reader::new(&data);
        let segment = parse_segment_header(&mut reader).unwrap();

        assert_eq!(segment.number, 32);
        assert_eq!(segment.kind, SegmentKind::ImmediateTextRegion);
        assert!(segment.deferred_non_retain);
        assert_eq!(segment.referred_to, vec![2, 30, 5]);
        // 0x6B = 0b0110_1011: flag i in bit i of the low five bits.
        assert_eq!(segment.retention_flags, vec![true, true, false, true]);
        assert_eq!(segment.association, Association::Page(4));
        assert_eq!(segment.data_length, 16);
        assert_eq!(segment.header_bytes, data);
        assert_eq!(segment.assoc_offset, 9);
        assert!(!segment.assoc_is_4_bytes);
        assert!(reader.at_end());
    }

    #[test]
    fn segment_header_example_2() {
        // 7.2.8 Segment header example, EXAMPLE 2:
        // "A segment header consisting of the sequence of bytes, in hexadecimal:
        // 00 00 02 34 40 E0 00 00 09 02 FD 01 00 00 02 00
        // 1E 00 05 02 00 02 01 02 02 02 03 02 04 00 00 04
        // 01"
        //
        // Plus 4 bytes for data length (not shown in example).
        #[rustfmt::skip]
        let data = [
            0x00, 0x00, 0x02, 0x34, // Segment number = 564
            0x40,                   // Flags: type 0, page assoc 4 bytes
            0xE0, 0x00, 0x00, 0x09, // Long form: refers to 9 segments
            0x02, 0xFD,             // Retention flags (2 bytes)
            0x01, 0x00,             // Referred segment 256
            0x00, 0x02,             // Referred segment 2
            0x00, 0x1E,             // Referred segment 30
            0x00, 0x05,             // Referred segment 5
            0x02, 0x00,             // Referred segment 512
            0x02, 0x01,             // Referred segment 513
            0x02, 0x02,             // Referred segment 514
            0x02, 0x03,             // Referred segment 515
            0x02, 0x04,             // Referred segment 516
            0x00, 0x00, 0x04, 0x01, // Page association = 1025
            0x00, 0x00, 0x00, 0x20, // Data length = 32 (added for complete header)
        ];

        let mut reader = Reader::new(&data);
        let segment = parse_segment_header(&mut reader).unwrap();

        assert_eq!(segment.number, 564);
        assert_eq!(segment.kind, SegmentKind::SymbolDictionary);
        assert!(!segment.deferred_non_retain);
        assert_eq!(
            segment.referred_to,
            vec![256, 2, 30, 5, 512, 513, 514, 515, 516]
        );
        // 0x02 0xFD, least significant bit first within each byte.
        assert_eq!(
            segment.retention_flags,
            vec![false, true, false, false, false, false, false, false, true, false]
        );
        assert_eq!(segment.association, Association::Page(1025));
        assert_eq!(segment.data_length, 32);
        assert_eq!(segment.header_bytes, data);
        assert_eq!(segment.assoc_offset, 29);
        assert!(segment.assoc_is_4_bytes);
        assert!(reader.at_end());
    }

    #[test]
    fn short_form_retention_flags() {
        let data = [
            0x00, 0x00, 0x00, 0x0A, // Segment number = 10
            0x00, // Flags: type 0
            0x43, // count_field = 2, low bits 0b00011
            0x01, 0x02, // Referred segments: 1, 2
            0x01, // Page association = 1
            0x00, 0x00, 0x00, 0x00, // Data length = 0
        ];

        let mut reader = Reader::new(&data);
        let segment = parse_segment_header(&mut reader).unwrap();

        assert_eq!(segment.referred_to, vec![1, 2]);
        assert_eq!(segment.retention_flags, vec![true, true, false]);
    }

    #[test]
    fn long_form_retention_flags() {
        let mut data = vec![
            0x00, 0x00, 0x00, 0x64, // Segment number = 100
            0x00, // Flags: type 0
            0xE0, 0x00, 0x00, 0x0A, // Long form: 10 referred-to segments
            0x03, 0x04, // Retention flags: ceil(11 / 8) = 2 bytes
        ];
        data.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]); // one byte each
        data.extend_from_slice(&[0x01]); // Page association = 1
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // Data length = 0

        let mut reader = Reader::new(&data);
        let segment = parse_segment_header(&mut reader).unwrap();

        assert_eq!(segment.referred_to.len(), 10);
        // 0x03 = flags 0 and 1 set; 0x04 = flag 10 (bit 2 of the second byte).
        assert_eq!(
            segment.retention_flags,
            vec![true, true, false, false, false, false, false, false, false, false, true]
        );
        assert!(reader.at_end());
    }

    #[test]
    fn count_field_values_5_and_6_rejected() {
        for count_field in [5_u8, 6] {
            let data = [
                0x00, 0x00, 0x00, 0x01, // Segment number = 1
                0x00, // Flags
                count_field << 5, // Reserved count field value
                0x01, // (would be page association)
                0x00, 0x00, 0x00, 0x00,
            ];

            let mut reader = Reader::new(&data);
            assert_eq!(
                parse_segment_header(&mut reader),
                Err(Error::InvalidReferredCount {
                    segment: 1,
                    offset: 5,
                })
            );
        }
    }

    #[test]
    fn referred_number_width_follows_current_segment_number() {
        // Segment number 300: two bytes per referred-to segment number.
        let data = [
            0x00, 0x00, 0x01, 0x2C, // Segment number = 300
            0x00, // Flags: type 0
            0x40, // count_field = 2
            0x01, 0x0A, // Referred segment 266
            0x00, 0x14, // Referred segment 20
            0x01, // Page association = 1
            0x00, 0x00, 0x00, 0x00, // Data length = 0
        ];
        let mut reader = Reader::new(&data);
        let segment = parse_segment_header(&mut reader).unwrap();
        assert_eq!(segment.referred_to, vec![266, 20]);

        // Segment number 100: one byte each.
        let data = [
            0x00, 0x00, 0x00, 0x64, // Segment number = 100
            0x00, 0x40, // count_field = 2
            0x0A, 0x14, // Referred segments: 10, 20
            0x01, // Page association = 1
            0x00, 0x00, 0x00, 0x00,
        ];
        let mut reader = Reader::new(&data);
        let segment = parse_segment_header(&mut reader).unwrap();
        assert_eq!(segment.referred_to, vec![10, 20]);
    }

    #[test]
    fn indeterminate_data_length_rejected() {
        let data = [
            0x00, 0x00, 0x00, 0x05, // Segment number = 5
            0x26, // Flags: type 38 (immediate generic region)
            0x00, // No referred-to segments
            0x01, // Page association = 1
            0xFF, 0xFF, 0xFF, 0xFF, // Indeterminate data length
        ];

        let mut reader = Reader::new(&data);
        assert_eq!(
            parse_segment_header(&mut reader),
            Err(Error::IndeterminateLength(5))
        );
    }

    #[test]
    fn four_byte_association_with_sign_bit_rejected() {
        let data = [
            0x00, 0x00, 0x00, 0x02, // Segment number = 2
            0x40, // Flags: type 0, page assoc 4 bytes
            0x00, // No referred-to segments
            0x80, 0x00, 0x00, 0x01, // Page association out of range
            0x00, 0x00, 0x00, 0x00,
        ];

        let mut reader = Reader::new(&data);
        assert_eq!(
            parse_segment_header(&mut reader),
            Err(Error::InvalidPageAssociation(2))
        );
    }

    #[test]
    fn reserved_type_code_preserved() {
        let data = [
            0x00, 0x00, 0x00, 0x03, // Segment number = 3
            0x0B, // Flags: type 11 (reserved)
            0x00, // No referred-to segments
            0x01, // Page association = 1
            0x00, 0x00, 0x00, 0x00,
        ];

        let mut reader = Reader::new(&data);
        let segment = parse_segment_header(&mut reader).unwrap();
        assert_eq!(segment.kind, SegmentKind::Reserved(11));
        assert_eq!(segment.kind.code(), 11);
    }
}
