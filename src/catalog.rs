//! The in-memory segment catalog and the embedded-organization export.
//!
//! Export follows the "Embedded organization" described for the PDF
//! `/JBIG2Decode` filter (ISO 32000-1, 7.4.7): end of file and end of page
//! segments are dropped and every remaining segment is re-associated with
//! page 1, at the width the page association field originally had.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::segment::{Association, Segment};

/// A page record, created the first time any segment associates with its
/// page number.
#[derive(Debug)]
pub struct Page {
    number: u32,
    width: Option<u32>,
    height: Option<u32>,
    segments: BTreeMap<u32, Segment>,
}

impl Page {
    fn new(number: u32) -> Self {
        Self {
            number,
            width: None,
            height: None,
            segments: BTreeMap::new(),
        }
    }

    /// The page number this record was created for.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// The page bitmap width, once a page information segment for this page
    /// has been read.
    pub fn width(&self) -> Option<u32> {
        self.width
    }

    /// The page bitmap height, once a page information segment for this page
    /// has been read.
    pub fn height(&self) -> Option<u32> {
        self.height
    }

    /// The page's segments, in ascending segment number order.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.values()
    }

    /// Concatenate the page's segments, in ascending segment number order,
    /// into a single byte stream.
    ///
    /// With `for_embedding`, end of file and end of page segments are
    /// skipped and each emitted header's page association is rewritten to
    /// page 1.
    pub fn data(&self, for_embedding: bool) -> Vec<u8> {
        let mut out = Vec::new();
        for segment in self.segments.values() {
            emit_segment(&mut out, segment, for_embedding);
        }

        out
    }

    pub(crate) fn set_bitmap_size(&mut self, width: u32, height: u32) {
        self.width = Some(width);
        self.height = Some(height);
    }
}

/// The catalog of everything found during a read pass.
///
/// Each segment is owned by exactly one page's map or by the global map,
/// never both.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    pub(crate) pages: BTreeMap<u32, Page>,
    globals: BTreeMap<u32, Segment>,
    /// Every catalogued segment number, across pages and globals, for the
    /// cross-container uniqueness check.
    numbers: BTreeSet<u32>,
}

impl Registry {
    /// Ensure a page record exists for the segment's association. Called
    /// while the segment's header is parsed, before its data is read.
    pub(crate) fn note_association(&mut self, segment: &Segment) {
        if let Association::Page(number) = segment.association {
            self.pages
                .entry(number)
                .or_insert_with(|| Page::new(number));
        }
    }

    /// Store the bitmap size from a page information segment on its page.
    ///
    /// The page record is guaranteed to exist because associations are
    /// registered during header parsing, which always precedes data reading
    /// for the same segment.
    pub(crate) fn set_page_bitmap_size(&mut self, number: u32, width: u32, height: u32) {
        let page = self
            .pages
            .get_mut(&number)
            .expect("page record created during header parsing");
        page.set_bitmap_size(width, height);
    }

    /// Move a fully read segment into its owning container.
    pub(crate) fn adopt(&mut self, segment: Segment) -> Result<()> {
        if !self.numbers.insert(segment.number) {
            return Err(Error::DuplicateSegment(segment.number));
        }

        match segment.association {
            Association::Global => {
                self.globals.insert(segment.number, segment);
            }
            Association::Page(number) => {
                let page = self
                    .pages
                    .get_mut(&number)
                    .expect("page record created during header parsing");
                page.segments.insert(segment.number, segment);
            }
        }

        Ok(())
    }

    pub(crate) fn global_count(&self) -> usize {
        self.globals.len()
    }

    /// Concatenate the global segments, in ascending segment number order.
    ///
    /// Returns `None` if the resulting stream would be empty, so callers can
    /// omit the `/JBIG2Globals` stream entirely.
    pub(crate) fn global_data(&self, for_embedding: bool) -> Option<Vec<u8>> {
        let mut out = Vec::new();
        for segment in self.globals.values() {
            emit_segment(&mut out, segment, for_embedding);
        }

        if out.is_empty() { None } else { Some(out) }
    }
}

/// Append one segment's header and payload to `out`.
fn emit_segment(out: &mut Vec<u8>, segment: &Segment, for_embedding: bool) {
    if for_embedding && segment.kind.excluded_from_embedding() {
        return;
    }

    if for_embedding && matches!(segment.association, Association::Page(_)) {
        // Rewrite the page association to page 1 in a copy of the header,
        // keeping the field's original width. Global segments keep their
        // association of zero.
        let mut header = segment.header_bytes.clone();
        if segment.assoc_is_4_bytes {
            header[segment.assoc_offset..segment.assoc_offset + 4]
                .copy_from_slice(&[0x00, 0x00, 0x00, 0x01]);
        } else {
            header[segment.assoc_offset] = 0x01;
        }
        out.extend_from_slice(&header);
    } else {
        out.extend_from_slice(&segment.header_bytes);
    }

    out.extend_from_slice(&segment.payload);
}
