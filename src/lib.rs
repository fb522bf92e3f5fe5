/*!
A JBIG2 segment catalog reader for embedding bi-level images in PDF.

`jbig2-embed` reads a standalone JBIG2 file (ITU-T T.88, also known as
ISO/IEC 14492) at the container level: it understands all the segments,
which segments belong to which pages, how many pages there are, what the
bitmap width and height of each page is, and which segments are global. It
can then re-emit per-page and global byte streams in the embedded
organization required by PDF's `/JBIG2Decode` filter, with end of file and
end of page segments dropped and page associations rewritten to 1.

Segment payloads are never decoded. Producing pixels from region segments
is the job of a JBIG2 *decoder*; this crate only rearranges the container
so a PDF writer can embed it.

# Example
```rust,no_run
use jbig2_embed::SegmentReader;

let data = std::fs::read("scan.jb2").unwrap();
let mut reader = SegmentReader::new();
reader.read(&data).unwrap();

for page in 1..=reader.number_of_pages() as u32 {
    let stream = reader.page_data(page, true).unwrap();
    println!(
        "page {page}: {:?}x{:?}, {} bytes",
        reader.page_width(page),
        reader.page_height(page),
        stream.len()
    );
}
if let Some(globals) = reader.global_data(true) {
    println!("globals: {} bytes", globals.len());
}
```

# Safety
This crate forbids unsafe code via a crate-level attribute.
*/

#![forbid(unsafe_code)]

mod catalog;
mod error;
mod file;
mod reader;
mod segment;

use std::collections::BTreeMap;
use std::fmt;

use crate::catalog::Registry;
use crate::file::parse_file_header;
use crate::reader::Reader;
use crate::segment::{page_bitmap_size, parse_segment_header, read_payload};

pub use crate::catalog::Page;
pub use crate::error::{Error, Result};
pub use crate::file::{FileHeader, FileOrganization};
pub use crate::segment::{Association, Segment, SegmentKind};

/// Where the reader stands in its one-shot lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    /// No read attempted yet.
    Unread,
    /// A read pass is in progress.
    Reading,
    /// A read pass completed; the catalog is final.
    Read,
    /// A read pass failed; the catalog was discarded.
    Failed,
}

/// A one-shot reader that decomposes a JBIG2 file into a catalog of
/// segments and pages.
///
/// [`read`](Self::read) may be called exactly once. Afterwards the catalog
/// is queryable but never mutated again; the input bytes are not needed
/// anymore, since all header and payload bytes are copied into the catalog.
#[derive(Debug)]
pub struct SegmentReader {
    state: ReaderState,
    registry: Registry,
    file_header: Option<FileHeader>,
}

impl SegmentReader {
    /// Create a reader with an empty catalog.
    pub fn new() -> Self {
        Self {
            state: ReaderState::Unread,
            registry: Registry::default(),
            file_header: None,
        }
    }

    /// Read the given JBIG2 file and build the catalog.
    ///
    /// This is a one-shot operation: a second call fails with
    /// [`Error::AlreadyRead`] (or [`Error::PreviouslyFailed`]) without
    /// touching the existing catalog. On any parse error the partially
    /// built catalog is discarded; there is no partial recovery.
    pub fn read(&mut self, data: &[u8]) -> Result<()> {
        match self.state {
            ReaderState::Unread => {}
            ReaderState::Reading | ReaderState::Read => return Err(Error::AlreadyRead),
            ReaderState::Failed => return Err(Error::PreviouslyFailed),
        }
        self.state = ReaderState::Reading;

        match self.read_inner(data) {
            Ok(()) => {
                self.state = ReaderState::Read;
                log::debug!(
                    "catalogued JBIG2 file: {} pages, {} global segments",
                    self.number_of_pages(),
                    self.registry.global_count(),
                );
                Ok(())
            }
            Err(e) => {
                self.registry = Registry::default();
                self.file_header = None;
                self.state = ReaderState::Failed;
                Err(e)
            }
        }
    }

    fn read_inner(&mut self, data: &[u8]) -> Result<()> {
        let mut reader = Reader::new(data);
        let file_header = parse_file_header(&mut reader)?;

        // Annex D: the two standalone organizations.
        match file_header.organization {
            FileOrganization::Sequential => self.read_sequential(&mut reader)?,
            FileOrganization::RandomAccess => self.read_random_access(&mut reader)?,
        }

        self.file_header = Some(file_header);
        Ok(())
    }

    /// "A file header is followed by a sequence of segments. The two parts
    /// of each segment are stored together: first the segment header then
    /// the segment data." (D.1)
    fn read_sequential(&mut self, reader: &mut Reader<'_>) -> Result<()> {
        while !reader.at_end() {
            let mut segment = parse_segment_header(reader)?;
            self.registry.note_association(&segment);
            read_payload(&mut segment, reader)?;
            self.finish_segment(segment)?;
        }

        Ok(())
    }

    /// "A file header is followed by a sequence of segment headers; the
    /// last segment header is followed by the data for the first segment,
    /// then the data for the second segment, and so on." (D.2)
    fn read_random_access(&mut self, reader: &mut Reader<'_>) -> Result<()> {
        let mut pending: BTreeMap<u32, Segment> = BTreeMap::new();

        // "If a file contains an end of file segment, it must be the last
        // segment." (7.4.11)
        loop {
            let segment = parse_segment_header(reader)?;
            self.registry.note_association(&segment);

            let number = segment.number;
            let is_end_of_file = segment.kind == SegmentKind::EndOfFile;
            if pending.insert(number, segment).is_some() {
                return Err(Error::DuplicateSegment(number));
            }
            if is_end_of_file {
                break;
            }
        }

        // Data parts follow, read in ascending segment number order.
        for (_, mut segment) in pending {
            read_payload(&mut segment, reader)?;
            self.finish_segment(segment)?;
        }

        Ok(())
    }

    /// Extract page dimensions from a page information payload, then hand
    /// the segment over to the catalog.
    fn finish_segment(&mut self, segment: Segment) -> Result<()> {
        if segment.kind == SegmentKind::PageInformation {
            match segment.association {
                Association::Page(number) => {
                    let (width, height) = page_bitmap_size(&segment)?;
                    self.registry.set_page_bitmap_size(number, width, height);
                }
                Association::Global => {
                    // A page information segment must belong to a page; a
                    // global one has no record to carry its dimensions.
                    log::warn!(
                        "page information segment {} is not associated with a page",
                        segment.number
                    );
                }
            }
        }

        self.registry.adopt(segment)
    }

    /// The number of pages observed during the read pass.
    ///
    /// This is driven by segment associations, not by the declared count in
    /// the file header (see [`FileHeader::number_of_pages`]).
    pub fn number_of_pages(&self) -> usize {
        self.registry.pages.len()
    }

    /// The catalogued page with the given number, if any.
    pub fn page(&self, number: u32) -> Option<&Page> {
        self.registry.pages.get(&number)
    }

    /// The bitmap width of the given page, once its page information
    /// segment has been read.
    pub fn page_width(&self, number: u32) -> Option<u32> {
        self.page(number)?.width()
    }

    /// The bitmap height of the given page, once its page information
    /// segment has been read.
    pub fn page_height(&self, number: u32) -> Option<u32> {
        self.page(number)?.height()
    }

    /// The byte stream for one page: its segments in ascending segment
    /// number order, headers followed by payloads.
    ///
    /// With `for_embedding`, end of file and end of page segments are
    /// skipped and every page association is rewritten to 1, as PDF's
    /// embedded organization requires. Returns `None` for an unknown page
    /// number.
    pub fn page_data(&self, number: u32, for_embedding: bool) -> Option<Vec<u8>> {
        Some(self.page(number)?.data(for_embedding))
    }

    /// The byte stream of global segments, in ascending segment number
    /// order, or `None` if it would be empty.
    ///
    /// This is the stream a PDF writer passes as `/JBIG2Globals`.
    pub fn global_data(&self, for_embedding: bool) -> Option<Vec<u8>> {
        self.registry.global_data(for_embedding)
    }

    /// The parsed file header, available after a successful read.
    pub fn file_header(&self) -> Option<&FileHeader> {
        self.file_header.as_ref()
    }
}

impl Default for SegmentReader {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SegmentReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state {
            ReaderState::Read => {
                write!(f, "JBIG2 segment reader: {} pages", self.number_of_pages())
            }
            _ => write!(f, "JBIG2 segment reader in indeterminate state"),
        }
    }
}
