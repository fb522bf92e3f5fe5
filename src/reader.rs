/// A cursor for reading big-endian values from a byte stream.
#[derive(Debug, Clone)]
pub(crate) struct Reader<'a> {
    /// The underlying data.
    data: &'a [u8],
    /// The position in bytes.
    pos: usize,
}

impl<'a> Reader<'a> {
    #[inline(always)]
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[inline(always)]
    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// The current position, in bytes from the start of the stream.
    #[inline(always)]
    pub(crate) fn offset(&self) -> usize {
        self.pos
    }

    /// The number of bytes left in the stream.
    #[inline(always)]
    pub(crate) fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// The bytes consumed since `start`, which must be a previously
    /// observed offset.
    #[inline(always)]
    pub(crate) fn span_from(&self, start: usize) -> &'a [u8] {
        &self.data[start..self.pos]
    }

    /// Read the given number of bytes.
    #[inline(always)]
    pub(crate) fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let bytes = self.data.get(self.pos..end)?;
        self.pos = end;

        Some(bytes)
    }

    /// Read a single byte.
    #[inline(always)]
    pub(crate) fn read_byte(&mut self) -> Option<u8> {
        let byte = self.data.get(self.pos).copied()?;
        self.pos += 1;

        Some(byte)
    }

    /// Read an u16 number.
    #[inline(always)]
    pub(crate) fn read_u16(&mut self) -> Option<u16> {
        Some(u16::from_be_bytes(self.read_bytes(2)?.try_into().ok()?))
    }

    /// Read an u32 number.
    #[inline(always)]
    pub(crate) fn read_u32(&mut self) -> Option<u32> {
        Some(u32::from_be_bytes(self.read_bytes(4)?.try_into().ok()?))
    }
}
