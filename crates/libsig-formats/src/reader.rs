//! Bounds-checked reading of little-endian fields.
//!
//! All offset arithmetic in the crate funnels through [`Reader`], so an
//! overrun is always an explicit [`ParseError::TruncatedData`] and never an
//! out-of-bounds index.

use crate::ParseError;

/// A forward-only cursor over a byte slice.
#[derive(Clone, Copy)]
pub struct Reader<'data> {
    data: &'data [u8],
    pos: usize,
    context: &'static str,
}

impl<'data> Reader<'data> {
    /// Creates a reader at the start of `data`. `context` names the structure
    /// being parsed and appears in truncation errors.
    pub fn new(data: &'data [u8], context: &'static str) -> Self {
        Self {
            data,
            pos: 0,
            context,
        }
    }

    /// Bytes left between the cursor and the end of the slice.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Takes the next `len` bytes.
    pub fn bytes(&mut self, len: usize) -> Result<&'data [u8], ParseError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(ParseError::TruncatedData {
                expected: len,
                actual: self.remaining(),
                context: self.context,
            })?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    /// Advances the cursor without looking at the bytes.
    pub fn skip(&mut self, len: usize) -> Result<(), ParseError> {
        self.bytes(len).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ParseError> {
        let bytes = self.bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_i16(&mut self) -> Result<i16, ParseError> {
        let bytes = self.bytes(2)?;
        Ok(i16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, ParseError> {
        let bytes = self.bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}
