/// A read ran past the end of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unexpected end of input: needed {needed} bytes at offset {offset}, {available} available")]
pub struct UnexpectedEof {
    pub offset: usize,
    pub needed: usize,
    pub available: usize,
}

/// Forward-only little-endian reader over an immutable byte slice.
///
/// Every read is bounds-checked and fails with [`UnexpectedEof`] instead of
/// reading past the end. The cursor does not advance on a failed read.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current offset from the start of the buffer.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Borrow the next `n` bytes and advance past them.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], UnexpectedEof> {
        if n > self.remaining() {
            return Err(UnexpectedEof {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], UnexpectedEof> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), UnexpectedEof> {
        self.read_bytes(n).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8, UnexpectedEof> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u32(&mut self) -> Result<u32, UnexpectedEof> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, UnexpectedEof> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, UnexpectedEof> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, UnexpectedEof> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_fields_in_order() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        bytes.push(7);
        bytes.extend_from_slice(&(-2i32).to_le_bytes());
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        bytes.extend_from_slice(&1.5f32.to_le_bytes());

        let mut c = ByteCursor::new(&bytes);
        assert_eq!(c.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(c.read_u8().unwrap(), 7);
        assert_eq!(c.read_i32().unwrap(), -2);
        assert_eq!(c.read_u64().unwrap(), u64::MAX);
        assert_eq!(c.read_f32().unwrap(), 1.5);
        assert!(c.is_empty());
    }

    #[test]
    fn short_read_fails_without_advancing() {
        let bytes = [1u8, 2, 3];
        let mut c = ByteCursor::new(&bytes);
        c.skip(1).unwrap();

        let err = c.read_u32().unwrap_err();
        assert_eq!(
            err,
            UnexpectedEof {
                offset: 1,
                needed: 4,
                available: 2
            }
        );
        assert_eq!(c.position(), 1);
        assert_eq!(c.read_bytes(2).unwrap(), &[2, 3]);
    }

    #[test]
    fn skip_past_end_is_an_error() {
        let mut c = ByteCursor::new(&[0u8; 4]);
        assert!(c.skip(5).is_err());
        assert!(c.skip(4).is_ok());
        assert!(c.read_u8().is_err());
    }
}
