//! Position-tracking little-endian cursors over host streams.
//!
//! ```text
//!   ByteReader<R: BufRead>          ByteWriter<W: Write>
//!   ├── peek()  (fill_buf, no consume)   ├── write_u8/u16/u32/...
//!   ├── read_u8/u16/u32/...              ├── write_raw(bytes)
//!   ├── read_raw(n) / skip(n)            └── position()
//!   └── position()
//! ```
//!
//! Both cursors are forward-only. Errors are plain `io::Error`; the node codec
//! decides whether a short read is a framing or a payload problem.

use std::io::{self, BufRead, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// Forward-only reader with a byte offset.
#[derive(Debug)]
pub struct ByteReader<R> {
    inner: R,
    position: u64,
}

impl<R: BufRead> ByteReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, position: 0 }
    }

    /// Bytes consumed so far.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.position
    }

    /// Next byte without consuming it; `None` at end of data.
    pub fn peek(&mut self) -> io::Result<Option<u8>> {
        Ok(self.inner.fill_buf()?.first().copied())
    }

    pub fn at_end(&mut self) -> io::Result<bool> {
        Ok(self.peek()?.is_none())
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        let v = self.inner.read_u8()?;
        self.position += 1;
        Ok(v)
    }

    pub fn read_u16(&mut self) -> io::Result<u16> {
        let v = self.inner.read_u16::<LittleEndian>()?;
        self.position += 2;
        Ok(v)
    }

    pub fn read_i16(&mut self) -> io::Result<i16> {
        let v = self.inner.read_i16::<LittleEndian>()?;
        self.position += 2;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> io::Result<u32> {
        let v = self.inner.read_u32::<LittleEndian>()?;
        self.position += 4;
        Ok(v)
    }

    pub fn read_i64(&mut self) -> io::Result<i64> {
        let v = self.inner.read_i64::<LittleEndian>()?;
        self.position += 8;
        Ok(v)
    }

    pub fn read_f32(&mut self) -> io::Result<f32> {
        let v = self.inner.read_f32::<LittleEndian>()?;
        self.position += 4;
        Ok(v)
    }

    /// Exactly `n` bytes.
    pub fn read_raw(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.inner.read_exact(&mut buf)?;
        self.position += n as u64;
        Ok(buf)
    }

    /// Discard exactly `n` bytes.
    pub fn skip(&mut self, n: u64) -> io::Result<()> {
        let copied = io::copy(&mut self.inner.by_ref().take(n), &mut io::sink())?;
        self.position += copied;
        if copied < n {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("skip wanted {n} bytes, got {copied}"),
            ));
        }
        Ok(())
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Forward-only writer with a byte offset.
#[derive(Debug)]
pub struct ByteWriter<W> {
    inner: W,
    position: u64,
}

impl<W: Write> ByteWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, position: 0 }
    }

    /// Bytes produced so far.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.position
    }

    pub fn write_u8(&mut self, v: u8) -> io::Result<()> {
        self.inner.write_u8(v)?;
        self.position += 1;
        Ok(())
    }

    pub fn write_u16(&mut self, v: u16) -> io::Result<()> {
        self.inner.write_u16::<LittleEndian>(v)?;
        self.position += 2;
        Ok(())
    }

    pub fn write_i16(&mut self, v: i16) -> io::Result<()> {
        self.inner.write_i16::<LittleEndian>(v)?;
        self.position += 2;
        Ok(())
    }

    pub fn write_u32(&mut self, v: u32) -> io::Result<()> {
        self.inner.write_u32::<LittleEndian>(v)?;
        self.position += 4;
        Ok(())
    }

    pub fn write_i64(&mut self, v: i64) -> io::Result<()> {
        self.inner.write_i64::<LittleEndian>(v)?;
        self.position += 8;
        Ok(())
    }

    pub fn write_f32(&mut self, v: f32) -> io::Result<()> {
        self.inner.write_f32::<LittleEndian>(v)?;
        self.position += 4;
        Ok(())
    }

    pub fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_layout() {
        let mut w = ByteWriter::new(Vec::new());
        w.write_u16(0x1234).unwrap();
        w.write_u32(0xAABB_CCDD).unwrap();
        assert_eq!(w.position(), 6);
        assert_eq!(w.into_inner(), vec![0x34, 0x12, 0xDD, 0xCC, 0xBB, 0xAA]);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let data = [7u8, 8];
        let mut r = ByteReader::new(&data[..]);
        assert_eq!(r.peek().unwrap(), Some(7));
        assert_eq!(r.peek().unwrap(), Some(7));
        assert_eq!(r.position(), 0);
        assert_eq!(r.read_u8().unwrap(), 7);
        assert_eq!(r.read_u8().unwrap(), 8);
        assert_eq!(r.peek().unwrap(), None);
        assert!(r.at_end().unwrap());
    }

    #[test]
    fn test_short_read_is_eof() {
        let data = [1u8];
        let mut r = ByteReader::new(&data[..]);
        let err = r.read_u16().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_skip_past_end() {
        let data = [1u8, 2, 3];
        let mut r = ByteReader::new(&data[..]);
        r.skip(2).unwrap();
        assert_eq!(r.position(), 2);
        assert!(r.skip(5).is_err());
    }

    #[test]
    fn test_signed_and_float() {
        let mut w = ByteWriter::new(Vec::new());
        w.write_i16(-3).unwrap();
        w.write_i64(-1_000_000_000_000).unwrap();
        w.write_f32(1.5).unwrap();
        let bytes = w.into_inner();
        let mut r = ByteReader::new(bytes.as_slice());
        assert_eq!(r.read_i16().unwrap(), -3);
        assert_eq!(r.read_i64().unwrap(), -1_000_000_000_000);
        assert!((r.read_f32().unwrap() - 1.5).abs() < f32::EPSILON);
        assert!(r.at_end().unwrap());
    }
}
