//! Typed attribute payloads.
//!
//! An attribute on the wire is `[id u8][len u16][payload]`. Fixed-width
//! primitives declare their width and the reader rejects any other length;
//! self-sized primitives (text, blobs) take the declared length as their size.

use std::io::{self, BufRead, Write};

use crate::cursor::{ByteReader, ByteWriter};

/// A value that can be decoded from an attribute payload.
pub trait DecodePrimitive: Sized {
    /// Name used in diagnostics.
    const NAME: &'static str;
    /// Exact payload width, or `None` when the length field is authoritative.
    const WIDTH: Option<u16>;

    /// Decode a payload of `len` bytes. `len` already matches `WIDTH` when set.
    fn decode<R: BufRead>(cursor: &mut ByteReader<R>, len: u16) -> io::Result<Self>;
}

/// A value that can be encoded as an attribute payload.
pub trait EncodePrimitive {
    /// Payload size in bytes; may exceed `u16::MAX`, the writer checks.
    fn encoded_len(&self) -> usize;

    fn encode<W: Write>(&self, cursor: &mut ByteWriter<W>) -> io::Result<()>;
}

macro_rules! fixed_primitive {
    ($ty:ty, $name:literal, $width:literal, $read:ident, $write:ident) => {
        impl DecodePrimitive for $ty {
            const NAME: &'static str = $name;
            const WIDTH: Option<u16> = Some($width);

            #[inline]
            fn decode<R: BufRead>(cursor: &mut ByteReader<R>, _len: u16) -> io::Result<Self> {
                cursor.$read()
            }
        }

        impl EncodePrimitive for $ty {
            #[inline]
            fn encoded_len(&self) -> usize {
                $width
            }

            #[inline]
            fn encode<W: Write>(&self, cursor: &mut ByteWriter<W>) -> io::Result<()> {
                cursor.$write(*self)
            }
        }
    };
}

fixed_primitive!(u8, "byte", 1, read_u8, write_u8);
fixed_primitive!(u16, "u16", 2, read_u16, write_u16);
fixed_primitive!(u32, "u32", 4, read_u32, write_u32);

impl DecodePrimitive for String {
    const NAME: &'static str = "string";
    const WIDTH: Option<u16> = None;

    fn decode<R: BufRead>(cursor: &mut ByteReader<R>, len: u16) -> io::Result<Self> {
        let bytes = cursor.read_raw(usize::from(len))?;
        Self::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl EncodePrimitive for str {
    fn encoded_len(&self) -> usize {
        self.len()
    }

    fn encode<W: Write>(&self, cursor: &mut ByteWriter<W>) -> io::Result<()> {
        cursor.write_raw(self.as_bytes())
    }
}

impl EncodePrimitive for String {
    fn encoded_len(&self) -> usize {
        self.len()
    }

    fn encode<W: Write>(&self, cursor: &mut ByteWriter<W>) -> io::Result<()> {
        cursor.write_raw(self.as_bytes())
    }
}

/// Opaque payload bytes (teleport destinations, outfits, attribute maps).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Blob(pub Vec<u8>);

impl DecodePrimitive for Blob {
    const NAME: &'static str = "blob";
    const WIDTH: Option<u16> = None;

    fn decode<R: BufRead>(cursor: &mut ByteReader<R>, len: u16) -> io::Result<Self> {
        cursor.read_raw(usize::from(len)).map(Blob)
    }
}

impl EncodePrimitive for [u8] {
    fn encoded_len(&self) -> usize {
        self.len()
    }

    fn encode<W: Write>(&self, cursor: &mut ByteWriter<W>) -> io::Result<()> {
        cursor.write_raw(self)
    }
}

impl EncodePrimitive for Blob {
    fn encoded_len(&self) -> usize {
        self.0.len()
    }

    fn encode<W: Write>(&self, cursor: &mut ByteWriter<W>) -> io::Result<()> {
        cursor.write_raw(&self.0)
    }
}
