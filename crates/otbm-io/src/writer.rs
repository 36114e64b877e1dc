//! Node writer: the mirror of [`crate::reader::NodeReader`].
//!
//! Lengths are always computed here, never supplied by the caller. Attribute
//! ids that collide with a structural byte and payloads longer than the
//! 16-bit length field are rejected before anything is written.

use std::io::{self, Write};

use crate::attribute::EncodePrimitive;
use crate::cursor::ByteWriter;
use crate::error::{OtbmError, OtbmResult, StreamStatus};
use crate::ids::{NODE_END, NODE_START, is_structural};
use crate::item::{ItemContext, NodeItem};

pub struct NodeWriter<W> {
    cursor: ByteWriter<W>,
    depth: usize,
    status: StreamStatus,
}

impl<W: Write> NodeWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            cursor: ByteWriter::new(inner),
            depth: 0,
            status: StreamStatus::Ok,
        }
    }

    #[inline]
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    #[must_use]
    pub const fn status(&self) -> StreamStatus {
        self.status
    }

    #[inline]
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.cursor.position()
    }

    pub fn begin_node(&mut self, ty: impl Into<u8>) -> OtbmResult<()> {
        let ty = ty.into();
        self.emit(|c| {
            c.write_u8(NODE_START)?;
            c.write_u8(ty)
        })?;
        self.depth += 1;
        Ok(())
    }

    pub fn end_node(&mut self) -> OtbmResult<()> {
        if self.depth == 0 {
            return Err(OtbmError::MalformedStream {
                offset: self.cursor.position(),
                reason: "end_node without a matching begin_node".into(),
            });
        }
        self.emit(|c| c.write_u8(NODE_END))?;
        self.depth -= 1;
        Ok(())
    }

    /// Emit `[id][len u16][payload]`.
    pub fn write_attribute<T: EncodePrimitive + ?Sized>(
        &mut self,
        id: u8,
        value: &T,
    ) -> OtbmResult<()> {
        if is_structural(id) {
            return Err(OtbmError::ReservedAttributeId(id));
        }
        let len = value.encoded_len();
        let Ok(len16) = u16::try_from(len) else {
            return Err(OtbmError::PayloadTooLarge { len });
        };
        self.emit(|c| {
            c.write_u8(id)?;
            c.write_u16(len16)?;
            value.encode(c)
        })
    }

    pub fn write_byte(&mut self, id: u8, v: u8) -> OtbmResult<()> {
        self.write_attribute(id, &v)
    }

    pub fn write_u16(&mut self, id: u8, v: u16) -> OtbmResult<()> {
        self.write_attribute(id, &v)
    }

    pub fn write_u32(&mut self, id: u8, v: u32) -> OtbmResult<()> {
        self.write_attribute(id, &v)
    }

    pub fn write_string(&mut self, id: u8, v: &str) -> OtbmResult<()> {
        self.write_attribute(id, v)
    }

    pub fn write_blob(&mut self, id: u8, v: &[u8]) -> OtbmResult<()> {
        self.write_attribute(id, v)
    }

    /// Raw bytes, no id or length.
    pub fn write_data(&mut self, bytes: &[u8]) -> OtbmResult<()> {
        self.emit(|c| c.write_raw(bytes))
    }

    pub fn write_raw_u8(&mut self, v: u8) -> OtbmResult<()> {
        self.emit(|c| c.write_u8(v))
    }

    pub fn write_raw_u16(&mut self, v: u16) -> OtbmResult<()> {
        self.emit(|c| c.write_u16(v))
    }

    pub fn write_raw_i16(&mut self, v: i16) -> OtbmResult<()> {
        self.emit(|c| c.write_i16(v))
    }

    pub fn write_raw_u32(&mut self, v: u32) -> OtbmResult<()> {
        self.emit(|c| c.write_u32(v))
    }

    /// Inline `[len u16][utf-8]` text, as used in node headers.
    pub fn write_raw_string(&mut self, v: &str) -> OtbmResult<()> {
        let Ok(len) = u16::try_from(v.len()) else {
            return Err(OtbmError::PayloadTooLarge { len: v.len() });
        };
        self.emit(|c| {
            c.write_u16(len)?;
            c.write_raw(v.as_bytes())
        })
    }

    /// Let the item serialize its own node.
    pub fn write_item_node<I: NodeItem + ?Sized>(
        &mut self,
        item: &I,
        ctx: &ItemContext,
    ) -> OtbmResult<()> {
        item.write_node(self, ctx)
    }

    /// Require every node closed, flush, and return the sink.
    pub fn finish(mut self) -> OtbmResult<W> {
        self.guard()?;
        if self.depth != 0 {
            return Err(OtbmError::MalformedStream {
                offset: self.cursor.position(),
                reason: format!("{} node(s) left open", self.depth),
            });
        }
        self.emit(ByteWriter::flush)?;
        Ok(self.cursor.into_inner())
    }

    fn emit(&mut self, f: impl FnOnce(&mut ByteWriter<W>) -> io::Result<()>) -> OtbmResult<()> {
        self.guard()?;
        f(&mut self.cursor).map_err(|e| {
            self.status = StreamStatus::IoFailure;
            OtbmError::Io(e)
        })
    }

    fn guard(&self) -> OtbmResult<()> {
        match self.status {
            StreamStatus::Ok => Ok(()),
            status => Err(OtbmError::Poisoned(status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{ESCAPE, NodeType, attr};
    use crate::reader::NodeReader;

    #[test]
    fn test_node_framing() {
        let mut w = NodeWriter::new(Vec::new());
        w.begin_node(NodeType::Root).unwrap();
        w.begin_node(NodeType::MapData).unwrap();
        assert_eq!(w.depth(), 2);
        w.end_node().unwrap();
        w.end_node().unwrap();
        let bytes = w.finish().unwrap();
        assert_eq!(bytes, vec![NODE_START, 1, NODE_START, 2, NODE_END, NODE_END]);
    }

    #[test]
    fn test_writer_computes_lengths() {
        let mut w = NodeWriter::new(Vec::new());
        w.begin_node(NodeType::Item).unwrap();
        w.write_u16(attr::ACTION_ID, 0x0102).unwrap();
        w.write_string(attr::TEXT, "abc").unwrap();
        w.end_node().unwrap();
        let bytes = w.finish().unwrap();
        assert_eq!(
            bytes,
            vec![
                NODE_START, 6, attr::ACTION_ID, 2, 0, 0x02, 0x01, attr::TEXT, 3, 0, b'a', b'b',
                b'c', NODE_END
            ]
        );
    }

    #[test]
    fn test_fixed_width_lengths_read_back() {
        let mut w = NodeWriter::new(Vec::new());
        w.begin_node(NodeType::Item).unwrap();
        w.write_byte(attr::COUNT, 3).unwrap();
        w.write_u16(attr::UNIQUE_ID, 500).unwrap();
        w.write_u32(attr::DURATION, 70_000).unwrap();
        w.end_node().unwrap();
        let bytes = w.finish().unwrap();

        // each declared length equals the primitive width
        assert_eq!(u16::from_le_bytes([bytes[3], bytes[4]]), 1);
        assert_eq!(u16::from_le_bytes([bytes[7], bytes[8]]), 2);
        assert_eq!(u16::from_le_bytes([bytes[12], bytes[13]]), 4);

        let mut r = NodeReader::new(bytes.as_slice());
        r.enter_node().unwrap();
        assert_eq!(r.next_attribute_id().unwrap(), Some(attr::COUNT));
        assert_eq!(r.read_byte().unwrap(), 3);
        assert_eq!(r.next_attribute_id().unwrap(), Some(attr::UNIQUE_ID));
        assert_eq!(r.read_u16().unwrap(), 500);
        assert_eq!(r.next_attribute_id().unwrap(), Some(attr::DURATION));
        assert_eq!(r.read_u32().unwrap(), 70_000);
        assert_eq!(r.next_attribute_id().unwrap(), None);
        r.leave_node().unwrap();
        r.finish().unwrap();
    }

    #[test]
    fn test_reserved_attribute_ids() {
        let mut w = NodeWriter::new(Vec::new());
        for id in [NODE_START, NODE_END, ESCAPE] {
            assert!(matches!(
                w.write_byte(id, 0),
                Err(OtbmError::ReservedAttributeId(x)) if x == id
            ));
        }
        assert_eq!(w.position(), 0);
    }

    #[test]
    fn test_payload_too_large() {
        let mut w = NodeWriter::new(Vec::new());
        let big = vec![0u8; 70_000];
        assert!(matches!(
            w.write_blob(attr::ATTRIBUTE_MAP, &big),
            Err(OtbmError::PayloadTooLarge { len: 70_000 })
        ));
        assert_eq!(w.status(), StreamStatus::Ok);
    }

    #[test]
    fn test_unbalanced() {
        let mut w = NodeWriter::new(Vec::new());
        assert!(w.end_node().is_err());
        w.begin_node(NodeType::Root).unwrap();
        assert!(w.finish().is_err());
    }
}
