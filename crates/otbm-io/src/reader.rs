//! Node reader: tree framing over a [`ByteReader`].
//!
//! ```text
//! Idle ──enter_node()──► InNode(1) ──enter_node()/next_child()──► InNode(2) ...
//!   ▲                        │
//!   └──────leave_node()──────┘
//! ```
//!
//! The reader never skips content on its own. Before `leave_node` the caller
//! must have drained every attribute (`next_attribute_id` returned `None`) and
//! consumed every child node. The first fatal error poisons the reader; all
//! later calls fail with [`OtbmError::Poisoned`].

use std::io::{self, BufRead};

use tracing::debug;

use crate::attribute::{Blob, DecodePrimitive};
use crate::cursor::ByteReader;
use crate::error::{OtbmError, OtbmResult, StreamStatus};
use crate::ids::{ESCAPE, NODE_END, NODE_START};
use crate::item::{ItemContext, ItemFactory, NodeItem};

/// Where a short read happened; decides which error it becomes.
#[derive(Clone, Copy)]
enum Expecting {
    Marker,
    Payload,
}

pub struct NodeReader<R> {
    cursor: ByteReader<R>,
    stack: Vec<u8>,
    status: StreamStatus,
}

impl<R: BufRead> NodeReader<R> {
    pub fn new(inner: R) -> Self {
        Self::from_cursor(ByteReader::new(inner))
    }

    pub fn from_cursor(cursor: ByteReader<R>) -> Self {
        Self {
            cursor,
            stack: Vec::with_capacity(16),
            status: StreamStatus::Ok,
        }
    }

    /// Current nesting depth.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Type of the innermost open node.
    #[inline]
    #[must_use]
    pub fn current_type(&self) -> Option<u8> {
        self.stack.last().copied()
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

    /// Expect a node-start marker and a type byte; returns the type.
    pub fn enter_node(&mut self) -> OtbmResult<u8> {
        self.guard()?;
        let result = self.enter_node_inner();
        self.track(result)
    }

    /// Enter the next child if one starts here; `None` at the parent's end marker.
    ///
    /// The end marker is left in place for [`NodeReader::leave_node`].
    pub fn next_child(&mut self) -> OtbmResult<Option<u8>> {
        self.guard()?;
        let result = match self.cursor.peek() {
            Ok(Some(NODE_START)) => self.enter_node_inner().map(Some),
            Ok(Some(NODE_END)) => Ok(None),
            Ok(Some(other)) => Err(self.malformed(format!(
                "expected child node or end marker, found {other:#04x} (unconsumed attributes?)"
            ))),
            Ok(None) => Err(self.malformed("end of data inside an open node")),
            Err(e) => Err(self.io_error(e, Expecting::Marker)),
        };
        self.track(result)
    }

    /// Expect a node-end marker at the current position and pop the stack.
    pub fn leave_node(&mut self) -> OtbmResult<()> {
        self.guard()?;
        let result = self.leave_node_inner();
        self.track(result)
    }

    /// Consume and return the next attribute id, or `None` at a node marker.
    pub fn next_attribute_id(&mut self) -> OtbmResult<Option<u8>> {
        self.guard()?;
        let result = match self.cursor.peek() {
            Ok(Some(NODE_START | NODE_END)) => Ok(None),
            Ok(Some(ESCAPE)) => Err(self.malformed("escape byte where an attribute id was expected")),
            Ok(Some(_)) => self
                .cursor
                .read_u8()
                .map(Some)
                .map_err(|e| self.io_error(e, Expecting::Marker)),
            Ok(None) => Err(self.malformed("end of data inside an open node")),
            Err(e) => Err(self.io_error(e, Expecting::Marker)),
        };
        self.track(result)
    }

    /// Read a length-prefixed attribute payload, validating fixed widths.
    pub fn read_attribute<T: DecodePrimitive>(&mut self) -> OtbmResult<T> {
        self.guard()?;
        let result = self.read_attribute_inner::<T>();
        self.track(result)
    }

    pub fn read_byte(&mut self) -> OtbmResult<u8> {
        self.read_attribute()
    }

    pub fn read_u16(&mut self) -> OtbmResult<u16> {
        self.read_attribute()
    }

    pub fn read_u32(&mut self) -> OtbmResult<u32> {
        self.read_attribute()
    }

    pub fn read_string(&mut self) -> OtbmResult<String> {
        self.read_attribute()
    }

    pub fn read_blob(&mut self) -> OtbmResult<Vec<u8>> {
        self.read_attribute::<Blob>().map(|b| b.0)
    }

    /// Skip an attribute payload whose id was already consumed.
    pub fn skip_attribute(&mut self) -> OtbmResult<()> {
        self.guard()?;
        let result = self
            .cursor
            .read_u16()
            .and_then(|len| self.cursor.skip(u64::from(len)))
            .map_err(|e| self.io_error(e, Expecting::Payload));
        self.track(result)
    }

    /// Exactly `n` raw bytes, no length field.
    pub fn read_data(&mut self, n: usize) -> OtbmResult<Vec<u8>> {
        self.raw(|c| c.read_raw(n))
    }

    pub fn read_raw_u8(&mut self) -> OtbmResult<u8> {
        self.raw(ByteReader::read_u8)
    }

    pub fn read_raw_u16(&mut self) -> OtbmResult<u16> {
        self.raw(ByteReader::read_u16)
    }

    pub fn read_raw_i16(&mut self) -> OtbmResult<i16> {
        self.raw(ByteReader::read_i16)
    }

    pub fn read_raw_u32(&mut self) -> OtbmResult<u32> {
        self.raw(ByteReader::read_u32)
    }

    /// Inline `[len u16][utf-8]` text, as used in node headers.
    pub fn read_raw_string(&mut self) -> OtbmResult<String> {
        self.raw(|c| {
            let len = c.read_u16()?;
            String::decode(c, len)
        })
    }

    /// Read an item header and its attributes.
    ///
    /// The caller has already entered the item node and owns the matching
    /// `leave_node`, plus any child item nodes in between.
    pub fn read_item<F: ItemFactory>(
        &mut self,
        factory: &F,
        ctx: &ItemContext,
    ) -> OtbmResult<F::Item> {
        let id = self.read_raw_u16()?;
        let Some(mut item) = factory.create_item(id) else {
            return self.track(Err(OtbmError::UnknownItem(id)));
        };

        if ctx.format.has_inline_subtype()
            && factory.properties(id).is_some_and(|p| p.has_subtype())
        {
            let subtype = self.read_raw_u8()?;
            item.set_legacy_subtype(subtype);
        }

        let result = item.read_attributes(self, ctx);
        self.track(result)?;
        Ok(item)
    }

    /// Require a balanced stack and hand back the cursor.
    pub fn finish(self) -> OtbmResult<ByteReader<R>> {
        self.guard()?;
        if !self.stack.is_empty() {
            let err = self.malformed(format!("{} node(s) left open", self.stack.len()));
            return Err(err);
        }
        Ok(self.cursor)
    }

    fn enter_node_inner(&mut self) -> OtbmResult<u8> {
        let marker = self
            .cursor
            .read_u8()
            .map_err(|e| self.io_error(e, Expecting::Marker))?;
        if marker != NODE_START {
            return Err(self.malformed(format!(
                "expected node start {NODE_START:#04x}, found {marker:#04x}"
            )));
        }
        let ty = self
            .cursor
            .read_u8()
            .map_err(|e| self.io_error(e, Expecting::Marker))?;
        self.stack.push(ty);
        Ok(ty)
    }

    fn leave_node_inner(&mut self) -> OtbmResult<()> {
        if self.stack.is_empty() {
            return Err(self.malformed("leave_node with an empty node stack"));
        }
        let marker = self
            .cursor
            .read_u8()
            .map_err(|e| self.io_error(e, Expecting::Marker))?;
        if marker != NODE_END {
            return Err(self.malformed(format!(
                "expected node end {NODE_END:#04x}, found {marker:#04x}"
            )));
        }
        self.stack.pop();
        Ok(())
    }

    fn read_attribute_inner<T: DecodePrimitive>(&mut self) -> OtbmResult<T> {
        let start = self.cursor.position();
        let len = self
            .cursor
            .read_u16()
            .map_err(|e| self.io_error(e, Expecting::Payload))?;
        if let Some(width) = T::WIDTH {
            if len != width {
                return Err(OtbmError::CorruptData {
                    offset: start,
                    reason: format!("{} attribute declares {len} bytes, expected {width}", T::NAME),
                });
            }
        }
        T::decode(&mut self.cursor, len).map_err(|e| self.io_error(e, Expecting::Payload))
    }

    fn raw<T>(&mut self, f: impl FnOnce(&mut ByteReader<R>) -> io::Result<T>) -> OtbmResult<T> {
        self.guard()?;
        let result = f(&mut self.cursor).map_err(|e| self.io_error(e, Expecting::Payload));
        self.track(result)
    }

    fn guard(&self) -> OtbmResult<()> {
        match self.status {
            StreamStatus::Ok => Ok(()),
            status => Err(OtbmError::Poisoned(status)),
        }
    }

    fn track<T>(&mut self, result: OtbmResult<T>) -> OtbmResult<T> {
        if let Err(err) = &result {
            if err.is_fatal() && self.status == StreamStatus::Ok {
                debug!(offset = self.cursor.position(), depth = self.stack.len(), %err, "node reader poisoned");
                self.status = err.status();
            }
        }
        result
    }

    fn malformed(&self, reason: impl Into<String>) -> OtbmError {
        OtbmError::MalformedStream {
            offset: self.cursor.position(),
            reason: reason.into(),
        }
    }

    fn io_error(&self, err: io::Error, expecting: Expecting) -> OtbmError {
        let offset = self.cursor.position();
        match (err.kind(), expecting) {
            (io::ErrorKind::UnexpectedEof, Expecting::Marker) => OtbmError::MalformedStream {
                offset,
                reason: "unexpected end of data while expecting a marker".into(),
            },
            (io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData, _) => {
                OtbmError::CorruptData {
                    offset,
                    reason: err.to_string(),
                }
            }
            _ => OtbmError::Io(err),
        }
    }
}
