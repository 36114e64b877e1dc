//! Binary node-tree codec for OTBM map files.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ NodeReader / NodeWriter   (tree framing)     │
//! │   enter/leave, attributes, read_item         │
//! ├──────────────────────────────────────────────┤
//! │ DecodePrimitive / EncodePrimitive            │
//! │   u8, u16, u32, text, blob (length-checked)  │
//! ├──────────────────────────────────────────────┤
//! │ ByteReader / ByteWriter   (little-endian)    │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Wire layout of a node:
//!
//! ```text
//! 0xFC [type u8] ([attr u8][len u16][payload])* (child node)* 0xFD
//! ```
//!
//! The codec knows nothing about maps or items beyond the
//! [`ItemFactory`]/[`NodeItem`] seam; the map model lives in `otbm-map`.

pub mod attribute;
pub mod cursor;
pub mod error;
pub mod ids;
pub mod item;
pub mod reader;
pub mod version;
pub mod writer;

pub use attribute::{Blob, DecodePrimitive, EncodePrimitive};
pub use cursor::{ByteReader, ByteWriter};
pub use error::{OtbmError, OtbmResult, StreamStatus};
pub use ids::{ESCAPE, NODE_END, NODE_START, NodeType};
pub use item::{ItemContext, ItemFactory, ItemGroup, ItemProperties, NodeItem};
pub use reader::NodeReader;
pub use version::{ClientVersion, FormatVersion};
pub use writer::NodeWriter;
