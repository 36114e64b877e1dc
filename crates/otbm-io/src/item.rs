//! Collaborator seams between the codec and a concrete item model.
//!
//! The reader only knows how to frame an item node; what an item *is* comes
//! from an [`ItemFactory`] and the [`NodeItem`] capability it produces.

use std::io::{BufRead, Write};

use crate::error::OtbmResult;
use crate::reader::NodeReader;
use crate::version::FormatVersion;
use crate::writer::NodeWriter;

/// Broad item category, as carried by the item-type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ItemGroup {
    #[default]
    None,
    Ground,
    Container,
    Weapon,
    Ammunition,
    Armor,
    Charges,
    Teleport,
    MagicField,
    Writeable,
    Key,
    Splash,
    Fluid,
    Door,
    Depot,
    Podium,
}

impl ItemGroup {
    /// Parse the lowercase name used in item-type tables.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "none" => Self::None,
            "ground" => Self::Ground,
            "container" => Self::Container,
            "weapon" => Self::Weapon,
            "ammunition" => Self::Ammunition,
            "armor" => Self::Armor,
            "charges" => Self::Charges,
            "teleport" => Self::Teleport,
            "magicfield" => Self::MagicField,
            "writeable" => Self::Writeable,
            "key" => Self::Key,
            "splash" => Self::Splash,
            "fluid" => Self::Fluid,
            "door" => Self::Door,
            "depot" => Self::Depot,
            "podium" => Self::Podium,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn is_fluid_like(self) -> bool {
        matches!(self, Self::Fluid | Self::Splash)
    }
}

/// What the codec needs to know about an item type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemProperties {
    pub stackable: bool,
    pub group: ItemGroup,
}

impl ItemProperties {
    /// Whether OTBM v1 stores a bare subtype byte after the item id.
    #[inline]
    #[must_use]
    pub const fn has_subtype(&self) -> bool {
        self.stackable || self.group.is_fluid_like()
    }
}

/// Format and item-list revision an item is being read or written under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemContext {
    pub format: FormatVersion,
    pub items_major: u32,
    pub items_minor: u32,
}

impl ItemContext {
    #[must_use]
    pub const fn new(format: FormatVersion, items_major: u32, items_minor: u32) -> Self {
        Self {
            format,
            items_major,
            items_minor,
        }
    }
}

/// Instantiates items by id.
pub trait ItemFactory {
    type Item: NodeItem;

    /// `None` means the id is unknown; the reader treats that as fatal.
    fn create_item(&self, id: u16) -> Option<Self::Item>;

    fn properties(&self, id: u16) -> Option<ItemProperties>;
}

/// An item that owns its own attribute (de)serialization.
pub trait NodeItem {
    /// Receive the OTBM v1 inline subtype byte.
    fn set_legacy_subtype(&mut self, subtype: u8);

    /// Consume the payload of one attribute whose id was already read.
    fn read_attribute<R: BufRead>(
        &mut self,
        id: u8,
        reader: &mut NodeReader<R>,
        ctx: &ItemContext,
    ) -> OtbmResult<()>;

    /// Consume attributes until the reader reports none left.
    fn read_attributes<R: BufRead>(
        &mut self,
        reader: &mut NodeReader<R>,
        ctx: &ItemContext,
    ) -> OtbmResult<()> {
        while let Some(id) = reader.next_attribute_id()? {
            self.read_attribute(id, reader, ctx)?;
        }
        Ok(())
    }

    /// Emit the complete item node, children included.
    fn write_node<W: Write>(&self, writer: &mut NodeWriter<W>, ctx: &ItemContext) -> OtbmResult<()>;
}
