//! Concrete item model and its node (de)serialization.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use otbm_io::ids::attr;
use otbm_io::{ItemContext, ItemProperties, NodeItem, NodeReader, NodeType, NodeWriter, OtbmError, OtbmResult};
use tracing::{debug, warn};

use crate::Position;
use crate::custom::{AttributeMap, decode_attribute_map, encode_attribute_map};

/// Payload width of a typed item attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Byte,
    Short,
    Long,
    Text,
}

/// Typed item attribute stored directly on the item node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ItemAttr {
    ActionId,
    UniqueId,
    Text,
    Desc,
    DepotId,
    RuneCharges,
    HouseDoorId,
    Count,
    Duration,
    DecayState,
    WrittenDate,
    WrittenBy,
    Charges,
    Tier,
}

impl ItemAttr {
    pub const ALL: [Self; 14] = [
        Self::ActionId,
        Self::UniqueId,
        Self::Text,
        Self::Desc,
        Self::DepotId,
        Self::RuneCharges,
        Self::HouseDoorId,
        Self::Count,
        Self::Duration,
        Self::DecayState,
        Self::WrittenDate,
        Self::WrittenBy,
        Self::Charges,
        Self::Tier,
    ];

    #[must_use]
    pub const fn wire_id(self) -> u8 {
        match self {
            Self::ActionId => attr::ACTION_ID,
            Self::UniqueId => attr::UNIQUE_ID,
            Self::Text => attr::TEXT,
            Self::Desc => attr::DESC,
            Self::DepotId => attr::DEPOT_ID,
            Self::RuneCharges => attr::RUNE_CHARGES,
            Self::HouseDoorId => attr::HOUSE_DOOR_ID,
            Self::Count => attr::COUNT,
            Self::Duration => attr::DURATION,
            Self::DecayState => attr::DECAYING_STATE,
            Self::WrittenDate => attr::WRITTEN_DATE,
            Self::WrittenBy => attr::WRITTEN_BY,
            Self::Charges => attr::CHARGES,
            Self::Tier => attr::TIER,
        }
    }

    #[must_use]
    pub fn from_wire(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.wire_id() == id)
    }

    #[must_use]
    pub const fn kind(self) -> AttrKind {
        match self {
            Self::RuneCharges | Self::HouseDoorId | Self::Count | Self::DecayState | Self::Tier => {
                AttrKind::Byte
            }
            Self::ActionId | Self::UniqueId | Self::DepotId | Self::Charges => AttrKind::Short,
            Self::Duration | Self::WrittenDate => AttrKind::Long,
            Self::Text | Self::Desc | Self::WrittenBy => AttrKind::Text,
        }
    }

    /// Short pre-v4 name.
    #[must_use]
    pub const fn legacy_name(self) -> &'static str {
        match self {
            Self::ActionId => "aid",
            Self::UniqueId => "uid",
            Self::Text => "text",
            Self::Desc => "desc",
            Self::DepotId => "depotid",
            Self::RuneCharges => "runecharges",
            Self::HouseDoorId => "doorid",
            Self::Count => "count",
            Self::Duration => "duration",
            Self::DecayState => "decaystate",
            Self::WrittenDate => "writtendate",
            Self::WrittenBy => "writtenby",
            Self::Charges => "charges",
            Self::Tier => "tier",
        }
    }

    #[must_use]
    pub fn from_legacy_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.legacy_name() == name)
    }
}

/// Value of a typed attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Byte(u8),
    Short(u16),
    Long(u32),
    Text(String),
}

impl AttrValue {
    #[must_use]
    pub const fn kind(&self) -> AttrKind {
        match self {
            Self::Byte(_) => AttrKind::Byte,
            Self::Short(_) => AttrKind::Short,
            Self::Long(_) => AttrKind::Long,
            Self::Text(_) => AttrKind::Text,
        }
    }

    #[must_use]
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::Byte(v) => Some(u32::from(*v)),
            Self::Short(v) => Some(u32::from(*v)),
            Self::Long(v) => Some(*v),
            Self::Text(_) => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Re-type a value for `kind`; numbers must fit, text stays text.
    #[must_use]
    pub fn coerce(self, kind: AttrKind) -> Option<Self> {
        if self.kind() == kind {
            return Some(self);
        }
        let n = self.as_u32()?;
        match kind {
            AttrKind::Byte => u8::try_from(n).ok().map(Self::Byte),
            AttrKind::Short => u16::try_from(n).ok().map(Self::Short),
            AttrKind::Long => Some(Self::Long(n)),
            AttrKind::Text => None,
        }
    }
}

const PODIUM_OUTFIT_LEN: usize = 15;

/// Outfit shown on a podium item (attribute 40).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PodiumOutfit {
    pub flags: u8,
    pub direction: u8,
    pub look_type: u16,
    pub look_head: u8,
    pub look_body: u8,
    pub look_legs: u8,
    pub look_feet: u8,
    pub look_addons: u8,
    pub look_mount: u16,
    pub mount_head: u8,
    pub mount_body: u8,
    pub mount_legs: u8,
    pub mount_feet: u8,
}

impl PodiumOutfit {
    pub const ENCODED_LEN: usize = PODIUM_OUTFIT_LEN;

    #[must_use]
    pub fn to_bytes(&self) -> [u8; PODIUM_OUTFIT_LEN] {
        let [t0, t1] = self.look_type.to_le_bytes();
        let [m0, m1] = self.look_mount.to_le_bytes();
        [
            self.flags,
            self.direction,
            t0,
            t1,
            self.look_head,
            self.look_body,
            self.look_legs,
            self.look_feet,
            self.look_addons,
            m0,
            m1,
            self.mount_head,
            self.mount_body,
            self.mount_legs,
            self.mount_feet,
        ]
    }

    #[must_use]
    pub fn from_bytes(b: &[u8; PODIUM_OUTFIT_LEN]) -> Self {
        Self {
            flags: b[0],
            direction: b[1],
            look_type: u16::from_le_bytes([b[2], b[3]]),
            look_head: b[4],
            look_body: b[5],
            look_legs: b[6],
            look_feet: b[7],
            look_addons: b[8],
            look_mount: u16::from_le_bytes([b[9], b[10]]),
            mount_head: b[11],
            mount_body: b[12],
            mount_legs: b[13],
            mount_feet: b[14],
        }
    }
}

/// An item placed on a tile or inside a container.
///
/// The stack count or fluid type lives only in the `Count` attribute, whatever
/// the format. OTBM v1 moves it to an inline byte on the wire, where zero
/// stands for "no count"; a stored count is therefore never zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: u16,
    pub properties: ItemProperties,
    attributes: BTreeMap<ItemAttr, AttrValue>,
    pub teleport: Option<Position>,
    pub podium: Option<PodiumOutfit>,
    pub custom: AttributeMap,
    pub contents: Vec<Item>,
}

impl Item {
    #[must_use]
    pub fn new(id: u16, properties: ItemProperties) -> Self {
        Self {
            id,
            properties,
            attributes: BTreeMap::new(),
            teleport: None,
            podium: None,
            custom: AttributeMap::new(),
            contents: Vec::new(),
        }
    }

    #[must_use]
    pub fn attribute(&self, attr: ItemAttr) -> Option<&AttrValue> {
        self.attributes.get(&attr)
    }

    #[must_use]
    pub fn has_attribute(&self, attr: ItemAttr) -> bool {
        self.attributes.contains_key(&attr)
    }

    /// Set a typed attribute; returns `false` if the value cannot take the attribute's kind.
    ///
    /// A zero count clears the count.
    pub fn set_attribute(&mut self, attr: ItemAttr, value: AttrValue) -> bool {
        match value.coerce(attr.kind()) {
            Some(AttrValue::Byte(0)) if attr == ItemAttr::Count => {
                self.attributes.remove(&attr);
                true
            }
            Some(v) => {
                self.attributes.insert(attr, v);
                true
            }
            None => false,
        }
    }

    pub fn remove_attribute(&mut self, attr: ItemAttr) -> Option<AttrValue> {
        self.attributes.remove(&attr)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (ItemAttr, &AttrValue)> + '_ {
        self.attributes.iter().map(|(k, v)| (*k, v))
    }

    /// Number of typed, teleport, podium and custom attributes.
    #[must_use]
    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
            + usize::from(self.teleport.is_some())
            + usize::from(self.podium.is_some())
            + self.custom.len()
    }

    /// Stack count or fluid type.
    #[must_use]
    pub fn count(&self) -> Option<u8> {
        match self.attributes.get(&ItemAttr::Count) {
            Some(AttrValue::Byte(v)) => Some(*v),
            _ => None,
        }
    }

    /// Set the count; zero clears it.
    pub fn set_count(&mut self, count: u8) {
        if count == 0 {
            self.attributes.remove(&ItemAttr::Count);
        } else {
            self.attributes.insert(ItemAttr::Count, AttrValue::Byte(count));
        }
    }

    #[must_use]
    pub fn action_id(&self) -> Option<u16> {
        self.attribute(ItemAttr::ActionId)
            .and_then(AttrValue::as_u32)
            .and_then(|v| u16::try_from(v).ok())
    }

    #[must_use]
    pub fn unique_id(&self) -> Option<u16> {
        self.attribute(ItemAttr::UniqueId)
            .and_then(AttrValue::as_u32)
            .and_then(|v| u16::try_from(v).ok())
    }

    #[must_use]
    pub fn is_ground(&self) -> bool {
        self.properties.group == otbm_io::ItemGroup::Ground
    }

    /// Visit this item and every nested content item.
    pub fn visit_mut(&mut self, f: &mut impl FnMut(&mut Item)) {
        f(self);
        for child in &mut self.contents {
            child.visit_mut(f);
        }
    }

    pub fn visit(&self, f: &mut impl FnMut(&Item)) {
        f(self);
        for child in &self.contents {
            child.visit(f);
        }
    }

    /// The byte OTBM v1 stores after the id for stackable and fluid types.
    fn inline_subtype(&self) -> u8 {
        self.count().unwrap_or(0)
    }

    fn read_fixed_blob<R: BufRead, const N: usize>(
        reader: &mut NodeReader<R>,
        what: &str,
    ) -> OtbmResult<[u8; N]> {
        let offset = reader.position();
        let bytes = reader.read_blob()?;
        <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| OtbmError::CorruptData {
            offset,
            reason: format!("{what} payload is {} bytes, expected {N}", bytes.len()),
        })
    }
}

impl NodeItem for Item {
    fn set_legacy_subtype(&mut self, subtype: u8) {
        self.set_count(subtype);
    }

    fn read_attribute<R: BufRead>(
        &mut self,
        id: u8,
        reader: &mut NodeReader<R>,
        _ctx: &ItemContext,
    ) -> OtbmResult<()> {
        if let Some(attr) = ItemAttr::from_wire(id) {
            let value = match attr.kind() {
                AttrKind::Byte => AttrValue::Byte(reader.read_byte()?),
                AttrKind::Short => AttrValue::Short(reader.read_u16()?),
                AttrKind::Long => AttrValue::Long(reader.read_u32()?),
                AttrKind::Text => AttrValue::Text(reader.read_string()?),
            };
            // a zero count on the wire means none
            self.set_attribute(attr, value);
            return Ok(());
        }

        match id {
            attr::TELE_DEST => {
                let b = Self::read_fixed_blob::<_, 5>(reader, "teleport destination")?;
                self.teleport = Some(Position::new(
                    u16::from_le_bytes([b[0], b[1]]),
                    u16::from_le_bytes([b[2], b[3]]),
                    b[4],
                ));
            }
            attr::PODIUM_OUTFIT => {
                let b = Self::read_fixed_blob::<_, PODIUM_OUTFIT_LEN>(reader, "podium outfit")?;
                self.podium = Some(PodiumOutfit::from_bytes(&b));
            }
            attr::ATTRIBUTE_MAP => {
                let offset = reader.position();
                let bytes = reader.read_blob()?;
                self.custom = decode_attribute_map(&bytes, offset)?;
            }
            other => {
                debug!(item = self.id, attribute = other, "skipping unknown item attribute");
                reader.skip_attribute()?;
            }
        }
        Ok(())
    }

    fn write_node<W: Write>(&self, writer: &mut NodeWriter<W>, ctx: &ItemContext) -> OtbmResult<()> {
        writer.begin_node(NodeType::Item)?;
        writer.write_raw_u16(self.id)?;

        let inline = ctx.format.has_inline_subtype() && self.properties.has_subtype();
        if inline {
            writer.write_raw_u8(self.inline_subtype())?;
        }

        for (attr, value) in &self.attributes {
            if inline && *attr == ItemAttr::Count {
                continue;
            }
            let id = attr.wire_id();
            match value {
                AttrValue::Byte(v) => writer.write_byte(id, *v)?,
                AttrValue::Short(v) => writer.write_u16(id, *v)?,
                AttrValue::Long(v) => writer.write_u32(id, *v)?,
                AttrValue::Text(s) => writer.write_string(id, s)?,
            }
        }

        if let Some(dest) = self.teleport {
            let [x0, x1] = dest.x.to_le_bytes();
            let [y0, y1] = dest.y.to_le_bytes();
            writer.write_blob(attr::TELE_DEST, &[x0, x1, y0, y1, dest.z])?;
        }
        if let Some(outfit) = &self.podium {
            writer.write_blob(attr::PODIUM_OUTFIT, &outfit.to_bytes())?;
        }
        if !self.custom.is_empty() {
            if ctx.format.supports_attribute_map() {
                writer.write_blob(attr::ATTRIBUTE_MAP, &encode_attribute_map(&self.custom)?)?;
            } else {
                warn!(
                    item = self.id,
                    entries = self.custom.len(),
                    format = %ctx.format,
                    "attribute map not supported by target format, not written"
                );
            }
        }

        for child in &self.contents {
            writer.write_item_node(child, ctx)?;
        }
        writer.end_node()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otbm_io::{FormatVersion, ItemGroup};

    fn stackable() -> ItemProperties {
        ItemProperties {
            stackable: true,
            group: ItemGroup::None,
        }
    }

    #[test]
    fn test_attr_wire_ids_unique() {
        for a in ItemAttr::ALL {
            assert_eq!(ItemAttr::from_wire(a.wire_id()), Some(a));
            assert_eq!(ItemAttr::from_legacy_name(a.legacy_name()), Some(a));
        }
    }

    #[test]
    fn test_set_attribute_coerces() {
        let mut item = Item::new(1, ItemProperties::default());
        assert!(item.set_attribute(ItemAttr::ActionId, AttrValue::Long(1000)));
        assert_eq!(item.attribute(ItemAttr::ActionId), Some(&AttrValue::Short(1000)));
        assert!(!item.set_attribute(ItemAttr::Count, AttrValue::Short(300)));
        assert!(!item.set_attribute(ItemAttr::Text, AttrValue::Byte(1)));
        assert_eq!(item.action_id(), Some(1000));
    }

    #[test]
    fn test_zero_count_is_no_count() {
        let mut item = Item::new(1, stackable());
        assert_eq!(item.count(), None);
        item.set_legacy_subtype(5);
        assert_eq!(item.count(), Some(5));
        item.set_count(0);
        assert_eq!(item.count(), None);
        assert!(item.set_attribute(ItemAttr::Count, AttrValue::Byte(0)));
        assert!(!item.has_attribute(ItemAttr::Count));
        item.set_legacy_subtype(0);
        assert_eq!(item, Item::new(1, stackable()));
    }

    #[test]
    fn test_v1_write_without_count_uses_zero() {
        let item = Item::new(0x0102, stackable());
        let mut w = NodeWriter::new(Vec::new());
        w.write_item_node(&item, &ItemContext::new(FormatVersion::Otbm1, 1, 0))
            .unwrap();
        assert_eq!(w.finish().unwrap(), vec![0xFC, 6, 0x02, 0x01, 0, 0xFD]);
    }

    #[test]
    fn test_v1_write_uses_inline_byte() {
        let mut item = Item::new(0x0102, stackable());
        item.set_count(9);
        let mut w = NodeWriter::new(Vec::new());
        w.write_item_node(&item, &ItemContext::new(FormatVersion::Otbm1, 1, 0))
            .unwrap();
        let bytes = w.finish().unwrap();
        assert_eq!(bytes, vec![0xFC, 6, 0x02, 0x01, 9, 0xFD]);
    }

    #[test]
    fn test_podium_outfit_bytes() {
        let outfit = PodiumOutfit {
            look_type: 128,
            look_mount: 0x0201,
            mount_feet: 7,
            ..PodiumOutfit::default()
        };
        let bytes = outfit.to_bytes();
        assert_eq!(bytes[2], 128);
        assert_eq!(&bytes[9..11], &[0x01, 0x02]);
        assert_eq!(PodiumOutfit::from_bytes(&bytes), outfit);
    }

    #[test]
    fn test_visit_reaches_contents() {
        let mut bag = Item::new(1, ItemProperties::default());
        let mut inner = Item::new(2, ItemProperties::default());
        inner.contents.push(Item::new(3, ItemProperties::default()));
        bag.contents.push(inner);
        let mut seen = Vec::new();
        bag.visit(&mut |i| seen.push(i.id));
        assert_eq!(seen, vec![1, 2, 3]);
    }
}
