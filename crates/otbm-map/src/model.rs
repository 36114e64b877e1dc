//! In-memory map model.

use std::collections::BTreeMap;
use std::fmt;

use bitflags::bitflags;
use otbm_io::{ClientVersion, FormatVersion};

use crate::item::Item;

/// World coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub x: u16,
    pub y: u16,
    pub z: u8,
}

impl Position {
    #[must_use]
    pub const fn new(x: u16, y: u16, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Base of the 256x256 tile area this position falls in.
    #[must_use]
    pub const fn area_base(self) -> Self {
        Self {
            x: self.x & 0xFF00,
            y: self.y & 0xFF00,
            z: self.z,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

bitflags! {
    /// Tile state flags (tile attribute 3).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TileFlags: u32 {
        const PROTECTION_ZONE = 0x0001;
        const NO_PVP = 0x0004;
        const NO_LOGOUT = 0x0008;
        const PVP_ZONE = 0x0010;
        const REFRESH = 0x0020;
    }
}

/// House membership of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HouseInfo {
    pub house_id: u32,
    pub door_id: Option<u8>,
}

/// One map square.
///
/// `ground` holds the ground item, which is always the first item on the
/// wire. Only a ground-group item arriving first becomes the ground; later
/// ground-group items stay in `items`. Build tiles through
/// [`Tile::push_item`] to get the placement loading produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub position: Position,
    pub flags: TileFlags,
    pub house: Option<HouseInfo>,
    pub ground: Option<Item>,
    pub items: Vec<Item>,
}

impl Tile {
    #[must_use]
    pub fn new(position: Position) -> Self {
        Self {
            position,
            flags: TileFlags::empty(),
            house: None,
            ground: None,
            items: Vec::new(),
        }
    }

    /// Add an item in wire order: the first item becomes the ground if it
    /// belongs to the ground group.
    pub fn push_item(&mut self, item: Item) {
        if self.ground.is_none() && self.items.is_empty() && item.is_ground() {
            self.ground = Some(item);
        } else {
            self.items.push(item);
        }
    }

    /// Ground first, then stacked items.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.ground.iter().chain(&self.items)
    }

    /// Visit every item on the tile including container contents.
    pub fn visit_items_mut(&mut self, f: &mut impl FnMut(&mut Item)) {
        if let Some(ground) = &mut self.ground {
            ground.visit_mut(f);
        }
        for item in &mut self.items {
            item.visit_mut(f);
        }
    }

    pub fn visit_items(&self, f: &mut impl FnMut(&Item)) {
        for item in self.items() {
            item.visit(f);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Town {
    pub id: u32,
    pub name: String,
    pub temple: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Waypoint {
    pub name: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Monster {
    pub name: String,
    /// Offset from the spawn centre.
    pub dx: i16,
    pub dy: i16,
    pub spawn_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnArea {
    pub center: Position,
    pub radius: u16,
    pub monsters: Vec<Monster>,
}

/// Header version fields of the root node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapVersion {
    pub format: FormatVersion,
    pub minor: u32,
    pub build: u32,
    pub description: String,
}

impl MapVersion {
    #[must_use]
    pub fn new(format: FormatVersion) -> Self {
        Self {
            format,
            minor: 0,
            build: 0,
            description: String::new(),
        }
    }
}

/// A whole map as loaded from or saved to an OTBM tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Map {
    pub version: MapVersion,
    pub client: ClientVersion,
    pub items_major: u32,
    pub items_minor: u32,
    pub width: u16,
    pub height: u16,
    pub description: String,
    pub spawn_file: String,
    pub house_file: String,
    pub tiles: BTreeMap<Position, Tile>,
    pub towns: Vec<Town>,
    pub waypoints: Vec<Waypoint>,
    pub spawns: Vec<SpawnArea>,
}

impl Map {
    #[must_use]
    pub fn new(format: FormatVersion, client: ClientVersion) -> Self {
        Self {
            version: MapVersion::new(format),
            client,
            items_major: 0,
            items_minor: 0,
            width: 0,
            height: 0,
            description: String::new(),
            spawn_file: String::new(),
            house_file: String::new(),
            tiles: BTreeMap::new(),
            towns: Vec::new(),
            waypoints: Vec::new(),
            spawns: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn format(&self) -> FormatVersion {
        self.version.format
    }

    /// Insert or replace the tile at its own position.
    pub fn insert_tile(&mut self, tile: Tile) -> Option<Tile> {
        self.tiles.insert(tile.position, tile)
    }

    #[must_use]
    pub fn tile(&self, pos: Position) -> Option<&Tile> {
        self.tiles.get(&pos)
    }

    pub fn tile_mut(&mut self, pos: Position) -> Option<&mut Tile> {
        self.tiles.get_mut(&pos)
    }

    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Items on all tiles, container contents included.
    #[must_use]
    pub fn item_count(&self) -> usize {
        let mut n = 0;
        self.visit_items(&mut |_| n += 1);
        n
    }

    pub fn visit_items_mut(&mut self, f: &mut impl FnMut(&mut Item)) {
        for tile in self.tiles.values_mut() {
            tile.visit_items_mut(f);
        }
    }

    pub fn visit_items(&self, f: &mut impl FnMut(&Item)) {
        for tile in self.tiles.values() {
            tile.visit_items(f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otbm_io::{ItemGroup, ItemProperties};

    #[test]
    fn test_area_base() {
        let p = Position::new(0x1234, 0x0567, 7);
        assert_eq!(p.area_base(), Position::new(0x1200, 0x0500, 7));
    }

    #[test]
    fn test_item_count_includes_contents() {
        let mut map = Map::new(FormatVersion::Otbm2, ClientVersion::V820);
        let mut tile = Tile::new(Position::new(100, 100, 7));
        tile.ground = Some(Item::new(1, ItemProperties::default()));
        let mut bag = Item::new(2, ItemProperties::default());
        bag.contents.push(Item::new(3, ItemProperties::default()));
        tile.items.push(bag);
        map.insert_tile(tile);
        assert_eq!(map.tile_count(), 1);
        assert_eq!(map.item_count(), 3);
    }

    #[test]
    fn test_push_item_places_ground_only_first() {
        let ground = ItemProperties {
            stackable: false,
            group: ItemGroup::Ground,
        };
        let mut tile = Tile::new(Position::new(1, 1, 7));
        tile.push_item(Item::new(10, ground));
        tile.push_item(Item::new(11, ground));
        assert_eq!(tile.ground.as_ref().map(|i| i.id), Some(10));
        assert_eq!(tile.items.len(), 1);

        let mut loose = Tile::new(Position::new(1, 2, 7));
        loose.push_item(Item::new(2, ItemProperties::default()));
        loose.push_item(Item::new(10, ground));
        assert!(loose.ground.is_none());
        assert_eq!(loose.items.len(), 2);
    }
}
