//! Node tree → [`Map`].
//!
//! ```text
//! ROOT (version attrs)
//! └── MAP_DATA (description, spawn/house file)
//!     ├── TILE_AREA [x y z]
//!     │   ├── TILE [dx dy]         ── ITEM [id] ── ITEM ...
//!     │   └── HOUSETILE [dx dy id] ── ITEM ...
//!     ├── TOWNS ── TOWN [id name x y z]
//!     ├── WAYPOINTS ── WAYPOINT [name x y z]
//!     └── SPAWNS ── SPAWN_AREA [x y z r] ── MONSTER [name dx dy secs]
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use otbm_io::ids::{attr, root_attr};
use otbm_io::{
    ClientVersion, FormatVersion, ItemContext, ItemFactory, NodeReader, NodeType, OtbmError,
};
use tracing::{debug, info};

use crate::error::{MapError, MapResult};
use crate::item::Item;
use crate::model::{HouseInfo, Map, Monster, Position, SpawnArea, Tile, TileFlags, Town, Waypoint};

/// Parse a complete map. Any framing or payload error aborts the load.
pub fn load_map<R, F>(input: R, factory: &F) -> MapResult<Map>
where
    R: BufRead,
    F: ItemFactory<Item = Item>,
{
    let mut reader = NodeReader::new(input);
    let mut loader = Loader {
        reader: &mut reader,
        factory,
    };
    let map = loader.root()?;
    reader.finish()?;
    info!(
        format = %map.format(),
        client = %map.client,
        tiles = map.tile_count(),
        towns = map.towns.len(),
        waypoints = map.waypoints.len(),
        spawns = map.spawns.len(),
        "loaded map"
    );
    Ok(map)
}

/// [`load_map`] over a buffered file.
pub fn load_map_from_path<F>(path: impl AsRef<Path>, factory: &F) -> MapResult<Map>
where
    F: ItemFactory<Item = Item>,
{
    let path = path.as_ref();
    debug!(path = %path.display(), "opening map");
    load_map(BufReader::new(File::open(path)?), factory)
}

struct Loader<'a, R, F> {
    reader: &'a mut NodeReader<R>,
    factory: &'a F,
}

impl<R: BufRead, F: ItemFactory<Item = Item>> Loader<'_, R, F> {
    fn root(&mut self) -> MapResult<Map> {
        let ty = self.reader.enter_node()?;
        if ty != NodeType::Root.as_u8() {
            return Err(self.misplaced("stream start", ty));
        }

        let mut format = None;
        let mut map = Map::new(FormatVersion::LATEST, ClientVersion::MAX);
        while let Some(id) = self.reader.next_attribute_id()? {
            match id {
                root_attr::VERSION_MAJOR => {
                    let major = self.reader.read_u32()?;
                    format = Some(FormatVersion::from_ordinal(major).ok_or_else(|| {
                        OtbmError::UnsupportedVersion(format!("OTBM major version {major}"))
                    })?);
                }
                root_attr::VERSION_MINOR => map.version.minor = self.reader.read_u32()?,
                root_attr::VERSION_BUILD => map.version.build = self.reader.read_u32()?,
                root_attr::VERSION_DESCRIPTION => {
                    map.version.description = self.reader.read_string()?;
                }
                root_attr::CLIENT_VERSION => {
                    let client = ClientVersion(self.reader.read_u32()?);
                    if !client.in_range() {
                        return Err(OtbmError::UnsupportedVersion(format!(
                            "client version {} outside {}..={}",
                            client.get(),
                            ClientVersion::MIN.get(),
                            ClientVersion::MAX.get()
                        ))
                        .into());
                    }
                    map.client = client;
                }
                root_attr::ITEMS_MAJOR => map.items_major = self.reader.read_u32()?,
                root_attr::ITEMS_MINOR => map.items_minor = self.reader.read_u32()?,
                root_attr::WIDTH => map.width = self.reader.read_u16()?,
                root_attr::HEIGHT => map.height = self.reader.read_u16()?,
                other => {
                    debug!(attribute = other, "skipping unknown root attribute");
                    self.reader.skip_attribute()?;
                }
            }
        }
        map.version.format = format.ok_or(MapError::MissingAttribute("format version"))?;
        let ctx = ItemContext::new(map.version.format, map.items_major, map.items_minor);

        match self.reader.next_child()? {
            Some(ty) if ty == NodeType::MapData.as_u8() => self.map_data(&mut map, &ctx)?,
            Some(ty) => return Err(self.misplaced("root", ty)),
            None => return Err(MapError::MissingRoot),
        }
        if let Some(ty) = self.reader.next_child()? {
            return Err(self.misplaced("root", ty));
        }
        self.reader.leave_node()?;
        Ok(map)
    }

    fn map_data(&mut self, map: &mut Map, ctx: &ItemContext) -> MapResult<()> {
        while let Some(id) = self.reader.next_attribute_id()? {
            match id {
                attr::DESCRIPTION => map.description = self.reader.read_string()?,
                attr::EXT_SPAWN_FILE => map.spawn_file = self.reader.read_string()?,
                attr::EXT_HOUSE_FILE => map.house_file = self.reader.read_string()?,
                other => {
                    debug!(attribute = other, "skipping unknown map-data attribute");
                    self.reader.skip_attribute()?;
                }
            }
        }

        while let Some(raw) = self.reader.next_child()? {
            match self.node_type(raw)? {
                NodeType::TileArea => self.tile_area(map, ctx)?,
                NodeType::Towns => self.towns(map)?,
                NodeType::Waypoints => self.waypoints(map)?,
                NodeType::Spawns => self.spawns(map)?,
                _ => return Err(self.misplaced("map data", raw)),
            }
        }
        self.reader.leave_node()?;
        Ok(())
    }

    fn tile_area(&mut self, map: &mut Map, ctx: &ItemContext) -> MapResult<()> {
        let base = self.position()?;
        self.skip_attributes("tile area")?;
        while let Some(raw) = self.reader.next_child()? {
            match self.node_type(raw)? {
                kind @ (NodeType::Tile | NodeType::HouseTile) => {
                    let tile = self.tile(base, kind == NodeType::HouseTile, ctx)?;
                    map.insert_tile(tile);
                }
                _ => return Err(self.misplaced("tile area", raw)),
            }
        }
        self.reader.leave_node()?;
        Ok(())
    }

    fn tile(&mut self, base: Position, is_house: bool, ctx: &ItemContext) -> MapResult<Tile> {
        let dx = self.reader.read_raw_u8()?;
        let dy = self.reader.read_raw_u8()?;
        let position = Position::new(
            base.x.wrapping_add(u16::from(dx)),
            base.y.wrapping_add(u16::from(dy)),
            base.z,
        );
        let mut tile = Tile::new(position);
        if is_house {
            tile.house = Some(HouseInfo {
                house_id: self.reader.read_raw_u32()?,
                door_id: None,
            });
        }

        while let Some(id) = self.reader.next_attribute_id()? {
            match (id, tile.house.as_mut()) {
                (attr::TILE_FLAGS, _) => {
                    tile.flags = TileFlags::from_bits_retain(self.reader.read_u32()?);
                }
                (attr::HOUSE_DOOR_ID, Some(house)) => house.door_id = Some(self.reader.read_byte()?),
                (other, _) => {
                    debug!(%position, attribute = other, "skipping unknown tile attribute");
                    self.reader.skip_attribute()?;
                }
            }
        }

        while let Some(raw) = self.reader.next_child()? {
            if raw != NodeType::Item.as_u8() {
                return Err(self.misplaced("tile", raw));
            }
            let item = self.item(ctx)?;
            tile.push_item(item);
        }
        self.reader.leave_node()?;
        Ok(tile)
    }

    /// An item node whose start marker was already consumed.
    fn item(&mut self, ctx: &ItemContext) -> MapResult<Item> {
        let mut item = self.reader.read_item(self.factory, ctx)?;
        while let Some(raw) = self.reader.next_child()? {
            if raw != NodeType::Item.as_u8() {
                return Err(self.misplaced("item", raw));
            }
            item.contents.push(self.item(ctx)?);
        }
        self.reader.leave_node()?;
        Ok(item)
    }

    fn towns(&mut self, map: &mut Map) -> MapResult<()> {
        self.skip_attributes("towns")?;
        while let Some(raw) = self.reader.next_child()? {
            if raw != NodeType::Town.as_u8() {
                return Err(self.misplaced("towns", raw));
            }
            let id = self.reader.read_raw_u32()?;
            let name = self.reader.read_raw_string()?;
            let temple = self.position()?;
            self.skip_attributes("town")?;
            self.reader.leave_node()?;
            map.towns.push(Town { id, name, temple });
        }
        self.reader.leave_node()?;
        Ok(())
    }

    fn waypoints(&mut self, map: &mut Map) -> MapResult<()> {
        self.skip_attributes("waypoints")?;
        while let Some(raw) = self.reader.next_child()? {
            if raw != NodeType::Waypoint.as_u8() {
                return Err(self.misplaced("waypoints", raw));
            }
            let name = self.reader.read_raw_string()?;
            let position = self.position()?;
            self.skip_attributes("waypoint")?;
            self.reader.leave_node()?;
            map.waypoints.push(Waypoint { name, position });
        }
        self.reader.leave_node()?;
        Ok(())
    }

    fn spawns(&mut self, map: &mut Map) -> MapResult<()> {
        self.skip_attributes("spawns")?;
        while let Some(raw) = self.reader.next_child()? {
            if raw != NodeType::SpawnArea.as_u8() {
                return Err(self.misplaced("spawns", raw));
            }
            let center = self.position()?;
            let radius = self.reader.read_raw_u16()?;
            self.skip_attributes("spawn area")?;
            let mut monsters = Vec::new();
            while let Some(raw) = self.reader.next_child()? {
                if raw != NodeType::Monster.as_u8() {
                    return Err(self.misplaced("spawn area", raw));
                }
                let name = self.reader.read_raw_string()?;
                let dx = self.reader.read_raw_i16()?;
                let dy = self.reader.read_raw_i16()?;
                let spawn_seconds = self.reader.read_raw_u32()?;
                self.skip_attributes("monster")?;
                self.reader.leave_node()?;
                monsters.push(Monster {
                    name,
                    dx,
                    dy,
                    spawn_seconds,
                });
            }
            self.reader.leave_node()?;
            map.spawns.push(SpawnArea {
                center,
                radius,
                monsters,
            });
        }
        self.reader.leave_node()?;
        Ok(())
    }

    fn position(&mut self) -> MapResult<Position> {
        let x = self.reader.read_raw_u16()?;
        let y = self.reader.read_raw_u16()?;
        let z = self.reader.read_raw_u8()?;
        Ok(Position::new(x, y, z))
    }

    fn skip_attributes(&mut self, node: &'static str) -> MapResult<()> {
        while let Some(id) = self.reader.next_attribute_id()? {
            debug!(node, attribute = id, "skipping unknown attribute");
            self.reader.skip_attribute()?;
        }
        Ok(())
    }

    fn node_type(&self, raw: u8) -> MapResult<NodeType> {
        NodeType::from_u8(raw).ok_or_else(|| {
            MapError::Codec(OtbmError::MalformedStream {
                offset: self.reader.position(),
                reason: format!("unknown node type {raw}"),
            })
        })
    }

    fn misplaced(&self, parent: &'static str, found: u8) -> MapError {
        if NodeType::from_u8(found).is_none() {
            return MapError::Codec(OtbmError::MalformedStream {
                offset: self.reader.position(),
                reason: format!("unknown node type {found}"),
            });
        }
        MapError::UnexpectedNode { parent, found }
    }
}
