//! [`Map`] → node tree. Mirrors [`crate::load`].

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use otbm_io::ids::{attr, root_attr};
use otbm_io::{ItemContext, NodeType, NodeWriter};
use tracing::{debug, info, warn};

use crate::error::MapResult;
use crate::model::{Map, Position, Tile};

/// Serialize `map` using its own format version.
pub fn save_map<W: Write>(map: &Map, output: W) -> MapResult<()> {
    let ctx = ItemContext::new(map.format(), map.items_major, map.items_minor);
    let mut w = NodeWriter::new(output);

    w.begin_node(NodeType::Root)?;
    w.write_u32(root_attr::VERSION_MAJOR, map.format().ordinal())?;
    w.write_u32(root_attr::VERSION_MINOR, map.version.minor)?;
    w.write_u32(root_attr::VERSION_BUILD, map.version.build)?;
    w.write_string(root_attr::VERSION_DESCRIPTION, &map.version.description)?;
    w.write_u32(root_attr::CLIENT_VERSION, map.client.get())?;
    w.write_u32(root_attr::ITEMS_MAJOR, map.items_major)?;
    w.write_u32(root_attr::ITEMS_MINOR, map.items_minor)?;
    w.write_u16(root_attr::WIDTH, map.width)?;
    w.write_u16(root_attr::HEIGHT, map.height)?;

    w.begin_node(NodeType::MapData)?;
    w.write_string(attr::DESCRIPTION, &map.description)?;
    w.write_string(attr::EXT_SPAWN_FILE, &map.spawn_file)?;
    w.write_string(attr::EXT_HOUSE_FILE, &map.house_file)?;

    let mut areas: BTreeMap<Position, Vec<&Tile>> = BTreeMap::new();
    for tile in map.tiles.values() {
        areas.entry(tile.position.area_base()).or_default().push(tile);
    }
    for (base, tiles) in &areas {
        w.begin_node(NodeType::TileArea)?;
        write_position(&mut w, *base)?;
        for tile in tiles {
            write_tile(&mut w, tile, &ctx)?;
        }
        w.end_node()?;
    }
    debug!(areas = areas.len(), tiles = map.tile_count(), "wrote tile areas");

    if !map.towns.is_empty() {
        w.begin_node(NodeType::Towns)?;
        for town in &map.towns {
            w.begin_node(NodeType::Town)?;
            w.write_raw_u32(town.id)?;
            w.write_raw_string(&town.name)?;
            write_position(&mut w, town.temple)?;
            w.end_node()?;
        }
        w.end_node()?;
    }

    if !map.waypoints.is_empty() {
        if map.format().supports_waypoints() {
            w.begin_node(NodeType::Waypoints)?;
            for wp in &map.waypoints {
                w.begin_node(NodeType::Waypoint)?;
                w.write_raw_string(&wp.name)?;
                write_position(&mut w, wp.position)?;
                w.end_node()?;
            }
            w.end_node()?;
        } else {
            warn!(
                waypoints = map.waypoints.len(),
                format = %map.format(),
                "format has no waypoints, not written"
            );
        }
    }

    if !map.spawns.is_empty() {
        w.begin_node(NodeType::Spawns)?;
        for spawn in &map.spawns {
            w.begin_node(NodeType::SpawnArea)?;
            write_position(&mut w, spawn.center)?;
            w.write_raw_u16(spawn.radius)?;
            for monster in &spawn.monsters {
                w.begin_node(NodeType::Monster)?;
                w.write_raw_string(&monster.name)?;
                w.write_raw_i16(monster.dx)?;
                w.write_raw_i16(monster.dy)?;
                w.write_raw_u32(monster.spawn_seconds)?;
                w.end_node()?;
            }
            w.end_node()?;
        }
        w.end_node()?;
    }

    w.end_node()?; // map data
    w.end_node()?; // root
    let written = w.position();
    w.finish()?;
    info!(format = %map.format(), client = %map.client, bytes = written, "saved map");
    Ok(())
}

/// [`save_map`] into a buffered file, creating or truncating it.
pub fn save_map_to_path(map: &Map, path: impl AsRef<Path>) -> MapResult<()> {
    let path = path.as_ref();
    debug!(path = %path.display(), "writing map");
    save_map(map, BufWriter::new(File::create(path)?))
}

fn write_tile<W: Write>(w: &mut NodeWriter<W>, tile: &Tile, ctx: &ItemContext) -> MapResult<()> {
    let pos = tile.position;
    match &tile.house {
        Some(house) => {
            w.begin_node(NodeType::HouseTile)?;
            w.write_raw_u8((pos.x & 0xFF) as u8)?;
            w.write_raw_u8((pos.y & 0xFF) as u8)?;
            w.write_raw_u32(house.house_id)?;
        }
        None => {
            w.begin_node(NodeType::Tile)?;
            w.write_raw_u8((pos.x & 0xFF) as u8)?;
            w.write_raw_u8((pos.y & 0xFF) as u8)?;
        }
    }
    if !tile.flags.is_empty() {
        w.write_u32(attr::TILE_FLAGS, tile.flags.bits())?;
    }
    if let Some(door) = tile.house.and_then(|h| h.door_id) {
        w.write_byte(attr::HOUSE_DOOR_ID, door)?;
    }
    for item in tile.items() {
        w.write_item_node(item, ctx)?;
    }
    w.end_node()?;
    Ok(())
}

fn write_position<W: Write>(w: &mut NodeWriter<W>, pos: Position) -> MapResult<()> {
    w.write_raw_u16(pos.x)?;
    w.write_raw_u16(pos.y)?;
    w.write_raw_u8(pos.z)?;
    Ok(())
}
