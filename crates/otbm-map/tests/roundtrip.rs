//! Load/save behaviour over whole maps.

use otbm_io::ids::attr;
use otbm_io::{
    ClientVersion, FormatVersion, ItemGroup, ItemProperties, NODE_END, NODE_START, NodeType,
    OtbmError,
};
use otbm_map::{
    AttrValue, CustomValue, HouseInfo, Item, ItemAttr, ItemTypeTable, Map, MapError, Monster,
    PodiumOutfit, Position, SpawnArea, Tile, TileFlags, Town, Waypoint, load_map,
    load_map_from_path, save_map, save_map_to_path,
};

const GRASS: u16 = 100;
const COINS: u16 = 2148;
const BAG: u16 = 1987;
const VIAL: u16 = 2006;
const PORTAL: u16 = 1387;

fn item_table() -> ItemTypeTable {
    let mut t = ItemTypeTable::new();
    t.insert(GRASS, "grass", ItemProperties { stackable: false, group: ItemGroup::Ground });
    t.insert(COINS, "gold coin", ItemProperties { stackable: true, group: ItemGroup::None });
    t.insert(BAG, "bag", ItemProperties { stackable: false, group: ItemGroup::Container });
    t.insert(VIAL, "vial", ItemProperties { stackable: false, group: ItemGroup::Fluid });
    t.insert(PORTAL, "magic forcefield", ItemProperties { stackable: false, group: ItemGroup::Teleport });
    t
}

fn item(table: &ItemTypeTable, id: u16) -> Item {
    Item::new(id, table.get(id).unwrap().properties)
}

fn sample_map(format: FormatVersion) -> Map {
    let table = item_table();
    let mut map = Map::new(format, ClientVersion(1098));
    map.version.minor = 1;
    map.version.build = 7;
    map.version.description = "test build".into();
    map.items_major = 3;
    map.items_minor = 57;
    map.width = 2048;
    map.height = 2048;
    map.description = "a small island".into();
    map.spawn_file = "island-spawn.xml".into();
    map.house_file = "island-house.xml".into();

    let mut tile = Tile::new(Position::new(1000, 1000, 7));
    tile.flags = TileFlags::PROTECTION_ZONE | TileFlags::REFRESH;
    tile.ground = Some(item(&table, GRASS));
    let mut coins = item(&table, COINS);
    coins.set_count(25);
    coins.set_attribute(ItemAttr::ActionId, AttrValue::Short(2000));
    let mut bag = item(&table, BAG);
    bag.set_attribute(ItemAttr::UniqueId, AttrValue::Short(3001));
    let mut vial = item(&table, VIAL);
    vial.set_count(2);
    bag.contents.push(vial);
    bag.contents.push(coins.clone());
    tile.items.push(coins);
    tile.items.push(bag);
    map.insert_tile(tile);

    let mut portal_tile = Tile::new(Position::new(1301, 1002, 7));
    portal_tile.ground = Some(item(&table, GRASS));
    let mut portal = item(&table, PORTAL);
    portal.teleport = Some(Position::new(1100, 1100, 6));
    portal.set_attribute(ItemAttr::Text, AttrValue::Text("to the temple".into()));
    portal_tile.items.push(portal);
    map.insert_tile(portal_tile);

    let mut house = Tile::new(Position::new(1010, 1020, 7));
    house.house = Some(HouseInfo { house_id: 42, door_id: Some(3) });
    house.ground = Some(item(&table, GRASS));
    map.insert_tile(house);

    map.towns.push(Town {
        id: 1,
        name: "Harbour".into(),
        temple: Position::new(1000, 1001, 7),
    });
    map.spawns.push(SpawnArea {
        center: Position::new(1005, 1005, 7),
        radius: 3,
        monsters: vec![Monster {
            name: "Rat".into(),
            dx: -1,
            dy: 2,
            spawn_seconds: 60,
        }],
    });
    if format.supports_waypoints() {
        map.waypoints.push(Waypoint {
            name: "depot".into(),
            position: Position::new(1003, 1004, 7),
        });
    }
    map
}

fn save_to_vec(map: &Map) -> Vec<u8> {
    let mut buf = Vec::new();
    save_map(map, &mut buf).unwrap();
    buf
}

#[test]
fn test_roundtrip_every_format() {
    let table = item_table();
    for format in FormatVersion::ALL {
        let map = sample_map(format);
        let bytes = save_to_vec(&map);
        let loaded = load_map(bytes.as_slice(), &table).unwrap();
        assert_eq!(loaded, map, "round trip for {format}");
    }
}

#[test]
fn test_roundtrip_v4_extras_through_file() {
    let table = item_table();
    let mut map = sample_map(FormatVersion::Otbm4);
    let tile = map.tile_mut(Position::new(1000, 1000, 7)).unwrap();
    let coins = &mut tile.items[0];
    coins.custom.insert("actionid".into(), CustomValue::Integer(2000));
    coins.custom.insert("shiny".into(), CustomValue::Boolean(true));
    coins.custom.insert("weight".into(), CustomValue::Float(0.1));
    coins.podium = Some(PodiumOutfit {
        look_type: 130,
        direction: 2,
        ..PodiumOutfit::default()
    });

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("island.otbm");
    save_map_to_path(&map, &path).unwrap();
    let loaded = load_map_from_path(&path, &table).unwrap();
    assert_eq!(loaded, map);
}

#[test]
fn test_waypoints_not_written_below_v3() {
    let table = item_table();
    let mut map = sample_map(FormatVersion::Otbm2);
    map.waypoints.push(Waypoint {
        name: "lost".into(),
        position: Position::new(1, 1, 7),
    });
    let loaded = load_map(save_to_vec(&map).as_slice(), &table).unwrap();
    assert!(loaded.waypoints.is_empty());
    assert_eq!(loaded.towns, map.towns);
}

/// Root (v1, client 8.20) → map data → area (256,256,7) → tile (5,6) → item 2148 with subtype 5.
fn v1_stream() -> Vec<u8> {
    let mut b = vec![NODE_START, NodeType::Root.as_u8()];
    b.extend([1, 4, 0, 0, 0, 0, 0]); // major = 0
    b.extend([5, 4, 0, 0x34, 0x03, 0, 0]); // client = 820
    b.extend([NODE_START, NodeType::MapData.as_u8()]);
    b.extend([NODE_START, NodeType::TileArea.as_u8(), 0x00, 0x01, 0x00, 0x01, 7]);
    b.extend([NODE_START, NodeType::Tile.as_u8(), 5, 6]);
    let [lo, hi] = COINS.to_le_bytes();
    b.extend([NODE_START, NodeType::Item.as_u8(), lo, hi, 5, NODE_END]);
    b.extend([NODE_END, NODE_END, NODE_END, NODE_END]);
    b
}

#[test]
fn test_v1_subtype_loads_as_count() {
    let map = load_map(v1_stream().as_slice(), &item_table()).unwrap();
    assert_eq!(map.format(), FormatVersion::Otbm1);
    assert_eq!(map.client, ClientVersion::V820);
    let tile = map.tile(Position::new(261, 262, 7)).unwrap();
    assert_eq!(tile.items.len(), 1);
    assert_eq!(tile.items[0].count(), Some(5));
}

#[test]
fn test_v1_subtype_saved_as_v2_count_attribute() {
    let table = item_table();
    let mut map = load_map(v1_stream().as_slice(), &table).unwrap();
    map.version.format = FormatVersion::Otbm2;
    let bytes = save_to_vec(&map);

    let [lo, hi] = COINS.to_le_bytes();
    let with_attr = [NODE_START, NodeType::Item.as_u8(), lo, hi, attr::COUNT, 1, 0, 5, NODE_END];
    assert!(bytes.windows(with_attr.len()).any(|w| w == with_attr));
    let inline = [NODE_START, NodeType::Item.as_u8(), lo, hi, 5, NODE_END];
    assert!(!bytes.windows(inline.len()).any(|w| w == inline));

    let reloaded = load_map(bytes.as_slice(), &table).unwrap();
    let coins = &reloaded.tile(Position::new(261, 262, 7)).unwrap().items[0];
    assert_eq!(coins.attribute(ItemAttr::Count), Some(&AttrValue::Byte(5)));
    assert_eq!(coins.count(), Some(5));
}

#[test]
fn test_v1_counts_roundtrip() {
    let table = item_table();
    let mut map = Map::new(FormatVersion::Otbm1, ClientVersion(800));
    let mut tile = Tile::new(Position::new(300, 300, 7));
    tile.ground = Some(item(&table, GRASS));
    let mut counted = item(&table, COINS);
    counted.set_count(9);
    tile.items.push(counted);
    tile.items.push(item(&table, COINS));
    tile.items.push(item(&table, VIAL));
    map.insert_tile(tile);

    let bytes = save_to_vec(&map);
    let [lo, hi] = COINS.to_le_bytes();
    let uncounted = [NODE_START, NodeType::Item.as_u8(), lo, hi, 0, NODE_END];
    assert!(bytes.windows(uncounted.len()).any(|w| w == uncounted));

    let loaded = load_map(bytes.as_slice(), &table).unwrap();
    assert_eq!(loaded, map);
    let items = &loaded.tile(Position::new(300, 300, 7)).unwrap().items;
    assert_eq!(items[0].attribute(ItemAttr::Count), Some(&AttrValue::Byte(9)));
    assert_eq!(items[1].count(), None);
    assert_eq!(items[2].count(), None);
}

#[test]
fn test_second_ground_item_stays_stacked() {
    let table = item_table();
    let mut map = Map::new(FormatVersion::Otbm3, ClientVersion(1000));
    let mut tile = Tile::new(Position::new(50, 50, 7));
    tile.push_item(item(&table, GRASS));
    tile.push_item(item(&table, GRASS));
    tile.push_item(item(&table, BAG));
    map.insert_tile(tile);

    let loaded = load_map(save_to_vec(&map).as_slice(), &table).unwrap();
    let tile = loaded.tile(Position::new(50, 50, 7)).unwrap();
    assert!(tile.ground.is_some());
    assert_eq!(tile.items.len(), 2);
    assert_eq!(loaded, map);
}

#[test]
fn test_node_framing_balanced() {
    // no payload byte in this map reaches the marker range
    let mut map = Map::new(FormatVersion::Otbm3, ClientVersion(1000));
    let table = item_table();
    let mut tile = Tile::new(Position::new(100, 100, 7));
    tile.ground = Some(item(&table, GRASS));
    map.insert_tile(tile);
    map.waypoints.push(Waypoint {
        name: "a".into(),
        position: Position::new(100, 101, 7),
    });
    let bytes = save_to_vec(&map);
    let starts = bytes.iter().filter(|&&b| b == NODE_START).count();
    let ends = bytes.iter().filter(|&&b| b == NODE_END).count();
    assert_eq!(starts, ends);
    assert_eq!(starts, 7);
}

#[test]
fn test_truncated_stream_is_fatal() {
    let bytes = v1_stream();
    for cut in [1, 9, bytes.len() / 2, bytes.len() - 1] {
        let err = load_map(&bytes[..cut], &item_table()).unwrap_err();
        assert!(
            matches!(
                err,
                MapError::Codec(OtbmError::MalformedStream { .. } | OtbmError::CorruptData { .. })
            ),
            "cut at {cut}: {err}"
        );
    }
}

#[test]
fn test_unknown_item_aborts() {
    let err = load_map(v1_stream().as_slice(), &ItemTypeTable::new()).unwrap_err();
    assert!(matches!(err, MapError::Codec(OtbmError::UnknownItem(COINS))));
}

#[test]
fn test_unknown_node_type_is_malformed() {
    let mut bytes = v1_stream();
    // retag the tile node
    let tile_at = bytes
        .windows(2)
        .position(|w| w == [NODE_START, NodeType::Tile.as_u8()])
        .unwrap();
    bytes[tile_at + 1] = 0x40;
    let err = load_map(bytes.as_slice(), &item_table()).unwrap_err();
    assert!(matches!(err, MapError::Codec(OtbmError::MalformedStream { .. })));
}

#[test]
fn test_unsupported_format_major() {
    let mut bytes = v1_stream();
    bytes[5] = 9;
    let err = load_map(bytes.as_slice(), &item_table()).unwrap_err();
    assert!(matches!(err, MapError::Codec(OtbmError::UnsupportedVersion(_))));
}

#[test]
fn test_client_out_of_range_is_unsupported() {
    let mut bytes = v1_stream();
    // client attribute payload starts at byte 12
    assert_eq!(&bytes[12..14], &[0x34, 0x03]);
    bytes[13] = 0x27;
    let err = load_map(bytes.as_slice(), &item_table()).unwrap_err();
    assert!(
        matches!(err, MapError::Codec(OtbmError::UnsupportedVersion(ref msg)) if msg.contains("10036")),
        "{err}"
    );
}

#[test]
fn test_misplaced_node() {
    let mut bytes = v1_stream();
    let tile_at = bytes
        .windows(2)
        .position(|w| w == [NODE_START, NodeType::Tile.as_u8()])
        .unwrap();
    bytes[tile_at + 1] = NodeType::Town.as_u8();
    let err = load_map(bytes.as_slice(), &item_table()).unwrap_err();
    assert!(matches!(err, MapError::UnexpectedNode { parent: "tile area", .. }));
}
