//! Wire constants: structural markers, node types and attribute ids.

/// Opens a node; followed by the node-type byte.
pub const NODE_START: u8 = 0xFC;
/// Closes the innermost open node.
pub const NODE_END: u8 = 0xFD;
/// Reserved for hosts that escape payload bytes colliding with markers.
pub const ESCAPE: u8 = 0xFE;

/// Whether `byte` terminates an attribute run (start of a child or end of the node).
#[inline]
#[must_use]
pub const fn is_node_marker(byte: u8) -> bool {
    byte == NODE_START || byte == NODE_END
}

/// Whether `byte` is one of the three structural bytes.
#[inline]
#[must_use]
pub const fn is_structural(byte: u8) -> bool {
    is_node_marker(byte) || byte == ESCAPE
}

/// Node type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeType {
    Root = 1,
    MapData = 2,
    ItemDef = 3,
    TileArea = 4,
    Tile = 5,
    Item = 6,
    TileSquare = 7,
    TileRef = 8,
    Spawns = 9,
    SpawnArea = 10,
    Monster = 11,
    Towns = 12,
    Town = 13,
    HouseTile = 14,
    Waypoints = 15,
    Waypoint = 16,
}

impl NodeType {
    /// Decode a raw node-type byte.
    #[must_use]
    pub const fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            1 => Self::Root,
            2 => Self::MapData,
            3 => Self::ItemDef,
            4 => Self::TileArea,
            5 => Self::Tile,
            6 => Self::Item,
            7 => Self::TileSquare,
            8 => Self::TileRef,
            9 => Self::Spawns,
            10 => Self::SpawnArea,
            11 => Self::Monster,
            12 => Self::Towns,
            13 => Self::Town,
            14 => Self::HouseTile,
            15 => Self::Waypoints,
            16 => Self::Waypoint,
            _ => return None,
        })
    }

    /// Raw byte for this type.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<NodeType> for u8 {
    fn from(value: NodeType) -> Self {
        value.as_u8()
    }
}

/// Attributes carried by the root node.
pub mod root_attr {
    pub const VERSION_MAJOR: u8 = 1;
    pub const VERSION_MINOR: u8 = 2;
    pub const VERSION_BUILD: u8 = 3;
    pub const VERSION_DESCRIPTION: u8 = 4;
    pub const CLIENT_VERSION: u8 = 5;
    pub const ITEMS_MAJOR: u8 = 6;
    pub const ITEMS_MINOR: u8 = 7;
    pub const WIDTH: u8 = 8;
    pub const HEIGHT: u8 = 9;
}

/// Attributes carried by map-data, tile and item nodes.
pub mod attr {
    pub const DESCRIPTION: u8 = 1;
    pub const TILE_FLAGS: u8 = 3;
    pub const ACTION_ID: u8 = 4;
    pub const UNIQUE_ID: u8 = 5;
    pub const TEXT: u8 = 6;
    pub const DESC: u8 = 7;
    pub const TELE_DEST: u8 = 8;
    pub const ITEM: u8 = 9;
    pub const DEPOT_ID: u8 = 10;
    pub const EXT_SPAWN_FILE: u8 = 11;
    pub const RUNE_CHARGES: u8 = 12;
    pub const EXT_HOUSE_FILE: u8 = 13;
    pub const HOUSE_DOOR_ID: u8 = 14;
    pub const COUNT: u8 = 15;
    pub const DURATION: u8 = 16;
    pub const DECAYING_STATE: u8 = 17;
    pub const WRITTEN_DATE: u8 = 18;
    pub const WRITTEN_BY: u8 = 19;
    pub const SLEEPER_GUID: u8 = 20;
    pub const SLEEP_START: u8 = 21;
    pub const CHARGES: u8 = 22;
    pub const PODIUM_OUTFIT: u8 = 40;
    pub const TIER: u8 = 41;
    pub const ATTRIBUTE_MAP: u8 = 128;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_type_roundtrip() {
        for raw in 1..=16u8 {
            let ty = NodeType::from_u8(raw).unwrap();
            assert_eq!(ty.as_u8(), raw);
        }
        assert_eq!(NodeType::from_u8(0), None);
        assert_eq!(NodeType::from_u8(17), None);
    }

    #[test]
    fn test_markers() {
        assert!(is_node_marker(NODE_START));
        assert!(is_node_marker(NODE_END));
        assert!(!is_node_marker(ESCAPE));
        assert!(is_structural(ESCAPE));
        assert!(!is_structural(attr::ATTRIBUTE_MAP));
    }
}
