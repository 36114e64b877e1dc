//! In-memory OTBM map model with node-tree load and save.
//!
//! ```text
//!   bytes ──load_map(factory)──► Map ──save_map──► bytes
//!                                 │
//!                    tiles: BTreeMap<Position, Tile>
//!                    towns, waypoints, spawns
//! ```
//!
//! Items are created through an [`otbm_io::ItemFactory`]; [`ItemTypeTable`]
//! is the stock implementation, loadable from JSON.
//!
//! Saving writes exactly the map's own format version. Bringing a map to a
//! different version is the job of `otbm-convert`, which runs on the loaded
//! [`Map`] before saving.

mod custom;
mod error;
mod item;
mod items;
mod load;
mod model;
mod save;

pub use custom::{AttributeMap, CustomValue, decode_attribute_map, encode_attribute_map};
pub use error::{MapError, MapResult};
pub use item::{AttrKind, AttrValue, Item, ItemAttr, PodiumOutfit};
pub use items::{ItemType, ItemTypeEntry, ItemTypeTable};
pub use load::{load_map, load_map_from_path};
pub use model::{
    HouseInfo, Map, MapVersion, Monster, Position, SpawnArea, Tile, TileFlags, Town, Waypoint,
};
pub use save::{save_map, save_map_to_path};
