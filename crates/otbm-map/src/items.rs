//! Item-type table: the item factory backing map loads.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use otbm_io::{ItemFactory, ItemGroup, ItemProperties};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{MapError, MapResult};
use crate::item::Item;

/// One entry of an item-type JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTypeEntry {
    pub id: u16,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub stackable: bool,
    #[serde(default = "default_group")]
    pub group: String,
}

fn default_group() -> String {
    "none".to_owned()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemType {
    pub name: String,
    pub properties: ItemProperties,
}

/// Known item types keyed by server id.
///
/// A strict table refuses unknown ids, which makes the reader abort. A
/// permissive table creates unknown ids with default properties; it cannot
/// parse OTBM v1 stackables correctly, since it does not know which ids
/// carry the inline subtype byte.
#[derive(Debug, Clone, Default)]
pub struct ItemTypeTable {
    types: HashMap<u16, ItemType>,
    permissive: bool,
}

impl ItemTypeTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn permissive() -> Self {
        Self {
            types: HashMap::new(),
            permissive: true,
        }
    }

    #[must_use]
    pub const fn is_permissive(&self) -> bool {
        self.permissive
    }

    pub fn from_entries(entries: impl IntoIterator<Item = ItemTypeEntry>) -> MapResult<Self> {
        let mut table = Self::new();
        for entry in entries {
            let group = ItemGroup::from_name(&entry.group.to_ascii_lowercase()).ok_or_else(|| {
                MapError::InvalidItemTable(format!("item {}: unknown group {:?}", entry.id, entry.group))
            })?;
            let props = ItemProperties {
                stackable: entry.stackable,
                group,
            };
            if table.types.contains_key(&entry.id) {
                return Err(MapError::InvalidItemTable(format!("duplicate item id {}", entry.id)));
            }
            table.insert(entry.id, entry.name, props);
        }
        Ok(table)
    }

    pub fn from_json_str(json: &str) -> MapResult<Self> {
        let entries: Vec<ItemTypeEntry> = serde_json::from_str(json)?;
        Self::from_entries(entries)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> MapResult<Self> {
        let path = path.as_ref();
        let table = Self::from_json_str(&fs::read_to_string(path)?)?;
        info!(path = %path.display(), types = table.len(), "loaded item types");
        Ok(table)
    }

    pub fn insert(&mut self, id: u16, name: impl Into<String>, properties: ItemProperties) {
        self.types.insert(
            id,
            ItemType {
                name: name.into(),
                properties,
            },
        );
    }

    #[must_use]
    pub fn get(&self, id: u16) -> Option<&ItemType> {
        self.types.get(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl ItemFactory for ItemTypeTable {
    type Item = Item;

    fn create_item(&self, id: u16) -> Option<Item> {
        self.properties(id).map(|props| Item::new(id, props))
    }

    fn properties(&self, id: u16) -> Option<ItemProperties> {
        match self.types.get(&id) {
            Some(ty) => Some(ty.properties),
            None if self.permissive => Some(ItemProperties::default()),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_table() {
        let table = ItemTypeTable::from_json_str(
            r#"[
                {"id": 100, "name": "grass", "group": "ground"},
                {"id": 2148, "name": "gold coin", "stackable": true},
                {"id": 2006, "name": "vial", "group": "Fluid"}
            ]"#,
        )
        .unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.properties(100).unwrap().group, ItemGroup::Ground);
        assert!(table.properties(2148).unwrap().has_subtype());
        assert!(table.properties(2006).unwrap().has_subtype());
        assert!(table.create_item(1).is_none());
    }

    #[test]
    fn test_bad_group_and_duplicates() {
        assert!(matches!(
            ItemTypeTable::from_json_str(r#"[{"id": 1, "group": "banana"}]"#),
            Err(MapError::InvalidItemTable(_))
        ));
        assert!(matches!(
            ItemTypeTable::from_json_str(r#"[{"id": 1}, {"id": 1}]"#),
            Err(MapError::InvalidItemTable(_))
        ));
    }

    #[test]
    fn test_permissive() {
        let table = ItemTypeTable::permissive();
        let item = table.create_item(4242).unwrap();
        assert_eq!(item.id, 4242);
        assert!(!item.properties.has_subtype());
    }
}
