//! Item-id conversion tables between client versions.
//!
//! A table keyed by client `k` maps ids as used by clients from `k` up to
//! the next keyed client. Converting across several keys chains the tables
//! in order; converting downwards chains their inverses in reverse.
//!
//! ```text
//!   750 ──table[750]──► 820 ──table[820]──► ...
//!   750 ◄─inverse─────  820 ◄─inverse─────  ...
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use otbm_io::ClientVersion;
use serde::Deserialize;
use tracing::info;

use crate::error::ConvertError;

/// Sparse id tables; absent ids are unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemIdTables {
    forward: BTreeMap<u32, BTreeMap<u16, u16>>,
    inverse: BTreeMap<u32, BTreeMap<u16, u16>>,
}

/// JSON shape: `{ "750": { "100": 101 } }`.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct TablesFile(BTreeMap<u32, BTreeMap<u16, u16>>);

const BUILTIN: &[(u32, u16, u16)] = &[(750, 100, 101), (750, 200, 205), (820, 300, 310), (820, 400, 420)];

impl ItemIdTables {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The stock tables shipped with the converter.
    pub fn builtin() -> Result<Self, ConvertError> {
        Self::from_entries(BUILTIN.iter().copied())
    }

    /// Build tables from `(client, from, to)` entries, rejecting conflicts.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (u32, u16, u16)>,
    ) -> Result<Self, ConvertError> {
        let mut tables = Self::empty();
        for (client, from, to) in entries {
            tables.insert(ClientVersion(client), from, to)?;
        }
        Ok(tables)
    }

    /// Add `from → to` to the table of `client`.
    pub fn insert(&mut self, client: ClientVersion, from: u16, to: u16) -> Result<(), ConvertError> {
        let inverse = self.inverse.entry(client.get()).or_default();
        if let Some(prev) = inverse.get(&to) {
            if *prev != from {
                return Err(ConvertError::InvalidTable {
                    client: client.get(),
                    reason: format!("ids {prev} and {from} both map to {to}"),
                });
            }
        }
        inverse.insert(to, from);
        if let Some(old) = self.forward.entry(client.get()).or_default().insert(from, to) {
            if let Some(slot) = self.inverse.get_mut(&client.get()) {
                if old != to {
                    slot.remove(&old);
                }
            }
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConvertError> {
        let TablesFile(raw) = serde_json::from_str(json)?;
        Self::from_entries(raw.into_iter().flat_map(|(client, entries)| {
            entries.into_iter().map(move |(from, to)| (client, from, to))
        }))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let path = path.as_ref();
        let tables = Self::from_json_str(&fs::read_to_string(path)?)?;
        info!(path = %path.display(), tables = tables.forward.len(), "loaded item id tables");
        Ok(tables)
    }

    /// Map `id` from one client's numbering to another's.
    #[must_use]
    pub fn convert(&self, id: u16, from: ClientVersion, to: ClientVersion) -> u16 {
        if from < to {
            self.forward
                .range(from.get()..to.get())
                .fold(id, |id, (_, table)| table.get(&id).copied().unwrap_or(id))
        } else {
            self.inverse
                .range(to.get()..from.get())
                .rev()
                .fold(id, |id, (_, table)| table.get(&id).copied().unwrap_or(id))
        }
    }

    #[must_use]
    pub fn has_changed(&self, id: u16, from: ClientVersion, to: ClientVersion) -> bool {
        self.convert(id, from, to) != id
    }

    /// Every id that changes between the two clients, with its target.
    #[must_use]
    pub fn conversion_map(&self, from: ClientVersion, to: ClientVersion) -> BTreeMap<u16, u16> {
        let (lo, hi) = if from < to { (from, to) } else { (to, from) };
        let tables = if from < to { &self.forward } else { &self.inverse };
        let mut out = BTreeMap::new();
        for table in tables.range(lo.get()..hi.get()).map(|(_, t)| t) {
            for &id in table.keys() {
                let mapped = self.convert(id, from, to);
                if mapped != id {
                    out.insert(id, mapped);
                }
            }
        }
        out
    }

    /// Clients that own a table.
    pub fn clients(&self) -> impl Iterator<Item = ClientVersion> + '_ {
        self.forward.keys().map(|&c| ClientVersion(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const C750: ClientVersion = ClientVersion(750);
    const C820: ClientVersion = ClientVersion(820);
    const C860: ClientVersion = ClientVersion(860);

    #[test]
    fn test_identity_when_absent() {
        let t = ItemIdTables::builtin().unwrap();
        assert_eq!(t.convert(999, C750, C860), 999);
        assert_eq!(t.convert(100, C820, C860), 100);
        assert_eq!(t.convert(100, C750, C750), 100);
    }

    #[test]
    fn test_upgrade_and_downgrade() {
        let t = ItemIdTables::builtin().unwrap();
        assert_eq!(t.convert(100, C750, C820), 101);
        assert_eq!(t.convert(101, C820, C750), 100);
        assert_eq!(t.convert(300, C820, C860), 310);
        assert_eq!(t.convert(310, C860, C820), 300);
        assert!(t.has_changed(200, C750, C860));
    }

    #[test]
    fn test_chained_tables() {
        let mut t = ItemIdTables::empty();
        t.insert(C750, 1, 2).unwrap();
        t.insert(C820, 2, 3).unwrap();
        assert_eq!(t.convert(1, C750, C860), 3);
        assert_eq!(t.convert(3, C860, C750), 1);
        let map = t.conversion_map(C750, C860);
        assert_eq!(map.get(&1), Some(&3));
        assert_eq!(map.get(&2), Some(&3));
    }

    #[test]
    fn test_conflicting_entries_rejected() {
        let err = ItemIdTables::from_entries([(750, 1, 5), (820, 2, 6), (750, 3, 5)]).unwrap_err();
        assert!(
            matches!(err, ConvertError::InvalidTable { client: 750, ref reason } if reason.contains("both map to 5")),
            "{err}"
        );
        assert!(ItemIdTables::from_entries(BUILTIN.iter().copied()).is_ok());
    }

    #[test]
    fn test_rejects_non_invertible() {
        let mut t = ItemIdTables::empty();
        t.insert(C750, 1, 5).unwrap();
        assert!(t.insert(C750, 2, 5).is_err());
    }

    #[test]
    fn test_json() {
        let t = ItemIdTables::from_json_str(r#"{"750": {"100": 101}, "820": {"300": 310}}"#).unwrap();
        assert_eq!(t.convert(100, C750, C820), 101);
        assert_eq!(t.clients().count(), 2);
        assert!(ItemIdTables::from_json_str(r#"{"750": {"1": 9, "2": 9}}"#).is_err());
    }
}
