//! Legacy ↔ modern attribute names.

use std::collections::{BTreeMap, BTreeSet};

const PAIRS: &[(&str, &str)] = &[
    ("aid", "actionid"),
    ("uid", "uniqueid"),
    ("desc", "description"),
];

const LEGACY: &[&str] = &["aid", "uid", "charges", "count", "text", "desc", "tier"];

const MODERN: &[&str] = &[
    "actionid",
    "uniqueid",
    "description",
    "weight",
    "attack",
    "defense",
    "extradefense",
    "armor",
    "hitchance",
    "shootrange",
];

/// Bidirectional name table, fixed after construction.
///
/// Each mapped name has exactly one partner, so
/// `modern_name(legacy_name(x)) == x` for every mapped `x`. Names without a
/// partner map to themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeNameMap {
    to_modern: BTreeMap<&'static str, &'static str>,
    to_legacy: BTreeMap<&'static str, &'static str>,
    legacy: BTreeSet<&'static str>,
    modern: BTreeSet<&'static str>,
}

impl Default for AttributeNameMap {
    fn default() -> Self {
        Self::standard()
    }
}

impl AttributeNameMap {
    #[must_use]
    pub fn standard() -> Self {
        Self {
            to_modern: PAIRS.iter().copied().collect(),
            to_legacy: PAIRS.iter().map(|&(l, m)| (m, l)).collect(),
            legacy: LEGACY.iter().copied().collect(),
            modern: MODERN.iter().copied().collect(),
        }
    }

    #[must_use]
    pub fn modern_name<'a>(&self, legacy: &'a str) -> &'a str {
        self.to_modern.get(legacy).copied().unwrap_or(legacy)
    }

    #[must_use]
    pub fn legacy_name<'a>(&self, modern: &'a str) -> &'a str {
        self.to_legacy.get(modern).copied().unwrap_or(modern)
    }

    #[must_use]
    pub fn is_legacy(&self, name: &str) -> bool {
        self.legacy.contains(name)
    }

    #[must_use]
    pub fn is_modern(&self, name: &str) -> bool {
        self.modern.contains(name)
    }

    /// `(legacy, modern)` pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.to_modern.iter().map(|(l, m)| (*l, *m))
    }
}
