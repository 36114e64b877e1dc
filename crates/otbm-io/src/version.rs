//! Format and client version identifiers.
//!
//! The two axes are independent: the format version describes the node
//! schema, the client version gates which item attributes and item ids
//! exist. Compatibility between them lives in `otbm-convert`.

use std::fmt;

/// OTBM structural revision. Ordinals are the on-wire major version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum FormatVersion {
    Otbm1 = 0,
    Otbm2 = 1,
    Otbm3 = 2,
    Otbm4 = 3,
}

impl FormatVersion {
    /// Every revision, oldest first.
    pub const ALL: [Self; 4] = [Self::Otbm1, Self::Otbm2, Self::Otbm3, Self::Otbm4];
    pub const LATEST: Self = Self::Otbm4;

    /// Decode the on-wire ordinal.
    #[must_use]
    pub const fn from_ordinal(ordinal: u32) -> Option<Self> {
        match ordinal {
            0 => Some(Self::Otbm1),
            1 => Some(Self::Otbm2),
            2 => Some(Self::Otbm3),
            3 => Some(Self::Otbm4),
            _ => None,
        }
    }

    /// Parse a human spelling: `"1"`..`"4"`, `"v3"`, `"otbm_2"`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.trim().to_ascii_lowercase();
        let digits = lower
            .trim_start_matches("otbm")
            .trim_start_matches(['_', '-', ' '])
            .trim_start_matches('v');
        let n: u32 = digits.parse().ok()?;
        n.checked_sub(1).and_then(Self::from_ordinal)
    }

    #[inline]
    #[must_use]
    pub const fn ordinal(self) -> u32 {
        self as u32
    }

    /// Human revision number (1-based).
    #[inline]
    #[must_use]
    pub const fn number(self) -> u32 {
        self as u32 + 1
    }

    /// The next revision up, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        Self::from_ordinal(self as u32 + 1)
    }

    /// The next revision down, if any.
    #[must_use]
    pub const fn prev(self) -> Option<Self> {
        match self {
            Self::Otbm1 => None,
            other => Self::from_ordinal(other as u32 - 1),
        }
    }

    #[inline]
    #[must_use]
    pub const fn supports_waypoints(self) -> bool {
        self as u32 >= Self::Otbm3 as u32
    }

    #[inline]
    #[must_use]
    pub const fn supports_attribute_map(self) -> bool {
        self as u32 >= Self::Otbm4 as u32
    }

    /// Whether items carry the bare subtype byte after their id.
    #[inline]
    #[must_use]
    pub const fn has_inline_subtype(self) -> bool {
        matches!(self, Self::Otbm1)
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OTBM_{}", self.number())
    }
}

/// Game client protocol version, e.g. `ClientVersion(860)` for 8.60.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientVersion(pub u32);

impl ClientVersion {
    pub const V750: Self = Self(750);
    pub const V820: Self = Self(820);
    pub const V900: Self = Self(900);
    pub const V1000: Self = Self(1000);
    pub const V1057: Self = Self(1057);
    pub const V1094: Self = Self(1094);
    pub const V1200: Self = Self(1200);
    pub const V1300: Self = Self(1300);

    pub const MIN: Self = Self::V750;
    pub const MAX: Self = Self::V1300;

    /// Released client versions the item tables know about.
    pub const KNOWN: &'static [u32] = &[
        750, 760, 770, 780, 790, 792, 800, 810, 811, 820, 830, 840, 841, 842, 850, 854, 860, 861,
        862, 870, 871, 872, 873, 900, 910, 920, 940, 944, 953, 960, 961, 963, 970, 980, 981, 982,
        983, 985, 986, 1010, 1020, 1021, 1030, 1031, 1035, 1036, 1038, 1057, 1058, 1059, 1060,
        1061, 1062, 1063, 1064, 1092, 1093, 1094, 1095, 1096, 1097, 1098, 1099, 1100, 1110, 1132,
        1140, 1150, 1171, 1180, 1185, 1200, 1210, 1215, 1220, 1240, 1250, 1260, 1270, 1280, 1281,
        1300,
    ];

    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Within the supported range (not necessarily a released client).
    #[must_use]
    pub const fn in_range(self) -> bool {
        self.0 >= Self::MIN.0 && self.0 <= Self::MAX.0
    }

    /// Listed in [`ClientVersion::KNOWN`].
    #[must_use]
    pub fn is_known(self) -> bool {
        Self::KNOWN.binary_search(&self.0).is_ok()
    }

    /// Parse `"860"` or the dotted `"8.60"`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some((major, minor)) = s.split_once('.') {
            let major: u32 = major.parse().ok()?;
            let minor: u32 = minor.parse().ok()?;
            if minor >= 100 {
                return None;
            }
            return Some(Self(major * 100 + minor));
        }
        s.parse().ok().map(Self)
    }
}

impl fmt::Display for ClientVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl From<u32> for ClientVersion {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_ordering() {
        assert!(FormatVersion::Otbm1 < FormatVersion::Otbm4);
        assert_eq!(FormatVersion::Otbm2.next(), Some(FormatVersion::Otbm3));
        assert_eq!(FormatVersion::Otbm4.next(), None);
        assert_eq!(FormatVersion::Otbm1.prev(), None);
        assert_eq!(FormatVersion::Otbm3.prev(), Some(FormatVersion::Otbm2));
    }

    #[test]
    fn test_format_features_are_cumulative() {
        let mut waypoints = false;
        let mut map = false;
        for v in FormatVersion::ALL {
            assert!(!waypoints || v.supports_waypoints());
            assert!(!map || v.supports_attribute_map());
            waypoints = v.supports_waypoints();
            map = v.supports_attribute_map();
        }
        assert!(!FormatVersion::Otbm2.supports_waypoints());
        assert!(FormatVersion::Otbm3.supports_waypoints());
        assert!(!FormatVersion::Otbm3.supports_attribute_map());
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(FormatVersion::parse("1"), Some(FormatVersion::Otbm1));
        assert_eq!(FormatVersion::parse("v3"), Some(FormatVersion::Otbm3));
        assert_eq!(FormatVersion::parse("OTBM_4"), Some(FormatVersion::Otbm4));
        assert_eq!(FormatVersion::parse("0"), None);
        assert_eq!(FormatVersion::parse("5"), None);
        assert_eq!(FormatVersion::Otbm2.to_string(), "OTBM_2");
    }

    #[test]
    fn test_client_parse_and_display() {
        assert_eq!(ClientVersion::parse("860"), Some(ClientVersion(860)));
        assert_eq!(ClientVersion::parse("8.60"), Some(ClientVersion(860)));
        assert_eq!(ClientVersion::parse("10.98"), Some(ClientVersion(1098)));
        assert_eq!(ClientVersion::parse("x"), None);
        assert_eq!(ClientVersion(860).to_string(), "8.60");
        assert_eq!(ClientVersion(1300).to_string(), "13.00");
    }

    #[test]
    fn test_known_list_sorted() {
        assert!(ClientVersion::KNOWN.windows(2).all(|w| w[0] < w[1]));
        assert!(ClientVersion(860).is_known());
        assert!(!ClientVersion(861 + 1000).is_known());
        assert!(ClientVersion(1299).in_range());
        assert!(!ClientVersion(740).in_range());
    }
}
