//! Format/client compatibility and feature support tables.

use std::fmt;

use otbm_io::{ClientVersion, FormatVersion};

/// Whether `major` is a known OTBM ordinal.
#[must_use]
pub fn is_valid_otbm_version(major: u32) -> bool {
    FormatVersion::from_ordinal(major).is_some()
}

#[must_use]
pub fn is_valid_client_version(client: ClientVersion) -> bool {
    client.in_range()
}

/// Which clients a format revision can be paired with.
///
/// ```text
/// OTBM_1  750 ..= 820
/// OTBM_2  820 ..= 1000
/// OTBM_3 1000 ..= 1200
/// OTBM_4 1057 ..
/// ```
#[must_use]
pub fn is_version_compatible(format: FormatVersion, client: ClientVersion) -> bool {
    let c = client.get();
    match format {
        FormatVersion::Otbm1 => (750..=820).contains(&c),
        FormatVersion::Otbm2 => (820..=1000).contains(&c),
        FormatVersion::Otbm3 => (1000..=1200).contains(&c),
        FormatVersion::Otbm4 => c >= 1057,
    }
}

/// Formats a client can be paired with, oldest first.
#[must_use]
pub fn compatible_formats(client: ClientVersion) -> Vec<FormatVersion> {
    FormatVersion::ALL
        .into_iter()
        .filter(|f| is_version_compatible(*f, client))
        .collect()
}

/// `"OTBM v3.1.0 (Waypoints support)"`.
#[must_use]
pub fn describe_format(format: FormatVersion, minor: u32, build: u32) -> String {
    let label = match format {
        FormatVersion::Otbm1 => "Legacy format",
        FormatVersion::Otbm2 => "Improved item handling",
        FormatVersion::Otbm3 => "Waypoints support",
        FormatVersion::Otbm4 => "Attribute map support",
    };
    format!("OTBM v{}.{minor}.{build} ({label})", format.number())
}

/// `"Client 860 (Classic)"`.
#[must_use]
pub fn describe_client(client: ClientVersion) -> String {
    let tier = match client.get() {
        1300.. => "Latest",
        1200.. => "Modern",
        1000.. => "Stable",
        900.. => "Classic",
        _ => "Legacy",
    };
    format!("Client {} ({tier})", client.get())
}

/// Compare `(format, minor, build)` triples.
#[must_use]
pub fn is_format_newer(a: (FormatVersion, u32, u32), b: (FormatVersion, u32, u32)) -> bool {
    a > b
}

#[must_use]
pub fn is_client_newer(a: ClientVersion, b: ClientVersion) -> bool {
    a > b
}

/// Optional map content gated by format or client version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feature {
    Waypoints,
    AttributeMap,
    HouseTiles,
    Spawns,
    Towns,
    Charges,
    Tier,
    PodiumOutfit,
}

impl Feature {
    pub const ALL: [Self; 8] = [
        Self::Waypoints,
        Self::AttributeMap,
        Self::HouseTiles,
        Self::Spawns,
        Self::Towns,
        Self::Charges,
        Self::Tier,
        Self::PodiumOutfit,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Waypoints => "waypoints",
            Self::AttributeMap => "attribute map",
            Self::HouseTiles => "house tiles",
            Self::Spawns => "spawns",
            Self::Towns => "towns",
            Self::Charges => "charges",
            Self::Tier => "tier",
            Self::PodiumOutfit => "podium outfit",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[must_use]
pub fn supports_charges(client: ClientVersion) -> bool {
    client >= ClientVersion::V820
}

#[must_use]
pub fn supports_tier(client: ClientVersion) -> bool {
    client >= ClientVersion::V1057
}

#[must_use]
pub fn supports_podium(client: ClientVersion) -> bool {
    client >= ClientVersion::V1094
}

/// Whether the target pair can carry `feature`.
#[must_use]
pub fn supports_feature(feature: Feature, format: FormatVersion, client: ClientVersion) -> bool {
    match feature {
        Feature::Waypoints => format.supports_waypoints(),
        Feature::AttributeMap => format.supports_attribute_map(),
        Feature::HouseTiles | Feature::Spawns | Feature::Towns => true,
        Feature::Charges => supports_charges(client),
        Feature::Tier => supports_tier(client),
        Feature::PodiumOutfit => supports_podium(client),
    }
}

#[must_use]
pub fn unsupported_features(format: FormatVersion, client: ClientVersion) -> Vec<Feature> {
    Feature::ALL
        .into_iter()
        .filter(|f| !supports_feature(*f, format, client))
        .collect()
}

/// Legacy attribute names the target pair cannot carry.
#[must_use]
pub fn unsupported_attributes(format: FormatVersion, client: ClientVersion) -> Vec<&'static str> {
    let mut out = Vec::new();
    if !supports_charges(client) {
        out.push("charges");
    }
    if !supports_tier(client) {
        out.push("tier");
    }
    if !supports_podium(client) {
        out.push("podiumoutfit");
    }
    if !format.supports_attribute_map() {
        out.push("attributemap");
    }
    out
}

#[must_use]
pub fn should_serialize_attribute(name: &str, format: FormatVersion, client: ClientVersion) -> bool {
    !unsupported_attributes(format, client).contains(&name)
}

#[must_use]
pub fn should_serialize_feature(feature: Feature, format: FormatVersion, client: ClientVersion) -> bool {
    supports_feature(feature, format, client)
}
