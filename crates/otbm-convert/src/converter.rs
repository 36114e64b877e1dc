//! The version converter.
//!
//! Format conversion is a walk over single-revision steps:
//!
//! ```text
//!   OTBM_1 ──1→2──► OTBM_2 ──2→3──► OTBM_3 ──3→4──► OTBM_4
//!          ◄──2→1──        ◄──3→2──        ◄──4→3──
//! ```
//!
//! Each step rewrites the whole map. The full path is planned before the
//! first step runs, so an impossible target never leaves a half-converted
//! map. Client-level conversion (item ids, charges, tier, podium outfits)
//! runs before the walk, or alone when the formats already match.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use otbm_io::{ClientVersion, FormatVersion};
use otbm_map::{AttrValue, CustomValue, Item, ItemAttr, Map, Position};
use tracing::{debug, error, info, warn};

use crate::compat::{
    describe_client, describe_format, is_valid_client_version, is_version_compatible,
    supports_charges, supports_podium, supports_tier,
};
use crate::error::ConvertError;
use crate::item_ids::ItemIdTables;
use crate::names::AttributeNameMap;
use crate::result::{ConversionResult, LogEntry, LogLevel, StepTrace};

/// Target used by [`VersionConverter::convert_to_defaults`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConverterDefaults {
    pub format: FormatVersion,
    pub client: ClientVersion,
}

impl Default for ConverterDefaults {
    fn default() -> Self {
        Self {
            format: FormatVersion::Otbm4,
            client: ClientVersion::V1300,
        }
    }
}

/// Progress observer: `(percent, label)`, called synchronously.
pub type ProgressFn = Box<dyn FnMut(u8, &str) + Send>;

/// Converts one map at a time. Name and id tables are shared read-only and
/// may back several converters working on different maps.
pub struct VersionConverter {
    defaults: ConverterDefaults,
    names: Arc<AttributeNameMap>,
    item_ids: Arc<ItemIdTables>,
    progress: Option<ProgressFn>,
    log: Vec<LogEntry>,
    verbose: bool,
}

impl fmt::Debug for VersionConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionConverter")
            .field("defaults", &self.defaults)
            .field("log_entries", &self.log.len())
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

const STEP_GUARD_LIMIT: usize = 8;

const CONSOLIDATED_ATTRS: [ItemAttr; 3] = [ItemAttr::ActionId, ItemAttr::UniqueId, ItemAttr::Desc];

#[derive(Clone, Copy)]
struct FormatStep {
    step_id: &'static str,
    from: FormatVersion,
    to: FormatVersion,
    apply: fn(&mut Map, &mut StepState<'_>) -> usize,
}

const FORMAT_STEPS: &[FormatStep] = &[
    FormatStep {
        step_id: "otbm1_to_otbm2",
        from: FormatVersion::Otbm1,
        to: FormatVersion::Otbm2,
        apply: subtype_to_count,
    },
    FormatStep {
        step_id: "otbm2_to_otbm3",
        from: FormatVersion::Otbm2,
        to: FormatVersion::Otbm3,
        apply: enable_waypoints,
    },
    FormatStep {
        step_id: "otbm3_to_otbm4",
        from: FormatVersion::Otbm3,
        to: FormatVersion::Otbm4,
        apply: consolidate_attributes,
    },
    FormatStep {
        step_id: "otbm4_to_otbm3",
        from: FormatVersion::Otbm4,
        to: FormatVersion::Otbm3,
        apply: expand_attribute_map,
    },
    FormatStep {
        step_id: "otbm3_to_otbm2",
        from: FormatVersion::Otbm3,
        to: FormatVersion::Otbm2,
        apply: drop_waypoints,
    },
    FormatStep {
        step_id: "otbm2_to_otbm1",
        from: FormatVersion::Otbm2,
        to: FormatVersion::Otbm1,
        apply: count_to_subtype,
    },
];

fn select_step(from: FormatVersion, to: FormatVersion) -> Option<&'static FormatStep> {
    FORMAT_STEPS.iter().find(|s| s.from == from && s.to == to)
}

/// The ordered steps from `from` to `to`.
fn plan_steps(from: FormatVersion, to: FormatVersion) -> Result<Vec<&'static FormatStep>, String> {
    let mut steps = Vec::new();
    let mut current = from;
    while current != to {
        if steps.len() >= STEP_GUARD_LIMIT {
            return Err(format!("no step path from {from} to {to}"));
        }
        let next = if current < to { current.next() } else { current.prev() };
        let step = next
            .and_then(|n| select_step(current, n))
            .ok_or_else(|| format!("no conversion step out of {current} towards {to}"))?;
        steps.push(step);
        current = step.to;
    }
    Ok(steps)
}

fn check_target(format: FormatVersion, client: ClientVersion) -> Result<(), String> {
    if !is_valid_client_version(client) {
        return Err(format!("invalid target client version: {}", client.get()));
    }
    if !is_version_compatible(format, client) {
        return Err(format!("{format} is not compatible with client {}", client.get()));
    }
    Ok(())
}

/// Mutable state shared by the steps of one run.
struct StepState<'a> {
    names: &'a AttributeNameMap,
    item_ids: &'a ItemIdTables,
    result: ConversionResult,
    touched_tiles: BTreeSet<Position>,
}

impl StepState<'_> {
    /// Apply `f` to every item; returns how many reported a change.
    fn rewrite_items(&mut self, map: &mut Map, mut f: impl FnMut(&mut Item) -> bool) -> usize {
        let mut total = 0;
        for tile in map.tiles.values_mut() {
            let mut hits = 0;
            tile.visit_items_mut(&mut |item| {
                if f(item) {
                    hits += 1;
                }
            });
            if hits > 0 {
                self.touched_tiles.insert(tile.position);
                total += hits;
            }
        }
        total
    }
}

impl VersionConverter {
    /// A converter with the standard name map and the stock id tables.
    pub fn new(defaults: ConverterDefaults) -> Result<Self, ConvertError> {
        Ok(Self::with_tables(defaults, Arc::new(ItemIdTables::builtin()?)))
    }

    #[must_use]
    pub fn with_tables(defaults: ConverterDefaults, item_ids: Arc<ItemIdTables>) -> Self {
        Self {
            defaults,
            names: Arc::new(AttributeNameMap::standard()),
            item_ids,
            progress: None,
            log: Vec::new(),
            verbose: false,
        }
    }

    #[must_use]
    pub fn with_names(mut self, names: Arc<AttributeNameMap>) -> Self {
        self.names = names;
        self
    }

    /// Install a progress observer, replacing any previous one.
    pub fn on_progress(&mut self, callback: impl FnMut(u8, &str) + Send + 'static) {
        self.progress = Some(Box::new(callback));
    }

    #[must_use]
    pub const fn defaults(&self) -> ConverterDefaults {
        self.defaults
    }

    pub fn set_defaults(&mut self, defaults: ConverterDefaults) {
        self.defaults = defaults;
    }

    #[must_use]
    pub fn names(&self) -> &AttributeNameMap {
        &self.names
    }

    #[must_use]
    pub fn item_ids(&self) -> &ItemIdTables {
        &self.item_ids
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    #[must_use]
    pub const fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Entries accumulated since the last clear.
    #[must_use]
    pub fn conversion_log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn clear_conversion_log(&mut self) {
        self.log.clear();
    }

    /// [`VersionConverter::convert_map_version`] towards the configured defaults.
    pub fn convert_to_defaults(&mut self, map: &mut Map) -> ConversionResult {
        let ConverterDefaults { format, client } = self.defaults;
        self.convert_map_version(map, format, client)
    }

    /// Bring `map` to `target_format` and `target_client`.
    ///
    /// An invalid or incompatible target is reported before the map is
    /// touched. Anything lost along the way becomes a warning.
    pub fn convert_map_version(
        &mut self,
        map: &mut Map,
        target_format: FormatVersion,
        target_client: ClientVersion,
    ) -> ConversionResult {
        if let Err(msg) = check_target(target_format, target_client) {
            self.log_error(msg.clone());
            return ConversionResult::failed(msg);
        }
        let from_format = map.format();
        let from_client = map.client;
        let steps = match plan_steps(from_format, target_format) {
            Ok(steps) => steps,
            Err(msg) => {
                self.log_error(msg.clone());
                return ConversionResult::failed(msg);
            }
        };

        self.log_info(format!(
            "converting map from {} to {}, {}",
            describe_format(from_format, map.version.minor, map.version.build),
            describe_format(target_format, map.version.minor, map.version.build),
            describe_client(target_client)
        ));

        let names = Arc::clone(&self.names);
        let item_ids = Arc::clone(&self.item_ids);
        let mut state = StepState {
            names: &names,
            item_ids: &item_ids,
            result: ConversionResult::default(),
            touched_tiles: BTreeSet::new(),
        };

        let client_changes = from_client != target_client;
        let total = steps.len() + usize::from(client_changes);
        // client data first, so the format walk sees what the target client keeps
        if client_changes {
            let label = format!("client {} to {}", from_client.get(), target_client.get());
            self.report_progress(percent(0, total), &label);
            let warned = state.result.warnings.len();
            let touched = convert_client(map, from_client, target_client, &mut state);
            map.client = target_client;
            state.result.items_converted += touched;
            self.log_info(format!("{label}: {touched} item(s) rewritten"));
            for w in &state.result.warnings[warned..] {
                self.log_warning(w.clone());
            }
        }

        let done = usize::from(client_changes);
        for (i, step) in steps.iter().enumerate() {
            self.report_progress(percent(done + i, total), step.step_id);
            let warned = state.result.warnings.len();
            let touched = (step.apply)(map, &mut state);
            map.version.format = step.to;
            state.result.items_converted += touched;
            state.result.steps.push(StepTrace {
                step_id: step.step_id,
                from: step.from,
                to: step.to,
                items_touched: touched,
            });
            self.log_info(format!("{}: {touched} item(s) rewritten", step.step_id));
            for w in &state.result.warnings[warned..] {
                self.log_warning(w.clone());
            }
        }

        let mut result = state.result;
        result.tiles_converted = state.touched_tiles.len();
        result.success = true;
        self.report_progress(100, "done");
        info!(
            from = %from_format,
            to = %target_format,
            client = target_client.get(),
            steps = result.steps.len(),
            items = result.items_converted,
            tiles = result.tiles_converted,
            warnings = result.warnings.len(),
            "map conversion finished"
        );
        result
    }

    /// Check a conversion without touching the map.
    pub fn validate_conversion(
        &self,
        map: &Map,
        target_format: FormatVersion,
        target_client: ClientVersion,
    ) -> ConversionResult {
        if let Err(msg) = check_target(target_format, target_client) {
            return ConversionResult::failed(msg);
        }
        if let Err(msg) = plan_steps(map.format(), target_format) {
            return ConversionResult::failed(msg);
        }

        let mut result = ConversionResult::default();
        if !target_format.supports_waypoints() && !map.waypoints.is_empty() {
            result.warn(format!(
                "{} waypoint(s) will be lost in {target_format}",
                map.waypoints.len()
            ));
        }

        let (mut custom, mut charges, mut tiers, mut podiums) = (0, 0, 0, 0);
        map.visit_items(&mut |item| {
            custom += usize::from(!item.custom.is_empty());
            charges += usize::from(item.has_attribute(ItemAttr::Charges));
            tiers += usize::from(item.has_attribute(ItemAttr::Tier));
            podiums += usize::from(item.podium.is_some());
        });
        let client = target_client.get();
        if !target_format.supports_attribute_map() && custom > 0 {
            result.warn(format!(
                "extended attributes on {custom} item(s) may be lost in {target_format}"
            ));
        }
        if !supports_charges(target_client) && charges > 0 {
            result.warn(format!(
                "charge attributes on {charges} item(s) will be converted to count for client {client}"
            ));
        }
        if !supports_tier(target_client) && tiers > 0 {
            result.warn(format!(
                "tier attributes on {tiers} item(s) will be removed for client {client}"
            ));
        }
        if !supports_podium(target_client) && podiums > 0 {
            result.warn(format!(
                "podium outfits on {podiums} item(s) will be removed for client {client}"
            ));
        }
        result.success = true;
        result
    }

    /// Validate, then convert. A failed validation leaves the map untouched.
    pub fn perform_conversion(
        &mut self,
        map: &mut Map,
        target_format: FormatVersion,
        target_client: ClientVersion,
    ) -> ConversionResult {
        let validation = self.validate_conversion(map, target_format, target_client);
        if !validation.is_success() {
            self.log_error(format!(
                "conversion rejected: {}",
                validation.error().unwrap_or("validation failed")
            ));
            return validation;
        }
        self.convert_map_version(map, target_format, target_client)
    }

    /// Rename keys towards `to`'s naming and drop what the default client
    /// cannot hold.
    ///
    /// Legacy names become modern ones when `to` has attribute maps, and the
    /// reverse otherwise. `charges` becomes `count` and `tier` is dropped
    /// when the default client lacks them.
    #[must_use]
    pub fn convert_attribute_map_for_version<V: Clone>(
        &self,
        attributes: &BTreeMap<String, V>,
        from: FormatVersion,
        to: FormatVersion,
    ) -> BTreeMap<String, V> {
        let client = self.defaults.client;
        let mut out = BTreeMap::new();
        for (key, value) in attributes {
            let mut name = key.as_str();
            if name == "tier" && !supports_tier(client) {
                debug!(%from, %to, "dropping tier for client {}", client.get());
                continue;
            }
            if name == "charges" && !supports_charges(client) {
                if attributes.contains_key("count") {
                    continue;
                }
                name = "count";
            }
            let renamed = if to.supports_attribute_map() && self.names.is_legacy(name) {
                self.names.modern_name(name)
            } else if !to.supports_attribute_map() && self.names.is_modern(name) {
                self.names.legacy_name(name)
            } else {
                name
            };
            out.entry(renamed.to_owned()).or_insert_with(|| value.clone());
        }
        out
    }

    #[must_use]
    pub fn convert_item_id_for_client(&self, id: u16, from: ClientVersion, to: ClientVersion) -> u16 {
        self.item_ids.convert(id, from, to)
    }

    #[must_use]
    pub fn item_id_conversion_map(&self, from: ClientVersion, to: ClientVersion) -> BTreeMap<u16, u16> {
        self.item_ids.conversion_map(from, to)
    }

    #[must_use]
    pub fn has_item_id_changed(&self, id: u16, from: ClientVersion, to: ClientVersion) -> bool {
        self.item_ids.has_changed(id, from, to)
    }

    fn report_progress(&mut self, percent: u8, label: &str) {
        if let Some(callback) = self.progress.as_mut() {
            callback(percent, label);
        }
    }

    fn log_info(&mut self, message: String) {
        if self.verbose {
            info!("{message}");
        } else {
            debug!("{message}");
        }
        self.log.push(LogEntry {
            level: LogLevel::Info,
            message,
        });
    }

    fn log_warning(&mut self, message: String) {
        warn!("{message}");
        self.log.push(LogEntry {
            level: LogLevel::Warning,
            message,
        });
    }

    fn log_error(&mut self, message: String) {
        error!("{message}");
        self.log.push(LogEntry {
            level: LogLevel::Error,
            message,
        });
    }
}

fn percent(done: usize, total: usize) -> u8 {
    u8::try_from(((done + 1) * 100 / (total + 1)).min(100)).unwrap_or(100)
}

/// Stackable and fluid items carrying a count: their count switches between
/// the v1 inline byte and the count attribute at save time.
fn count_representation(map: &mut Map, st: &mut StepState<'_>) -> usize {
    let touched = st.rewrite_items(map, |item| {
        item.properties.has_subtype() && item.count().is_some()
    });
    st.result.attributes_converted += touched;
    touched
}

/// v1 → v2: inline subtype bytes become count attributes.
fn subtype_to_count(map: &mut Map, st: &mut StepState<'_>) -> usize {
    count_representation(map, st)
}

/// v2 → v3: waypoints become available; no data moves.
fn enable_waypoints(_map: &mut Map, st: &mut StepState<'_>) -> usize {
    st.result.features_added += 1;
    0
}

/// v3 → v4: action id, unique id and description move into the attribute map.
fn consolidate_attributes(map: &mut Map, st: &mut StepState<'_>) -> usize {
    let names = st.names;
    let mut attrs = 0;
    let touched = st.rewrite_items(map, |item| {
        let mut moved = false;
        for attr in CONSOLIDATED_ATTRS {
            let key = names.modern_name(attr.legacy_name());
            if item.custom.contains_key(key) {
                continue;
            }
            let Some(value) = item.remove_attribute(attr) else {
                continue;
            };
            let value = match value {
                AttrValue::Byte(v) => CustomValue::Integer(v.into()),
                AttrValue::Short(v) => CustomValue::Integer(v.into()),
                AttrValue::Long(v) => CustomValue::Integer(v.into()),
                AttrValue::Text(s) => CustomValue::String(s),
            };
            item.custom.insert(key.to_owned(), value);
            attrs += 1;
            moved = true;
        }
        moved
    });
    st.result.attributes_converted += attrs;
    st.result.features_added += 1;
    touched
}

/// v4 → v3: attribute-map entries go back to typed attributes where one
/// exists; the rest is dropped.
fn expand_attribute_map(map: &mut Map, st: &mut StepState<'_>) -> usize {
    let names = st.names;
    let mut attrs = 0;
    let mut dropped: BTreeMap<String, usize> = BTreeMap::new();
    let touched = st.rewrite_items(map, |item| {
        if item.custom.is_empty() {
            return false;
        }
        for (key, value) in std::mem::take(&mut item.custom) {
            let restored = ItemAttr::from_legacy_name(names.legacy_name(&key))
                .filter(|attr| !item.has_attribute(*attr))
                .and_then(|attr| custom_to_attr(value).map(|v| (attr, v)))
                .is_some_and(|(attr, v)| item.set_attribute(attr, v));
            if restored {
                attrs += 1;
            } else {
                *dropped.entry(key).or_default() += 1;
            }
        }
        true
    });
    for (key, count) in dropped {
        st.result.warn(format!(
            "attribute map entry '{key}' dropped from {count} item(s): not representable in {}",
            FormatVersion::Otbm3
        ));
    }
    st.result.attributes_converted += attrs;
    st.result.features_removed += 1;
    touched
}

fn custom_to_attr(value: CustomValue) -> Option<AttrValue> {
    match value {
        CustomValue::Integer(v) => u32::try_from(v).ok().map(AttrValue::Long),
        CustomValue::String(s) => Some(AttrValue::Text(s)),
        CustomValue::Float(_) | CustomValue::Boolean(_) => None,
    }
}

/// v3 → v2: waypoints are dropped.
fn drop_waypoints(map: &mut Map, st: &mut StepState<'_>) -> usize {
    if !map.waypoints.is_empty() {
        st.result.warn(format!(
            "{} waypoint(s) dropped: {} has no waypoints",
            map.waypoints.len(),
            FormatVersion::Otbm2
        ));
        map.waypoints.clear();
        st.result.features_removed += 1;
    }
    0
}

/// v2 → v1: stackable and fluid counts go back to the inline subtype byte.
fn count_to_subtype(map: &mut Map, st: &mut StepState<'_>) -> usize {
    count_representation(map, st)
}

/// Item ids through the id tables, then strip what the target client lacks.
fn convert_client(
    map: &mut Map,
    from: ClientVersion,
    to: ClientVersion,
    st: &mut StepState<'_>,
) -> usize {
    let ids = st.item_ids;
    let strip_charges = !supports_charges(to);
    let strip_tier = !supports_tier(to);
    let strip_podium = !supports_podium(to);
    let (mut remapped, mut folded, mut tiers, mut podiums) = (0usize, 0usize, 0usize, 0usize);

    let touched = st.rewrite_items(map, |item| {
        let mut changed = false;
        let new_id = ids.convert(item.id, from, to);
        if new_id != item.id {
            item.id = new_id;
            remapped += 1;
            changed = true;
        }
        if strip_charges {
            if let Some(charges) = item.remove_attribute(ItemAttr::Charges) {
                if !item.has_attribute(ItemAttr::Count) {
                    let count = charges
                        .as_u32()
                        .map_or(u8::MAX, |v| u8::try_from(v).unwrap_or(u8::MAX));
                    item.set_count(count);
                }
                folded += 1;
                changed = true;
            }
        }
        if strip_tier && item.remove_attribute(ItemAttr::Tier).is_some() {
            tiers += 1;
            changed = true;
        }
        if strip_podium && item.podium.take().is_some() {
            podiums += 1;
            changed = true;
        }
        changed
    });

    let client = to.get();
    if folded > 0 {
        st.result.warn(format!(
            "charges folded into count on {folded} item(s): client {client} has no charges"
        ));
        st.result.features_removed += 1;
        st.result.attributes_converted += folded;
    }
    if tiers > 0 {
        st.result.warn(format!(
            "tier removed from {tiers} item(s): client {client} has no item tiers"
        ));
        st.result.features_removed += 1;
    }
    if podiums > 0 {
        st.result.warn(format!(
            "podium outfit removed from {podiums} item(s): client {client} has no podiums"
        ));
        st.result.features_removed += 1;
    }
    debug!(remapped, from = from.get(), to = client, "item ids remapped");
    touched
}
