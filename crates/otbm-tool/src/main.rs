//! Command-line front end for OTBM maps.
//!
//! Commands:
//! - `info <map>` - Print header, counts and compatible formats
//! - `validate <map> <format> <client>` - Dry-run a conversion
//! - `convert <in> <out> [format] [client]` - Convert and save
//! - `dump <map>` - Print the node tree outline
//! - `versions` - Print the format/client compatibility table
//!
//! Environment:
//! - `OTBM_ITEMS` - JSON item type table (otherwise every id is accepted)
//! - `OTBM_ITEM_ID_TABLES` - JSON item id conversion tables
//! - `OTBM_TARGET_FORMAT`, `OTBM_TARGET_CLIENT` - Defaults for `convert`
//! - `OTBM_VERBOSE` - Log conversion steps at info level

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyre::{WrapErr, bail, eyre};
use otbm_convert::compat::{compatible_formats, describe_client, describe_format};
use otbm_convert::{ConversionResult, ConverterDefaults, ItemIdTables, VersionConverter};
use otbm_io::{ClientVersion, FormatVersion};
use otbm_map::{Item, ItemTypeTable, Map, Position, load_map_from_path, save_map_to_path};
use tracing::{info, warn};

#[derive(Debug, PartialEq, Eq)]
struct Config {
    items: Option<PathBuf>,
    item_id_tables: Option<PathBuf>,
    defaults: ConverterDefaults,
    verbose: bool,
}

impl Config {
    fn from_env() -> eyre::Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> eyre::Result<Self> {
        let mut defaults = ConverterDefaults::default();
        if let Some(s) = var("OTBM_TARGET_FORMAT") {
            defaults.format = parse_format(&s)?;
        }
        if let Some(s) = var("OTBM_TARGET_CLIENT") {
            defaults.client = parse_client(&s)?;
        }
        Ok(Self {
            items: var("OTBM_ITEMS").map(PathBuf::from),
            item_id_tables: var("OTBM_ITEM_ID_TABLES").map(PathBuf::from),
            defaults,
            verbose: var("OTBM_VERBOSE").is_some_and(|v| v != "0"),
        })
    }

    fn item_table(&self) -> eyre::Result<ItemTypeTable> {
        match &self.items {
            Some(path) => ItemTypeTable::from_json_file(path)
                .wrap_err_with(|| format!("loading item types from {}", path.display())),
            None => Ok(ItemTypeTable::permissive()),
        }
    }

    fn converter(&self) -> eyre::Result<VersionConverter> {
        let tables = match &self.item_id_tables {
            Some(path) => ItemIdTables::from_json_file(path)
                .wrap_err_with(|| format!("loading item id tables from {}", path.display()))?,
            None => ItemIdTables::builtin()?,
        };
        let mut converter = VersionConverter::with_tables(self.defaults, Arc::new(tables));
        converter.set_verbose(self.verbose);
        converter.on_progress(|percent, label| info!(percent, "{label}"));
        Ok(converter)
    }
}

fn parse_format(s: &str) -> eyre::Result<FormatVersion> {
    FormatVersion::parse(s).ok_or_else(|| eyre!("unknown OTBM format: {s}"))
}

fn parse_client(s: &str) -> eyre::Result<ClientVersion> {
    ClientVersion::parse(s).ok_or_else(|| eyre!("bad client version: {s}"))
}

fn load(config: &Config, path: &Path) -> eyre::Result<Map> {
    let table = config.item_table()?;
    let map = load_map_from_path(path, &table).wrap_err_with(|| {
        if config.items.is_some() {
            format!("loading {}", path.display())
        } else {
            format!(
                "loading {} without OTBM_ITEMS (OTBM v1 maps need stackable and fluid flags)",
                path.display()
            )
        }
    })?;
    if config.items.is_none() && map.format().has_inline_subtype() {
        warn!(
            path = %path.display(),
            "{} map loaded without OTBM_ITEMS: inline counts of stackable and fluid items were not read",
            map.format()
        );
    }
    Ok(map)
}

fn print_result(out: &mut impl Write, result: &ConversionResult) -> io::Result<()> {
    writeln!(out, "{result}")?;
    for w in result.warnings() {
        writeln!(out, "  warning: {w}")?;
    }
    for step in result.steps() {
        writeln!(out, "  {}: {} item(s)", step.step_id, step.items_touched)?;
    }
    Ok(())
}

fn cmd_info(config: &Config, path: &Path) -> eyre::Result<()> {
    let map = load(config, path)?;
    let mut out = io::stdout().lock();
    writeln!(
        out,
        "{}",
        describe_format(map.format(), map.version.minor, map.version.build)
    )?;
    writeln!(out, "{}", describe_client(map.client))?;
    writeln!(out, "size: {}x{}", map.width, map.height)?;
    writeln!(out, "description: {}", map.description)?;
    writeln!(out, "tiles: {}", map.tile_count())?;
    writeln!(out, "items: {}", map.item_count())?;
    writeln!(out, "towns: {}", map.towns.len())?;
    writeln!(out, "waypoints: {}", map.waypoints.len())?;
    writeln!(out, "spawns: {}", map.spawns.len())?;
    let formats: Vec<String> = compatible_formats(map.client)
        .into_iter()
        .map(|f| f.to_string())
        .collect();
    writeln!(out, "compatible formats: {}", formats.join(", "))?;
    Ok(())
}

fn cmd_validate(
    config: &Config,
    path: &Path,
    format: FormatVersion,
    client: ClientVersion,
) -> eyre::Result<()> {
    let map = load(config, path)?;
    let converter = config.converter()?;
    let result = converter.validate_conversion(&map, format, client);
    print_result(&mut io::stdout().lock(), &result)?;
    if !result.is_success() {
        bail!("validation failed");
    }
    Ok(())
}

fn cmd_convert(
    config: &Config,
    input: &Path,
    output: &Path,
    format: Option<FormatVersion>,
    client: Option<ClientVersion>,
) -> eyre::Result<()> {
    let mut map = load(config, input)?;
    let mut converter = config.converter()?;
    let format = format.unwrap_or(config.defaults.format);
    let client = client.unwrap_or(config.defaults.client);

    let result = converter.perform_conversion(&mut map, format, client);
    print_result(&mut io::stdout().lock(), &result)?;
    if !result.is_success() {
        bail!("conversion failed: {}", result.error().unwrap_or("unknown error"));
    }
    save_map_to_path(&map, output).wrap_err_with(|| format!("saving {}", output.display()))?;
    info!(path = %output.display(), "map written");
    Ok(())
}

fn dump_item(out: &mut impl Write, item: &Item, depth: usize) -> io::Result<()> {
    let pad = "  ".repeat(depth);
    write!(out, "{pad}item {}", item.id)?;
    if let Some(count) = item.count() {
        write!(out, " x{count}")?;
    }
    for (attr, value) in item.attributes() {
        write!(out, " {}={value:?}", attr.legacy_name())?;
    }
    if let Some(dest) = item.teleport {
        write!(out, " teleport={dest}")?;
    }
    if item.podium.is_some() {
        write!(out, " podium")?;
    }
    for (key, value) in &item.custom {
        write!(out, " {key}:{value}")?;
    }
    writeln!(out)?;
    for inner in &item.contents {
        dump_item(out, inner, depth + 1)?;
    }
    Ok(())
}

fn cmd_dump(config: &Config, path: &Path) -> eyre::Result<()> {
    let map = load(config, path)?;
    let mut out = io::stdout().lock();
    writeln!(out, "root {} client {}", map.format(), map.client)?;
    writeln!(out, "  map_data {:?}", map.description)?;
    let mut area: Option<Position> = None;
    for tile in map.tiles.values() {
        let base = tile.position.area_base();
        if area != Some(base) {
            writeln!(out, "    tile_area {base}")?;
            area = Some(base);
        }
        match tile.house {
            Some(house) => writeln!(out, "      house_tile {} house {}", tile.position, house.house_id)?,
            None => writeln!(out, "      tile {}", tile.position)?,
        }
        for item in tile.items() {
            dump_item(&mut out, item, 4)?;
        }
    }
    if !map.towns.is_empty() {
        writeln!(out, "    towns")?;
        for town in &map.towns {
            writeln!(out, "      town {} {:?} temple {}", town.id, town.name, town.temple)?;
        }
    }
    if !map.waypoints.is_empty() {
        writeln!(out, "    waypoints")?;
        for wp in &map.waypoints {
            writeln!(out, "      waypoint {:?} {}", wp.name, wp.position)?;
        }
    }
    if !map.spawns.is_empty() {
        writeln!(out, "    spawns")?;
        for spawn in &map.spawns {
            writeln!(out, "      spawn_area {} radius {}", spawn.center, spawn.radius)?;
            for m in &spawn.monsters {
                writeln!(out, "        monster {:?} ({}, {}) {}s", m.name, m.dx, m.dy, m.spawn_seconds)?;
            }
        }
    }
    Ok(())
}

fn cmd_versions() -> io::Result<()> {
    let mut out = io::stdout().lock();
    for &client in ClientVersion::KNOWN {
        let client = ClientVersion(client);
        let formats: Vec<String> = compatible_formats(client)
            .into_iter()
            .map(|f| f.to_string())
            .collect();
        writeln!(out, "{:>6}  {}", client.to_string(), formats.join(" "))?;
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Info(PathBuf),
    Validate {
        map: PathBuf,
        format: FormatVersion,
        client: ClientVersion,
    },
    Convert {
        input: PathBuf,
        output: PathBuf,
        format: Option<FormatVersion>,
        client: Option<ClientVersion>,
    },
    Dump(PathBuf),
    Versions,
}

impl Command {
    fn parse(args: &[&str]) -> eyre::Result<Self> {
        Ok(match args {
            ["info", map] => Self::Info(PathBuf::from(map)),
            ["validate", map, format, client] => Self::Validate {
                map: PathBuf::from(map),
                format: parse_format(format)?,
                client: parse_client(client)?,
            },
            ["convert", input, output, rest @ ..] if rest.len() <= 2 => Self::Convert {
                input: PathBuf::from(input),
                output: PathBuf::from(output),
                format: rest.first().map(|s| parse_format(s)).transpose()?,
                client: rest.get(1).map(|s| parse_client(s)).transpose()?,
            },
            ["dump", map] => Self::Dump(PathBuf::from(map)),
            ["versions"] => Self::Versions,
            _ => return Err(usage()),
        })
    }

    fn run(self, config: &Config) -> eyre::Result<()> {
        match self {
            Self::Info(map) => cmd_info(config, &map),
            Self::Validate { map, format, client } => cmd_validate(config, &map, format, client),
            Self::Convert {
                input,
                output,
                format,
                client,
            } => cmd_convert(config, &input, &output, format, client),
            Self::Dump(map) => cmd_dump(config, &map),
            Self::Versions => Ok(cmd_versions()?),
        }
    }
}

fn usage() -> eyre::Report {
    eyre!(
        "usage: otbm-tool <info <map> | validate <map> <format> <client> | \
         convert <in> <out> [format] [client] | dump <map> | versions>"
    )
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("otbm_tool=info".parse()?)
                .add_directive("otbm_map=info".parse()?)
                .add_directive("otbm_convert=info".parse()?),
        )
        .with_writer(io::stderr)
        .init();

    let config = Config::from_env()?;
    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    Command::parse(&args)?.run(&config)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_defaults_without_env() {
        let config = Config::from_vars(vars(&[])).unwrap();
        assert_eq!(config.defaults, ConverterDefaults::default());
        assert_eq!(config.items, None);
        assert!(!config.verbose);
    }

    #[test]
    fn test_config_from_env() {
        let config = Config::from_vars(vars(&[
            ("OTBM_ITEMS", "items.json"),
            ("OTBM_ITEM_ID_TABLES", "ids.json"),
            ("OTBM_TARGET_FORMAT", "v2"),
            ("OTBM_TARGET_CLIENT", "8.60"),
            ("OTBM_VERBOSE", "1"),
        ]))
        .unwrap();
        assert_eq!(config.items, Some(PathBuf::from("items.json")));
        assert_eq!(config.item_id_tables, Some(PathBuf::from("ids.json")));
        assert_eq!(config.defaults.format, FormatVersion::Otbm2);
        assert_eq!(config.defaults.client, ClientVersion(860));
        assert!(config.verbose);

        assert!(Config::from_vars(vars(&[("OTBM_TARGET_FORMAT", "OTBM_9")])).is_err());
        assert!(!Config::from_vars(vars(&[("OTBM_VERBOSE", "0")])).unwrap().verbose);
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse(&["info", "a.otbm"]).unwrap(),
            Command::Info(PathBuf::from("a.otbm"))
        );
        assert_eq!(
            Command::parse(&["validate", "a.otbm", "OTBM_3", "10.98"]).unwrap(),
            Command::Validate {
                map: PathBuf::from("a.otbm"),
                format: FormatVersion::Otbm3,
                client: ClientVersion(1098),
            }
        );
        assert_eq!(
            Command::parse(&["convert", "a.otbm", "b.otbm", "1"]).unwrap(),
            Command::Convert {
                input: PathBuf::from("a.otbm"),
                output: PathBuf::from("b.otbm"),
                format: Some(FormatVersion::Otbm1),
                client: None,
            }
        );
        assert_eq!(Command::parse(&["versions"]).unwrap(), Command::Versions);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Command::parse(&[]).is_err());
        assert!(Command::parse(&["info"]).is_err());
        assert!(Command::parse(&["validate", "a.otbm", "OTBM_7", "1098"]).is_err());
        assert!(Command::parse(&["validate", "a.otbm", "4", "ten"]).is_err());
        assert!(Command::parse(&["convert", "a", "b", "4", "1300", "extra"]).is_err());
    }
}
