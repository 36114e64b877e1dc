//! Conversion of loaded OTBM maps between format revisions and client
//! versions.
//!
//! ```text
//!   Map (OTBM_a, client x)
//!     │  validate_conversion     read-only, warnings up front
//!     ▼
//!   convert_map_version
//!     │  format steps a → b      one revision at a time
//!     │  client conversion x → y item ids, charges, tier, podium
//!     ▼
//!   Map (OTBM_b, client y) + ConversionResult
//! ```
//!
//! Lossy conversions always succeed; what was lost is listed in
//! [`ConversionResult::warnings`]. Only an invalid or incompatible target
//! fails, and it fails before the map is modified.

pub mod compat;
mod converter;
mod error;
pub mod item_ids;
pub mod names;
mod result;

pub use compat::Feature;
pub use converter::{ConverterDefaults, ProgressFn, VersionConverter};
pub use error::ConvertError;
pub use item_ids::ItemIdTables;
pub use names::AttributeNameMap;
pub use result::{ConversionResult, LogEntry, LogLevel, StepTrace};
