//! Conversion outcome and the converter's running log.

use std::fmt;

use otbm_io::FormatVersion;

/// One executed format step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepTrace {
    pub step_id: &'static str,
    pub from: FormatVersion,
    pub to: FormatVersion,
    pub items_touched: usize,
}

/// Outcome of one validation or conversion call. Read-only once returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct ConversionResult {
    pub(crate) success: bool,
    pub(crate) error: Option<String>,
    pub(crate) warnings: Vec<String>,
    pub(crate) items_converted: usize,
    pub(crate) tiles_converted: usize,
    pub(crate) attributes_converted: usize,
    pub(crate) features_removed: usize,
    pub(crate) features_added: usize,
    pub(crate) steps: Vec<StepTrace>,
}

impl ConversionResult {
    pub(crate) fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub(crate) fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    #[must_use]
    pub const fn items_converted(&self) -> usize {
        self.items_converted
    }

    #[must_use]
    pub const fn tiles_converted(&self) -> usize {
        self.tiles_converted
    }

    #[must_use]
    pub const fn attributes_converted(&self) -> usize {
        self.attributes_converted
    }

    #[must_use]
    pub const fn features_removed(&self) -> usize {
        self.features_removed
    }

    #[must_use]
    pub const fn features_added(&self) -> usize {
        self.features_added
    }

    /// Format steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[StepTrace] {
        &self.steps
    }
}

impl fmt::Display for ConversionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            Some(err) => write!(f, "failed: {err}")?,
            None if self.success => write!(
                f,
                "ok: {} step(s), {} item(s), {} tile(s), {} attribute(s), +{}/-{} feature(s)",
                self.steps.len(),
                self.items_converted,
                self.tiles_converted,
                self.attributes_converted,
                self.features_added,
                self.features_removed
            )?,
            None => write!(f, "not run")?,
        }
        if !self.warnings.is_empty() {
            write!(f, ", {} warning(s)", self.warnings.len())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        };
        write!(f, "[{tag}] {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let failed = ConversionResult::failed("bad client");
        assert!(!failed.is_success());
        assert_eq!(failed.to_string(), "failed: bad client");

        let mut ok = ConversionResult {
            success: true,
            items_converted: 3,
            ..ConversionResult::default()
        };
        ok.warn("waypoints dropped");
        assert_eq!(
            ok.to_string(),
            "ok: 0 step(s), 3 item(s), 0 tile(s), 0 attribute(s), +0/-0 feature(s), 1 warning(s)"
        );
    }

    #[test]
    fn test_log_entry_tags() {
        let e = LogEntry {
            level: LogLevel::Warning,
            message: "x".into(),
        };
        assert_eq!(e.to_string(), "[WARNING] x");
    }
}
