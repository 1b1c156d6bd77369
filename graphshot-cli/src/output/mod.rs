//! Output formatting for the graphshot CLI.
//!
//! Every command result renders either as a human-readable table or as JSON.
//! Colors and truncation follow the TTY unless overridden by configuration.

use clap::ValueEnum;
use serde::Serialize;
use std::io::IsTerminal;
use std::str::FromStr;

mod json;
mod table;

pub use self::json::JsonOutput;
pub use self::table::TableOutput;

/// Output format for CLI results
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format (default)
    #[default]
    Table,
    /// JSON format for machine consumption
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: '{}'", s)),
        }
    }
}

/// Configuration for output rendering
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Disable truncation of long values
    pub no_truncate: bool,
    /// Override terminal width (None = auto-detect)
    pub width: Option<usize>,
    /// Compact mode (blank table borders, single-line JSON)
    pub compact: bool,
}

impl OutputConfig {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            no_truncate: false,
            width: None,
            compact: false,
        }
    }

    /// Create an OutputConfig with TTY detection and an optional color override.
    ///
    /// When stdout is not a TTY, truncation is disabled and colors are off
    /// unless `color_override` forces them on.
    pub fn auto_detect(format: OutputFormat, color_override: Option<bool>) -> Self {
        let is_tty = std::io::stdout().is_terminal();
        colored::control::set_override(color_override.unwrap_or(is_tty));
        Self {
            no_truncate: !is_tty,
            ..Self::new(format)
        }
    }

    /// Get the effective terminal width
    pub fn effective_width(&self) -> usize {
        self.width.unwrap_or_else(|| {
            terminal_size::terminal_size()
                .map(|(w, _)| w.0 as usize)
                .unwrap_or(80)
        })
    }

    pub fn should_truncate(&self) -> bool {
        !self.no_truncate
    }

    /// Builder: set compact mode
    pub fn with_compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }
}

/// Types that can be rendered in every supported format.
pub trait Outputter: Serialize + Sized {
    fn to_table(&self, config: &OutputConfig) -> String;

    fn to_json(&self, config: &OutputConfig) -> String {
        JsonOutput::format(self, config)
    }

    /// Render using the format specified in config
    fn render(&self, config: &OutputConfig) -> String {
        match config.format {
            OutputFormat::Table => self.to_table(config),
            OutputFormat::Json => self.to_json(config),
        }
    }

    /// Render and print to stdout
    fn output(&self, config: &OutputConfig) {
        println!("{}", self.render(config));
    }
}

/// Command results that know how to lay themselves out as a table.
pub trait TableDisplay: Serialize {
    fn to_table(&self, config: &OutputConfig) -> String;
}

impl<T: TableDisplay + Serialize> Outputter for T {
    fn to_table(&self, config: &OutputConfig) -> String {
        TableDisplay::to_table(self, config)
    }
}

/// Truncate a string to a maximum width with ellipsis
pub fn truncate(s: &str, max_width: usize) -> String {
    if s.chars().count() <= max_width {
        s.to_string()
    } else if max_width <= 3 {
        s.chars().take(max_width).collect()
    } else {
        let truncated: String = s.chars().take(max_width - 3).collect();
        format!("{}...", truncated)
    }
}

/// Join a list of ids for a table cell, truncated to the terminal width.
pub fn id_list<T: ToString>(ids: &[T], config: &OutputConfig) -> String {
    let joined = ids.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ");
    if config.should_truncate() {
        truncate(&joined, config.effective_width().saturating_sub(24).max(16))
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_string() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_long_string() {
        assert_eq!(truncate("hello world", 8), "hello...");
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("table".parse::<OutputFormat>(), Ok(OutputFormat::Table));
        assert!("csv".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_id_list_truncates_on_narrow_terminals() {
        let ids: Vec<u32> = (0..200).collect();
        let mut config = OutputConfig::new(OutputFormat::Table);
        config.width = Some(40);
        let cell = id_list(&ids, &config);
        assert!(cell.ends_with("..."));
        assert_eq!(cell.chars().count(), 16);

        config.no_truncate = true;
        let full = id_list(&ids, &config);
        assert!(full.ends_with("199"));
    }
}
