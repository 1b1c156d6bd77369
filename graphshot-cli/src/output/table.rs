//! Table output built on `tabled`.

use super::OutputConfig;
use tabled::{
    builder::Builder,
    settings::{object::Columns, style::Style, Alignment, Modify, Width},
    Table,
};

pub struct TableOutput;

impl TableOutput {
    /// Format a two-column key/value table with right-aligned keys.
    pub fn format_key_value(pairs: &[(&str, String)], config: &OutputConfig) -> String {
        let mut builder = Builder::default();
        for (key, value) in pairs {
            builder.push_record([*key, value.as_str()]);
        }

        let mut table = builder.build();
        table.with(Modify::new(Columns::first()).with(Alignment::right()));
        Self::finish(table, config)
    }

    /// Create a table from rows of strings
    pub fn from_rows(headers: &[&str], rows: &[Vec<String>], config: &OutputConfig) -> String {
        if rows.is_empty() {
            return "(no results)".to_string();
        }

        let mut builder = Builder::default();
        builder.push_record(headers.iter().copied());
        for row in rows {
            builder.push_record(row.iter().map(|s| s.as_str()));
        }
        Self::finish(builder.build(), config)
    }

    fn finish(mut table: Table, config: &OutputConfig) -> String {
        if config.compact {
            table.with(Style::blank());
        } else {
            table.with(Style::rounded());
        }
        if config.should_truncate() {
            table.with(Width::wrap(config.effective_width()));
        }
        table.to_string()
    }
}
