//! JSON output: pretty-printed by default, single-line in compact mode.

use super::OutputConfig;
use serde::Serialize;

pub struct JsonOutput;

impl JsonOutput {
    /// Format data as a JSON string
    pub fn format<T: Serialize + ?Sized>(data: &T, config: &OutputConfig) -> String {
        if config.compact {
            serde_json::to_string(data).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
        } else {
            serde_json::to_string_pretty(data)
                .unwrap_or_else(|e| format!("{{\n  \"error\": \"{}\"\n}}", e))
        }
    }
}
