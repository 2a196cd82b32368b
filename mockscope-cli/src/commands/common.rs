use std::path::Path;

use anyhow::Context;
use mockscope::{RuleSet, Value};

/// Parse a configuration file as generation `generation`.
pub fn load_rules(path: &Path, generation: u64) -> anyhow::Result<RuleSet> {
    let data = std::fs::read(path)
        .with_context(|| format!("failed to read configuration: {}", path.display()))?;
    RuleSet::parse(&data, generation)
        .with_context(|| format!("invalid configuration: {}", path.display()))
}

/// Parse a command-line argument as a JSON literal, falling back to a plain string.
pub fn parse_value(raw: &str) -> Value {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json) => Value::from_json(&json),
        Err(_) => Value::from(raw),
    }
}

/// Extract a display-friendly filename from a path.
pub fn file_display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    )
}
