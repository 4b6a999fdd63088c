//! Config value checks: collection names and body size limits.

use crate::error::ConfigError;
use regex::Regex;
use std::sync::OnceLock;

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"))
}

fn size_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*(\d+(?:\.\d+)?)\s*(b|kb|mb|gb|tb)?\s*$").expect("static regex"))
}

/// Collection names double as table names and URL segments.
pub fn is_valid_collection_name(name: &str) -> bool {
    identifier_re().is_match(name)
}

/// Parse a size such as "256mb", "100kb", "1.5gb" or "1024" (bytes) into a byte count.
pub fn parse_size_limit(s: &str) -> Result<usize, ConfigError> {
    let caps = size_re()
        .captures(s)
        .ok_or_else(|| ConfigError::InvalidSizeLimit(s.to_string()))?;
    let n: f64 = caps[1]
        .parse()
        .map_err(|_| ConfigError::InvalidSizeLimit(s.to_string()))?;
    let unit = caps.get(2).map(|m| m.as_str().to_lowercase());
    let multiplier: f64 = match unit.as_deref() {
        None | Some("b") => 1.0,
        Some("kb") => 1024.0,
        Some("mb") => 1024.0 * 1024.0,
        Some("gb") => 1024.0 * 1024.0 * 1024.0,
        Some("tb") => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        Some(_) => return Err(ConfigError::InvalidSizeLimit(s.to_string())),
    };
    Ok((n * multiplier).floor() as usize)
}
