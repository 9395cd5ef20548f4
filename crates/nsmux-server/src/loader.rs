//! Config loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ServerConfig::default()`]
//! 2. If a config file is given and exists, deep-merge its values over defaults
//! 3. Apply `NSMUX_*` environment variable overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::errors::Result;

/// Load configuration from an optional file path with env var overrides.
///
/// A missing file yields defaults. A file with invalid JSON is an error.
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig> {
    let defaults = serde_json::to_value(ServerConfig::default())?;

    let merged = match path {
        Some(path) if path.exists() => {
            debug!(?path, "loading config from file");
            let content = std::fs::read_to_string(path)?;
            let user: Value = serde_json::from_str(&content)?;
            deep_merge(defaults, user)
        }
        Some(path) => {
            debug!(?path, "config file not found, using defaults");
            defaults
        }
        None => defaults,
    };

    let mut config: ServerConfig = serde_json::from_value(merged)?;
    apply_env_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `NSMUX_*` process environment overrides.
pub fn apply_env_overrides(config: &mut ServerConfig) {
    apply_overrides(config, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Invalid values are ignored with a warning, keeping the file/default value.
pub fn apply_overrides(config: &mut ServerConfig, lookup: impl Fn(&str) -> Option<String>) {
    let read_string = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = read_string("NSMUX_HOST") {
        config.host = v;
    }
    if let Some(v) = read_string("NSMUX_PORT") {
        match parse_u16_range(&v, 0, u16::MAX) {
            Some(port) => config.port = port,
            None => warn!(key = "NSMUX_PORT", value = %v, "invalid u16 env var, ignoring"),
        }
    }
    if let Some(v) = read_string("NSMUX_PATH") {
        config.path = v;
    }
    if let Some(v) = read_string("NSMUX_MAX_CONNECTIONS") {
        match parse_usize_range(&v, 1, 1_000_000) {
            Some(n) => config.max_connections = n,
            None => {
                warn!(key = "NSMUX_MAX_CONNECTIONS", value = %v, "invalid usize env var, ignoring");
            }
        }
    }
    if let Some(v) = read_string("NSMUX_ALLOWED_ORIGINS") {
        config.allowed_origins = parse_list(&v);
    }
    if let Some(v) = read_string("NSMUX_LOG_LEVEL") {
        config.log_level = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
pub fn parse_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ConfigError;
    use serde_json::json;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |k| map.get(k).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_simple_override() {
        let merged = deep_merge(json!({"a": 1, "b": 2}), json!({"a": 10}));
        assert_eq!(merged, json!({"a": 10, "b": 2}));
    }

    #[test]
    fn merge_nested_override() {
        let merged = deep_merge(
            json!({"server": {"port": 8080, "host": "localhost"}}),
            json!({"server": {"port": 9090}}),
        );
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "localhost");
    }

    #[test]
    fn merge_array_replace() {
        let merged = deep_merge(json!({"items": [1, 2, 3]}), json!({"items": [4]}));
        assert_eq!(merged["items"], json!([4]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let merged = deep_merge(json!({"a": 1}), json!({"a": null}));
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let merged = deep_merge(json!({"a": {"nested": true}}), json!({"a": 42}));
        assert_eq!(merged["a"], 42);
    }

    // ── load_config ─────────────────────────────────────────────────

    #[test]
    fn load_without_path_returns_defaults() {
        let cfg = load_config(None).unwrap();
        assert_eq!(cfg.path, ServerConfig::default().path);
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let cfg = load_config(Some(Path::new("/nonexistent/nsmux.json"))).unwrap();
        assert_eq!(cfg.max_connections, ServerConfig::default().max_connections);
    }

    #[test]
    fn load_partial_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nsmux.json");
        std::fs::write(
            &path,
            r#"{"path": "/socket", "allowed_origins": ["localhost:3000"], "log_level": null}"#,
        )
        .unwrap();

        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.path, "/socket");
        assert_eq!(cfg.allowed_origins, vec!["localhost:3000"]);
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.heartbeat_interval_secs, 30);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nsmux.json");
        std::fs::write(&path, "not valid json").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn load_wrong_type_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nsmux.json");
        std::fs::write(&path, r#"{"port": "eighty"}"#).unwrap();

        assert!(matches!(load_config(Some(&path)), Err(ConfigError::Json(_))));
    }

    #[test]
    fn load_invalid_value_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nsmux.json");
        std::fs::write(&path, r#"{"max_connections": 0}"#).unwrap();

        assert!(matches!(
            load_config(Some(&path)),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    // ── overrides ───────────────────────────────────────────────────

    #[test]
    fn overrides_apply() {
        let mut cfg = ServerConfig::default();
        apply_overrides(
            &mut cfg,
            env(&[
                ("NSMUX_HOST", "0.0.0.0"),
                ("NSMUX_PORT", "9001"),
                ("NSMUX_PATH", "/live"),
                ("NSMUX_MAX_CONNECTIONS", "10"),
                ("NSMUX_ALLOWED_ORIGINS", "localhost:3000, example.com ,"),
                ("NSMUX_LOG_LEVEL", "debug"),
            ]),
        );
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 9001);
        assert_eq!(cfg.path, "/live");
        assert_eq!(cfg.max_connections, 10);
        assert_eq!(cfg.allowed_origins, vec!["localhost:3000", "example.com"]);
        assert_eq!(cfg.log_level, "debug");
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let mut cfg = ServerConfig::default();
        apply_overrides(
            &mut cfg,
            env(&[
                ("NSMUX_PORT", "70000"),
                ("NSMUX_MAX_CONNECTIONS", "0"),
                ("NSMUX_HOST", ""),
            ]),
        );
        assert_eq!(cfg, ServerConfig::default());
    }

    #[test]
    fn parse_u16_bounds() {
        assert_eq!(parse_u16_range("8000", 1, 65535), Some(8000));
        assert_eq!(parse_u16_range(" 0 ", 0, 10), Some(0));
        assert_eq!(parse_u16_range("0", 1, 10), None);
        assert_eq!(parse_u16_range("abc", 0, 10), None);
    }

    #[test]
    fn parse_usize_bounds() {
        assert_eq!(parse_usize_range("5", 1, 10), Some(5));
        assert_eq!(parse_usize_range("11", 1, 10), None);
        assert_eq!(parse_usize_range("-1", 0, 10), None);
    }

    #[test]
    fn parse_list_trims_and_skips_empty() {
        assert_eq!(parse_list("a, b,,c "), vec!["a", "b", "c"]);
        assert!(parse_list(" , ").is_empty());
    }
}
