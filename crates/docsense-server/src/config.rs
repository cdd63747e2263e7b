//! Environment-driven configuration.
//!
//! Unknown values never crash the server: invalid integers fall back to
//! the documented defaults, and every directory derives from `STORE_DIR`
//! unless overridden individually.

use std::path::PathBuf;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default sweep cadence for the TTL sweeper.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Default TTL; zero disables the sweeper entirely.
pub const DEFAULT_TTL_SECS: u64 = 0;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub store_dir: PathBuf,
    pub bulk_dir: PathBuf,
    pub fresh_dir: PathBuf,
    pub viewer_dir: PathBuf,
    pub ttl_seconds: u64,
    pub sweep_interval_seconds: u64,
    pub port: u16,
}

impl ServerConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary lookup (testable).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let store_dir = lookup("STORE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./store"));
        let bulk_dir = lookup("BULK_STORE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| store_dir.join("bulk_uploads"));
        let fresh_dir = lookup("FRESH_STORE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| store_dir.join("fresh_uploads"));
        let viewer_dir = lookup("VIEWER_STORE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| store_dir.join("viewer_uploads"));

        Self {
            bulk_dir,
            fresh_dir,
            viewer_dir,
            store_dir,
            ttl_seconds: parse_or(lookup("STORE_TTL_SECONDS"), DEFAULT_TTL_SECS),
            sweep_interval_seconds: parse_or(
                lookup("STORE_SWEEP_INTERVAL_SECONDS"),
                DEFAULT_SWEEP_INTERVAL_SECS,
            ),
            port: parse_or(lookup("BACKEND_PORT"), DEFAULT_PORT),
        }
    }

    /// Whether the background TTL sweeper should run at all.
    pub fn sweeper_enabled(&self) -> bool {
        self.ttl_seconds > 0
    }

    /// The partition directories, for the sweeper.
    pub fn partition_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.bulk_dir.clone(),
            self.fresh_dir.clone(),
            self.viewer_dir.clone(),
        ]
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> ServerConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_with(&[]);
        assert_eq!(config.store_dir, PathBuf::from("./store"));
        assert_eq!(config.fresh_dir, PathBuf::from("./store/fresh_uploads"));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.ttl_seconds, 0);
        assert!(!config.sweeper_enabled());
    }

    #[test]
    fn test_partition_dirs_follow_store_dir() {
        let config = config_with(&[("STORE_DIR", "/data/docs")]);
        assert_eq!(config.bulk_dir, PathBuf::from("/data/docs/bulk_uploads"));
        assert_eq!(config.viewer_dir, PathBuf::from("/data/docs/viewer_uploads"));
    }

    #[test]
    fn test_explicit_partition_override() {
        let config = config_with(&[
            ("STORE_DIR", "/data/docs"),
            ("FRESH_STORE_DIR", "/fast/fresh"),
        ]);
        assert_eq!(config.fresh_dir, PathBuf::from("/fast/fresh"));
        assert_eq!(config.bulk_dir, PathBuf::from("/data/docs/bulk_uploads"));
    }

    #[test]
    fn test_invalid_integers_fall_back() {
        let config = config_with(&[
            ("STORE_TTL_SECONDS", "not-a-number"),
            ("STORE_SWEEP_INTERVAL_SECONDS", ""),
            ("BACKEND_PORT", "99999999"),
        ]);
        assert_eq!(config.ttl_seconds, DEFAULT_TTL_SECS);
        assert_eq!(config.sweep_interval_seconds, DEFAULT_SWEEP_INTERVAL_SECS);
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_sweeper_enabled_by_positive_ttl() {
        let config = config_with(&[("STORE_TTL_SECONDS", "3600")]);
        assert!(config.sweeper_enabled());
        assert_eq!(config.ttl_seconds, 3600);
    }
}
