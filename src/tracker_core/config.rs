use crate::tracker_core::coordinator::PollConfig;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum BackendType {
    Csv,
    Jsonl,
    Sqlite,
}

impl BackendType {
    pub fn default_output_path(&self) -> &'static str {
        match self {
            BackendType::Csv => "rolls.csv",
            BackendType::Jsonl => "rolls.jsonl",
            BackendType::Sqlite => "rolls.db",
        }
    }

    /// Reads `--backend <csv|jsonl|sqlite>`, defaulting to CSV
    pub fn parse_from_args(args: &[String]) -> BackendType {
        if let Some(idx) = args.iter().position(|x| x == "--backend") {
            match args.get(idx + 1).map(|s| s.as_str()) {
                Some("sqlite") => return BackendType::Sqlite,
                Some("jsonl") => return BackendType::Jsonl,
                Some("csv") => return BackendType::Csv,
                other => {
                    log::warn!("Unknown --backend {:?}, defaulting to csv", other);
                }
            }
        }

        BackendType::Csv
    }
}

/// Where snapshots come from
#[derive(Debug, Clone, PartialEq)]
pub enum SourceSpec {
    File(PathBuf),
    Http(String),
}

impl SourceSpec {
    pub fn parse(value: &str) -> SourceSpec {
        if value.starts_with("http://") || value.starts_with("https://") {
            SourceSpec::Http(value.to_string())
        } else {
            SourceSpec::File(PathBuf::from(value))
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub source: SourceSpec,
    pub backend: BackendType,
    pub output_path: PathBuf,
    pub poll_interval: Duration,
    pub max_runtime: Option<Duration>,
    pub stale_threshold: Duration,
    pub acquire_timeout: Duration,
    pub read_timeout: Duration,
    pub acquire_retries: u32,
    pub max_sink_failures: u32,
    pub min_overlap: usize,
    pub rust_log: String,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl TrackerConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `ROLLTRACK_SOURCE` (required): snapshot file path or http(s) URL
    /// - `ROLLTRACK_OUTPUT_PATH` (default: rolls.csv / rolls.jsonl / rolls.db)
    /// - `ROLLTRACK_POLL_INTERVAL_SECS` (default: 10)
    /// - `ROLLTRACK_MAX_RUNTIME_MINUTES` (default: unbounded)
    /// - `ROLLTRACK_STALE_THRESHOLD_SECS` (default: 300)
    /// - `ROLLTRACK_ACQUIRE_TIMEOUT_SECS` (default: 30)
    /// - `ROLLTRACK_READ_TIMEOUT_SECS` (default: 10)
    /// - `ROLLTRACK_ACQUIRE_RETRIES` (default: 3)
    /// - `ROLLTRACK_MAX_SINK_FAILURES` (default: 5)
    /// - `ROLLTRACK_MIN_OVERLAP` (default: 1)
    /// - `RUST_LOG` (default: info)
    pub fn from_env(backend: BackendType) -> Result<Self, ConfigError> {
        Self::from_lookup(backend, |key| env::var(key).ok())
    }

    pub fn from_lookup<F>(backend: BackendType, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = lookup("ROLLTRACK_SOURCE")
            .filter(|s| !s.trim().is_empty())
            .map(|s| SourceSpec::parse(s.trim()))
            .ok_or_else(|| ConfigError::MissingVariable("ROLLTRACK_SOURCE".to_string()))?;

        let output_path = lookup("ROLLTRACK_OUTPUT_PATH")
            .unwrap_or_else(|| backend.default_output_path().to_string())
            .into();

        let poll_interval_secs = parse_or(&lookup, "ROLLTRACK_POLL_INTERVAL_SECS", 10.0_f64)?;
        if poll_interval_secs <= 0.0 {
            return Err(ConfigError::InvalidValue(
                "ROLLTRACK_POLL_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        let max_runtime = match lookup("ROLLTRACK_MAX_RUNTIME_MINUTES") {
            Some(raw) => {
                let minutes: f64 = raw.trim().parse().map_err(|_| {
                    ConfigError::InvalidValue(format!("ROLLTRACK_MAX_RUNTIME_MINUTES: {}", raw))
                })?;
                if minutes <= 0.0 {
                    return Err(ConfigError::InvalidValue(
                        "ROLLTRACK_MAX_RUNTIME_MINUTES must be greater than zero".to_string(),
                    ));
                }
                Some(Duration::from_secs_f64(minutes * 60.0))
            }
            None => None,
        };

        let stale_threshold_secs: u64 = parse_or(&lookup, "ROLLTRACK_STALE_THRESHOLD_SECS", 300)?;
        if stale_threshold_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "ROLLTRACK_STALE_THRESHOLD_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            source,
            backend,
            output_path,
            poll_interval: Duration::from_secs_f64(poll_interval_secs),
            max_runtime,
            stale_threshold: Duration::from_secs(stale_threshold_secs),
            acquire_timeout: Duration::from_secs(parse_or(&lookup, "ROLLTRACK_ACQUIRE_TIMEOUT_SECS", 30)?),
            read_timeout: Duration::from_secs(parse_or(&lookup, "ROLLTRACK_READ_TIMEOUT_SECS", 10)?),
            acquire_retries: parse_or(&lookup, "ROLLTRACK_ACQUIRE_RETRIES", 3)?,
            max_sink_failures: parse_or(&lookup, "ROLLTRACK_MAX_SINK_FAILURES", 5)?,
            min_overlap: parse_or(&lookup, "ROLLTRACK_MIN_OVERLAP", 1)?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            poll_interval: self.poll_interval,
            max_runtime: self.max_runtime,
            stale_threshold: self.stale_threshold,
            acquire_timeout: self.acquire_timeout,
            read_timeout: self.read_timeout,
            acquire_retries: self.acquire_retries,
            max_sink_failures: self.max_sink_failures,
            min_overlap: self.min_overlap,
            ..PollConfig::default()
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{}: {}", key, raw))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = TrackerConfig::from_lookup(
            BackendType::Csv,
            lookup_from(&[("ROLLTRACK_SOURCE", "snapshots.txt")]),
        )
        .unwrap();

        assert_eq!(config.source, SourceSpec::File(PathBuf::from("snapshots.txt")));
        assert_eq!(config.output_path, PathBuf::from("rolls.csv"));
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.max_runtime, None);
        assert_eq!(config.stale_threshold, Duration::from_secs(300));
        assert_eq!(config.acquire_retries, 3);
        assert_eq!(config.max_sink_failures, 5);
        assert_eq!(config.min_overlap, 1);
        assert_eq!(config.rust_log, "info");
    }

    #[test]
    fn test_custom_config() {
        let config = TrackerConfig::from_lookup(
            BackendType::Sqlite,
            lookup_from(&[
                ("ROLLTRACK_SOURCE", "https://feed.example/rolls"),
                ("ROLLTRACK_POLL_INTERVAL_SECS", "2.5"),
                ("ROLLTRACK_MAX_RUNTIME_MINUTES", "90"),
                ("ROLLTRACK_STALE_THRESHOLD_SECS", "120"),
                ("ROLLTRACK_MIN_OVERLAP", "3"),
            ]),
        )
        .unwrap();

        assert_eq!(config.source, SourceSpec::Http("https://feed.example/rolls".to_string()));
        assert_eq!(config.output_path, PathBuf::from("rolls.db"));
        assert_eq!(config.poll_interval, Duration::from_millis(2500));
        assert_eq!(config.max_runtime, Some(Duration::from_secs(90 * 60)));
        assert_eq!(config.stale_threshold, Duration::from_secs(120));
        assert_eq!(config.poll_config().min_overlap, 3);
    }

    #[test]
    fn test_missing_source() {
        let result = TrackerConfig::from_lookup(BackendType::Csv, lookup_from(&[]));
        assert!(matches!(result, Err(ConfigError::MissingVariable(_))));
    }

    #[test]
    fn test_invalid_values() {
        let result = TrackerConfig::from_lookup(
            BackendType::Csv,
            lookup_from(&[("ROLLTRACK_SOURCE", "a.txt"), ("ROLLTRACK_POLL_INTERVAL_SECS", "0")]),
        );
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));

        let result = TrackerConfig::from_lookup(
            BackendType::Csv,
            lookup_from(&[("ROLLTRACK_SOURCE", "a.txt"), ("ROLLTRACK_ACQUIRE_RETRIES", "many")]),
        );
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_backend_from_args() {
        let args = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        assert_eq!(BackendType::parse_from_args(&args(&["rolltrack"])), BackendType::Csv);
        assert_eq!(
            BackendType::parse_from_args(&args(&["rolltrack", "--backend", "sqlite"])),
            BackendType::Sqlite
        );
        assert_eq!(
            BackendType::parse_from_args(&args(&["rolltrack", "--backend", "jsonl"])),
            BackendType::Jsonl
        );
        assert_eq!(
            BackendType::parse_from_args(&args(&["rolltrack", "--backend"])),
            BackendType::Csv
        );
    }
}
