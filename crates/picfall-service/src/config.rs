use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Controls the log format.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect (pretty for tty, simplified for other).
    Auto,
    /// With colors.
    Pretty,
    /// Simplified log output.
    Simplified,
}

/// Controls the logging system.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct Logging {
    /// The log level filter.
    pub level: log::LevelFilter,
    /// Controls the log format.
    pub format: LogFormat,
    /// When set to true, backtraces are forced on.
    pub enable_backtraces: bool,
}

impl Default for Logging {
    fn default() -> Self {
        Logging {
            level: log::LevelFilter::Info,
            format: LogFormat::Auto,
            enable_backtraces: true,
        }
    }
}

/// Fine-tuning for the API data cache.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TtlCacheConfig {
    /// How long a successfully fetched value stays fresh.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,

    /// How long a cached failure blocks re-fetching when no stale value exists.
    #[serde(with = "humantime_serde")]
    pub error_ttl: Duration,

    /// Maximum number of entries; the oldest-inserted entry is evicted on
    /// overflow.
    pub capacity: usize,

    /// Interval of the background sweep that removes expired entries.
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,

    /// Artificial delay before a miss-triggered fetch, to coalesce
    /// near-simultaneous callers.
    #[serde(with = "humantime_serde")]
    pub coalesce_delay: Duration,
}

impl Default for TtlCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5 * 60),
            error_ttl: Duration::from_secs(60),
            capacity: 100,
            sweep_interval: Duration::from_secs(2 * 60),
            coalesce_delay: Duration::from_millis(100),
        }
    }
}

/// Fine-tuning for the image-resolution outcome cache.
///
/// Failures are retried sooner than successes are re-validated, so a single
/// flaky pass does not pin the fallback avatar for long.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutcomeCacheConfig {
    /// How long a resolved URL short-circuits future resolutions.
    #[serde(with = "humantime_serde")]
    pub success_ttl: Duration,

    /// How long a terminal failure short-circuits future resolutions.
    #[serde(with = "humantime_serde")]
    pub error_ttl: Duration,

    /// Maximum number of cached outcomes.
    pub capacity: u64,
}

impl Default for OutcomeCacheConfig {
    fn default() -> Self {
        Self {
            success_ttl: Duration::from_secs(10 * 60),
            error_ttl: Duration::from_secs(5 * 60),
            capacity: 100,
        }
    }
}

/// Grouped cache configuration.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfigs {
    /// The API data cache used by [`CachedFetcher`](crate::caching::CachedFetcher).
    pub api: TtlCacheConfig,
    /// The resolution outcome cache used by
    /// [`ImageResolver`](crate::resolver::ImageResolver).
    pub resolutions: OutcomeCacheConfig,
}

/// Tuning knobs of the resilient image resolver.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ResolverConfig {
    /// Full passes over the candidate list after the initial one.
    pub max_retries: u32,

    /// Base delay of the linear backoff between passes; pass `n` waits
    /// `retry_delay * n`.
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,

    /// Hard deadline for a single load attempt.
    #[serde(with = "humantime_serde")]
    pub load_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            load_timeout: Duration::from_secs(10),
        }
    }
}

/// Top-level configuration of the resolution layer.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Cache expiry and capacity settings.
    pub caches: CacheConfigs,
    /// Resolver retry/timeout settings.
    pub resolver: ResolverConfig,
    /// Logging configuration.
    pub logging: Logging,
}

impl Config {
    /// Reads the configuration from a YAML reader.
    pub fn from_reader(reader: impl io::Read) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_reader(reader)?)
    }

    /// Reads the configuration from a YAML file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let file = fs::File::open(path.as_ref())?;
        Self::from_reader(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.caches.api.ttl, Duration::from_secs(300));
        assert_eq!(config.caches.api.capacity, 100);
        assert_eq!(config.resolver.max_retries, 3);
        assert_eq!(config.resolver.load_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_from_reader() {
        let yaml = r#"
caches:
  api:
    ttl: 30s
    capacity: 10
  resolutions:
    success_ttl: 1m
resolver:
  max_retries: 1
  retry_delay: 100ms
"#;
        let config = Config::from_reader(yaml.as_bytes()).unwrap();
        assert_eq!(config.caches.api.ttl, Duration::from_secs(30));
        assert_eq!(config.caches.api.capacity, 10);
        // Unset fields keep their defaults.
        assert_eq!(
            config.caches.api.coalesce_delay,
            Duration::from_millis(100)
        );
        assert_eq!(
            config.caches.resolutions.success_ttl,
            Duration::from_secs(60)
        );
        assert_eq!(config.resolver.max_retries, 1);
        assert_eq!(config.resolver.retry_delay, Duration::from_millis(100));
    }
}
