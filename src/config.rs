//! Configuration Module
//!
//! Store configuration with builder-style setters and environment loading.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, StoreError};

/// Store configuration parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// TTL applied to entries inserted without an explicit TTL
    pub default_ttl: Duration,
    /// Non-binding sizing hint for the entry table
    pub initial_capacity: usize,
    /// Interval between two reclaimer sweeps
    pub sweep_interval: Duration,
    /// Whether `get` refreshes the last-access time of an entry
    pub refresh_on_read: bool,
}

impl StoreConfig {
    /// Creates a config with the given default TTL and sweep interval.
    ///
    /// Refresh-on-read is enabled and no capacity is reserved.
    pub fn new(default_ttl: Duration, sweep_interval: Duration) -> Self {
        Self {
            default_ttl,
            sweep_interval,
            ..Self::default()
        }
    }

    /// Sets the store-wide default TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Sets the initial capacity hint. Negative hints are clamped to zero.
    pub fn with_initial_capacity(mut self, hint: isize) -> Self {
        self.initial_capacity = clamp_capacity(hint as i64);
        self
    }

    /// Sets the interval between sweeps.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Enables or disables refreshing the last-access time on `get`.
    pub fn with_refresh_on_read(mut self, refresh: bool) -> Self {
        self.refresh_on_read = refresh;
        self
    }

    /// Checks that the configuration can drive a reclaimer.
    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval.is_zero() {
            return Err(StoreError::InvalidConfig(
                "sweep_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Creates a new StoreConfig by loading values from environment variables,
    /// falling back to [`StoreConfig::default`].
    pub fn from_env() -> Self {
        Self::from_env_with_defaults(Self::default())
    }

    /// Creates a new StoreConfig by loading values from environment variables.
    ///
    /// Variables that are unset or fail to parse keep the value from `defaults`.
    ///
    /// # Environment Variables
    /// - `DEFAULT_TTL_MS` - Default TTL in milliseconds
    /// - `INITIAL_CAPACITY` - Capacity hint (negative values clamp to 0)
    /// - `SWEEP_INTERVAL_MS` - Sweep frequency in milliseconds
    /// - `REFRESH_ON_READ` - `true` or `false`
    pub fn from_env_with_defaults(defaults: Self) -> Self {
        Self {
            default_ttl: env_parse::<u64>("DEFAULT_TTL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.default_ttl),
            initial_capacity: env_parse::<i64>("INITIAL_CAPACITY")
                .map(clamp_capacity)
                .unwrap_or(defaults.initial_capacity),
            sweep_interval: env_parse::<u64>("SWEEP_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.sweep_interval),
            refresh_on_read: env_parse::<bool>("REFRESH_ON_READ")
                .unwrap_or(defaults.refresh_on_read),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(300),
            initial_capacity: 0,
            sweep_interval: Duration::from_secs(1),
            refresh_on_read: true,
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn clamp_capacity(hint: i64) -> usize {
    usize::try_from(hint.max(0)).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = StoreConfig::default();
        assert_eq!(config.default_ttl, Duration::from_secs(300));
        assert_eq!(config.initial_capacity, 0);
        assert_eq!(config.sweep_interval, Duration::from_secs(1));
        assert!(config.refresh_on_read);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = StoreConfig::new(Duration::from_millis(300), Duration::from_millis(100))
            .with_initial_capacity(16)
            .with_refresh_on_read(false);

        assert_eq!(config.default_ttl, Duration::from_millis(300));
        assert_eq!(config.sweep_interval, Duration::from_millis(100));
        assert_eq!(config.initial_capacity, 16);
        assert!(!config.refresh_on_read);
    }

    #[test]
    fn test_negative_capacity_is_clamped() {
        let config = StoreConfig::default().with_initial_capacity(-5);
        assert_eq!(config.initial_capacity, 0);
    }

    #[test]
    fn test_zero_sweep_interval_rejected() {
        let config = StoreConfig::default().with_sweep_interval(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(StoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_from_env() {
        // Single test touches the environment so parallel tests don't race on it
        env::remove_var("DEFAULT_TTL_MS");
        env::remove_var("INITIAL_CAPACITY");
        env::remove_var("SWEEP_INTERVAL_MS");
        env::remove_var("REFRESH_ON_READ");
        assert_eq!(StoreConfig::from_env(), StoreConfig::default());

        env::set_var("DEFAULT_TTL_MS", "1500");
        env::set_var("INITIAL_CAPACITY", "-3");
        env::set_var("SWEEP_INTERVAL_MS", "not a number");
        env::set_var("REFRESH_ON_READ", "false");

        let config = StoreConfig::from_env();
        assert_eq!(config.default_ttl, Duration::from_millis(1500));
        assert_eq!(config.initial_capacity, 0);
        assert_eq!(config.sweep_interval, Duration::from_secs(1));
        assert!(!config.refresh_on_read);

        env::remove_var("DEFAULT_TTL_MS");
        env::remove_var("INITIAL_CAPACITY");
        env::remove_var("SWEEP_INTERVAL_MS");
        env::remove_var("REFRESH_ON_READ");
    }
}
