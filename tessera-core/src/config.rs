//! Configuration types
//!
//! Values are loaded from environment variables with defaults suitable for a
//! browser-resident client: a few hundred entities cached for five minutes.

use crate::{ConfigError, TesseraError, TesseraResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default cache capacity (entries).
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 500;

/// Default cache entry lifetime.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Configuration for the synchronization layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Maximum number of live cache entries.
    pub cache_max_entries: usize,
    /// Lifetime of a cache entry, measured from insertion.
    pub cache_ttl: Duration,
    /// Whether reads promote an entry to most-recently-used.
    pub cache_update_age_on_get: bool,
    /// Assumed connectivity when the runtime cannot report it at startup.
    pub assume_online: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_update_age_on_get: true,
            assume_online: true,
        }
    }
}

impl SyncConfig {
    /// Create SyncConfig from environment variables.
    ///
    /// Environment variables:
    /// - `TESSERA_CACHE_MAX_ENTRIES`: cache capacity (default: 500)
    /// - `TESSERA_CACHE_TTL_SECS`: entry lifetime in seconds (default: 300)
    /// - `TESSERA_CACHE_UPDATE_AGE_ON_GET`: "true" or "false" (default: true)
    /// - `TESSERA_ASSUME_ONLINE`: "true" or "false" (default: true)
    ///
    /// Unparseable values are reported rather than silently replaced.
    pub fn from_env() -> TesseraResult<Self> {
        let defaults = Self::default();

        let cache_max_entries = parse_env("TESSERA_CACHE_MAX_ENTRIES")?
            .unwrap_or(defaults.cache_max_entries);

        let cache_ttl = parse_env::<u64>("TESSERA_CACHE_TTL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.cache_ttl);

        let cache_update_age_on_get = parse_bool_env("TESSERA_CACHE_UPDATE_AGE_ON_GET")?
            .unwrap_or(defaults.cache_update_age_on_get);

        let assume_online =
            parse_bool_env("TESSERA_ASSUME_ONLINE")?.unwrap_or(defaults.assume_online);

        let config = Self {
            cache_max_entries,
            cache_ttl,
            cache_update_age_on_get,
            assume_online,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - cache_max_entries > 0
    /// - cache_ttl is positive
    pub fn validate(&self) -> TesseraResult<()> {
        if self.cache_max_entries == 0 {
            return Err(TesseraError::Config(ConfigError::InvalidValue {
                field: "cache_max_entries".to_string(),
                value: self.cache_max_entries.to_string(),
                reason: "cache_max_entries must be greater than 0".to_string(),
            }));
        }

        if self.cache_ttl.is_zero() {
            return Err(TesseraError::Config(ConfigError::InvalidValue {
                field: "cache_ttl".to_string(),
                value: format!("{:?}", self.cache_ttl),
                reason: "cache_ttl must be positive".to_string(),
            }));
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> TesseraResult<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            TesseraError::Config(ConfigError::InvalidValue {
                field: key.to_string(),
                value: raw.clone(),
                reason: "could not be parsed".to_string(),
            })
        }),
        Err(_) => Ok(None),
    }
}

fn parse_bool_env(key: &str) -> TesseraResult<Option<bool>> {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Some(true)),
            "false" | "0" | "no" => Ok(Some(false)),
            _ => Err(TesseraError::Config(ConfigError::InvalidValue {
                field: key.to_string(),
                value: raw,
                reason: "expected true or false".to_string(),
            })),
        },
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    struct EnvVarGuard {
        key: &'static str,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let original = std::env::var(key).ok();
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
            Self { key, original }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.original.as_deref() {
                Some(v) => std::env::set_var(self.key, v),
                None => std::env::remove_var(self.key),
            }
        }
    }

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.cache_max_entries, 500);
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert!(config.cache_update_age_on_get);
        assert!(config.assume_online);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = SyncConfig {
            cache_max_entries: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cache_max_entries"));
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let config = SyncConfig {
            cache_ttl: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TesseraError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_from_env_overrides() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _max = EnvVarGuard::set("TESSERA_CACHE_MAX_ENTRIES", Some("42"));
        let _ttl = EnvVarGuard::set("TESSERA_CACHE_TTL_SECS", Some("10"));
        let _age = EnvVarGuard::set("TESSERA_CACHE_UPDATE_AGE_ON_GET", Some("false"));
        let _online = EnvVarGuard::set("TESSERA_ASSUME_ONLINE", None);

        let config = SyncConfig::from_env().unwrap();
        assert_eq!(config.cache_max_entries, 42);
        assert_eq!(config.cache_ttl, Duration::from_secs(10));
        assert!(!config.cache_update_age_on_get);
        assert!(config.assume_online);
    }

    #[test]
    fn test_from_env_reports_garbage() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _max = EnvVarGuard::set("TESSERA_CACHE_MAX_ENTRIES", Some("lots"));
        let _ttl = EnvVarGuard::set("TESSERA_CACHE_TTL_SECS", None);
        let _age = EnvVarGuard::set("TESSERA_CACHE_UPDATE_AGE_ON_GET", None);
        let _online = EnvVarGuard::set("TESSERA_ASSUME_ONLINE", None);

        let err = SyncConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("TESSERA_CACHE_MAX_ENTRIES"));
    }

    #[test]
    fn test_from_env_rejects_zero_ttl() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _max = EnvVarGuard::set("TESSERA_CACHE_MAX_ENTRIES", None);
        let _ttl = EnvVarGuard::set("TESSERA_CACHE_TTL_SECS", Some("0"));
        let _age = EnvVarGuard::set("TESSERA_CACHE_UPDATE_AGE_ON_GET", None);
        let _online = EnvVarGuard::set("TESSERA_ASSUME_ONLINE", None);

        assert!(SyncConfig::from_env().is_err());
    }
}
