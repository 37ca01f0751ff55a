//! Configuration module
//!
//! Timeouts, limits and storage settings for the synchronization engine. Values
//! come from the environment (optionally via a `.env` file) and fall back to the
//! defaults in [`crate::constants`].

use std::env;
use std::time::Duration;

use crate::constants::*;
use crate::storage_types::StorageBackend;

const DEFAULT_LOCAL_STORAGE_PATH: &str = "./data/blobs";
const DEFAULT_LOCAL_STORAGE_BASE_URL: &str = "file://data/blobs";

#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub environment: String,
    /// Collection holding the session documents
    pub collection: String,
    /// Prefix of photo paths in the blob store
    pub photo_prefix: String,
    /// How long a clock action waits for the subscription to confirm it
    pub confirm_timeout: Duration,
    /// Unconditional clear of a stuck submitting flag; longer than `confirm_timeout`
    pub safety_timeout: Duration,
    pub autosave_quiet_period: Duration,
    pub geolocation_timeout: Duration,
    pub geolocation_max_age: Duration,
    pub max_photo_size_bytes: u64,
    pub recent_shown: usize,
    pub recent_primary_limit: usize,
    pub recent_fallback_limit: usize,
    pub storage_backend: StorageBackend,
    pub local_storage_path: String,
    pub local_storage_base_url: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            photo_prefix: DEFAULT_PHOTO_PREFIX.to_string(),
            confirm_timeout: Duration::from_secs(CONFIRM_TIMEOUT_SECS),
            safety_timeout: Duration::from_secs(SAFETY_TIMEOUT_SECS),
            autosave_quiet_period: Duration::from_millis(AUTOSAVE_QUIET_MS),
            geolocation_timeout: Duration::from_secs(GEO_TIMEOUT_SECS),
            geolocation_max_age: Duration::from_secs(GEO_MAX_AGE_SECS),
            max_photo_size_bytes: MAX_PHOTO_SIZE_MB * 1024 * 1024,
            recent_shown: RECENT_SHOWN,
            recent_primary_limit: RECENT_PRIMARY_LIMIT,
            recent_fallback_limit: RECENT_FALLBACK_LIMIT,
            storage_backend: StorageBackend::Local,
            local_storage_path: DEFAULT_LOCAL_STORAGE_PATH.to_string(),
            local_storage_base_url: DEFAULT_LOCAL_STORAGE_BASE_URL.to_string(),
        }
    }
}

impl SyncConfig {
    /// Check if the engine is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable numbers fall back to the
    /// default; an unknown storage backend is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let secs = |key: &str, default: Duration| -> Duration {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };
        let millis = |key: &str, default: Duration| -> Duration {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(default)
        };
        let count = |key: &str, default: usize| -> usize {
            lookup(key)
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(default)
        };

        let storage_backend = match lookup("JOBSYNC_STORAGE_BACKEND") {
            Some(value) => value.parse::<StorageBackend>()?,
            None => defaults.storage_backend,
        };

        let max_photo_mb = lookup("JOBSYNC_MAX_PHOTO_MB")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(MAX_PHOTO_SIZE_MB);

        let config = Self {
            environment: lookup("JOBSYNC_ENVIRONMENT")
                .map(|v| v.trim().to_string())
                .unwrap_or(defaults.environment),
            collection: lookup("JOBSYNC_COLLECTION")
                .map(|v| v.trim().to_string())
                .unwrap_or(defaults.collection),
            photo_prefix: lookup("JOBSYNC_PHOTO_PREFIX")
                .map(|v| v.trim().trim_matches('/').to_string())
                .unwrap_or(defaults.photo_prefix),
            confirm_timeout: secs("JOBSYNC_CONFIRM_TIMEOUT_SECS", defaults.confirm_timeout),
            safety_timeout: secs("JOBSYNC_SAFETY_TIMEOUT_SECS", defaults.safety_timeout),
            autosave_quiet_period: millis(
                "JOBSYNC_AUTOSAVE_QUIET_MS",
                defaults.autosave_quiet_period,
            ),
            geolocation_timeout: secs("JOBSYNC_GEO_TIMEOUT_SECS", defaults.geolocation_timeout),
            geolocation_max_age: secs("JOBSYNC_GEO_MAX_AGE_SECS", defaults.geolocation_max_age),
            max_photo_size_bytes: max_photo_mb * 1024 * 1024,
            recent_shown: count("JOBSYNC_RECENT_SHOWN", defaults.recent_shown),
            recent_primary_limit: count(
                "JOBSYNC_RECENT_PRIMARY_LIMIT",
                defaults.recent_primary_limit,
            ),
            recent_fallback_limit: count(
                "JOBSYNC_RECENT_FALLBACK_LIMIT",
                defaults.recent_fallback_limit,
            ),
            storage_backend,
            local_storage_path: lookup("JOBSYNC_LOCAL_STORAGE_PATH")
                .unwrap_or(defaults.local_storage_path),
            local_storage_base_url: lookup("JOBSYNC_LOCAL_STORAGE_BASE_URL")
                .unwrap_or(defaults.local_storage_base_url),
        };

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.collection.is_empty() {
            return Err(anyhow::anyhow!("JOBSYNC_COLLECTION must not be empty"));
        }

        if self.photo_prefix.is_empty() || self.photo_prefix.contains("..") {
            return Err(anyhow::anyhow!(
                "JOBSYNC_PHOTO_PREFIX must be a non-empty relative prefix"
            ));
        }

        if self.confirm_timeout.is_zero() {
            return Err(anyhow::anyhow!(
                "JOBSYNC_CONFIRM_TIMEOUT_SECS must be greater than zero"
            ));
        }

        if self.safety_timeout <= self.confirm_timeout {
            return Err(anyhow::anyhow!(
                "JOBSYNC_SAFETY_TIMEOUT_SECS ({:?}) must be longer than JOBSYNC_CONFIRM_TIMEOUT_SECS ({:?})",
                self.safety_timeout,
                self.confirm_timeout
            ));
        }

        if self.max_photo_size_bytes == 0 {
            return Err(anyhow::anyhow!("JOBSYNC_MAX_PHOTO_MB must be greater than zero"));
        }

        if self.recent_shown == 0
            || self.recent_primary_limit == 0
            || self.recent_fallback_limit == 0
        {
            return Err(anyhow::anyhow!("Recent activity limits must be greater than zero"));
        }

        if self.recent_shown > self.recent_primary_limit {
            return Err(anyhow::anyhow!(
                "JOBSYNC_RECENT_SHOWN ({}) must not exceed JOBSYNC_RECENT_PRIMARY_LIMIT ({})",
                self.recent_shown,
                self.recent_primary_limit
            ));
        }

        if self.storage_backend == StorageBackend::Local && self.local_storage_path.is_empty() {
            return Err(anyhow::anyhow!(
                "JOBSYNC_LOCAL_STORAGE_PATH must be set when using local storage backend"
            ));
        }

        Ok(())
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
    fn defaults_match_the_documented_values() {
        let config = SyncConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.collection, "job_logs");
        assert_eq!(config.confirm_timeout, Duration::from_secs(15));
        assert_eq!(config.safety_timeout, Duration::from_secs(20));
        assert_eq!(config.autosave_quiet_period, Duration::from_secs(1));
        assert_eq!(config.geolocation_timeout, Duration::from_secs(8));
        assert_eq!(config.max_photo_size_bytes, 10 * 1024 * 1024);
        assert_eq!(
            (config.recent_shown, config.recent_primary_limit, config.recent_fallback_limit),
            (5, 10, 200)
        );
        config.validate().unwrap();
    }

    #[test]
    fn overrides_are_applied_and_bad_numbers_fall_back() {
        let config = SyncConfig::from_lookup(lookup_from(&[
            ("JOBSYNC_CONFIRM_TIMEOUT_SECS", "5"),
            ("JOBSYNC_SAFETY_TIMEOUT_SECS", "7"),
            ("JOBSYNC_AUTOSAVE_QUIET_MS", "oops"),
            ("JOBSYNC_PHOTO_PREFIX", "/photos/"),
            ("JOBSYNC_STORAGE_BACKEND", "memory"),
        ]))
        .unwrap();
        assert_eq!(config.confirm_timeout, Duration::from_secs(5));
        assert_eq!(config.safety_timeout, Duration::from_secs(7));
        assert_eq!(config.autosave_quiet_period, Duration::from_millis(1000));
        assert_eq!(config.photo_prefix, "photos");
        assert_eq!(config.storage_backend, StorageBackend::Memory);
    }

    #[test]
    fn unknown_backend_is_an_error() {
        assert!(SyncConfig::from_lookup(lookup_from(&[("JOBSYNC_STORAGE_BACKEND", "s3")])).is_err());
    }

    #[test]
    fn safety_timeout_must_outlast_confirmation() {
        let config = SyncConfig {
            safety_timeout: Duration::from_secs(15),
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn shown_count_cannot_exceed_primary_limit() {
        let config = SyncConfig {
            recent_shown: 11,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
