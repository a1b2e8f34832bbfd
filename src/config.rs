use std::env;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://api.complymap.io/api/v1/soc2/snapshot";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://complymap.db";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_REDIRECTS: usize = 5;
const DEFAULT_OBSERVATION_DAYS: i64 = 90;

/// Everything a report run needs, resolved up front. Nothing in the pipeline
/// reads process-wide state after construction, so two engines with different
/// configs can coexist in one process.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Vendor snapshot endpoint.
    pub endpoint: String,
    /// Credential sent as `X-ComplyMap-License`. May be empty at
    /// construction; an empty key fails the run when it starts.
    pub license_key: String,
    /// Public URL of the audited site, used as the record target and for the
    /// TLS probe fallback.
    pub site_url: String,
    /// History store location.
    pub database_url: String,
    /// Snapshot fetch timeout.
    pub timeout: Duration,
    /// Redirect hops the snapshot fetch will follow.
    pub max_redirects: usize,
    /// Length of the observation period reported in the control-tests
    /// section, ending at generation time.
    pub observation_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            license_key: String::new(),
            site_url: String::new(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            observation_days: DEFAULT_OBSERVATION_DAYS,
        }
    }
}

impl EngineConfig {
    /// Resolve a config from `COMPLYMAP_*` environment variables, falling
    /// back to the documented defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(endpoint) = env::var("COMPLYMAP_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                config.endpoint = endpoint.trim().to_string();
            }
        }
        if let Ok(key) = env::var("COMPLYMAP_LICENSE_KEY") {
            config.license_key = key.trim().to_string();
        }
        if let Ok(url) = env::var("COMPLYMAP_SITE_URL") {
            config.site_url = url.trim().to_string();
        }
        if let Ok(db) = env::var("COMPLYMAP_DATABASE_URL") {
            if !db.trim().is_empty() {
                config.database_url = db.trim().to_string();
            }
        }
        if let Ok(days) = env::var("COMPLYMAP_OBSERVATION_DAYS") {
            if let Ok(days) = days.trim().parse::<i64>() {
                if days > 0 {
                    config.observation_days = days;
                }
            }
        }
        config
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_license_key(mut self, key: impl Into<String>) -> Self {
        self.license_key = key.into();
        self
    }

    pub fn with_site_url(mut self, url: impl Into<String>) -> Self {
        self.site_url = url.into();
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    pub fn with_observation_days(mut self, days: i64) -> Self {
        self.observation_days = days;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_contract() {
        let config = EngineConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_redirects, 5);
        assert_eq!(config.observation_days, 90);
        assert!(config.license_key.is_empty());
    }

    #[test]
    fn builders_override_defaults() {
        let config = EngineConfig::default()
            .with_endpoint("https://vendor.test/snapshot")
            .with_license_key("lk_test")
            .with_site_url("https://shop.example")
            .with_observation_days(30);
        assert_eq!(config.endpoint, "https://vendor.test/snapshot");
        assert_eq!(config.license_key, "lk_test");
        assert_eq!(config.site_url, "https://shop.example");
        assert_eq!(config.observation_days, 30);
    }
}
