//! Configuration management
//!
//! Settings come from the process environment (a `.env` file is honoured) with
//! the defaults below; CLI flags override individual values afterwards.

use std::path::PathBuf;
use std::time::Duration;

use nhsync_common::{Result, SyncError};
use nhsync_crm::CrmConfig;
use serde::Serialize;

// ============================================================================
// Configuration Constants
// ============================================================================

/// CMS nursing-home provider information, September 2025 release.
pub const DEFAULT_CSV_URL: &str = "https://data.cms.gov/provider-data/sites/default/files/resources/e923f267504f72a3b10c2daa39efed8a_1757685912/NH_ProviderInfo_Sep2025.csv";

pub const DEFAULT_METADATA_PATH: &str = "data/metadata.json";

/// Jurisdictions mirrored into the CRM.
pub const DEFAULT_STATES: &[&str] = &["AZ", "NV", "UT", "CO"];

/// Pause between two custom field creations.
pub const DEFAULT_FIELD_DELAY_SECS: u64 = 2;

/// Pause between two Account upserts.
pub const DEFAULT_RECORD_DELAY_MS: u64 = 100;

pub const DEFAULT_API_VERSION: &str = "v60.0";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Arizona licensing portal serving the facility search page.
pub const DEFAULT_CAC_LICENSING_URL: &str = "https://hsapps.azdhs.gov";

/// Arizona Care Check community site answering the Aura facility call.
pub const DEFAULT_CAC_CARECHECK_URL: &str = "https://azcarecheck.azdhs.gov";

/// Tenant credentials; all three are required for any live CRM call
#[derive(Clone, Default)]
pub struct Credentials {
    pub domain: Option<String>,
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("domain", &self.domain)
            .field("consumer_key", &self.consumer_key.as_ref().map(|_| "<set>"))
            .field("consumer_secret", &self.consumer_secret.as_ref().map(|_| "<set>"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HttpConfig {
    pub api_version: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceConfig {
    pub csv_url: String,
    pub metadata_path: PathBuf,
    /// Upper-cased two-letter codes
    pub states: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PacingConfig {
    pub field_delay_secs: u64,
    pub record_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacConfig {
    pub licensing_url: String,
    pub carecheck_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub http: HttpConfig,
    pub source: SourceConfig,
    pub pacing: PacingConfig,
    pub cac: CacConfig,
}

impl Config {
    /// Load `.env`, then read the process environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let config = Config {
            credentials: Credentials {
                domain: var("DOMAIN"),
                consumer_key: var("CONSUMER_KEY"),
                consumer_secret: var("CONSUMER_SECRET"),
            },
            http: HttpConfig {
                api_version: var("NHSYNC_API_VERSION")
                    .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
                timeout_secs: parse_var(&var, "NHSYNC_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?,
                max_retries: parse_var(&var, "NHSYNC_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            },
            source: SourceConfig {
                csv_url: var("NHSYNC_CSV_URL").unwrap_or_else(|| DEFAULT_CSV_URL.to_string()),
                metadata_path: var("NHSYNC_METADATA_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_METADATA_PATH)),
                states: match var("NHSYNC_STATES") {
                    Some(list) => parse_states(&list),
                    None => DEFAULT_STATES.iter().map(|s| s.to_string()).collect(),
                },
            },
            pacing: PacingConfig {
                field_delay_secs: parse_var(&var, "NHSYNC_FIELD_DELAY_SECS", DEFAULT_FIELD_DELAY_SECS)?,
                record_delay_ms: parse_var(&var, "NHSYNC_RECORD_DELAY_MS", DEFAULT_RECORD_DELAY_MS)?,
            },
            cac: CacConfig {
                licensing_url: var("NHSYNC_CAC_LICENSING_URL")
                    .unwrap_or_else(|| DEFAULT_CAC_LICENSING_URL.to_string()),
                carecheck_url: var("NHSYNC_CAC_CARECHECK_URL")
                    .unwrap_or_else(|| DEFAULT_CAC_CARECHECK_URL.to_string()),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.source.states.is_empty() {
            return Err(SyncError::config("jurisdiction set must not be empty"));
        }
        if let Some(bad) = self
            .source
            .states
            .iter()
            .find(|s| s.len() != 2 || !s.chars().all(|c| c.is_ascii_alphabetic()))
        {
            return Err(SyncError::config(format!(
                "'{bad}' is not a two-letter state code"
            )));
        }

        require_http_url("NHSYNC_CSV_URL", &self.source.csv_url)?;
        require_http_url("NHSYNC_CAC_LICENSING_URL", &self.cac.licensing_url)?;
        require_http_url("NHSYNC_CAC_CARECHECK_URL", &self.cac.carecheck_url)?;

        if self.http.timeout_secs == 0 {
            return Err(SyncError::config("NHSYNC_HTTP_TIMEOUT_SECS must be greater than 0"));
        }

        Ok(())
    }

    /// Connection settings for the tenant; fails if any credential is missing.
    pub fn crm_config(&self) -> Result<CrmConfig> {
        let require = |value: &Option<String>, name: &str| {
            value
                .clone()
                .ok_or_else(|| SyncError::config(format!("{name} is not set")))
        };

        let domain = require(&self.credentials.domain, "DOMAIN")?;
        let consumer_key = require(&self.credentials.consumer_key, "CONSUMER_KEY")?;
        let consumer_secret = require(&self.credentials.consumer_secret, "CONSUMER_SECRET")?;

        Ok(CrmConfig::new(domain, consumer_key, consumer_secret)
            .with_api_version(&self.http.api_version)
            .with_timeout(Duration::from_secs(self.http.timeout_secs))
            .with_retries(self.http.max_retries, Duration::from_secs(1)))
    }

    pub fn field_delay(&self) -> Duration {
        Duration::from_secs(self.pacing.field_delay_secs)
    }

    pub fn record_delay(&self) -> Duration {
        Duration::from_millis(self.pacing.record_delay_ms)
    }
}

/// Split a comma separated list into upper-cased, de-duplicated codes.
pub fn parse_states(list: &str) -> Vec<String> {
    let mut states: Vec<String> = Vec::new();
    for state in list.split(',').map(|s| s.trim().to_ascii_uppercase()) {
        if !state.is_empty() && !states.contains(&state) {
            states.push(state);
        }
    }
    states
}

fn parse_var<T: std::str::FromStr>(
    var: impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| SyncError::config(format!("{key} has an invalid value '{raw}'"))),
        None => Ok(default),
    }
}

fn require_http_url(name: &str, url: &str) -> Result<()> {
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(())
    } else {
        Err(SyncError::config(format!("{name} must be an http(s) URL, got '{url}'")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.source.csv_url, DEFAULT_CSV_URL);
        assert_eq!(config.source.states, vec!["AZ", "NV", "UT", "CO"]);
        assert_eq!(config.source.metadata_path, PathBuf::from("data/metadata.json"));
        assert_eq!(config.field_delay(), Duration::from_secs(2));
        assert_eq!(config.record_delay(), Duration::from_millis(100));
        assert_eq!(config.http.api_version, "v60.0");
    }

    #[test]
    fn test_missing_credentials_is_config_error() {
        let config = Config::from_lookup(lookup(&[("DOMAIN", "acme"), ("CONSUMER_KEY", "k")])).unwrap();
        let err = config.crm_config().unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "Configuration error: CONSUMER_SECRET is not set");
    }

    #[test]
    fn test_crm_config_from_env() {
        let config = Config::from_lookup(lookup(&[
            ("DOMAIN", "acme-dev-ed.develop.my"),
            ("CONSUMER_KEY", "key"),
            ("CONSUMER_SECRET", "secret"),
            ("NHSYNC_API_VERSION", "61.0"),
            ("NHSYNC_MAX_RETRIES", "5"),
        ]))
        .unwrap();
        let crm = config.crm_config().unwrap();
        assert_eq!(crm.login_base_url(), "https://acme-dev-ed.develop.my.salesforce.com");
        assert_eq!(crm.api_version, "v61.0");
        assert_eq!(crm.max_retries, 5);
    }

    #[test]
    fn test_states_are_normalized() {
        let config = Config::from_lookup(lookup(&[("NHSYNC_STATES", " az, nv ,AZ,")])).unwrap();
        assert_eq!(config.source.states, vec!["AZ", "NV"]);
    }

    #[test]
    fn test_validation_failures() {
        assert!(Config::from_lookup(lookup(&[("NHSYNC_STATES", " , ")])).is_err());
        assert!(Config::from_lookup(lookup(&[("NHSYNC_STATES", "ARIZONA")])).is_err());
        assert!(Config::from_lookup(lookup(&[("NHSYNC_CSV_URL", "ftp://example.org/x.csv")])).is_err());
        assert!(Config::from_lookup(lookup(&[("NHSYNC_FIELD_DELAY_SECS", "soon")])).is_err());
        assert!(Config::from_lookup(lookup(&[("NHSYNC_HTTP_TIMEOUT_SECS", "0")])).is_err());
    }
}
