//! Connection settings and OAuth2 client-credentials token exchange

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info};

use crate::endpoints;
use crate::error::{CrmError, Result};
use crate::types::{OAuthErrorBody, TokenResponse};

// ============================================================================
// Connection Defaults
// ============================================================================

pub const DEFAULT_API_VERSION: &str = "v60.0";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 1000;

/// Everything needed to open a session against one tenant
#[derive(Clone)]
pub struct CrmConfig {
    /// Tenant subdomain (`acme-dev-ed.develop.my`) or a full login URL
    pub domain: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub api_version: String,
    pub timeout: Duration,
    /// Extra attempts after the first for transient failures
    pub max_retries: u32,
    /// Initial backoff; doubled per attempt
    pub retry_backoff: Duration,
}

impl CrmConfig {
    pub fn new(
        domain: impl Into<String>,
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }

    pub fn with_api_version(mut self, version: impl AsRef<str>) -> Self {
        self.api_version = endpoints::normalize_api_version(version.as_ref());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = backoff;
        self
    }

    pub fn login_base_url(&self) -> String {
        endpoints::login_base(&self.domain)
    }

    pub fn validate(&self) -> Result<()> {
        if self.domain.trim().is_empty() {
            return Err(CrmError::Config("DOMAIN must not be empty".to_string()));
        }
        if self.consumer_key.trim().is_empty() {
            return Err(CrmError::Config("CONSUMER_KEY must not be empty".to_string()));
        }
        if self.consumer_secret.trim().is_empty() {
            return Err(CrmError::Config("CONSUMER_SECRET must not be empty".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(CrmError::Config("HTTP timeout must be greater than 0".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for CrmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrmConfig")
            .field("domain", &self.domain)
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field("api_version", &self.api_version)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff", &self.retry_backoff)
            .finish()
    }
}

/// Bearer token plus the instance host it is valid for
#[derive(Clone)]
pub struct Session {
    pub access_token: String,
    pub instance_url: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("instance_url", &self.instance_url)
            .finish()
    }
}

/// Exchange the consumer key and secret for a session.
pub async fn client_credentials(http: &Client, config: &CrmConfig) -> Result<Session> {
    let url = endpoints::token_url(&config.login_base_url());
    debug!(url = %url, "Requesting access token");

    let response = http
        .post(&url)
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", config.consumer_key.as_str()),
            ("client_secret", config.consumer_secret.as_str()),
        ])
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let reason = match serde_json::from_str::<OAuthErrorBody>(&body) {
            Ok(err) => match err.error_description {
                Some(description) => format!("{}: {}", err.error, description),
                None => err.error,
            },
            Err(_) => format!("token endpoint returned status {}", status.as_u16()),
        };
        return Err(CrmError::Auth(reason));
    }

    let token: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| CrmError::Decode(format!("token response: {e}")))?;

    info!(instance_url = %token.instance_url, "Authenticated against CRM");

    Ok(Session {
        access_token: token.access_token,
        instance_url: token.instance_url.trim_end_matches('/').to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secret() {
        let config = CrmConfig::new("acme", "key", "super-secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_validate_rejects_blank_credentials() {
        assert!(CrmConfig::new("acme", "key", "secret").validate().is_ok());
        assert!(CrmConfig::new("", "key", "secret").validate().is_err());
        assert!(CrmConfig::new("acme", " ", "secret").validate().is_err());
        assert!(CrmConfig::new("acme", "key", "").validate().is_err());
    }

    #[test]
    fn test_api_version_is_normalized() {
        let config = CrmConfig::new("acme", "k", "s").with_api_version("61.0");
        assert_eq!(config.api_version, "v61.0");
    }
}
