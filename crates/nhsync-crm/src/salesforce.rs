//! Salesforce REST client
//!
//! Data plane calls go to `/services/data/{version}/...`, metadata plane calls to
//! the Tooling API under the same prefix. Transient failures (connect errors,
//! timeouts, 408/429/5xx) are retried with exponential backoff, honoring
//! `Retry-After` when the tenant sends one. An expired session is refreshed once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nhsync_common::pacing::{Sleeper, TokioSleeper};
use nhsync_common::types::{AccountRecord, FieldDescriptor};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::auth::{self, CrmConfig, Session};
use crate::client::{CrmClient, FieldInfo, ObjectDescription, RecordRef};
use crate::endpoints;
use crate::error::{CrmError, Result};
use crate::query::RecordQuery;
use crate::types::{ApiError, CustomFieldRequest, DescribeResponse, QueryResponse, SaveResult};

/// Upper bound for a single backoff wait.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("nhsync/", env!("CARGO_PKG_VERSION"));

pub struct SalesforceClient {
    http: Client,
    config: CrmConfig,
    session: RwLock<Session>,
    sleeper: Arc<dyn Sleeper>,
}

impl SalesforceClient {
    /// Validate the settings and authenticate.
    pub async fn connect(config: CrmConfig) -> Result<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        let session = auth::client_credentials(&http, &config).await?;

        Ok(Self {
            http,
            config,
            session: RwLock::new(session),
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replace the sleeper used between retries.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn config(&self) -> &CrmConfig {
        &self.config
    }

    pub async fn instance_url(&self) -> String {
        self.session.read().await.instance_url.clone()
    }

    async fn get_json<T: DeserializeOwned>(&self, url_for: impl Fn(&str) -> String) -> Result<T> {
        self.execute(Method::GET, url_for, None::<&()>).await
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        url_for: impl Fn(&str) -> String,
        body: &B,
    ) -> Result<T> {
        self.execute(Method::POST, url_for, Some(body)).await
    }

    /// Send one logical request, retrying transient failures.
    ///
    /// `url_for` receives the current instance URL so a refreshed session can
    /// move the request to a different host.
    async fn execute<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: Method,
        url_for: impl Fn(&str) -> String,
        body: Option<&B>,
    ) -> Result<T> {
        let mut backoff = self.config.retry_backoff;
        let mut attempt: u32 = 0;
        let mut refreshed = false;

        loop {
            let session = self.session.read().await.clone();
            let url = url_for(&session.instance_url);

            let mut request: RequestBuilder = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(&session.access_token);
            if let Some(body) = body {
                request = request.json(body);
            }

            debug!(method = %method, url = %url, attempt = attempt + 1, "CRM request");

            let outcome = match request.send().await {
                Ok(response) => decode::<T>(response).await,
                Err(err) => Err(CrmError::Http(err)),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(CrmError::Api { status: 401, .. }) if !refreshed => {
                    warn!("Session rejected, re-authenticating");
                    let fresh = auth::client_credentials(&self.http, &self.config).await?;
                    *self.session.write().await = fresh;
                    refreshed = true;
                },
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    let wait = err.retry_after().unwrap_or(backoff).min(MAX_BACKOFF);
                    attempt += 1;
                    warn!(
                        error = %err,
                        attempt,
                        max_retries = self.config.max_retries,
                        wait_ms = wait.as_millis() as u64,
                        "Transient CRM failure, retrying"
                    );
                    self.sleeper.sleep(wait).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                },
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl CrmClient for SalesforceClient {
    async fn describe(&self, object: &str) -> Result<ObjectDescription> {
        let version = self.config.api_version.clone();
        let response: DescribeResponse = self
            .get_json(|base| endpoints::describe_url(base, &version, object))
            .await?;

        debug!(object, fields = response.fields.len(), "Described object");

        Ok(ObjectDescription {
            name: response.name,
            fields: response
                .fields
                .into_iter()
                .map(|f| FieldInfo {
                    name: f.name,
                    label: f.label,
                    field_type: f.field_type,
                    custom: f.custom,
                })
                .collect(),
        })
    }

    async fn query(&self, query: &RecordQuery) -> Result<Vec<RecordRef>> {
        let version = self.config.api_version.clone();
        let soql = query.to_soql();
        let response: QueryResponse = self
            .get_json(|base| endpoints::query_url(base, &version, &soql))
            .await?;

        debug!(soql = %soql, total = response.total_size, "Query answered");

        response
            .records
            .into_iter()
            .map(|mut fields| {
                fields.remove("attributes");
                let id = fields
                    .get("Id")
                    .and_then(|v| v.as_str())
                    .map(ToOwned::to_owned)
                    .ok_or_else(|| CrmError::Decode("query record without Id".to_string()))?;
                Ok(RecordRef { id, fields })
            })
            .collect()
    }

    async fn create_record(&self, object: &str, record: &AccountRecord) -> Result<String> {
        let version = self.config.api_version.clone();
        let result: SaveResult = self
            .post_json(|base| endpoints::sobject_url(base, &version, object), record)
            .await?;
        saved_id(result)
    }

    async fn create_field(&self, descriptor: &FieldDescriptor) -> Result<String> {
        let version = self.config.api_version.clone();
        let payload = CustomFieldRequest::from(descriptor);
        let result: SaveResult = self
            .post_json(|base| endpoints::custom_field_url(base, &version), &payload)
            .await?;
        let id = saved_id(result)?;
        info!(field = %descriptor.full_name(), id = %id, "Custom field created");
        Ok(id)
    }
}

fn saved_id(result: SaveResult) -> Result<String> {
    match (result.success, result.id) {
        (true, Some(id)) => Ok(id),
        _ => Err(CrmError::Api {
            status: 200,
            errors: result.errors,
            retry_after: None,
        }),
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let retry_after = parse_retry_after(response.headers().get(reqwest::header::RETRY_AFTER));
    let body = response.text().await?;

    if !status.is_success() {
        return Err(CrmError::Api {
            status: status.as_u16(),
            errors: parse_error_body(status, &body),
            retry_after,
        });
    }

    serde_json::from_str(&body).map_err(|e| {
        CrmError::Decode(format!("{e} in response body: {}", truncate_for_log(&body)))
    })
}

/// The tenant answers errors as an array, occasionally as a single object.
pub fn parse_error_body(status: StatusCode, body: &str) -> Vec<ApiError> {
    if let Ok(errors) = serde_json::from_str::<Vec<ApiError>>(body) {
        return errors;
    }
    if let Ok(error) = serde_json::from_str::<ApiError>(body) {
        if !error.error_code.is_empty() || !error.message.is_empty() {
            return vec![error];
        }
    }
    if body.trim().is_empty() {
        return Vec::new();
    }
    vec![ApiError::new(
        status.canonical_reason().unwrap_or("HTTP_ERROR").to_ascii_uppercase().replace(' ', "_"),
        truncate_for_log(body),
    )]
}

pub fn parse_retry_after(value: Option<&reqwest::header::HeaderValue>) -> Option<Duration> {
    let secs = value?.to_str().ok()?.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(secs))
}

fn truncate_for_log(text: &str) -> String {
    const MAX_CHARS: usize = 300;
    let trimmed = text.trim();
    if trimmed.chars().count() <= MAX_CHARS {
        trimmed.to_string()
    } else {
        format!("{}...", trimmed.chars().take(MAX_CHARS).collect::<String>())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_parse_error_array() {
        let errors = parse_error_body(
            StatusCode::BAD_REQUEST,
            r#"[{"message":"duplicate value found","errorCode":"DUPLICATE_VALUE","fields":[]}]"#,
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_code, "DUPLICATE_VALUE");
    }

    #[test]
    fn test_parse_error_plain_text() {
        let errors = parse_error_body(StatusCode::SERVICE_UNAVAILABLE, "upstream down");
        assert_eq!(errors[0].error_code, "SERVICE_UNAVAILABLE");
        assert_eq!(errors[0].message, "upstream down");
    }

    #[test]
    fn test_parse_error_empty_body() {
        assert!(parse_error_body(StatusCode::BAD_GATEWAY, "  ").is_empty());
    }

    #[test]
    fn test_parse_retry_after() {
        let value = HeaderValue::from_static("7");
        assert_eq!(parse_retry_after(Some(&value)), Some(Duration::from_secs(7)));
        let value = HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(parse_retry_after(Some(&value)), None);
        assert_eq!(parse_retry_after(None), None);
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        let text = "é".repeat(400);
        let truncated = truncate_for_log(&text);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 303);
    }

    #[test]
    fn test_saved_id_failure_carries_errors() {
        let err = saved_id(SaveResult {
            id: None,
            success: false,
            errors: vec![ApiError::new("DUPLICATE_DEVELOPER_NAME", "already exists")],
        })
        .unwrap_err();
        assert_eq!(err.error_code(), Some("DUPLICATE_DEVELOPER_NAME"));
    }
}
