//! Chief administrative officer lookup on the Arizona licensing portals
//!
//! The licensing search page embeds the facility id in a hidden form field. The
//! Care Check community site then answers an Aura Apex action for that id with
//! the facility details, including the officer's full name.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ORIGIN, REFERER, USER_AGENT};
use scraper::{Html, Selector};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, instrument};

const HIDDEN_ID_SELECTOR: &str = "#ctl00_ContentPlaceHolder1_HiddenField1";

const AURA_CONTEXT: &str = r#"{"mode":"PROD","fwuid":"VFJhRGxfRlFsN29ySGg2SXFsaUZsQTFLcUUxeUY3ZVB6dE9hR0VheDVpb2cxMy4zMzU1NDQzMi4yNTE2NTgyNA","app":"siteforce:communityApp","loaded":{"APPLICATION@markup://siteforce:communityApp":"1411_cmG25dptuXHlZVEVTc27wQ"},"dn":[],"globals":{},"uad":true}"#;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/110.0.0.0 Safari/537.36";

#[derive(Error, Debug)]
pub enum CacError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("No facility id found for provider '{0}'")]
    FacilityNotFound(String),

    #[error("No chief administrative officer listed for facility {0}")]
    OfficerMissing(String),

    #[error("Chief administrative officer name is empty for facility {0}")]
    EmptyName(String),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, CacError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfficerName {
    pub first_name: String,
    pub last_name: String,
}

impl OfficerName {
    /// First and last whitespace-separated token; a single token fills both.
    pub fn parse(full_name: &str) -> Option<Self> {
        let mut tokens = full_name.split_whitespace();
        let first = tokens.next()?;
        let last = tokens.last().unwrap_or(first);
        Some(Self {
            first_name: first.to_string(),
            last_name: last.to_string(),
        })
    }
}

pub struct CacClient {
    http: reqwest::Client,
    licensing_url: String,
    carecheck_url: String,
}

impl CacClient {
    pub fn new(licensing_url: &str, carecheck_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            licensing_url: licensing_url.trim_end_matches('/').to_string(),
            carecheck_url: carecheck_url.trim_end_matches('/').to_string(),
        })
    }

    #[instrument(skip(self))]
    pub async fn lookup(&self, provider_name: &str) -> Result<OfficerName> {
        let facility_id = self.facility_id(provider_name).await?;
        debug!(facility_id = %facility_id, "Resolved facility id");

        let officer = self.officer(&facility_id).await?;
        info!(facility_id = %facility_id, "Found chief administrative officer");
        Ok(officer)
    }

    /// Hidden facility id from the licensing search page.
    pub async fn facility_id(&self, provider_name: &str) -> Result<String> {
        let url = format!("{}/ls/sod/Provider.aspx", self.licensing_url);
        let html = self
            .http
            .get(&url)
            .query(&[("ProviderName", provider_name)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        extract_hidden_id(&html)?.ok_or_else(|| CacError::FacilityNotFound(provider_name.to_string()))
    }

    pub async fn officer(&self, facility_id: &str) -> Result<OfficerName> {
        let url = format!(
            "{}/s/sfsites/aura?r=1&aura.ApexAction.execute=2",
            self.carecheck_url
        );
        let page_uri = facility_page_uri(facility_id);

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(
            ORIGIN,
            HeaderValue::from_str(&self.carecheck_url).map_err(|e| CacError::Decode(e.to_string()))?,
        );
        headers.insert(
            REFERER,
            HeaderValue::from_str(&format!("{}{}", self.carecheck_url, page_uri))
                .map_err(|e| CacError::Decode(e.to_string()))?,
        );

        let message = aura_message(facility_id).to_string();
        let form = [
            ("message", message.as_str()),
            ("aura.context", AURA_CONTEXT),
            ("aura.pageURI", page_uri.as_str()),
            ("aura.token", "null"),
        ];

        let body: Value = self
            .http
            .post(&url)
            .headers(headers)
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_officer(&body, facility_id)
    }
}

fn facility_page_uri(facility_id: &str) -> String {
    format!("/s/facility-details?facilityId={facility_id}&programType=Health%20Care%20Facilties")
}

fn aura_message(facility_id: &str) -> Value {
    json!({
        "actions": [{
            "id": "79;a",
            "descriptor": "aura://ApexActionController/ACTION$execute",
            "callingDescriptor": "UNKNOWN",
            "params": {
                "namespace": "",
                "classname": "AZCCFacilityDetailsTabController",
                "method": "getFacilityDetails",
                "params": {"facilityId": facility_id},
                "cacheable": true,
                "isContinuation": false
            }
        }]
    })
}

pub fn extract_hidden_id(html: &str) -> Result<Option<String>> {
    let selector =
        Selector::parse(HIDDEN_ID_SELECTOR).map_err(|e| CacError::Decode(format!("{e:?}")))?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr("value"))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned))
}

pub fn parse_officer(body: &Value, facility_id: &str) -> Result<OfficerName> {
    let details = body
        .pointer("/actions/0/returnValue/returnValue")
        .ok_or_else(|| CacError::Decode("response has no facility details".to_string()))?;

    let full_name = match details.get("chiefAdministrativeOfficer") {
        Some(Value::String(name)) => name,
        _ => return Err(CacError::OfficerMissing(facility_id.to_string())),
    };

    OfficerName::parse(full_name).ok_or_else(|| CacError::EmptyName(facility_id.to_string()))
}
