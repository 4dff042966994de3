//! Officer lookup against mocked licensing portals

use std::time::Duration;

use nhsync_ingest::cac::{CacClient, CacError};
use serde_json::json;
use wiremock::{
    matchers::{body_string_contains, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

const SEARCH_PAGE: &str = r#"<!DOCTYPE html>
<html><body>
  <form method="post" action="./Provider.aspx">
    <input type="hidden" name="ctl00$ContentPlaceHolder1$HiddenField1"
           id="ctl00_ContentPlaceHolder1_HiddenField1" value="a0Bt0000001AbCdEAK" />
  </form>
</body></html>"#;

fn facility_details(officer: serde_json::Value) -> serde_json::Value {
    json!({
        "actions": [{
            "id": "79;a",
            "state": "SUCCESS",
            "returnValue": {
                "returnValue": {
                    "facilityName": "SUNVIEW CARE",
                    "chiefAdministrativeOfficer": officer
                },
                "cacheable": true
            }
        }]
    })
}

async fn mount_search(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/ls/sod/Provider.aspx"))
        .and(query_param("ProviderName", "Sunview Care"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn client(server: &MockServer) -> CacClient {
    CacClient::new(&server.uri(), &server.uri(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_lookup_returns_first_and_last_name() {
    let server = MockServer::start().await;
    mount_search(&server, SEARCH_PAGE).await;

    Mock::given(method("POST"))
        .and(path("/s/sfsites/aura"))
        .and(query_param("aura.ApexAction.execute", "2"))
        .and(header("origin", server.uri().as_str()))
        .and(body_string_contains("AZCCFacilityDetailsTabController"))
        .and(body_string_contains("a0Bt0000001AbCdEAK"))
        .and(body_string_contains("aura.token=null"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(facility_details(json!("Jane Q. Public"))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let officer = client(&server).lookup("Sunview Care").await.unwrap();
    assert_eq!(officer.first_name, "Jane");
    assert_eq!(officer.last_name, "Public");
}

#[tokio::test]
async fn test_missing_hidden_id() {
    let server = MockServer::start().await;
    mount_search(&server, "<html><body><p>No results</p></body></html>").await;

    let err = client(&server).lookup("Sunview Care").await.unwrap_err();
    assert!(matches!(err, CacError::FacilityNotFound(ref name) if name == "Sunview Care"));
}

#[tokio::test]
async fn test_missing_officer() {
    let server = MockServer::start().await;
    mount_search(&server, SEARCH_PAGE).await;

    Mock::given(method("POST"))
        .and(path("/s/sfsites/aura"))
        .respond_with(ResponseTemplate::new(200).set_body_json(facility_details(json!(null))))
        .mount(&server)
        .await;

    let err = client(&server).lookup("Sunview Care").await.unwrap_err();
    assert!(matches!(err, CacError::OfficerMissing(ref id) if id == "a0Bt0000001AbCdEAK"));
}

#[tokio::test]
async fn test_blank_officer_name() {
    let server = MockServer::start().await;
    mount_search(&server, SEARCH_PAGE).await;

    Mock::given(method("POST"))
        .and(path("/s/sfsites/aura"))
        .respond_with(ResponseTemplate::new(200).set_body_json(facility_details(json!("   "))))
        .mount(&server)
        .await;

    let err = client(&server).lookup("Sunview Care").await.unwrap_err();
    assert!(matches!(err, CacError::EmptyName(_)));
}

#[tokio::test]
async fn test_portal_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ls/sod/Provider.aspx"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client(&server).lookup("Sunview Care").await.unwrap_err();
    assert!(matches!(err, CacError::Http(_)));
}
