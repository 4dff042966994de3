//! Salesforce REST endpoint URL builders

/// OAuth2 token endpoint on the login host
pub fn token_url(login_base: &str) -> String {
    format!("{}/services/oauth2/token", login_base)
}

/// `GET` describe for one object
pub fn describe_url(instance_url: &str, api_version: &str, object: &str) -> String {
    format!(
        "{}/services/data/{}/sobjects/{}/describe",
        instance_url, api_version, object
    )
}

/// `POST` target for creating a record of `object`
pub fn sobject_url(instance_url: &str, api_version: &str, object: &str) -> String {
    format!("{}/services/data/{}/sobjects/{}", instance_url, api_version, object)
}

/// SOQL query URL with the statement URL-encoded into `q`
pub fn query_url(instance_url: &str, api_version: &str, soql: &str) -> String {
    format!(
        "{}/services/data/{}/query?q={}",
        instance_url,
        api_version,
        urlencoding::encode(soql)
    )
}

/// Tooling API collection for custom field metadata
pub fn custom_field_url(instance_url: &str, api_version: &str) -> String {
    format!(
        "{}/services/data/{}/tooling/sobjects/CustomField",
        instance_url, api_version
    )
}

/// Resolve the login host from `DOMAIN`.
///
/// A bare domain such as `acme-dev-ed.develop.my` expands to
/// `https://acme-dev-ed.develop.my.salesforce.com`; a full URL is used as-is.
pub fn login_base(domain: &str) -> String {
    let domain = domain.trim().trim_end_matches('/');
    if domain.starts_with("https://") || domain.starts_with("http://") {
        domain.to_string()
    } else {
        format!("https://{}.salesforce.com", domain)
    }
}

/// Normalise `60.0` / `v60.0` to `v60.0`.
pub fn normalize_api_version(version: &str) -> String {
    let version = version.trim();
    if version.starts_with('v') {
        version.to_string()
    } else {
        format!("v{}", version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_base_from_bare_domain() {
        assert_eq!(
            login_base("dwu00000ymz9b2af-dev-ed.develop.my"),
            "https://dwu00000ymz9b2af-dev-ed.develop.my.salesforce.com"
        );
    }

    #[test]
    fn test_login_base_from_url() {
        assert_eq!(login_base("http://127.0.0.1:8080/"), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_describe_url() {
        assert_eq!(
            describe_url("https://acme.my.salesforce.com", "v60.0", "Account"),
            "https://acme.my.salesforce.com/services/data/v60.0/sobjects/Account/describe"
        );
    }

    #[test]
    fn test_query_url_encodes_statement() {
        let url = query_url(
            "https://acme.my.salesforce.com",
            "v60.0",
            "SELECT Id FROM Account WHERE CCN__c = '015009' LIMIT 1",
        );
        assert_eq!(
            url,
            "https://acme.my.salesforce.com/services/data/v60.0/query?q=SELECT%20Id%20FROM%20Account%20WHERE%20CCN__c%20%3D%20%27015009%27%20LIMIT%201"
        );
    }

    #[test]
    fn test_custom_field_url() {
        assert_eq!(
            custom_field_url("https://acme.my.salesforce.com", "v60.0"),
            "https://acme.my.salesforce.com/services/data/v60.0/tooling/sobjects/CustomField"
        );
    }

    #[test]
    fn test_normalize_api_version() {
        assert_eq!(normalize_api_version("60.0"), "v60.0");
        assert_eq!(normalize_api_version("v61.0"), "v61.0");
    }
}
