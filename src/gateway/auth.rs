//! Credential and session extraction from HTTP requests

use axum::http::HeaderMap;
use tracing::warn;

use crate::catalog::MIN_CREDENTIAL_LEN;
use crate::config::SecurityConfig;

/// Extract the upstream credential from a request.
///
/// Checked in order, first match wins: `token` header,
/// `Authorization: Bearer`, `token` query parameter.
#[must_use]
pub fn extract_credential(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    if let Some(token) = header_str(headers, "token") {
        return Some(token.to_string());
    }

    if let Some(auth) = header_str(headers, "authorization") {
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .unwrap_or_default();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    let query = query.unwrap_or_default();
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
}

/// Check a credential extracted from a request, yielding an error message
/// suitable for a JSON-RPC auth error.
pub fn require_credential(credential: Option<&str>) -> Result<&str, &'static str> {
    let credential = credential.ok_or("Authentication required: credential missing")?;
    if credential.len() < MIN_CREDENTIAL_LEN {
        return Err("Authentication failed: invalid credential format");
    }
    Ok(credential)
}

/// Extract the MCP session correlator
#[must_use]
pub fn extract_session_id(headers: &HeaderMap) -> Option<String> {
    header_str(headers, "mcp-session-id").map(String::from)
}

/// Validate the request Origin.
///
/// Non-browser requests (no Origin header) always pass. Browser origins
/// outside the allow list are logged; they are rejected only when
/// `enforce_origin` is set.
#[must_use]
pub fn validate_origin(headers: &HeaderMap, security: &SecurityConfig) -> bool {
    let Some(origin) = header_str(headers, "origin") else {
        return true;
    };

    if security
        .allowed_origins
        .iter()
        .any(|allowed| origin.starts_with(allowed.as_str()))
    {
        return true;
    }

    warn!(origin = %origin, "Request origin not in allow list");
    !security.enforce_origin
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn token_header_wins_over_bearer_and_query() {
        let headers = headers(&[
            ("token", "from-header"),
            ("authorization", "Bearer from-bearer"),
        ]);
        assert_eq!(
            extract_credential(&headers, Some("token=from-query")),
            Some("from-header".to_string())
        );
    }

    #[test]
    fn bearer_wins_over_query() {
        let headers = headers(&[("authorization", "Bearer from-bearer")]);
        assert_eq!(
            extract_credential(&headers, Some("token=from-query")),
            Some("from-bearer".to_string())
        );
    }

    #[test]
    fn lowercase_bearer_prefix_accepted() {
        let headers = headers(&[("authorization", "bearer tok-lower")]);
        assert_eq!(
            extract_credential(&headers, None),
            Some("tok-lower".to_string())
        );
    }

    #[test]
    fn query_parameter_as_last_resort() {
        let headers = HeaderMap::new();
        assert_eq!(
            extract_credential(&headers, Some("a=b&token=from-query")),
            Some("from-query".to_string())
        );
        assert_eq!(extract_credential(&headers, Some("a=b")), None);
        assert_eq!(extract_credential(&headers, None), None);
    }

    #[test]
    fn non_bearer_authorization_is_ignored() {
        let headers = headers(&[("authorization", "Basic dXNlcg==")]);
        assert_eq!(extract_credential(&headers, None), None);
    }

    #[test]
    fn require_credential_gates_length() {
        assert!(require_credential(None).is_err());
        assert!(require_credential(Some("short")).is_err());
        assert_eq!(
            require_credential(Some("long-enough-credential")),
            Ok("long-enough-credential")
        );
    }

    #[test]
    fn session_id_from_header() {
        let headers = headers(&[("mcp-session-id", "sess-1")]);
        assert_eq!(extract_session_id(&headers), Some("sess-1".to_string()));
        assert_eq!(extract_session_id(&HeaderMap::new()), None);
    }

    #[test]
    fn origin_validation_is_permissive_by_default() {
        let security = SecurityConfig::default();
        assert!(validate_origin(&HeaderMap::new(), &security));
        assert!(validate_origin(
            &headers(&[("origin", "http://localhost:3000")]),
            &security
        ));
        // unknown origin: logged but allowed
        assert!(validate_origin(
            &headers(&[("origin", "https://evil.example")]),
            &security
        ));
    }

    #[test]
    fn origin_enforcement_rejects_unknown_origins() {
        let security = SecurityConfig {
            enforce_origin: true,
            ..SecurityConfig::default()
        };
        assert!(validate_origin(
            &headers(&[("origin", "http://127.0.0.1:8080")]),
            &security
        ));
        assert!(!validate_origin(
            &headers(&[("origin", "https://evil.example")]),
            &security
        ));
        // non-browser requests still pass
        assert!(validate_origin(&HeaderMap::new(), &security));
    }
}
