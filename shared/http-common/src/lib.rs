//! Shared HTTP utilities for the URL shortener workspace.
//!
//! Provides the response envelope, HTTP Basic credential parsing and short
//! link URL building used by the web adapter. Framework-agnostic.

use base64::Engine;

/// Successful result envelope.
///
/// Returns: `{"success": true, "result": <result>}`
pub fn json_ok(result: serde_json::Value) -> serde_json::Value {
    serde_json::json!({"success": true, "result": result})
}

/// Failure envelope with a machine-readable code and a user-facing message.
///
/// Returns: `{"success": false, "code": "<code>", "message": "<message>"}`
pub fn json_fail(code: &str, message: &str) -> serde_json::Value {
    serde_json::json!({"success": false, "code": code, "message": message})
}

/// Human-readable summary of an admin delete.
pub fn deleted_message(count: usize) -> String {
    format!("Deleted {} URL{}", count, if count == 1 { "" } else { "s" })
}

/// Parse an `Authorization: Basic <base64(user:pass)>` header value.
///
/// Returns `None` for other schemes or undecodable payloads.
pub fn parse_basic_auth(header: &str) -> Option<(String, String)> {
    let (scheme, payload) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, pass) = text.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Scheme the client used, from `X-Forwarded-Proto` when a proxy set it.
///
/// Only the first hop counts; anything but `https` is treated as `http`.
pub fn request_scheme(forwarded_proto: Option<&str>) -> &'static str {
    match forwarded_proto.and_then(|v| v.split(',').next()) {
        Some(p) if p.trim().eq_ignore_ascii_case("https") => "https",
        _ => "http",
    }
}

/// Base URL of the service.
///
/// A configured public domain wins and is always served over https;
/// otherwise the request scheme and host are used, and a bare `/` when
/// neither is known.
pub fn base_url(site_domain: Option<&str>, scheme: &str, host: &str) -> String {
    match site_domain.filter(|d| !d.is_empty()) {
        Some(dom) => format!("https://{}/", dom.trim_end_matches('/')),
        None if host.is_empty() => "/".to_string(),
        None => format!("{}://{}/", scheme, host),
    }
}

/// Join a base URL and an alias.
pub fn build_short_url(base: &str, short: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), short)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelopes() {
        assert_eq!(
            json_ok(serde_json::json!("https://sho.rt/abc")),
            serde_json::json!({"success": true, "result": "https://sho.rt/abc"})
        );
        assert_eq!(
            json_fail("short_taken", "Short URL already taken"),
            serde_json::json!({"success": false, "code": "short_taken", "message": "Short URL already taken"})
        );
    }

    #[test]
    fn test_deleted_message() {
        assert_eq!(deleted_message(1), "Deleted 1 URL");
        assert_eq!(deleted_message(3), "Deleted 3 URLs");
    }

    #[test]
    fn test_parse_basic_auth() {
        // admin:secret
        assert_eq!(
            parse_basic_auth("Basic YWRtaW46c2VjcmV0"),
            Some(("admin".to_string(), "secret".to_string()))
        );
        assert_eq!(
            parse_basic_auth("basic YWRtaW46c2VjcmV0"),
            Some(("admin".to_string(), "secret".to_string()))
        );
        assert_eq!(parse_basic_auth("Bearer YWRtaW46c2VjcmV0"), None);
        assert_eq!(parse_basic_auth("Basic !!!"), None);
        assert_eq!(parse_basic_auth("Basic"), None);
    }

    #[test]
    fn test_request_scheme() {
        assert_eq!(request_scheme(None), "http");
        assert_eq!(request_scheme(Some("https")), "https");
        assert_eq!(request_scheme(Some("HTTPS, http")), "https");
        assert_eq!(request_scheme(Some("http, https")), "http");
        assert_eq!(request_scheme(Some("gopher")), "http");
    }

    #[test]
    fn test_base_url_and_short_url() {
        assert_eq!(base_url(Some("sho.rt"), "http", "ignored:3001"), "https://sho.rt/");
        assert_eq!(base_url(None, "http", "localhost:3001"), "http://localhost:3001/");
        assert_eq!(base_url(None, "https", "sho.rt"), "https://sho.rt/");
        assert_eq!(base_url(Some(""), "http", ""), "/");
        assert_eq!(build_short_url("https://sho.rt/", "abc"), "https://sho.rt/abc");
        assert_eq!(build_short_url("/", "abc"), "/abc");
    }
}
