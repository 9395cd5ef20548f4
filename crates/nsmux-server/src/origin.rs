//! Upgrade request admission: auth hook and `Origin` allow-list.

use axum::http::HeaderMap;
use axum::http::header::ORIGIN;

/// Caller-supplied auth check run against the upgrade request headers.
pub type Authorizer = dyn Fn(&HeaderMap) -> bool + Send + Sync;

/// Whether the request's `Origin` is acceptable.
///
/// An empty allow-list accepts everything. A missing or empty `Origin` is
/// accepted. Otherwise the header must look like `scheme://host` and `host`
/// must equal one of the allowed entries.
pub fn origin_allowed(headers: &HeaderMap, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    let origin = match headers.get(ORIGIN).map(|v| v.to_str()) {
        None => return true,
        Some(Ok(origin)) => origin,
        Some(Err(_)) => return false,
    };
    if origin.is_empty() {
        return true;
    }
    let parts: Vec<&str> = origin.split("//").collect();
    match parts.as_slice() {
        [_, host] => allowed.iter().any(|a| a == host),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with_origin(origin: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(ORIGIN, HeaderValue::from_str(origin).unwrap());
        headers
    }

    fn allowed() -> Vec<String> {
        vec!["localhost:3000".into(), "localhost:8000".into()]
    }

    #[test]
    fn empty_allow_list_accepts_anything() {
        assert!(origin_allowed(&with_origin("http://evil.example"), &[]));
    }

    #[test]
    fn missing_or_empty_origin_accepted() {
        assert!(origin_allowed(&HeaderMap::new(), &allowed()));
        assert!(origin_allowed(&with_origin(""), &allowed()));
    }

    #[test]
    fn matching_host_accepted() {
        assert!(origin_allowed(&with_origin("http://localhost:3000"), &allowed()));
        assert!(origin_allowed(&with_origin("https://localhost:8000"), &allowed()));
    }

    #[test]
    fn other_host_rejected() {
        assert!(!origin_allowed(&with_origin("http://localhost:9999"), &allowed()));
        assert!(!origin_allowed(&with_origin("http://localhost"), &allowed()));
    }

    #[test]
    fn malformed_origin_rejected() {
        assert!(!origin_allowed(&with_origin("localhost:3000"), &allowed()));
        assert!(!origin_allowed(&with_origin("http://a//localhost:3000"), &allowed()));
    }

    #[test]
    fn host_with_path_does_not_match() {
        assert!(!origin_allowed(&with_origin("http://localhost:3000/app"), &allowed()));
    }
}
