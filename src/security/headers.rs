//! Security headers for API responses
//!
//! The API serves JSON only, so every response, rejections included, carries
//! one strict header set: nothing may be framed, sniffed or cached.

use warp::http::header::{HeaderMap, HeaderName, HeaderValue};

/// Content Security Policy for a JSON-only API
const API_CSP: &str = "default-src 'none'; frame-ancestors 'none';";

const PERMISSIONS_POLICY: &str =
    "geolocation=(), microphone=(), camera=(), payment=(), usb=(), magnetometer=(), gyroscope=(), accelerometer=()";

const API_HEADERS: [(&str, &str); 6] = [
    ("x-frame-options", "DENY"),
    ("x-content-type-options", "nosniff"),
    ("referrer-policy", "no-referrer"),
    ("content-security-policy", API_CSP),
    ("cache-control", "no-cache, no-store, must-revalidate"),
    ("permissions-policy", PERMISSIONS_POLICY),
];

/// Header set applied to every API response
pub fn api_security_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in API_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    headers
}

/// Wrapping filter that stamps the API security headers on each reply
pub fn with_api_security_headers() -> warp::filters::reply::WithHeaders {
    warp::reply::with::headers(api_security_headers())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_csp_is_strict() {
        assert!(API_CSP.contains("default-src 'none'"));
        assert!(!API_CSP.contains("unsafe-inline"));
    }

    #[test]
    fn test_header_set() {
        let headers = api_security_headers();
        assert_eq!(headers["x-frame-options"], "DENY");
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert!(headers.contains_key("cache-control"));
        assert_eq!(headers.len(), API_HEADERS.len());
    }
}
