//! Request inspection and metadata annotation.
//!
//! # Responsibilities
//! - Turn incoming HTTP headers into outgoing RPC metadata
//! - Resolve the effective verb (`X-HTTP-Method-Override`)
//! - Detect whether the client accepts HTTP trailers
//!
//! # Design Decisions
//! - Only an allow-list of headers is forwarded; hop-by-hop and transport
//!   headers never reach the callee
//! - Request ID is assigned by the tower-http layer as early as possible and
//!   forwarded as `x-request-id`

use std::net::SocketAddr;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method};

/// Request ID header.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Prefix of HTTP headers forwarded verbatim (minus the prefix) as metadata,
/// and of response headers carrying header metadata.
pub const METADATA_HEADER_PREFIX: &str = "grpc-metadata-";

/// Prefix of HTTP trailers carrying trailer metadata.
pub const METADATA_TRAILER_PREFIX: &str = "grpc-trailer-";

/// Prefix given to permanent HTTP headers when forwarded as metadata.
pub const METADATA_PREFIX: &str = "grpcgateway-";

pub const X_HTTP_METHOD_OVERRIDE: &str = "x-http-method-override";

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// IANA permanent message headers forwarded as `grpcgateway-<name>`.
const PERMANENT_HEADERS: &[&str] = &[
    "accept",
    "accept-charset",
    "accept-language",
    "accept-ranges",
    "authorization",
    "cache-control",
    "content-type",
    "cookie",
    "date",
    "expect",
    "from",
    "host",
    "if-match",
    "if-modified-since",
    "if-none-match",
    "if-schedule-tag-match",
    "if-unmodified-since",
    "max-forwards",
    "origin",
    "pragma",
    "referer",
    "user-agent",
    "via",
    "warning",
];

pub fn is_permanent_header(name: &str) -> bool {
    PERMANENT_HEADERS.contains(&name)
}

/// Build outgoing RPC metadata from request headers.
///
/// - `Grpc-Metadata-<key>` becomes `<key>`
/// - permanent headers become `grpcgateway-<name>`
/// - `Authorization` is also forwarded unchanged
/// - `x-forwarded-host`, `x-forwarded-for` and `x-request-id` are added
pub fn annotate_incoming(headers: &HeaderMap, remote: Option<SocketAddr>) -> HeaderMap {
    let mut out = HeaderMap::new();

    for (name, value) in headers {
        let key = name.as_str();
        if let Some(stripped) = key.strip_prefix(METADATA_HEADER_PREFIX) {
            if let Ok(name) = HeaderName::from_bytes(stripped.as_bytes()) {
                out.append(name, value.clone());
            }
            continue;
        }
        if is_permanent_header(key) {
            if let Ok(name) = HeaderName::from_bytes(format!("{METADATA_PREFIX}{key}").as_bytes()) {
                out.append(name, value.clone());
            }
        }
        if *name == header::AUTHORIZATION {
            out.append(header::AUTHORIZATION, value.clone());
        }
    }

    let host = headers
        .get(X_FORWARDED_HOST)
        .or_else(|| headers.get(header::HOST));
    if let Some(host) = host {
        out.insert(X_FORWARDED_HOST, host.clone());
    }

    if let Some(remote) = remote {
        let ip = remote.ip().to_string();
        let forwarded = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(existing) => format!("{existing}, {ip}"),
            None => ip,
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded) {
            out.insert(X_FORWARDED_FOR, value);
        }
    }

    if let Some(id) = headers.get(X_REQUEST_ID) {
        out.insert(X_REQUEST_ID, id.clone());
    }

    out
}

/// The verb used for routing. POST requests may override it with
/// `X-HTTP-Method-Override` when enabled.
pub fn effective_method(method: &Method, headers: &HeaderMap, allow_override: bool) -> Method {
    if !allow_override || *method != Method::POST {
        return method.clone();
    }
    headers
        .get(X_HTTP_METHOD_OVERRIDE)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| Method::from_bytes(v.to_ascii_uppercase().as_bytes()).ok())
        .unwrap_or_else(|| method.clone())
}

/// True if the client sent `TE: trailers`.
pub fn accepts_trailers(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::TE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|t| {
            t.split(';')
                .next()
                .is_some_and(|t| t.trim().eq_ignore_ascii_case("trailers"))
        })
}

/// Request ID assigned to this request, if any.
pub fn request_id(headers: &HeaderMap) -> Option<&str> {
    headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(*k, HeaderValue::from_static(*v));
        }
        map
    }

    #[test]
    fn test_annotate_incoming() {
        let incoming = headers(&[
            ("grpc-metadata-tenant", "acme"),
            ("authorization", "Bearer t"),
            ("user-agent", "curl/8"),
            ("host", "api.example.com"),
            ("x-request-id", "req-1"),
            ("connection", "keep-alive"),
            ("x-custom", "dropped"),
        ]);
        let addr: SocketAddr = "10.0.0.7:5555".parse().unwrap();
        let md = annotate_incoming(&incoming, Some(addr));

        assert_eq!(md.get("tenant").unwrap(), "acme");
        assert_eq!(md.get("authorization").unwrap(), "Bearer t");
        assert_eq!(md.get("grpcgateway-authorization").unwrap(), "Bearer t");
        assert_eq!(md.get("grpcgateway-user-agent").unwrap(), "curl/8");
        assert_eq!(md.get("x-forwarded-host").unwrap(), "api.example.com");
        assert_eq!(md.get("x-forwarded-for").unwrap(), "10.0.0.7");
        assert_eq!(md.get("x-request-id").unwrap(), "req-1");
        assert!(md.get("connection").is_none());
        assert!(md.get("x-custom").is_none());
    }

    #[test]
    fn test_forwarded_for_is_appended() {
        let incoming = headers(&[("x-forwarded-for", "1.2.3.4")]);
        let addr: SocketAddr = "10.0.0.7:5555".parse().unwrap();
        let md = annotate_incoming(&incoming, Some(addr));
        assert_eq!(md.get("x-forwarded-for").unwrap(), "1.2.3.4, 10.0.0.7");
    }

    #[test]
    fn test_method_override() {
        let h = headers(&[("x-http-method-override", "patch")]);
        assert_eq!(effective_method(&Method::POST, &h, true), Method::PATCH);
        assert_eq!(effective_method(&Method::POST, &h, false), Method::POST);
        assert_eq!(effective_method(&Method::PUT, &h, true), Method::PUT);
        assert_eq!(effective_method(&Method::POST, &HeaderMap::new(), true), Method::POST);
    }

    #[test]
    fn test_accepts_trailers() {
        assert!(accepts_trailers(&headers(&[("te", "trailers")])));
        assert!(accepts_trailers(&headers(&[("te", "gzip, Trailers")])));
        assert!(!accepts_trailers(&headers(&[("te", "gzip")])));
        assert!(!accepts_trailers(&HeaderMap::new()));
    }
}
