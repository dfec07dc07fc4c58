//! Request normalization for visitor tracking

use axum::http::{header::USER_AGENT, HeaderMap};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Sentinel stored when no client address can be resolved
pub const UNKNOWN_IP: &str = "unknown";

/// JSON body sent by the tracking script. Nothing here is validated; missing
/// fields are stored as null.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub page: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub referrer: Option<String>,
}

impl TrackPayload {
    /// Parse a raw request body regardless of its content type.
    /// `sendBeacon` posts JSON as `text/plain`, so the header is not trusted.
    /// Anything that is not a JSON object yields an empty payload.
    pub fn from_body(body: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(body) {
            Ok(value @ Value::Object(_)) => serde_json::from_value(value).unwrap_or_default(),
            _ => Self::default(),
        }
    }
}

/// Strings pass through verbatim, other scalars keep their JSON text, null
/// stays null. A mistyped field never invalidates its neighbours.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

/// Everything the pipeline needs from one inbound tracking request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRequest {
    pub session_id: Option<String>,
    pub page: Option<String>,
    pub referrer: Option<String>,
    pub ip: String,
    pub user_agent: String,
}

impl ClientRequest {
    pub fn from_parts(headers: &HeaderMap, payload: TrackPayload) -> Self {
        Self {
            session_id: payload.session_id,
            page: payload.page,
            referrer: payload.referrer,
            ip: client_ip(headers),
            user_agent: headers
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string(),
        }
    }
}

/// Resolve the client address.
/// Priority: X-Forwarded-For (first entry) > X-Real-IP > "unknown"
pub fn client_ip(headers: &HeaderMap) -> String {
    let forwarded = header_str(headers, "x-forwarded-for")
        .and_then(|ips| ips.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    forwarded
        .or_else(|| {
            header_str(headers, "x-real-ip")
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
        })
        .unwrap_or(UNKNOWN_IP)
        .to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn forwarded_for_takes_first_entry() {
        let h = headers(&[("x-forwarded-for", "1.2.3.4, 5.6.7.8")]);
        assert_eq!(client_ip(&h), "1.2.3.4");
    }

    #[test]
    fn forwarded_for_beats_real_ip() {
        let h = headers(&[("x-forwarded-for", "1.2.3.4"), ("x-real-ip", "9.9.9.9")]);
        assert_eq!(client_ip(&h), "1.2.3.4");
    }

    #[test]
    fn real_ip_is_used_without_forwarded_for() {
        let h = headers(&[("x-real-ip", "9.9.9.9")]);
        assert_eq!(client_ip(&h), "9.9.9.9");
    }

    #[test]
    fn missing_headers_yield_unknown() {
        assert_eq!(client_ip(&HeaderMap::new()), UNKNOWN_IP);
    }

    #[test]
    fn ip_syntax_is_not_validated() {
        let h = headers(&[("x-forwarded-for", "not-an-ip")]);
        assert_eq!(client_ip(&h), "not-an-ip");
    }

    #[test]
    fn from_parts_passes_body_through() {
        let h = headers(&[("user-agent", "curl/8.4.0"), ("x-real-ip", "8.8.8.8")]);
        let payload = TrackPayload {
            session_id: Some("abc".to_string()),
            page: None,
            referrer: Some("https://example.com".to_string()),
        };

        let request = ClientRequest::from_parts(&h, payload);
        assert_eq!(request.session_id.as_deref(), Some("abc"));
        assert_eq!(request.page, None);
        assert_eq!(request.referrer.as_deref(), Some("https://example.com"));
        assert_eq!(request.ip, "8.8.8.8");
        assert_eq!(request.user_agent, "curl/8.4.0");
    }

    #[test]
    fn body_fields_are_read_leniently() {
        let payload =
            TrackPayload::from_body(br#"{"sessionId":42,"page":"/x","referrer":null}"#);
        assert_eq!(payload.session_id.as_deref(), Some("42"));
        assert_eq!(payload.page.as_deref(), Some("/x"));
        assert_eq!(payload.referrer, None);
    }

    #[test]
    fn non_object_body_is_empty_payload() {
        let bodies: [&[u8]; 4] = [b"", b"not json", b"[1,2]", b"\"page\""];
        for body in bodies {
            let payload = TrackPayload::from_body(body);
            assert!(payload.session_id.is_none());
            assert!(payload.page.is_none());
            assert!(payload.referrer.is_none());
        }
    }

    #[test]
    fn missing_user_agent_is_empty() {
        let request = ClientRequest::from_parts(&HeaderMap::new(), TrackPayload::default());
        assert_eq!(request.user_agent, "");
        assert_eq!(request.ip, UNKNOWN_IP);
    }
}
