//! Client address extraction from HTTP headers

use axum::http::HeaderMap;
use std::net::IpAddr;

/// Extract the client address to classify.
///
/// Takes the first (client-most) entry of `X-Forwarded-For` when the header
/// is present, otherwise the socket peer address. The value is returned
/// unparsed so the decision engine can reject malformed input; non-ASCII
/// bytes are kept (lossily) rather than falling back to the peer.
pub fn extract_client_ip(headers: &HeaderMap, peer: IpAddr) -> String {
    match headers.get("x-forwarded-for") {
        Some(value) if !value.as_bytes().trim_ascii().is_empty() => {
            String::from_utf8_lossy(value.as_bytes())
                .split(',')
                .next()
                .unwrap_or_default()
                .trim()
                .to_string()
        }
        _ => peer.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> IpAddr {
        "192.168.1.1".parse().unwrap()
    }

    #[test]
    fn test_no_header_uses_peer() {
        assert_eq!(extract_client_ip(&HeaderMap::new(), peer()), "192.168.1.1");
    }

    #[test]
    fn test_first_forwarded_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 203.0.113.1 , 198.51.100.1"),
        );
        assert_eq!(extract_client_ip(&headers, peer()), "203.0.113.1");
    }

    #[test]
    fn test_single_forwarded_entry() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("2001:db8::1"));
        assert_eq!(extract_client_ip(&headers, peer()), "2001:db8::1");
    }

    #[test]
    fn test_garbage_is_passed_through() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("not_an_ip"));
        assert_eq!(extract_client_ip(&headers, peer()), "not_an_ip");
    }

    #[test]
    fn test_opaque_bytes_do_not_fall_back_to_peer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_bytes(b"\xff1.2.3.4, 203.0.113.9").unwrap(),
        );
        let extracted = extract_client_ip(&headers, "10.0.0.5".parse().unwrap());
        assert_ne!(extracted, "10.0.0.5");
        assert!(extracted.parse::<IpAddr>().is_err());
    }

    #[test]
    fn test_empty_header_uses_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(""));
        assert_eq!(extract_client_ip(&headers, peer()), "192.168.1.1");
    }
}
