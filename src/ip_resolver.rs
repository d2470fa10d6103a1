//! Public IP resolution through a list of IP-echo services.
//!
//! Endpoints are tried in order, each with its own timeout. The first one
//! that answers with something that parses as an IP address wins. If every
//! endpoint fails the result is `None`; failures are logged, never raised.

use std::net::IpAddr;
use std::time::Duration;

use crate::config::CollectorConfig;
use crate::error::{CollectorError, Result};
use crate::http::{FetchTransport, HttpTransport};
use crate::runtime::{timeout, BrowserClock, Clock};

/// Pull an address out of an echo service response.
///
/// Accepts `{"ip": "..."}`, a bare JSON string, or a plain-text body.
pub fn extract_ip(body: &str) -> Option<String> {
    let body = body.trim();
    if let Ok(ip) = body.parse::<IpAddr>() {
        return Some(ip.to_string());
    }

    match serde_json::from_str::<serde_json::Value>(body).ok()? {
        serde_json::Value::Object(map) => map
            .get("ip")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string),
        serde_json::Value::String(s) => s.trim().parse::<IpAddr>().ok().map(|ip| ip.to_string()),
        _ => None,
    }
}

pub struct PublicIpResolver<T: HttpTransport = FetchTransport, C: Clock = BrowserClock> {
    endpoints: Vec<String>,
    per_endpoint: Duration,
    transport: T,
    clock: C,
}

impl PublicIpResolver {
    pub fn for_browser(config: &CollectorConfig) -> Self {
        Self::new(
            config.ip_echo_endpoints.clone(),
            config.ip_echo_timeout(),
            FetchTransport::new(),
            BrowserClock::new(),
        )
    }
}

impl<T: HttpTransport, C: Clock> PublicIpResolver<T, C> {
    pub fn new(endpoints: Vec<String>, per_endpoint: Duration, transport: T, clock: C) -> Self {
        Self {
            endpoints,
            per_endpoint,
            transport,
            clock,
        }
    }

    async fn query(&self, endpoint: &str) -> Result<String> {
        let body = timeout(&self.clock, self.per_endpoint, self.transport.get_text(endpoint))
            .await
            .ok_or(CollectorError::Timeout)??;
        extract_ip(&body).ok_or_else(|| {
            CollectorError::Parse(format!("no IP address in response from {}", endpoint))
        })
    }

    /// First IP reported by any endpoint, in order.
    pub async fn resolve(&self) -> Option<String> {
        for endpoint in &self.endpoints {
            match self.query(endpoint).await {
                Ok(ip) => {
                    log::debug!("Public IP resolved via {}", endpoint);
                    return Some(ip);
                }
                Err(e) => log::debug!("IP echo {} failed: {}", endpoint, e),
            }
        }
        log::warn!("Could not resolve public IP from {} endpoints", self.endpoints.len());
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_ip_field() {
        assert_eq!(
            extract_ip(r#"{"ip":"203.0.113.5"}"#).as_deref(),
            Some("203.0.113.5")
        );
        assert_eq!(
            extract_ip(r#"{"ip":"2001:db8::1","city":"Berlin","org":"AS64500"}"#).as_deref(),
            Some("2001:db8::1")
        );
    }

    #[test]
    fn test_plain_text_body() {
        assert_eq!(extract_ip("198.51.100.20\n").as_deref(), Some("198.51.100.20"));
        assert_eq!(extract_ip(r#""198.51.100.20""#).as_deref(), Some("198.51.100.20"));
    }

    #[test]
    fn test_unusable_bodies() {
        assert_eq!(extract_ip(""), None);
        assert_eq!(extract_ip("<html>rate limited</html>"), None);
        assert_eq!(extract_ip(r#"{"error":true}"#), None);
        assert_eq!(extract_ip(r#"{"ip":""}"#), None);
        assert_eq!(extract_ip("[1,2]"), None);
    }
}
