//! Visit submission: one tracking POST per browser session.

use std::future::Future;

use serde::Serialize;

use crate::config::CollectorConfig;
use crate::coordinator::Collected;
use crate::error::{CollectorError, Result};
use crate::http::{FetchTransport, HttpTransport};
use crate::record::FingerprintRecord;
use crate::runtime::{now_ms, timeout, BrowserClock, Clock};

/// Session key set once the visit has been submitted
pub const TRACKED_KEY: &str = "ipTracked";
pub const ENTRY_TIME_KEY: &str = "entryTime";
/// Referrer sent when the page was opened directly
pub const DIRECT_VISIT: &str = "Direct Visit";

/// Body of `POST {api_base}/api/track-ip`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingPayload {
    pub page: String,
    pub device_info: FingerprintRecord,
    #[serde(rename = "publicIP")]
    pub public_ip: Option<String>,
    pub referrer: String,
    /// Epoch milliseconds
    pub entry_time: u64,
}

impl TrackingPayload {
    pub fn new(
        page: &str,
        device_info: FingerprintRecord,
        public_ip: Option<String>,
        referrer: Option<String>,
        entry_time: u64,
    ) -> Self {
        Self {
            page: page.to_string(),
            device_info,
            public_ip,
            referrer: referrer
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| DIRECT_VISIT.to_string()),
            entry_time,
        }
    }
}

/// Key/value storage scoped to the browser session.
pub trait SessionStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

/// `window.sessionStorage`. Storage can be blocked (private mode, sandboxed
/// iframes); reads then see nothing and writes are dropped.
#[derive(Debug, Clone, Default)]
pub struct BrowserSession {
    storage: Option<web_sys::Storage>,
}

impl BrowserSession {
    pub fn open() -> Self {
        let storage = web_sys::window().and_then(|w| w.session_storage().ok().flatten());
        if storage.is_none() {
            log::debug!("sessionStorage unavailable, visits are not deduplicated");
        }
        Self { storage }
    }
}

impl SessionStore for BrowserSession {
    fn get(&self, key: &str) -> Option<String> {
        self.storage.as_ref()?.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) {
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.set_item(key, value) {
                log::debug!("sessionStorage.setItem({}) failed: {:?}", key, e);
            }
        }
    }
}

pub struct VisitTracker<S = BrowserSession, T = FetchTransport, C = BrowserClock> {
    config: CollectorConfig,
    session: S,
    transport: T,
    clock: C,
}

impl VisitTracker {
    pub fn for_browser(config: CollectorConfig) -> Self {
        Self::new(config, BrowserSession::open(), FetchTransport::new(), BrowserClock::new())
    }
}

impl<S: SessionStore, T: HttpTransport, C: Clock> VisitTracker<S, T, C> {
    pub fn new(config: CollectorConfig, session: S, transport: T, clock: C) -> Self {
        Self {
            config,
            session,
            transport,
            clock,
        }
    }

    pub fn already_tracked(&self) -> bool {
        self.session.get(TRACKED_KEY).as_deref() == Some("true")
    }

    /// POST the payload, bounded by the submit timeout.
    pub async fn submit(&self, payload: &TrackingPayload) -> Result<()> {
        let body = serde_json::to_string(payload)?;
        let url = self.config.track_url();
        timeout(
            &self.clock,
            self.config.submit_timeout(),
            self.transport.post_json(&url, &body),
        )
        .await
        .ok_or(CollectorError::Timeout)??;
        Ok(())
    }

    /// Collect, resolve and submit, unless this session was already tracked.
    ///
    /// `collection` and `public_ip` run concurrently. Returns `false` when the
    /// visit was skipped. The session is only marked after a 2xx response, so
    /// a failed submission is retried on the next page load.
    pub async fn track<F, G>(
        &self,
        collection: F,
        public_ip: G,
        referrer: Option<String>,
    ) -> Result<bool>
    where
        F: Future<Output = Collected>,
        G: Future<Output = Option<String>>,
    {
        if self.already_tracked() {
            log::info!("Visit already tracked in this session, skipping");
            return Ok(false);
        }

        let entry_time = now_ms() as u64;
        let (collected, public_ip) = futures::join!(collection, public_ip);

        let payload = TrackingPayload::new(
            &self.config.page,
            collected.record,
            public_ip,
            referrer,
            entry_time,
        );

        if let Err(e) = self.submit(&payload).await {
            log::warn!("Visit submission failed: {}", e);
            return Err(e);
        }

        self.session.set(TRACKED_KEY, "true");
        self.session.set(ENTRY_TIME_KEY, &entry_time.to_string());
        log::info!("Visit tracked");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::record::RecordBuilder;

    fn record() -> FingerprintRecord {
        RecordBuilder::new(Environment::unknown()).finalize()
    }

    #[test]
    fn test_payload_keys() {
        let payload = TrackingPayload::new(
            "Product Sale Website",
            record(),
            Some("203.0.113.5".into()),
            Some("https://search.example/".into()),
            1_700_000_000_000,
        );
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["page"], "Product Sale Website");
        assert_eq!(json["publicIP"], "203.0.113.5");
        assert_eq!(json["referrer"], "https://search.example/");
        assert_eq!(json["entryTime"], 1_700_000_000_000u64);
        assert_eq!(json["deviceInfo"]["browser"], "Unknown");
        assert!(json["deviceInfo"].get("webrtcLocalIPs").is_some());
    }

    #[test]
    fn test_empty_referrer_is_direct_visit() {
        for referrer in [None, Some(String::new()), Some("  ".to_string())] {
            let payload = TrackingPayload::new("p", record(), None, referrer, 0);
            assert_eq!(payload.referrer, DIRECT_VISIT);
        }
    }

    #[test]
    fn test_missing_ip_serializes_as_null() {
        let payload = TrackingPayload::new("p", record(), None, None, 0);
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json["publicIP"].is_null());
    }
}
