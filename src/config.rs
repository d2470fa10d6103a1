//! Collector configuration.
//!
//! Every knob has a default, so the page can call the exported functions
//! with no options at all, or override a handful of keys:
//!
//! ```javascript
//! await collect_fingerprint({ collection_ceiling_ms: 1500, request_media_permission: false });
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use wasm_bindgen::JsValue;

use crate::error::{CollectorError, Result};

/// Public STUN servers used to trigger ICE gathering
pub const DEFAULT_STUN_SERVERS: &[&str] = &[
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
];

/// IP-echo services, tried in order
pub const DEFAULT_IP_ECHO_ENDPOINTS: &[&str] = &[
    "https://api.ipify.org?format=json",
    "https://ipapi.co/json/",
    "https://api.ip.sb/ip",
];

/// Configuration for a collection run and the visit submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Motion sampler's own deadline
    pub sensor_window_ms: u32,
    /// Hard ceiling on the sampling phase, independent of the sampler
    pub collection_ceiling_ms: u32,
    /// How long ICE candidates are gathered
    pub webrtc_window_ms: u32,
    /// Motion samples needed before a movement pattern is derived
    pub min_motion_samples: usize,
    /// How long the silent oscillator runs before the analyser is read
    pub audio_settle_ms: u32,
    pub battery_timeout_ms: u32,
    /// Covers the permission prompt and the enumeration itself
    pub media_timeout_ms: u32,
    pub permission_timeout_ms: u32,
    pub ip_echo_timeout_ms: u32,
    pub ip_echo_endpoints: Vec<String>,
    pub stun_servers: Vec<String>,
    /// Prompt for camera/microphone first so enumerated devices carry labels
    pub request_media_permission: bool,
    /// Tracking backend base URL
    pub api_base: String,
    /// Page label sent with the visit
    pub page: String,
    pub submit_timeout_ms: u32,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            sensor_window_ms: 3_000,
            collection_ceiling_ms: 3_000,
            webrtc_window_ms: 3_000,
            min_motion_samples: 10,
            audio_settle_ms: 100,
            battery_timeout_ms: 2_000,
            media_timeout_ms: 3_000,
            permission_timeout_ms: 1_000,
            ip_echo_timeout_ms: 3_000,
            ip_echo_endpoints: DEFAULT_IP_ECHO_ENDPOINTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            stun_servers: DEFAULT_STUN_SERVERS.iter().map(|s| s.to_string()).collect(),
            request_media_permission: true,
            api_base: "http://localhost:5001".to_string(),
            page: "Product Sale Website".to_string(),
            submit_timeout_ms: 15_000,
        }
    }
}

impl CollectorConfig {
    /// Read options passed from JS. `undefined`/`null` yields the defaults;
    /// an object with mistyped keys is rejected.
    pub fn from_js(options: JsValue) -> Result<Self> {
        if options.is_undefined() || options.is_null() {
            return Ok(Self::default());
        }
        let config: Self = serde_wasm_bindgen::from_value(options)
            .map_err(|e| CollectorError::Config(e.to_string()))?;
        config.validate()
    }

    /// Reject settings the collector cannot run with.
    pub fn validate(self) -> Result<Self> {
        if !(self.api_base.starts_with("http://") || self.api_base.starts_with("https://")) {
            return Err(CollectorError::Config(format!(
                "api_base must be an http(s) URL, got {:?}",
                self.api_base
            )));
        }
        if let Some(bad) = self
            .ip_echo_endpoints
            .iter()
            .find(|url| !url.starts_with("https://") && !url.starts_with("http://"))
        {
            return Err(CollectorError::Config(format!("bad IP echo endpoint {:?}", bad)));
        }
        Ok(self)
    }

    pub fn sensor_window(&self) -> Duration {
        Duration::from_millis(self.sensor_window_ms as u64)
    }

    pub fn collection_ceiling(&self) -> Duration {
        Duration::from_millis(self.collection_ceiling_ms as u64)
    }

    pub fn webrtc_window(&self) -> Duration {
        Duration::from_millis(self.webrtc_window_ms as u64)
    }

    pub fn ip_echo_timeout(&self) -> Duration {
        Duration::from_millis(self.ip_echo_timeout_ms as u64)
    }

    pub fn audio_settle(&self) -> Duration {
        Duration::from_millis(self.audio_settle_ms as u64)
    }

    pub fn battery_timeout(&self) -> Duration {
        Duration::from_millis(self.battery_timeout_ms as u64)
    }

    pub fn media_timeout(&self) -> Duration {
        Duration::from_millis(self.media_timeout_ms as u64)
    }

    pub fn permission_timeout(&self) -> Duration {
        Duration::from_millis(self.permission_timeout_ms as u64)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms as u64)
    }

    /// URL of the tracking endpoint
    pub fn track_url(&self) -> String {
        format!("{}/api/track-ip", self.api_base.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CollectorConfig::default();
        assert_eq!(config.sensor_window_ms, 3_000);
        assert_eq!(config.collection_ceiling_ms, 3_000);
        assert_eq!(config.webrtc_window_ms, 3_000);
        assert_eq!(config.min_motion_samples, 10);
        assert_eq!(config.ip_echo_endpoints.len(), 3);
        assert_eq!(config.ip_echo_endpoints[0], "https://api.ipify.org?format=json");
        assert_eq!(config.stun_servers.len(), 2);
    }

    #[test]
    fn test_partial_override() {
        let config: CollectorConfig =
            serde_json::from_str(r#"{"collection_ceiling_ms": 1500, "page": "Landing"}"#).unwrap();
        assert_eq!(config.collection_ceiling_ms, 1_500);
        assert_eq!(config.page, "Landing");
        // Untouched keys keep their defaults
        assert_eq!(config.webrtc_window_ms, 3_000);
        assert!(config.request_media_permission);
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(CollectorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        let config = CollectorConfig {
            api_base: "localhost:5001".into(),
            ..CollectorConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, CollectorError::Config(_)));
        assert_eq!(err.code(), crate::error::ErrorCode::ConfigError);

        let config = CollectorConfig {
            ip_echo_endpoints: vec!["https://api.ipify.org".into(), "ftp://echo".into()],
            ..CollectorConfig::default()
        };
        assert!(matches!(config.validate(), Err(CollectorError::Config(_))));
    }

    #[test]
    fn test_track_url() {
        let mut config = CollectorConfig::default();
        assert_eq!(config.track_url(), "http://localhost:5001/api/track-ip");

        config.api_base = "https://tracker.example.com/".into();
        assert_eq!(config.track_url(), "https://tracker.example.com/api/track-ip");
    }

    #[cfg(target_arch = "wasm32")]
    mod browser {
        use super::*;
        use wasm_bindgen_test::*;

        #[wasm_bindgen_test]
        fn test_missing_options_use_defaults() {
            let defaults = CollectorConfig::default();
            assert_eq!(CollectorConfig::from_js(JsValue::UNDEFINED).unwrap(), defaults);
            assert_eq!(CollectorConfig::from_js(JsValue::NULL).unwrap(), defaults);
        }

        #[wasm_bindgen_test]
        fn test_mistyped_options_are_rejected() {
            let options = js_sys::Object::new();
            js_sys::Reflect::set(&options, &"collection_ceiling_ms".into(), &"soon".into())
                .unwrap();
            let err = CollectorConfig::from_js(options.into()).unwrap_err();
            assert!(matches!(err, CollectorError::Config(_)));
        }
    }
}
