//! # Visitor WASM
//!
//! Browser-side visitor fingerprint collection compiled to WebAssembly.
//!
//! A page load gathers a broad set of browser and device signals, merges them
//! into one [`FingerprintRecord`], and submits it to the tracking backend once
//! per session.
//!
//! ## Architecture
//!
//! ```text
//!   Environment snapshot ─┐
//!   Signal probes ────────┤
//!   Motion sampler ───────┼──▶ Collector ──▶ FingerprintRecord
//!   Ceiling timer ────────┤        │
//!   WebRTC probe ─────────┘        ▼
//!                           VisitTracker ◀── PublicIpResolver
//!                                  │
//!                                  ▼
//!                        POST {api_base}/api/track-ip
//! ```
//!
//! Every signal is best-effort. A missing API, a denied permission or a
//! timeout leaves that section at its fallback value; collection itself
//! always resolves, within `collection_ceiling + webrtc_window + 500 ms`.

use wasm_bindgen::prelude::*;

// Modules
pub mod config;
pub mod coordinator;
pub mod environment;
mod error;
pub mod http;
pub mod ip_resolver;
pub mod js;
pub mod latch;
pub mod probes;
pub mod record;
pub mod runtime;
pub mod sampler;
pub mod tracker;
pub mod ua;

pub use config::CollectorConfig;
pub use coordinator::{Collected, Collector, Completion, WEBRTC_GRACE};
pub use environment::Environment;
pub use error::{CollectorError, ErrorCode, ErrorInfo, Result};
pub use http::{FetchTransport, HttpTransport};
pub use ip_resolver::{extract_ip, PublicIpResolver};
pub use latch::Latch;
pub use probes::{run_probe, Probe};
pub use record::{FingerprintRecord, ProbeOutput, RecordBuilder};
pub use runtime::{BrowserClock, Clock};
pub use sampler::{MotionSampler, MotionSource, SamplerOutcome, SamplerState};
pub use tracker::{SessionStore, TrackingPayload, VisitTracker};

/// Initialize the collector
///
/// Installs the console logger.
#[wasm_bindgen(start)]
pub fn init() {
    // A second instantiation finds the logger already set
    let _ = console_log::init_with_level(log::Level::Info);

    log::info!("Visitor collector initialized");
}

/// Collect the fingerprint record.
///
/// `options` is an optional object of [`CollectorConfig`] overrides.
/// Resolves to a plain JSON-compatible object. Rejects with an
/// [`ErrorInfo`]-shaped error when `options` is malformed.
#[wasm_bindgen]
pub async fn collect_fingerprint(options: JsValue) -> std::result::Result<JsValue, JsValue> {
    let config = CollectorConfig::from_js(options).map_err(|e| error_to_js(&e))?;
    let collected = Collector::for_browser(config).collect().await;
    collected.record.to_js().map_err(|e| error_to_js(&e))
}

/// Resolve the visitor's public IP through the configured echo services.
///
/// Resolves to the address string, or `null` when every service failed.
#[wasm_bindgen]
pub async fn resolve_public_ip(options: JsValue) -> std::result::Result<JsValue, JsValue> {
    let config = CollectorConfig::from_js(options).map_err(|e| error_to_js(&e))?;
    Ok(match PublicIpResolver::for_browser(&config).resolve().await {
        Some(ip) => JsValue::from_str(&ip),
        None => JsValue::NULL,
    })
}

/// Track this page load.
///
/// Resolves `false` when the visit was already submitted in this browser
/// session, `true` once the backend accepted it. Rejects with an
/// [`ErrorInfo`]-shaped error if `options` is malformed or the submission
/// failed.
#[wasm_bindgen]
pub async fn track_visit(options: JsValue) -> std::result::Result<bool, JsValue> {
    let config = CollectorConfig::from_js(options).map_err(|e| error_to_js(&e))?;
    let tracker = VisitTracker::for_browser(config.clone());
    let collector = Collector::for_browser(config.clone());
    let resolver = PublicIpResolver::for_browser(&config);
    let referrer = web_sys::window()
        .and_then(|w| w.document())
        .map(|d| d.referrer());

    tracker
        .track(collector.collect(), resolver.resolve(), referrer)
        .await
        .map_err(|e| error_to_js(&e))
}

fn error_to_js(error: &CollectorError) -> JsValue {
    serde_wasm_bindgen::to_value(&ErrorInfo::from(error))
        .unwrap_or_else(|_| JsValue::from_str(&error.to_string()))
}
