//! WebRTC local address leak.
//!
//! A throwaway peer connection with public STUN servers and an empty data
//! channel makes the browser gather ICE candidates. Candidates are collected
//! for a fixed window, then the connection is closed and every address in a
//! private or link-local range is reported.

use std::cell::RefCell;
use std::future::Future;
use std::net::{IpAddr, Ipv6Addr};
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{pin_mut, select_biased, FutureExt};
use js_sys::{Array, Object, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    RtcConfiguration, RtcPeerConnection, RtcPeerConnectionIceEvent, RtcSessionDescriptionInit,
};

use super::Probe;
use crate::config::CollectorConfig;
use crate::error::{CollectorError, Result};
use crate::js;
use crate::record::{ProbeOutput, WebRtcLeak};
use crate::runtime::{BrowserClock, Clock};

/// Every IP address token in an ICE candidate line.
///
/// `candidate:1 1 udp 2122260223 192.168.1.7 54321 typ host` yields
/// `192.168.1.7`. mDNS hostnames (`*.local`) are not addresses and are skipped.
pub fn extract_addresses(candidate: &str) -> Vec<IpAddr> {
    candidate
        .split_whitespace()
        .filter_map(|token| token.parse::<IpAddr>().ok())
        .collect()
}

fn is_local_v6(ip: &Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    // fe80::/10 link-local, fc00::/7 unique local (includes fd00::/8)
    (first & 0xffc0) == 0xfe80 || (first & 0xfe00) == 0xfc00
}

/// Private IPv4 (10/8, 172.16/12, 192.168/16) or local IPv6.
///
/// Loopback, unspecified and 169.254/16 never qualify.
pub fn is_local_scope(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private(),
        IpAddr::V6(v6) => is_local_v6(v6),
    }
}

/// Deduplicated local addresses across candidate lines, in discovery order.
pub fn local_addresses<'a>(candidates: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut found: Vec<IpAddr> = Vec::new();
    for ip in candidates.into_iter().flat_map(extract_addresses) {
        if is_local_scope(&ip) && !found.contains(&ip) {
            found.push(ip);
        }
    }
    found.iter().map(IpAddr::to_string).collect()
}

pub struct WebRtcProbe {
    stun_servers: Vec<String>,
    window: Duration,
    clock: BrowserClock,
}

impl WebRtcProbe {
    pub fn new(config: &CollectorConfig) -> Self {
        Self {
            stun_servers: config.stun_servers.clone(),
            window: config.webrtc_window(),
            clock: BrowserClock::new(),
        }
    }

    fn configuration(&self) -> Result<RtcConfiguration> {
        let config = RtcConfiguration::new();
        let ice_servers = Array::new();
        for url in &self.stun_servers {
            let server = Object::new();
            Reflect::set(&server, &"urls".into(), &JsValue::from_str(url))
                .map_err(|e| CollectorError::from_js("RTCIceServer", &e))?;
            ice_servers.push(&server);
        }
        config.set_ice_servers(&ice_servers);
        Ok(config)
    }
}

async fn start_gathering(pc: &RtcPeerConnection) -> Result<()> {
    let offer = JsFuture::from(pc.create_offer())
        .await
        .map_err(|e| CollectorError::from_js("createOffer", &e))?;
    let description: RtcSessionDescriptionInit = offer.unchecked_into();
    JsFuture::from(pc.set_local_description(&description))
        .await
        .map_err(|e| CollectorError::from_js("setLocalDescription", &e))?;
    Ok(())
}

/// Keep gathering open for `window`.
///
/// Candidates keep arriving after `setup` succeeds, so only a failed setup
/// ends the window early.
pub async fn hold_window<C, F>(clock: &C, window: Duration, setup: F) -> Result<()>
where
    C: Clock + ?Sized,
    F: Future<Output = Result<()>>,
{
    let setup = setup.fuse();
    let elapsed = clock.sleep(window).fuse();
    pin_mut!(setup, elapsed);

    loop {
        select_biased! {
            result = setup => result?,
            () = elapsed => return Ok(()),
        }
    }
}

#[async_trait(?Send)]
impl Probe for WebRtcProbe {
    fn name(&self) -> &'static str {
        "webrtc"
    }

    fn available(&self) -> bool {
        js::global_has("RTCPeerConnection")
    }

    async fn probe(&self) -> Result<ProbeOutput> {
        let pc = RtcPeerConnection::new_with_configuration(&self.configuration()?)
            .map_err(|e| CollectorError::from_js("RTCPeerConnection", &e))?;

        let candidates: Rc<RefCell<Vec<String>>> = Rc::default();
        let sink = candidates.clone();
        let on_candidate = Closure::wrap(Box::new(move |event: JsValue| {
            let event: RtcPeerConnectionIceEvent = event.unchecked_into();
            // A null candidate marks the end of gathering
            if let Some(candidate) = event.candidate() {
                sink.borrow_mut().push(candidate.candidate());
            }
        }) as Box<dyn FnMut(JsValue)>);
        pc.set_onicecandidate(Some(on_candidate.as_ref().unchecked_ref()));

        let _channel = pc.create_data_channel("");

        if let Err(e) = hold_window(&self.clock, self.window, start_gathering(&pc)).await {
            log::debug!("ICE gathering did not start: {}", e);
        }

        pc.set_onicecandidate(None);
        pc.close();
        drop(on_candidate);

        let gathered = candidates.borrow();
        let local_ips = local_addresses(gathered.iter().map(String::as_str));
        log::debug!(
            "WebRTC: {} candidates, {} local addresses",
            gathered.len(),
            local_ips.len()
        );

        Ok(ProbeOutput::WebRtc(WebRtcLeak {
            local_ips,
            supported: true,
        }))
    }

    fn fallback(&self) -> ProbeOutput {
        ProbeOutput::WebRtc(WebRtcLeak::default())
    }
}
