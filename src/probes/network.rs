//! Network Information API probe (`navigator.connection` and its prefixed
//! variants).

use async_trait::async_trait;

use super::Probe;
use crate::error::{CollectorError, Result};
use crate::js;
use crate::record::{NetworkLink, ProbeOutput, UNKNOWN};

/// Human label for a `type`/`effectiveType` value. Unrecognised values pass
/// through unchanged.
pub fn connection_label(kind: &str) -> String {
    let label = match kind {
        "wifi" => "WiFi",
        "cellular" => "Mobile Data",
        "ethernet" => "Ethernet",
        "bluetooth" => "Bluetooth",
        "wimax" => "WiMAX",
        "other" => "Other",
        "none" => "No Connection",
        "4g" => "4G",
        "3g" => "3G",
        "2g" => "2G",
        "slow-2g" => "Slow 2G",
        other => other,
    };
    label.to_string()
}

impl NetworkLink {
    /// Build from the raw `type`, `effectiveType` and `downlink` values.
    ///
    /// `type` is only exposed by some engines; the effective type stands in
    /// for it when missing.
    pub fn from_connection(
        kind: Option<&str>,
        effective_type: Option<&str>,
        downlink: Option<f64>,
    ) -> Self {
        let connection_type = kind
            .or(effective_type)
            .map(connection_label)
            .unwrap_or_else(|| UNKNOWN.to_string());
        let is_ethernet = kind == Some("ethernet")
            || effective_type == Some("ethernet")
            || connection_type.to_lowercase().contains("ethernet");

        // A zero reading means the engine has no estimate
        let downlink = downlink.filter(|mbps| *mbps != 0.0 && !mbps.is_nan());

        Self {
            connection_type,
            connection_effective_type: effective_type.unwrap_or(UNKNOWN).to_string(),
            connection_downlink: downlink,
            downlink_speed: downlink.map(|mbps| format!("{} Mbps", mbps)),
            is_ethernet,
        }
    }
}

#[derive(Debug, Default)]
pub struct NetworkInfoProbe;

impl NetworkInfoProbe {
    pub fn new() -> Self {
        Self
    }
}

const CONNECTION_PROPS: &[&str] = &["connection", "mozConnection", "webkitConnection"];

#[async_trait(?Send)]
impl Probe for NetworkInfoProbe {
    fn name(&self) -> &'static str {
        "network"
    }

    fn available(&self) -> bool {
        js::navigator().map_or(false, |nav| js::first_property(&nav, CONNECTION_PROPS).is_some())
    }

    async fn probe(&self) -> Result<ProbeOutput> {
        let navigator = js::navigator()?;
        let connection = js::first_property(&navigator, CONNECTION_PROPS)
            .ok_or_else(|| CollectorError::Unavailable("navigator.connection".into()))?;

        let kind = js::get_string(&connection, "type");
        let effective = js::get_string(&connection, "effectiveType");
        Ok(ProbeOutput::Network(NetworkLink::from_connection(
            kind.as_deref(),
            effective.as_deref(),
            js::get_f64(&connection, "downlink"),
        )))
    }

    fn fallback(&self) -> ProbeOutput {
        ProbeOutput::Network(NetworkLink::unavailable())
    }
}
