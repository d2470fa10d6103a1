//! Signal probes.
//!
//! Each probe reads one browser signal and hands back a [`ProbeOutput`] for
//! the section it owns. Probes never fail outward: [`run_probe`] turns a
//! missing API, a denied permission, a thrown exception or a timeout into
//! the probe's fallback value.

pub mod audio;
pub mod battery;
pub mod gpu;
pub mod media;
pub mod network;
pub mod sensors;
pub mod service_worker;
pub mod webrtc;

pub use audio::AudioProbe;
pub use battery::BatteryProbe;
pub use gpu::GpuProbe;
pub use media::MediaDevicesProbe;
pub use network::NetworkInfoProbe;
pub use sensors::SensorAvailabilityProbe;
pub use service_worker::ServiceWorkerProbe;
pub use webrtc::WebRtcProbe;

use async_trait::async_trait;

use crate::config::CollectorConfig;
use crate::error::Result;
use crate::record::ProbeOutput;

/// One independently collectable signal.
#[async_trait(?Send)]
pub trait Probe {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Cheap capability check. `false` skips [`Probe::probe`] entirely.
    fn available(&self) -> bool {
        true
    }

    async fn probe(&self) -> Result<ProbeOutput>;

    /// Section value when the signal cannot be read
    fn fallback(&self) -> ProbeOutput;
}

/// Run a probe to completion, substituting its fallback on any failure.
pub async fn run_probe(probe: &dyn Probe) -> ProbeOutput {
    if !probe.available() {
        log::debug!("{} probe: not supported here", probe.name());
        return probe.fallback();
    }

    match probe.probe().await {
        Ok(output) => output,
        Err(e) if e.is_capability_gap() => {
            log::debug!("{} probe: {}", probe.name(), e);
            probe.fallback()
        }
        Err(e) => {
            log::warn!("{} probe failed: {}", probe.name(), e);
            probe.fallback()
        }
    }
}

/// Every concurrently-run browser probe. The WebRTC probe is excluded: it
/// runs in its own phase after sampling.
pub fn browser_probes(config: &CollectorConfig) -> Vec<Box<dyn Probe>> {
    vec![
        Box::new(BatteryProbe::new(config)),
        Box::new(NetworkInfoProbe::new()),
        Box::new(GpuProbe::new()),
        Box::new(SensorAvailabilityProbe::new(config)),
        Box::new(MediaDevicesProbe::new(config)),
        Box::new(AudioProbe::new(config)),
        Box::new(ServiceWorkerProbe::new(config)),
    ]
}
