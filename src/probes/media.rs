//! Media device inventory via `navigator.mediaDevices`.

use std::time::Duration;

use async_trait::async_trait;
use js_sys::Array;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    MediaDeviceInfo, MediaDeviceKind, MediaDevices, MediaStream, MediaStreamConstraints,
    MediaStreamTrack,
};

use super::Probe;
use crate::config::CollectorConfig;
use crate::error::{CollectorError, Result};
use crate::js;
use crate::record::{MediaDevice, MediaInventory, ProbeOutput};
use crate::runtime::{timeout, BrowserClock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Camera,
    Microphone,
    Speaker,
    /// Any kind the engine reports beyond the three above
    Other,
}

impl MediaKind {
    fn default_label(self) -> &'static str {
        match self {
            MediaKind::Camera => "Unknown Camera",
            MediaKind::Microphone => "Unknown Microphone",
            MediaKind::Speaker => "Unknown Speaker/Headset",
            MediaKind::Other => "Unknown Device",
        }
    }
}

/// One raw `MediaDeviceInfo` entry
#[derive(Debug, Clone, PartialEq)]
pub struct RawDevice {
    pub kind: MediaKind,
    pub device_id: String,
    pub label: String,
    pub group_id: String,
}

impl MediaInventory {
    /// Group enumerated devices by kind. Blank labels (no permission) get a
    /// generic name. The total counts every enumerated entry, including
    /// kinds that are not grouped.
    pub fn from_devices(devices: impl IntoIterator<Item = RawDevice>) -> Self {
        let mut inventory = MediaInventory::default();
        let mut total = 0;

        for raw in devices {
            total += 1;
            if raw.kind == MediaKind::Other {
                continue;
            }
            let label = if raw.label.trim().is_empty() {
                raw.kind.default_label().to_string()
            } else {
                raw.label
            };
            let device = MediaDevice {
                device_id: raw.device_id,
                label,
                group_id: raw.group_id,
            };
            match raw.kind {
                MediaKind::Camera => inventory.camera_devices.push(device),
                MediaKind::Microphone => inventory.microphone_devices.push(device),
                MediaKind::Speaker => inventory.speaker_devices.push(device),
                MediaKind::Other => {}
            }
        }

        inventory.camera_count = inventory.camera_devices.len();
        inventory.microphone_count = inventory.microphone_devices.len();
        inventory.speaker_count = inventory.speaker_devices.len();
        inventory.has_camera = inventory.camera_count > 0;
        inventory.has_microphone = inventory.microphone_count > 0;
        inventory.has_speakers = inventory.speaker_count > 0;
        inventory.total_media_devices = total;
        inventory
    }
}

pub struct MediaDevicesProbe {
    request_permission: bool,
    timeout: Duration,
    clock: BrowserClock,
}

impl MediaDevicesProbe {
    pub fn new(config: &CollectorConfig) -> Self {
        Self {
            request_permission: config.request_media_permission,
            timeout: config.media_timeout(),
            clock: BrowserClock::new(),
        }
    }

    /// Ask for camera and microphone so enumeration returns labels. Any
    /// granted stream is stopped straight away.
    async fn request_labels(&self, devices: &MediaDevices) {
        let constraints = MediaStreamConstraints::new();
        constraints.set_video(&JsValue::TRUE);
        constraints.set_audio(&JsValue::TRUE);

        let prompt = async {
            let promise = devices
                .get_user_media_with_constraints(&constraints)
                .map_err(|e| CollectorError::from_js("getUserMedia", &e))?;
            JsFuture::from(promise)
                .await
                .map_err(|e| CollectorError::from_js("getUserMedia", &e))
        };

        match timeout(&self.clock, self.timeout, prompt).await {
            Some(Ok(stream)) => {
                if let Ok(stream) = stream.dyn_into::<MediaStream>() {
                    for track in stream.get_tracks().iter() {
                        if let Ok(track) = track.dyn_into::<MediaStreamTrack>() {
                            track.stop();
                        }
                    }
                }
            }
            // Still enumerable without labels
            Some(Err(e)) => log::debug!("Media permission not granted: {}", e),
            None => log::debug!("Media permission prompt unanswered"),
        }
    }
}

fn raw_device(info: &MediaDeviceInfo) -> RawDevice {
    let kind = match info.kind() {
        MediaDeviceKind::Videoinput => MediaKind::Camera,
        MediaDeviceKind::Audioinput => MediaKind::Microphone,
        MediaDeviceKind::Audiooutput => MediaKind::Speaker,
        _ => MediaKind::Other,
    };
    RawDevice {
        kind,
        device_id: info.device_id(),
        label: info.label(),
        group_id: info.group_id(),
    }
}

#[async_trait(?Send)]
impl Probe for MediaDevicesProbe {
    fn name(&self) -> &'static str {
        "media"
    }

    fn available(&self) -> bool {
        js::navigator()
            .ok()
            .and_then(|nav| js::get_property(&nav, "mediaDevices"))
            .map_or(false, |md| js::has_method(&md, "enumerateDevices"))
    }

    async fn probe(&self) -> Result<ProbeOutput> {
        let window =
            web_sys::window().ok_or_else(|| CollectorError::Unavailable("window".into()))?;
        let devices = window
            .navigator()
            .media_devices()
            .map_err(|e| CollectorError::from_js("mediaDevices", &e))?;

        if self.request_permission {
            self.request_labels(&devices).await;
        }

        let listing = async {
            let promise = devices
                .enumerate_devices()
                .map_err(|e| CollectorError::from_js("enumerateDevices", &e))?;
            JsFuture::from(promise)
                .await
                .map_err(|e| CollectorError::from_js("enumerateDevices", &e))
        };
        let listing = timeout(&self.clock, self.timeout, listing)
            .await
            .ok_or(CollectorError::Timeout)??;

        let entries: Array = listing
            .dyn_into()
            .map_err(|_| CollectorError::Parse("enumerateDevices did not return an array".into()))?;
        let raw = entries
            .iter()
            .filter_map(|entry| entry.dyn_into::<MediaDeviceInfo>().ok())
            .map(|info| raw_device(&info));

        Ok(ProbeOutput::Media(MediaInventory::from_devices(raw)))
    }

    fn fallback(&self) -> ProbeOutput {
        ProbeOutput::Media(MediaInventory::default())
    }
}
