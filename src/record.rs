//! The fingerprint record and its staging builder.
//!
//! A [`RecordBuilder`] is created when collection starts, pre-filled with
//! every fallback value, and owned by the coordinator. Probes never touch it
//! directly: they hand back a [`ProbeOutput`] and the coordinator applies it,
//! so each probe can only replace its own section. [`RecordBuilder::finalize`]
//! consumes the builder, which makes the frozen [`FingerprintRecord`]
//! impossible to mutate afterwards.
//!
//! Field names serialize to the camelCase keys the tracking backend stores
//! (`batteryLevel`, `webrtcLocalIPs`, ...). Sections are flattened, so the
//! JSON is one flat object.

use serde::{Deserialize, Serialize};
use wasm_bindgen::JsValue;

use crate::environment::{DeviceClass, DisplayInfo, Environment, HardwareInfo, PlatformInfo};
use crate::error::{CollectorError, Result};

/// Canonical placeholder for string fields nobody could fill
pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryStatus {
    /// 0-100
    pub battery_level: Option<u8>,
    pub battery_charging: Option<bool>,
}

impl BatteryStatus {
    pub fn unavailable() -> Self {
        Self {
            battery_level: None,
            battery_charging: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkLink {
    pub connection_type: String,
    pub connection_effective_type: String,
    /// Mbps
    pub connection_downlink: Option<f64>,
    pub downlink_speed: Option<String>,
    pub is_ethernet: bool,
}

impl NetworkLink {
    pub fn unavailable() -> Self {
        Self {
            connection_type: UNKNOWN.to_string(),
            connection_effective_type: UNKNOWN.to_string(),
            connection_downlink: None,
            downlink_speed: None,
            is_ethernet: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuInfo {
    pub gpu: String,
    pub gpu_vendor: String,
    pub gpu_renderer: String,
}

impl GpuInfo {
    pub fn unavailable() -> Self {
        Self {
            gpu: UNKNOWN.to_string(),
            gpu_vendor: UNKNOWN.to_string(),
            gpu_renderer: UNKNOWN.to_string(),
        }
    }
}

/// Best-effort sensor presence flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorAvailability {
    pub has_accelerometer: bool,
    pub has_gyroscope: bool,
    pub has_magnetometer: bool,
    pub has_orientation_sensor: bool,
}

impl SensorAvailability {
    /// A sensor is present if any source says so.
    pub fn merge(self, other: SensorAvailability) -> Self {
        Self {
            has_accelerometer: self.has_accelerometer || other.has_accelerometer,
            has_gyroscope: self.has_gyroscope || other.has_gyroscope,
            has_magnetometer: self.has_magnetometer || other.has_magnetometer,
            has_orientation_sensor: self.has_orientation_sensor || other.has_orientation_sensor,
        }
    }
}

/// Latest device-motion sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccelerometerSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Degrees
    pub pitch: f64,
    /// Degrees
    pub roll: f64,
    pub timestamp: f64,
}

/// Latest device-orientation sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrientationSample {
    pub alpha: Option<f64>,
    pub beta: Option<f64>,
    pub gamma: Option<f64>,
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementPattern {
    pub average_pitch_change: f64,
    pub average_roll_change: f64,
    pub max_pitch_change: f64,
    pub max_roll_change: f64,
    pub movement_detected: bool,
    #[serde(rename = "samples")]
    pub sample_count: usize,
}

/// What the motion/orientation sampler contributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionReport {
    pub accelerometer_data: Option<AccelerometerSample>,
    pub device_orientation: Option<OrientationSample>,
    pub movement_pattern: Option<MovementPattern>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDevice {
    pub device_id: String,
    pub label: String,
    pub group_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInventory {
    pub has_camera: bool,
    pub has_microphone: bool,
    pub has_speakers: bool,
    pub camera_count: usize,
    pub microphone_count: usize,
    pub speaker_count: usize,
    pub camera_devices: Vec<MediaDevice>,
    pub microphone_devices: Vec<MediaDevice>,
    pub speaker_devices: Vec<MediaDevice>,
    pub total_media_devices: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFingerprint {
    pub sample_rate: u32,
    pub average: f64,
    pub max: u8,
    pub min: u8,
    pub variance: f64,
    /// `{sampleRate}-{round(average)}-{max}-{min}`
    pub fingerprint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioReport {
    pub audio_fingerprint: Option<AudioFingerprint>,
    pub audio_context_supported: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceWorkerStatus {
    pub service_worker_registered: bool,
    pub service_worker_active: bool,
    pub service_worker_scope: String,
}

impl ServiceWorkerStatus {
    pub fn unavailable() -> Self {
        Self {
            service_worker_registered: false,
            service_worker_active: false,
            service_worker_scope: UNKNOWN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebRtcLeak {
    #[serde(rename = "webrtcLocalIPs")]
    pub local_ips: Vec<String>,
    #[serde(rename = "webrtcSupported")]
    pub supported: bool,
}

/// Result handed back by one signal probe.
///
/// Each variant maps to exactly one section of the record.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutput {
    Battery(BatteryStatus),
    Network(NetworkLink),
    Gpu(GpuInfo),
    Sensors(SensorAvailability),
    Media(MediaInventory),
    Audio(AudioReport),
    ServiceWorker(ServiceWorkerStatus),
    WebRtc(WebRtcLeak),
}

/// The consolidated, immutable record produced once per collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    #[serde(flatten)]
    pub display: DisplayInfo,
    #[serde(flatten)]
    pub platform: PlatformInfo,
    #[serde(flatten)]
    pub device: DeviceClass,
    #[serde(flatten)]
    pub hardware: HardwareInfo,
    #[serde(flatten)]
    pub battery: BatteryStatus,
    #[serde(flatten)]
    pub network: NetworkLink,
    #[serde(flatten)]
    pub gpu: GpuInfo,
    #[serde(flatten)]
    pub sensors: SensorAvailability,
    #[serde(flatten)]
    pub motion: MotionReport,
    #[serde(flatten)]
    pub media: MediaInventory,
    #[serde(flatten)]
    pub audio: AudioReport,
    #[serde(flatten)]
    pub service_worker: ServiceWorkerStatus,
    #[serde(flatten)]
    pub webrtc: WebRtcLeak,
}

impl FingerprintRecord {
    /// Convert to a plain JS object (not a `Map`), ready for `JSON.stringify`.
    pub fn to_js(&self) -> Result<JsValue> {
        self.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|e| CollectorError::Parse(e.to_string()))
    }
}

/// Mutable staging area for a record under construction.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: FingerprintRecord,
}

impl RecordBuilder {
    /// Start a record with every section at its fallback value.
    pub fn new(environment: Environment) -> Self {
        let Environment {
            display,
            platform,
            device,
            hardware,
        } = environment;

        Self {
            record: FingerprintRecord {
                display,
                platform,
                device,
                hardware,
                battery: BatteryStatus::unavailable(),
                network: NetworkLink::unavailable(),
                gpu: GpuInfo::unavailable(),
                sensors: SensorAvailability::default(),
                motion: MotionReport::default(),
                media: MediaInventory::default(),
                audio: AudioReport::default(),
                service_worker: ServiceWorkerStatus::unavailable(),
                webrtc: WebRtcLeak::default(),
            },
        }
    }

    /// Replace the section a probe owns.
    pub fn apply(&mut self, output: ProbeOutput) {
        let record = &mut self.record;
        match output {
            ProbeOutput::Battery(battery) => record.battery = battery,
            ProbeOutput::Network(network) => record.network = network,
            ProbeOutput::Gpu(gpu) => record.gpu = gpu,
            // Availability hints accumulate; the sampler also contributes.
            ProbeOutput::Sensors(sensors) => record.sensors = record.sensors.merge(sensors),
            ProbeOutput::Media(media) => record.media = media,
            ProbeOutput::Audio(audio) => record.audio = audio,
            ProbeOutput::ServiceWorker(status) => record.service_worker = status,
            ProbeOutput::WebRtc(leak) => record.webrtc = leak,
        }
    }

    /// Merge what the motion/orientation sampler saw.
    pub fn apply_motion(&mut self, report: MotionReport) {
        let observed = SensorAvailability {
            has_accelerometer: report.accelerometer_data.is_some(),
            has_gyroscope: report.device_orientation.is_some(),
            ..SensorAvailability::default()
        };
        self.record.sensors = self.record.sensors.merge(observed);
        self.record.motion = report;
    }

    /// Peek at the record being built
    pub fn current(&self) -> &FingerprintRecord {
        &self.record
    }

    /// Freeze the record.
    pub fn finalize(self) -> FingerprintRecord {
        self.record
    }
}
