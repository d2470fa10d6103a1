//! Sensor presence probe: Generic Sensor constructors, device event
//! constructors and Permissions API grants.

use std::time::Duration;

use async_trait::async_trait;
use js_sys::{Array, Object, Reflect};
use wasm_bindgen::JsValue;

use super::Probe;
use crate::config::CollectorConfig;
use crate::error::{CollectorError, Result};
use crate::js;
use crate::record::{ProbeOutput, SensorAvailability};
use crate::runtime::{timeout, BrowserClock};

/// Which globals exist, keyed by constructor name.
pub fn availability_from_globals(has: impl Fn(&str) -> bool) -> SensorAvailability {
    SensorAvailability {
        has_accelerometer: has("Accelerometer") || has("DeviceMotionEvent"),
        has_gyroscope: has("Gyroscope") || has("DeviceOrientationEvent"),
        has_magnetometer: has("Magnetometer"),
        has_orientation_sensor: has("OrientationSensor") || has("AbsoluteOrientationSensor"),
    }
}

pub struct SensorAvailabilityProbe {
    permission_timeout: Duration,
    clock: BrowserClock,
}

impl SensorAvailabilityProbe {
    pub fn new(config: &CollectorConfig) -> Self {
        Self {
            permission_timeout: config.permission_timeout(),
            clock: BrowserClock::new(),
        }
    }

    /// `true` when `permissions.query({ name })` answers at all. Engines
    /// reject names they do not know, so an answer means the sensor exists.
    async fn permission_known(&self, permissions: &JsValue, name: &str) -> bool {
        let query = async {
            let descriptor = Object::new();
            Reflect::set(&descriptor, &JsValue::from_str("name"), &JsValue::from_str(name))
                .map_err(|e| CollectorError::from_js("permissions.query", &e))?;
            let pending = js::call_method(permissions, "query", &Array::of1(&descriptor))?;
            js::await_promise(pending, "permissions.query").await
        };

        match timeout(&self.clock, self.permission_timeout, query).await {
            Some(Ok(_)) => true,
            Some(Err(e)) => {
                log::debug!("permissions.query({}) rejected: {}", name, e);
                false
            }
            None => false,
        }
    }
}

#[async_trait(?Send)]
impl Probe for SensorAvailabilityProbe {
    fn name(&self) -> &'static str {
        "sensors"
    }

    async fn probe(&self) -> Result<ProbeOutput> {
        let mut availability = availability_from_globals(js::global_has);

        let permissions = js::navigator()
            .ok()
            .and_then(|nav| js::get_property(&nav, "permissions"))
            .filter(|p| js::has_method(p, "query"));

        if let Some(permissions) = permissions {
            let (accelerometer, gyroscope, magnetometer) = futures::join!(
                self.permission_known(&permissions, "accelerometer"),
                self.permission_known(&permissions, "gyroscope"),
                self.permission_known(&permissions, "magnetometer"),
            );
            availability = availability.merge(SensorAvailability {
                has_accelerometer: accelerometer,
                has_gyroscope: gyroscope,
                has_magnetometer: magnetometer,
                has_orientation_sensor: false,
            });
        }

        Ok(ProbeOutput::Sensors(availability))
    }

    fn fallback(&self) -> ProbeOutput {
        ProbeOutput::Sensors(SensorAvailability::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desktop_without_sensors() {
        let availability = availability_from_globals(|_| false);
        assert_eq!(availability, SensorAvailability::default());
    }

    #[test]
    fn test_event_constructors_count_as_sensors() {
        let availability = availability_from_globals(|name| {
            matches!(name, "DeviceMotionEvent" | "DeviceOrientationEvent")
        });
        assert!(availability.has_accelerometer);
        assert!(availability.has_gyroscope);
        assert!(!availability.has_magnetometer);
        assert!(!availability.has_orientation_sensor);
    }

    #[test]
    fn test_generic_sensor_api() {
        let availability = availability_from_globals(|name| {
            matches!(name, "Magnetometer" | "AbsoluteOrientationSensor")
        });
        assert!(availability.has_magnetometer);
        assert!(availability.has_orientation_sensor);
        assert!(!availability.has_accelerometer);
    }
}
