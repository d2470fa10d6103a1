//! `navigator.getBattery()` probe.

use std::time::Duration;

use async_trait::async_trait;
use js_sys::Array;

use super::Probe;
use crate::config::CollectorConfig;
use crate::error::{CollectorError, Result};
use crate::js;
use crate::record::{BatteryStatus, ProbeOutput};
use crate::runtime::{timeout, BrowserClock};

impl BatteryStatus {
    /// `level` is the 0.0-1.0 fraction the Battery API reports.
    pub fn from_level(level: Option<f64>, charging: Option<bool>) -> Self {
        Self {
            battery_level: level
                .filter(|l| l.is_finite())
                .map(|l| (l * 100.0).round().clamp(0.0, 100.0) as u8),
            battery_charging: charging,
        }
    }
}

pub struct BatteryProbe {
    timeout: Duration,
    clock: BrowserClock,
}

impl BatteryProbe {
    pub fn new(config: &CollectorConfig) -> Self {
        Self {
            timeout: config.battery_timeout(),
            clock: BrowserClock::new(),
        }
    }
}

#[async_trait(?Send)]
impl Probe for BatteryProbe {
    fn name(&self) -> &'static str {
        "battery"
    }

    fn available(&self) -> bool {
        js::navigator().map_or(false, |nav| js::has_method(&nav, "getBattery"))
    }

    async fn probe(&self) -> Result<ProbeOutput> {
        let navigator = js::navigator()?;
        let pending = js::call_method(&navigator, "getBattery", &Array::new())?;
        let manager = timeout(&self.clock, self.timeout, js::await_promise(pending, "getBattery"))
            .await
            .ok_or(CollectorError::Timeout)??;

        Ok(ProbeOutput::Battery(BatteryStatus::from_level(
            js::get_f64(&manager, "level"),
            js::get_bool(&manager, "charging"),
        )))
    }

    fn fallback(&self) -> ProbeOutput {
        ProbeOutput::Battery(BatteryStatus::unavailable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_scaled_to_percent() {
        let status = BatteryStatus::from_level(Some(0.876), Some(false));
        assert_eq!(status.battery_level, Some(88));
        assert_eq!(status.battery_charging, Some(false));

        assert_eq!(BatteryStatus::from_level(Some(1.0), None).battery_level, Some(100));
        assert_eq!(BatteryStatus::from_level(Some(0.0), None).battery_level, Some(0));
    }

    #[test]
    fn test_missing_or_bogus_level() {
        assert_eq!(BatteryStatus::from_level(None, Some(true)).battery_level, None);
        assert_eq!(BatteryStatus::from_level(Some(f64::NAN), None).battery_level, None);
        assert_eq!(BatteryStatus::from_level(Some(1.7), None).battery_level, Some(100));
    }
}
