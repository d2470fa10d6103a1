//! Synchronous environment snapshot: display, browser/OS, device class and
//! hardware hints.
//!
//! These values are readable without awaiting anything, so they are captured
//! up front and seed the record builder.

use js_sys::{Array, Object, Reflect};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::record::UNKNOWN;
use crate::ua;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayInfo {
    /// `"{width}x{height}"`
    pub screen_resolution: String,
    pub screen_width: Option<i32>,
    pub screen_height: Option<i32>,
    pub viewport_width: Option<i32>,
    pub viewport_height: Option<i32>,
    pub color_depth: Option<i32>,
    pub pixel_depth: Option<i32>,
}

impl DisplayInfo {
    pub fn new(
        screen: Option<(i32, i32)>,
        viewport: Option<(i32, i32)>,
        color_depth: Option<i32>,
        pixel_depth: Option<i32>,
    ) -> Self {
        Self {
            screen_resolution: screen
                .map(|(w, h)| format!("{}x{}", w, h))
                .unwrap_or_else(|| UNKNOWN.to_string()),
            screen_width: screen.map(|(w, _)| w),
            screen_height: screen.map(|(_, h)| h),
            viewport_width: viewport.map(|(w, _)| w),
            viewport_height: viewport.map(|(_, h)| h),
            color_depth,
            pixel_depth,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformInfo {
    pub browser: String,
    pub browser_version: String,
    pub os: String,
    pub os_version: String,
    pub platform: String,
    pub vendor: String,
    pub language: String,
    pub languages: Vec<String>,
    pub timezone: String,
    /// Minutes, as `Date.prototype.getTimezoneOffset` reports it
    pub timezone_offset: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceClass {
    pub device_type: String,
    pub device_model: String,
    pub is_mobile: bool,
    pub is_tablet: bool,
}

impl DeviceClass {
    pub fn from_user_agent(user_agent: &str) -> Self {
        Self {
            device_type: ua::device_type(user_agent).to_string(),
            device_model: ua::device_model(user_agent),
            is_mobile: ua::is_mobile(user_agent),
            is_tablet: ua::is_tablet(user_agent),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareInfo {
    pub hardware_concurrency: Option<u32>,
    /// GB, as `navigator.deviceMemory` reports it
    pub device_memory: Option<f64>,
    pub ram: String,
}

impl HardwareInfo {
    pub fn new(hardware_concurrency: Option<u32>, device_memory: Option<f64>) -> Self {
        Self {
            hardware_concurrency,
            device_memory,
            ram: estimate_ram(device_memory, hardware_concurrency),
        }
    }
}

/// `"8 GB"` when the browser reports memory, otherwise a rough guess of
/// two GB per core.
pub fn estimate_ram(device_memory: Option<f64>, cores: Option<u32>) -> String {
    match (device_memory, cores) {
        (Some(gb), _) if gb > 0.0 => format!("{} GB", gb),
        (_, Some(cores)) if cores > 0 => format!("~{} GB (estimated)", cores * 2),
        _ => UNKNOWN.to_string(),
    }
}

/// Everything known about the visitor before any probe runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    pub display: DisplayInfo,
    pub platform: PlatformInfo,
    pub device: DeviceClass,
    pub hardware: HardwareInfo,
}

impl Environment {
    /// Snapshot with every field at its fallback
    pub fn unknown() -> Self {
        Self {
            display: DisplayInfo::new(None, None, None, None),
            platform: PlatformInfo {
                browser: UNKNOWN.to_string(),
                browser_version: UNKNOWN.to_string(),
                os: UNKNOWN.to_string(),
                os_version: UNKNOWN.to_string(),
                platform: UNKNOWN.to_string(),
                vendor: UNKNOWN.to_string(),
                language: UNKNOWN.to_string(),
                languages: Vec::new(),
                timezone: UNKNOWN.to_string(),
                timezone_offset: None,
            },
            device: DeviceClass {
                device_type: UNKNOWN.to_string(),
                device_model: UNKNOWN.to_string(),
                is_mobile: false,
                is_tablet: false,
            },
            hardware: HardwareInfo::new(None, None),
        }
    }

    /// Read the snapshot from `window`, `navigator` and `screen`.
    pub fn capture() -> Self {
        let Some(window) = web_sys::window() else {
            log::debug!("No window object, using an empty environment snapshot");
            return Self::unknown();
        };
        let navigator = window.navigator();
        let user_agent = navigator.user_agent().unwrap_or_default();

        let display = match window.screen() {
            Ok(screen) => DisplayInfo::new(
                screen.width().ok().zip(screen.height().ok()),
                js_dimension(window.inner_width()).zip(js_dimension(window.inner_height())),
                screen.color_depth().ok(),
                screen.pixel_depth().ok(),
            ),
            Err(_) => DisplayInfo::new(None, None, None, None),
        };

        let language = navigator.language().unwrap_or_else(|| UNKNOWN.to_string());
        let mut languages: Vec<String> = navigator
            .languages()
            .iter()
            .filter_map(|l| l.as_string())
            .collect();
        if languages.is_empty() && language != UNKNOWN {
            languages.push(language.clone());
        }

        let platform = PlatformInfo {
            browser: ua::browser_name(&user_agent).to_string(),
            browser_version: ua::browser_version(&user_agent),
            os: ua::os_name(&user_agent).to_string(),
            os_version: ua::os_version(&user_agent),
            platform: non_empty(navigator.platform().ok()),
            vendor: non_empty(
                Reflect::get(&navigator, &JsValue::from_str("vendor"))
                    .ok()
                    .and_then(|v| v.as_string()),
            ),
            language,
            languages,
            timezone: resolved_timezone().unwrap_or_else(|| UNKNOWN.to_string()),
            timezone_offset: Some(js_sys::Date::new_0().get_timezone_offset() as i32),
        };

        let cores = navigator.hardware_concurrency();
        let device_memory = Reflect::get(&navigator, &JsValue::from_str("deviceMemory"))
            .ok()
            .and_then(|v| v.as_f64());

        Self {
            display,
            platform,
            device: DeviceClass::from_user_agent(&user_agent),
            hardware: HardwareInfo::new((cores > 0.0).then_some(cores as u32), device_memory),
        }
    }
}

fn js_dimension(value: Result<JsValue, JsValue>) -> Option<i32> {
    value.ok().and_then(|v| v.as_f64()).map(|v| v as i32)
}

fn non_empty(value: Option<String>) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// IANA zone name from `Intl.DateTimeFormat().resolvedOptions().timeZone`
fn resolved_timezone() -> Option<String> {
    let format = js_sys::Intl::DateTimeFormat::new(&Array::new(), &Object::new());
    let options = format.resolved_options();
    Reflect::get(&options, &JsValue::from_str("timeZone"))
        .ok()
        .and_then(|tz| tz.dyn_into::<js_sys::JsString>().ok())
        .map(String::from)
}
