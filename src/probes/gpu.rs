//! WebGL renderer probe.

use async_trait::async_trait;
use wasm_bindgen::JsCast;
use web_sys::{HtmlCanvasElement, WebGlRenderingContext};

use super::Probe;
use crate::error::{CollectorError, Result};
use crate::js;
use crate::record::{GpuInfo, ProbeOutput, UNKNOWN};

/// `UNMASKED_VENDOR_WEBGL` from `WEBGL_debug_renderer_info`
const UNMASKED_VENDOR: u32 = 0x9245;
/// `UNMASKED_RENDERER_WEBGL`
const UNMASKED_RENDERER: u32 = 0x9246;

impl GpuInfo {
    /// Values read through the debug extension.
    pub fn unmasked(vendor: Option<String>, renderer: Option<String>) -> Self {
        let vendor = vendor.unwrap_or_else(|| UNKNOWN.to_string());
        let renderer = renderer.unwrap_or_else(|| UNKNOWN.to_string());
        Self {
            gpu: format!("{} {}", vendor, renderer),
            gpu_vendor: vendor,
            gpu_renderer: renderer,
        }
    }

    /// Only the generic `RENDERER` string is exposed; the vendor stays unknown.
    pub fn masked(renderer: Option<String>) -> Self {
        let renderer = renderer.unwrap_or_else(|| UNKNOWN.to_string());
        Self {
            gpu: renderer.clone(),
            gpu_vendor: UNKNOWN.to_string(),
            gpu_renderer: renderer,
        }
    }
}

#[derive(Debug, Default)]
pub struct GpuProbe;

impl GpuProbe {
    pub fn new() -> Self {
        Self
    }
}

fn webgl_context(canvas: &HtmlCanvasElement) -> Option<WebGlRenderingContext> {
    ["webgl", "experimental-webgl"].iter().find_map(|kind| {
        canvas
            .get_context(kind)
            .ok()
            .flatten()
            .and_then(|ctx| ctx.dyn_into::<WebGlRenderingContext>().ok())
    })
}

fn string_parameter(gl: &WebGlRenderingContext, pname: u32) -> Option<String> {
    gl.get_parameter(pname)
        .ok()
        .and_then(|v| v.as_string())
        .filter(|s| !s.is_empty())
}

#[async_trait(?Send)]
impl Probe for GpuProbe {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn available(&self) -> bool {
        js::global_has("WebGLRenderingContext")
    }

    async fn probe(&self) -> Result<ProbeOutput> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| CollectorError::Unavailable("document".into()))?;
        let canvas: HtmlCanvasElement = document
            .create_element("canvas")
            .map_err(|e| CollectorError::from_js("createElement", &e))?
            .dyn_into()
            .map_err(|_| CollectorError::Internal("canvas is not an HTMLCanvasElement".into()))?;

        let gl = webgl_context(&canvas)
            .ok_or_else(|| CollectorError::Unavailable("webgl context".into()))?;

        let info = match gl.get_extension("WEBGL_debug_renderer_info") {
            Ok(Some(_)) => GpuInfo::unmasked(
                string_parameter(&gl, UNMASKED_VENDOR),
                string_parameter(&gl, UNMASKED_RENDERER),
            ),
            _ => GpuInfo::masked(string_parameter(&gl, WebGlRenderingContext::RENDERER)),
        };
        Ok(ProbeOutput::Gpu(info))
    }

    fn fallback(&self) -> ProbeOutput {
        ProbeOutput::Gpu(GpuInfo::unavailable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmasked_joins_vendor_and_renderer() {
        let info = GpuInfo::unmasked(
            Some("Google Inc. (NVIDIA)".into()),
            Some("ANGLE (NVIDIA GeForce RTX 3060)".into()),
        );
        assert_eq!(info.gpu, "Google Inc. (NVIDIA) ANGLE (NVIDIA GeForce RTX 3060)");
        assert_eq!(info.gpu_vendor, "Google Inc. (NVIDIA)");
    }

    #[test]
    fn test_masked_keeps_vendor_unknown() {
        let info = GpuInfo::masked(Some("WebKit WebGL".into()));
        assert_eq!(info.gpu, "WebKit WebGL");
        assert_eq!(info.gpu_renderer, "WebKit WebGL");
        assert_eq!(info.gpu_vendor, UNKNOWN);
    }

    #[test]
    fn test_partial_debug_values() {
        let info = GpuInfo::unmasked(None, Some("Mali-G78".into()));
        assert_eq!(info.gpu, "Unknown Mali-G78");
        assert_eq!(info.gpu_vendor, UNKNOWN);
    }
}
