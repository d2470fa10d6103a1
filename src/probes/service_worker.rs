//! Service worker registration probe.

use std::time::Duration;

use async_trait::async_trait;
use js_sys::Array;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::ServiceWorkerRegistration;

use super::Probe;
use crate::config::CollectorConfig;
use crate::error::{CollectorError, Result};
use crate::js;
use crate::record::{ProbeOutput, ServiceWorkerStatus, UNKNOWN};
use crate::runtime::{timeout, BrowserClock};

/// Registration summary: whether it has an active worker, and its scope
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationSummary {
    pub active: bool,
    pub scope: String,
}

impl ServiceWorkerStatus {
    /// The scope reported is the first registration with an active worker.
    pub fn from_registrations(registrations: &[RegistrationSummary]) -> Self {
        let active = registrations.iter().find(|r| r.active);
        Self {
            service_worker_registered: !registrations.is_empty(),
            service_worker_active: active.is_some(),
            service_worker_scope: active
                .map(|r| r.scope.clone())
                .unwrap_or_else(|| UNKNOWN.to_string()),
        }
    }
}

pub struct ServiceWorkerProbe {
    timeout: Duration,
    clock: BrowserClock,
}

impl ServiceWorkerProbe {
    pub fn new(config: &CollectorConfig) -> Self {
        Self {
            timeout: config.permission_timeout(),
            clock: BrowserClock::new(),
        }
    }
}

#[async_trait(?Send)]
impl Probe for ServiceWorkerProbe {
    fn name(&self) -> &'static str {
        "service_worker"
    }

    fn available(&self) -> bool {
        js::navigator().map_or(false, |nav| js::get_property(&nav, "serviceWorker").is_some())
    }

    async fn probe(&self) -> Result<ProbeOutput> {
        let window =
            web_sys::window().ok_or_else(|| CollectorError::Unavailable("window".into()))?;
        let container = window.navigator().service_worker();

        let listing = timeout(
            &self.clock,
            self.timeout,
            JsFuture::from(container.get_registrations()),
        )
        .await
        .ok_or(CollectorError::Timeout)?
        .map_err(|e| CollectorError::from_js("getRegistrations", &e))?;

        let summaries: Vec<RegistrationSummary> = listing
            .dyn_into::<Array>()
            .map_err(|_| CollectorError::Parse("getRegistrations did not return an array".into()))?
            .iter()
            .filter_map(|r| r.dyn_into::<ServiceWorkerRegistration>().ok())
            .map(|r| RegistrationSummary {
                active: r.active().is_some(),
                scope: r.scope(),
            })
            .collect();

        Ok(ProbeOutput::ServiceWorker(ServiceWorkerStatus::from_registrations(&summaries)))
    }

    fn fallback(&self) -> ProbeOutput {
        ProbeOutput::ServiceWorker(ServiceWorkerStatus::unavailable())
    }
}
