//! Minimal HTTP over the Fetch API.
//!
//! Only two shapes of request are needed: a GET to an IP-echo service and a
//! JSON POST to the tracking backend. Both go through [`HttpTransport`] so
//! the resolver and the tracker can be exercised natively with scripted
//! transports.

use async_trait::async_trait;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, RequestMode, Response};

use crate::error::{CollectorError, Result};

#[async_trait(?Send)]
pub trait HttpTransport {
    /// GET `url` and return the body as text.
    async fn get_text(&self, url: &str) -> Result<String>;

    /// POST `body` as `application/json` and return the response text.
    async fn post_json(&self, url: &str, body: &str) -> Result<String>;
}

/// [`HttpTransport`] backed by `window.fetch`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchTransport;

impl FetchTransport {
    pub fn new() -> Self {
        Self
    }

    async fn exchange(&self, url: &str, method: &str, body: Option<&str>) -> Result<String> {
        let opts = RequestInit::new();
        opts.set_method(method);
        opts.set_mode(RequestMode::Cors);
        if let Some(body) = body {
            opts.set_body(&JsValue::from_str(body));
        }

        let request = Request::new_with_str_and_init(url, &opts)
            .map_err(|e| CollectorError::from_js("Request::new", &e))?;
        if body.is_some() {
            request
                .headers()
                .set("Content-Type", "application/json")
                .map_err(|e| CollectorError::from_js("set header", &e))?;
        }

        let window =
            web_sys::window().ok_or_else(|| CollectorError::Unavailable("window".into()))?;
        let resp_value = JsFuture::from(window.fetch_with_request(&request))
            .await
            .map_err(|e| CollectorError::Network(format!("fetch {} failed: {:?}", url, e)))?;

        let resp: Response = resp_value
            .dyn_into()
            .map_err(|_| CollectorError::Internal("response is not a Response".into()))?;

        if !resp.ok() {
            return Err(CollectorError::HttpStatus {
                status: resp.status(),
                url: url.to_string(),
            });
        }

        let text = JsFuture::from(resp.text().map_err(|e| CollectorError::from_js("text", &e))?)
            .await
            .map_err(|e| CollectorError::from_js("text", &e))?;
        text.as_string()
            .ok_or_else(|| CollectorError::Parse("response body is not text".into()))
    }
}

#[async_trait(?Send)]
impl HttpTransport for FetchTransport {
    async fn get_text(&self, url: &str) -> Result<String> {
        self.exchange(url, "GET", None).await
    }

    async fn post_json(&self, url: &str, body: &str) -> Result<String> {
        self.exchange(url, "POST", Some(body)).await
    }
}
