//! Sleep provider implementation using browser timers

use std::time::Duration;

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use gloo_timers::future::TimeoutFuture;

use super::Clock;

/// [`Clock`] backed by `setTimeout`.
///
/// `TimeoutFuture` calls `clearTimeout` when dropped, so a deadline that
/// loses its race never fires into a finished collection.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserClock;

impl BrowserClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for BrowserClock {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        let millis = duration.as_millis().min(u32::MAX as u128) as u32;
        TimeoutFuture::new(millis).boxed_local()
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    async fn test_sleep() {
        let before = super::super::now_ms();

        BrowserClock::new().sleep(Duration::from_millis(10)).await;

        let elapsed = super::super::now_ms() - before;
        // Should have slept at least 10ms (with some tolerance)
        assert!(elapsed >= 8.0);
    }
}
