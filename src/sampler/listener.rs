//! Binding between browser motion events and the sampler state machine.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{DeviceMotionEvent, DeviceOrientationEvent, Event};

use super::{Axes, MotionReading, MotionSampler, OrientationReading, SamplerOutcome, SamplerState};
use crate::error::{CollectorError, Result};
use crate::js;
use crate::latch::Latch;
use crate::runtime::{timeout, Clock};

/// Handle given to an event source; forwards readings into the sampler and
/// fires the convergence latch.
#[derive(Clone)]
pub struct SampleFeed {
    sampler: Rc<RefCell<MotionSampler>>,
    converged: Latch<()>,
}

impl SampleFeed {
    pub fn motion(&self, reading: MotionReading) {
        let state = self.sampler.borrow_mut().record_motion(reading);
        if state == SamplerState::Converged {
            self.converged.settle(());
        }
    }

    pub fn orientation(&self, reading: OrientationReading) {
        self.sampler.borrow_mut().record_orientation(reading);
    }
}

/// Detaches the listeners it was built for when dropped.
pub struct ListenerGuard {
    detach: Option<Box<dyn FnOnce()>>,
}

impl ListenerGuard {
    pub fn new(detach: impl FnOnce() + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// Guard with nothing to detach
    pub fn noop() -> Self {
        Self { detach: None }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

/// Something that can deliver motion and orientation readings.
pub trait MotionSource {
    fn has_motion(&self) -> bool;
    fn has_orientation(&self) -> bool;
    /// Start delivering readings into `feed` until the guard is dropped.
    fn attach(&self, feed: SampleFeed) -> Result<ListenerGuard>;
}

/// `devicemotion` / `deviceorientation` listeners on `window`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserMotionSource;

impl BrowserMotionSource {
    pub fn new() -> Self {
        Self
    }
}

fn axes(x: Option<f64>, y: Option<f64>, z: Option<f64>) -> Axes {
    Axes { x, y, z }
}

impl MotionSource for BrowserMotionSource {
    fn has_motion(&self) -> bool {
        js::global_has("DeviceMotionEvent")
    }

    fn has_orientation(&self) -> bool {
        js::global_has("DeviceOrientationEvent")
    }

    fn attach(&self, feed: SampleFeed) -> Result<ListenerGuard> {
        let window =
            web_sys::window().ok_or_else(|| CollectorError::Unavailable("window".into()))?;

        let motion_feed = feed.clone();
        let on_motion = Closure::wrap(Box::new(move |event: Event| {
            let Ok(event) = event.dyn_into::<DeviceMotionEvent>() else {
                return;
            };
            motion_feed.motion(MotionReading {
                acceleration: event.acceleration().map(|a| axes(a.x(), a.y(), a.z())),
                including_gravity: event
                    .acceleration_including_gravity()
                    .map(|a| axes(a.x(), a.y(), a.z())),
                timestamp: crate::runtime::now_ms(),
            });
        }) as Box<dyn FnMut(Event)>);

        let on_orientation = Closure::wrap(Box::new(move |event: Event| {
            let Ok(event) = event.dyn_into::<DeviceOrientationEvent>() else {
                return;
            };
            feed.orientation(OrientationReading {
                alpha: event.alpha(),
                beta: event.beta(),
                gamma: event.gamma(),
                timestamp: crate::runtime::now_ms(),
            });
        }) as Box<dyn FnMut(Event)>);

        let mut attached = Ok(());
        if self.has_motion() {
            attached = window.add_event_listener_with_callback(
                "devicemotion",
                on_motion.as_ref().unchecked_ref(),
            );
        }
        if attached.is_ok() && self.has_orientation() {
            attached = window.add_event_listener_with_callback(
                "deviceorientation",
                on_orientation.as_ref().unchecked_ref(),
            );
        }

        // The closures live in the guard, so they are freed right after removal.
        let guard = ListenerGuard::new(move || {
            let _ = window.remove_event_listener_with_callback(
                "devicemotion",
                on_motion.as_ref().unchecked_ref(),
            );
            let _ = window.remove_event_listener_with_callback(
                "deviceorientation",
                on_orientation.as_ref().unchecked_ref(),
            );
            log::debug!("Motion listeners detached");
        });

        // On failure the guard drops here and undoes a partial attach
        attached.map_err(|e| CollectorError::from_js("addEventListener", &e))?;
        Ok(guard)
    }
}

/// Drive `sampler` from `source` until it converges or `window` elapses.
///
/// Completes immediately with [`SamplerOutcome::NoSensors`] when the platform
/// exposes neither event type. Listeners are detached when this future
/// finishes or is dropped.
pub async fn run_sampler<C: Clock + ?Sized>(
    source: &dyn MotionSource,
    sampler: Rc<RefCell<MotionSampler>>,
    clock: &C,
    window: Duration,
) -> SamplerOutcome {
    if !source.has_motion() && !source.has_orientation() {
        log::debug!("No motion or orientation events on this platform");
        return SamplerOutcome::NoSensors;
    }

    sampler.borrow_mut().start();
    let converged = Latch::new();
    let feed = SampleFeed {
        sampler: sampler.clone(),
        converged: converged.clone(),
    };

    let _guard = match source.attach(feed) {
        Ok(guard) => guard,
        Err(e) => {
            log::warn!("Could not attach motion listeners: {}", e);
            sampler.borrow_mut().time_out();
            return SamplerOutcome::TimedOut;
        }
    };

    match timeout(clock, window, converged.wait()).await {
        Some(()) => SamplerOutcome::Converged,
        None => {
            sampler.borrow_mut().time_out();
            SamplerOutcome::TimedOut
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use futures::future::{pending, ready, LocalBoxFuture};
    use futures::FutureExt;
    use std::cell::Cell;

    struct InstantClock;

    impl Clock for InstantClock {
        fn sleep(&self, _: Duration) -> LocalBoxFuture<'static, ()> {
            ready(()).boxed_local()
        }
    }

    struct NeverClock;

    impl Clock for NeverClock {
        fn sleep(&self, _: Duration) -> LocalBoxFuture<'static, ()> {
            pending().boxed_local()
        }
    }

    /// Pushes a fixed number of flat readings synchronously on attach.
    struct ScriptedSource {
        samples: usize,
        detached: Rc<Cell<bool>>,
    }

    impl MotionSource for ScriptedSource {
        fn has_motion(&self) -> bool {
            true
        }

        fn has_orientation(&self) -> bool {
            false
        }

        fn attach(&self, feed: SampleFeed) -> Result<ListenerGuard> {
            for i in 0..self.samples {
                feed.motion(MotionReading {
                    acceleration: None,
                    including_gravity: Some(axes(Some(0.0), Some(0.0), Some(9.8))),
                    timestamp: i as f64,
                });
            }
            let detached = self.detached.clone();
            Ok(ListenerGuard::new(move || detached.set(true)))
        }
    }

    struct NoSensors;

    impl MotionSource for NoSensors {
        fn has_motion(&self) -> bool {
            false
        }

        fn has_orientation(&self) -> bool {
            false
        }

        fn attach(&self, _: SampleFeed) -> Result<ListenerGuard> {
            panic!("attach must not be called without sensors");
        }
    }

    #[test]
    fn test_converges_and_detaches() {
        let detached = Rc::new(Cell::new(false));
        let source = ScriptedSource {
            samples: 12,
            detached: detached.clone(),
        };
        let sampler = Rc::new(RefCell::new(MotionSampler::new(10)));

        let outcome = block_on(run_sampler(
            &source,
            sampler.clone(),
            &NeverClock,
            Duration::from_secs(3),
        ));

        assert_eq!(outcome, SamplerOutcome::Converged);
        assert!(detached.get());
        // Readings after convergence are ignored
        assert_eq!(sampler.borrow().sample_count(), 10);
    }

    #[test]
    fn test_times_out_with_too_few_samples() {
        let detached = Rc::new(Cell::new(false));
        let source = ScriptedSource {
            samples: 3,
            detached: detached.clone(),
        };
        let sampler = Rc::new(RefCell::new(MotionSampler::new(10)));

        let outcome = block_on(run_sampler(
            &source,
            sampler.clone(),
            &InstantClock,
            Duration::from_secs(3),
        ));

        assert_eq!(outcome, SamplerOutcome::TimedOut);
        assert_eq!(sampler.borrow().state(), SamplerState::TimedOut);
        assert!(sampler.borrow().report().movement_pattern.is_none());
        assert!(detached.get());
    }

    #[test]
    fn test_no_sensors_is_immediate() {
        let sampler = Rc::new(RefCell::new(MotionSampler::new(10)));
        let outcome = block_on(run_sampler(
            &NoSensors,
            sampler.clone(),
            &NeverClock,
            Duration::from_secs(3),
        ));
        assert_eq!(outcome, SamplerOutcome::NoSensors);
        assert_eq!(sampler.borrow().state(), SamplerState::Idle);
    }

    #[test]
    fn test_dropping_run_detaches() {
        let detached = Rc::new(Cell::new(false));
        let source = ScriptedSource {
            samples: 1,
            detached: detached.clone(),
        };
        let sampler = Rc::new(RefCell::new(MotionSampler::new(10)));

        let mut run =
            run_sampler(&source, sampler, &NeverClock, Duration::from_secs(3)).boxed_local();
        assert!((&mut run).now_or_never().is_none());
        assert!(!detached.get());

        drop(run);
        assert!(detached.get());
    }
}
