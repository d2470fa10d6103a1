//! Aggregation coordinator.
//!
//! Runs every probe concurrently with the motion sampler and a global
//! ceiling timer. The first completion signal (sampler converged, sampler
//! timed out, ceiling reached) ends the sampling phase; later signals are
//! no-ops. The WebRTC probe then runs in its own bounded phase while probes
//! still in flight keep landing in the builder. Whatever has not resolved
//! when that phase ends keeps its fallback value, and the record is frozen.
//!
//! The builder is owned by this future alone, so no probe can write to the
//! record after it has been finalized.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use futures::stream::FuturesUnordered;
use futures::{pin_mut, select_biased, FutureExt, StreamExt};

use crate::config::CollectorConfig;
use crate::environment::Environment;
use crate::latch::Latch;
use crate::probes::{self, run_probe, Probe, WebRtcProbe};
use crate::record::{FingerprintRecord, RecordBuilder};
use crate::runtime::{now_ms, timeout, BrowserClock, Clock};
use crate::sampler::{run_sampler, BrowserMotionSource, MotionSampler, MotionSource, SamplerOutcome};

/// Extra time granted to the WebRTC probe beyond its own gathering window
pub const WEBRTC_GRACE: Duration = Duration::from_millis(500);

/// Which path ended the sampling phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Converged,
    SamplerTimedOut,
    /// No motion/orientation events on this platform
    NoSensors,
    Ceiling,
}

impl From<SamplerOutcome> for Completion {
    fn from(outcome: SamplerOutcome) -> Self {
        match outcome {
            SamplerOutcome::Converged => Completion::Converged,
            SamplerOutcome::TimedOut => Completion::SamplerTimedOut,
            SamplerOutcome::NoSensors => Completion::NoSensors,
        }
    }
}

/// Output of one collection run
#[derive(Debug, Clone)]
pub struct Collected {
    pub record: FingerprintRecord,
    pub completion: Completion,
    pub elapsed_ms: f64,
}

pub struct Collector<C: Clock = BrowserClock> {
    config: CollectorConfig,
    clock: C,
    environment: Environment,
    probes: Vec<Box<dyn Probe>>,
    webrtc: Box<dyn Probe>,
    motion: Box<dyn MotionSource>,
}

impl Collector<BrowserClock> {
    /// Collector wired to the real browser APIs.
    pub fn for_browser(config: CollectorConfig) -> Self {
        let probes = probes::browser_probes(&config);
        let webrtc = Box::new(WebRtcProbe::new(&config));
        Self::new(
            config,
            BrowserClock::new(),
            Environment::capture(),
            probes,
            webrtc,
            Box::new(BrowserMotionSource::new()),
        )
    }
}

impl<C: Clock> Collector<C> {
    pub fn new(
        config: CollectorConfig,
        clock: C,
        environment: Environment,
        probes: Vec<Box<dyn Probe>>,
        webrtc: Box<dyn Probe>,
        motion: Box<dyn MotionSource>,
    ) -> Self {
        Self {
            config,
            clock,
            environment,
            probes,
            webrtc,
            motion,
        }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Upper bound on how long [`Collector::collect`] can take
    pub fn deadline(&self) -> Duration {
        self.config.collection_ceiling() + self.config.webrtc_window() + WEBRTC_GRACE
    }

    /// Run one collection and freeze the record.
    pub async fn collect(&self) -> Collected {
        let started = now_ms();
        let mut builder = RecordBuilder::new(self.environment.clone());
        let sampler = Rc::new(RefCell::new(MotionSampler::new(self.config.min_motion_samples)));
        let completion: Latch<Completion> = Latch::new();

        let mut pending: FuturesUnordered<_> = self
            .probes
            .iter()
            .map(|probe| run_probe(probe.as_ref()))
            .collect();

        {
            let sampling = run_sampler(
                self.motion.as_ref(),
                sampler.clone(),
                &self.clock,
                self.config.sensor_window(),
            )
            .fuse();
            let ceiling = self.clock.sleep(self.config.collection_ceiling()).fuse();
            pin_mut!(sampling, ceiling);

            while !completion.is_settled() {
                select_biased! {
                    output = pending.select_next_some() => builder.apply(output),
                    outcome = sampling => {
                        completion.settle(Completion::from(outcome));
                    }
                    () = ceiling => {
                        completion.settle(Completion::Ceiling);
                    }
                }
            }
            // Leaving the block drops the sampler future, which detaches the
            // listeners and clears its timer, and cancels the ceiling timer.
        }

        let completion = completion.get().unwrap_or(Completion::Ceiling);
        {
            let mut sampler = sampler.borrow_mut();
            sampler.time_out();
            builder.apply_motion(sampler.report());
        }
        log::debug!("Sampling phase ended: {:?}", completion);

        let webrtc = timeout(
            &self.clock,
            self.config.webrtc_window() + WEBRTC_GRACE,
            run_probe(self.webrtc.as_ref()),
        )
        .fuse();
        pin_mut!(webrtc);

        loop {
            select_biased! {
                output = pending.select_next_some() => builder.apply(output),
                leak = webrtc => {
                    builder.apply(leak.unwrap_or_else(|| {
                        log::debug!("WebRTC probe exceeded its bound");
                        self.webrtc.fallback()
                    }));
                    break;
                }
            }
        }

        if !pending.is_empty() {
            log::debug!("{} probe(s) unresolved at finalize", pending.len());
        }
        drop(pending);

        let record = builder.finalize();
        let elapsed_ms = now_ms() - started;
        log::info!(
            "Fingerprint collected in {:.0} ms ({:?})",
            elapsed_ms,
            completion
        );

        Collected {
            record,
            completion,
            elapsed_ms,
        }
    }
}
