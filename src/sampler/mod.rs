//! Motion/orientation sampler.
//!
//! ```text
//! Idle ──start──▶ Sampling ──N motion samples──▶ Converged
//!                    │
//!                    └──────deadline──────────▶ TimedOut
//! ```
//!
//! Motion events accumulate into an ordered history from which pitch/roll
//! deltas are derived. Orientation events only overwrite the latest reading.
//! Once a terminal state is reached every further event is ignored.

mod listener;

pub use listener::{run_sampler, BrowserMotionSource, ListenerGuard, MotionSource, SampleFeed};

use crate::record::{AccelerometerSample, MotionReport, MovementPattern, OrientationSample};

/// Pitch or roll change (degrees) above which the device counts as moving
pub const MOVEMENT_THRESHOLD_DEG: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Idle,
    Sampling,
    Converged,
    TimedOut,
}

impl SamplerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SamplerState::Converged | SamplerState::TimedOut)
    }
}

/// How a sampling run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerOutcome {
    Converged,
    TimedOut,
    /// Neither motion nor orientation events exist on this platform
    NoSensors,
}

/// One vector of a `devicemotion` event; any axis may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Axes {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionReading {
    /// Acceleration without gravity
    pub acceleration: Option<Axes>,
    pub including_gravity: Option<Axes>,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationReading {
    pub alpha: Option<f64>,
    pub beta: Option<f64>,
    pub gamma: Option<f64>,
    pub timestamp: f64,
}

/// Pitch and roll in degrees from a gravity-including acceleration vector.
pub fn pitch_roll(x: f64, y: f64, z: f64) -> (f64, f64) {
    let pitch = x.atan2((y * y + z * z).sqrt()).to_degrees();
    let roll = y.atan2(z).to_degrees();
    (pitch, roll)
}

/// Aggregate consecutive pitch/roll deltas over a sample history.
///
/// Needs at least two samples.
pub fn movement_pattern(samples: &[AccelerometerSample]) -> Option<MovementPattern> {
    if samples.len() < 2 {
        return None;
    }

    let (pitch_deltas, roll_deltas): (Vec<f64>, Vec<f64>) = samples
        .windows(2)
        .map(|w| ((w[1].pitch - w[0].pitch).abs(), (w[1].roll - w[0].roll).abs()))
        .unzip();

    let average = |d: &[f64]| d.iter().sum::<f64>() / d.len() as f64;
    let max = |d: &[f64]| d.iter().copied().fold(0.0_f64, f64::max);

    let max_pitch = max(&pitch_deltas);
    let max_roll = max(&roll_deltas);

    Some(MovementPattern {
        average_pitch_change: round2(average(&pitch_deltas)),
        average_roll_change: round2(average(&roll_deltas)),
        max_pitch_change: round2(max_pitch),
        max_roll_change: round2(max_roll),
        movement_detected: max_pitch > MOVEMENT_THRESHOLD_DEG || max_roll > MOVEMENT_THRESHOLD_DEG,
        sample_count: samples.len(),
    })
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Sampler state machine.
#[derive(Debug, Clone)]
pub struct MotionSampler {
    state: SamplerState,
    min_samples: usize,
    samples: Vec<AccelerometerSample>,
    orientation: Option<OrientationSample>,
    pattern: Option<MovementPattern>,
}

impl MotionSampler {
    pub fn new(min_samples: usize) -> Self {
        Self {
            state: SamplerState::Idle,
            // Deltas need two points
            min_samples: min_samples.max(2),
            samples: Vec::new(),
            orientation: None,
            pattern: None,
        }
    }

    pub fn state(&self) -> SamplerState {
        self.state
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn start(&mut self) {
        if self.state == SamplerState::Idle {
            self.state = SamplerState::Sampling;
        }
    }

    /// Append one motion sample; converges once enough have arrived.
    pub fn record_motion(&mut self, reading: MotionReading) -> SamplerState {
        if self.state != SamplerState::Sampling {
            return self.state;
        }
        if reading.acceleration.is_none() && reading.including_gravity.is_none() {
            return self.state;
        }

        let gravity = reading.including_gravity.unwrap_or_default();
        let (gx, gy, gz) = (
            gravity.x.unwrap_or(0.0),
            gravity.y.unwrap_or(0.0),
            gravity.z.unwrap_or(0.0),
        );
        let (pitch, roll) = pitch_roll(gx, gy, gz);

        let linear = reading.acceleration.unwrap_or_default();
        self.samples.push(AccelerometerSample {
            x: linear.x.unwrap_or(gx),
            y: linear.y.unwrap_or(gy),
            z: linear.z.unwrap_or(gz),
            pitch: round2(pitch),
            roll: round2(roll),
            timestamp: reading.timestamp,
        });

        if self.samples.len() >= self.min_samples {
            self.pattern = movement_pattern(&self.samples);
            self.state = SamplerState::Converged;
        }
        self.state
    }

    /// Overwrite the latest orientation reading.
    pub fn record_orientation(&mut self, reading: OrientationReading) {
        if self.state != SamplerState::Sampling {
            return;
        }
        self.orientation = Some(OrientationSample {
            alpha: reading.alpha.map(round2),
            beta: reading.beta.map(round2),
            gamma: reading.gamma.map(round2),
            timestamp: reading.timestamp,
        });
    }

    /// Deadline reached. No-op once terminal.
    pub fn time_out(&mut self) -> SamplerState {
        if !self.state.is_terminal() {
            self.state = SamplerState::TimedOut;
        }
        self.state
    }

    pub fn report(&self) -> MotionReport {
        MotionReport {
            accelerometer_data: self.samples.last().cloned(),
            device_orientation: self.orientation.clone(),
            movement_pattern: self.pattern.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gravity(x: f64, y: f64, z: f64, timestamp: f64) -> MotionReading {
        MotionReading {
            acceleration: None,
            including_gravity: Some(Axes {
                x: Some(x),
                y: Some(y),
                z: Some(z),
            }),
            timestamp,
        }
    }

    #[test]
    fn test_pitch_roll_flat_device() {
        let (pitch, roll) = pitch_roll(0.0, 0.0, 9.8);
        assert!(pitch.abs() < 1e-9);
        assert!(roll.abs() < 1e-9);
    }

    #[test]
    fn test_pitch_roll_device_on_side() {
        let (pitch, _) = pitch_roll(9.8, 0.0, 0.0);
        assert!((pitch - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_converges_at_min_samples() {
        let mut sampler = MotionSampler::new(10);
        sampler.start();

        for i in 0..9 {
            assert_eq!(
                sampler.record_motion(gravity(0.0, 0.0, 9.8, i as f64)),
                SamplerState::Sampling
            );
        }
        assert!(sampler.report().movement_pattern.is_none());

        assert_eq!(
            sampler.record_motion(gravity(0.0, 0.0, 9.8, 9.0)),
            SamplerState::Converged
        );
        let pattern = sampler.report().movement_pattern.unwrap();
        assert_eq!(pattern.sample_count, 10);
        assert!(!pattern.movement_detected);
        assert_eq!(pattern.max_pitch_change, 0.0);
    }

    #[test]
    fn test_movement_detected_from_tilt() {
        let mut sampler = MotionSampler::new(10);
        sampler.start();
        for i in 0..10 {
            // Alternate flat and tilted on x
            let x = if i % 2 == 0 { 0.0 } else { 9.8 };
            sampler.record_motion(gravity(x, 0.0, 9.8, i as f64));
        }

        let pattern = sampler.report().movement_pattern.unwrap();
        assert!(pattern.movement_detected);
        assert_eq!(pattern.max_pitch_change, 45.0);
        assert_eq!(pattern.average_pitch_change, 45.0);
        assert_eq!(pattern.max_roll_change, 0.0);
    }

    #[test]
    fn test_timeout_keeps_latest_sample_without_pattern() {
        let mut sampler = MotionSampler::new(10);
        sampler.start();
        sampler.record_motion(gravity(0.0, 0.0, 9.8, 1.0));
        sampler.record_motion(gravity(0.0, 4.9, 9.8, 2.0));
        sampler.record_orientation(OrientationReading {
            alpha: Some(12.345),
            beta: None,
            gamma: Some(-3.0),
            timestamp: 3.0,
        });

        assert_eq!(sampler.time_out(), SamplerState::TimedOut);

        let report = sampler.report();
        assert!(report.movement_pattern.is_none());
        assert_eq!(report.accelerometer_data.unwrap().timestamp, 2.0);
        let orientation = report.device_orientation.unwrap();
        assert_eq!(orientation.alpha, Some(12.35));
        assert_eq!(orientation.beta, None);
    }

    #[test]
    fn test_terminal_state_ignores_events() {
        let mut sampler = MotionSampler::new(2);
        sampler.start();
        sampler.record_motion(gravity(0.0, 0.0, 9.8, 1.0));
        sampler.record_motion(gravity(0.0, 0.0, 9.8, 2.0));
        assert_eq!(sampler.state(), SamplerState::Converged);

        sampler.record_motion(gravity(9.8, 0.0, 0.0, 3.0));
        sampler.record_orientation(OrientationReading {
            alpha: Some(1.0),
            beta: Some(2.0),
            gamma: Some(3.0),
            timestamp: 4.0,
        });
        assert_eq!(sampler.time_out(), SamplerState::Converged);

        let report = sampler.report();
        assert_eq!(sampler.sample_count(), 2);
        assert_eq!(report.accelerometer_data.unwrap().timestamp, 2.0);
        assert!(report.device_orientation.is_none());
    }

    #[test]
    fn test_idle_sampler_ignores_events() {
        let mut sampler = MotionSampler::new(10);
        sampler.record_motion(gravity(0.0, 0.0, 9.8, 1.0));
        assert_eq!(sampler.sample_count(), 0);
        assert_eq!(sampler.state(), SamplerState::Idle);
    }

    #[test]
    fn test_linear_acceleration_preferred_per_axis() {
        let mut sampler = MotionSampler::new(10);
        sampler.start();
        sampler.record_motion(MotionReading {
            acceleration: Some(Axes {
                x: Some(0.25),
                y: None,
                z: Some(0.0),
            }),
            including_gravity: Some(Axes {
                x: Some(0.5),
                y: Some(1.5),
                z: Some(9.8),
            }),
            timestamp: 1.0,
        });

        let sample = sampler.report().accelerometer_data.unwrap();
        assert_eq!(sample.x, 0.25);
        assert_eq!(sample.y, 1.5);
        assert_eq!(sample.z, 0.0);
    }
}
