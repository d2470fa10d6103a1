//! Web Audio oscillator fingerprint.
//!
//! A silent triangle oscillator is routed through an analyser into a
//! zero-gain node. After a short settle delay the analyser's byte frequency
//! data is summarised; small differences in the audio stack show up in the
//! summary.

use std::time::Duration;

use async_trait::async_trait;
use web_sys::{AnalyserNode, AudioContext, GainNode, OscillatorNode, OscillatorType};

use super::Probe;
use crate::config::CollectorConfig;
use crate::error::{CollectorError, Result};
use crate::js;
use crate::record::{AudioFingerprint, AudioReport, ProbeOutput};
use crate::runtime::{BrowserClock, Clock};
use crate::sampler::round2;

const OSCILLATOR_HZ: f32 = 10_000.0;
const FFT_SIZE: u32 = 2048;

impl AudioFingerprint {
    /// Summarise one frame of byte frequency data. `None` for an empty frame.
    pub fn from_frequency_data(sample_rate: u32, data: &[u8]) -> Option<Self> {
        if data.is_empty() {
            return None;
        }

        let n = data.len() as f64;
        let average = data.iter().map(|&b| b as f64).sum::<f64>() / n;
        let variance = data
            .iter()
            .map(|&b| (b as f64 - average).powi(2))
            .sum::<f64>()
            / n;
        let max = data.iter().copied().max().unwrap_or(0);
        let min = data.iter().copied().min().unwrap_or(0);

        Some(Self {
            sample_rate,
            average: round2(average),
            max,
            min,
            variance: round2(variance),
            fingerprint: format!("{}-{}-{}-{}", sample_rate, average.round(), max, min),
        })
    }
}

/// Nodes of one measurement. Dropping it stops the oscillator and closes
/// the context on every exit path.
struct AudioGraph {
    context: AudioContext,
    oscillator: OscillatorNode,
    analyser: AnalyserNode,
    // Held so the node outlives the measurement
    _gain: GainNode,
}

impl AudioGraph {
    fn build() -> Result<Self> {
        let js_err = |e| CollectorError::from_js("AudioContext", &e);

        let context = AudioContext::new().map_err(js_err)?;
        let oscillator = context.create_oscillator().map_err(js_err)?;
        let analyser = context.create_analyser().map_err(js_err)?;
        let gain = context.create_gain().map_err(js_err)?;

        oscillator.set_type(OscillatorType::Triangle);
        oscillator.frequency().set_value(OSCILLATOR_HZ);
        analyser.set_fft_size(FFT_SIZE);
        gain.gain().set_value(0.0);

        oscillator.connect_with_audio_node(&analyser).map_err(js_err)?;
        analyser.connect_with_audio_node(&gain).map_err(js_err)?;
        gain.connect_with_audio_node(&context.destination()).map_err(js_err)?;
        oscillator.start().map_err(js_err)?;

        Ok(Self {
            context,
            oscillator,
            analyser,
            _gain: gain,
        })
    }

    fn read(&self) -> Option<AudioFingerprint> {
        let mut frame = vec![0u8; self.analyser.frequency_bin_count() as usize];
        self.analyser.get_byte_frequency_data(&mut frame);
        AudioFingerprint::from_frequency_data(self.context.sample_rate() as u32, &frame)
    }
}

impl Drop for AudioGraph {
    fn drop(&mut self) {
        let _ = self.oscillator.stop();
        let _ = self.context.close();
    }
}

pub struct AudioProbe {
    settle: Duration,
    clock: BrowserClock,
}

impl AudioProbe {
    pub fn new(config: &CollectorConfig) -> Self {
        Self {
            settle: config.audio_settle(),
            clock: BrowserClock::new(),
        }
    }
}

#[async_trait(?Send)]
impl Probe for AudioProbe {
    fn name(&self) -> &'static str {
        "audio"
    }

    fn available(&self) -> bool {
        js::global_has("AudioContext")
    }

    async fn probe(&self) -> Result<ProbeOutput> {
        let graph = AudioGraph::build()?;
        self.clock.sleep(self.settle).await;

        Ok(ProbeOutput::Audio(AudioReport {
            audio_fingerprint: graph.read(),
            audio_context_supported: true,
        }))
    }

    fn fallback(&self) -> ProbeOutput {
        ProbeOutput::Audio(AudioReport::default())
    }
}
