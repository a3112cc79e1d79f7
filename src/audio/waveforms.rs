// Copyright (c) 2024 Mike Tsao

use crate::types::{AudioSampleType, SampleRate};
use core::f32::consts::TAU;
use std::sync::Arc;

/// Supplies the decoded tick sounds.
pub trait WaveformProvider: Send + core::fmt::Debug {
    /// The mono samples for an accented or a regular tick.
    fn tick_waveform(&self, is_accented: bool) -> &[AudioSampleType];
}

/// A pair of tick waveforms held in memory. Clones share the sample data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickWaveforms {
    accented: Arc<Vec<AudioSampleType>>,
    regular: Arc<Vec<AudioSampleType>>,
}
impl WaveformProvider for TickWaveforms {
    fn tick_waveform(&self, is_accented: bool) -> &[AudioSampleType] {
        if is_accented {
            &self.accented
        } else {
            &self.regular
        }
    }
}
impl TickWaveforms {
    const CLICK_DURATION_MS: f32 = 10.0;
    const ACCENTED_FREQUENCY: f32 = 1200.0;
    const ACCENTED_AMPLITUDE: f32 = 0.6;
    const REGULAR_FREQUENCY: f32 = 800.0;
    const REGULAR_AMPLITUDE: f32 = 0.4;

    /// Uses already-decoded sample buffers.
    pub fn new_with(accented: Vec<AudioSampleType>, regular: Vec<AudioSampleType>) -> Self {
        Self {
            accented: Arc::new(accented),
            regular: Arc::new(regular),
        }
    }

    /// Empty waveforms, so that every beat renders as silence.
    pub fn silent() -> Self {
        Self::default()
    }

    /// Short sine clicks with a fast exponential decay. The accented click is
    /// higher and louder.
    pub fn synthesized(sample_rate: SampleRate) -> Self {
        let sample_rate = sample_rate.0 as f32;
        let len = (sample_rate * Self::CLICK_DURATION_MS / 1000.0) as usize;
        Self::new_with(
            Self::click(
                sample_rate,
                len,
                Self::ACCENTED_FREQUENCY,
                Self::ACCENTED_AMPLITUDE,
            ),
            Self::click(
                sample_rate,
                len,
                Self::REGULAR_FREQUENCY,
                Self::REGULAR_AMPLITUDE,
            ),
        )
    }

    fn click(sample_rate: f32, len: usize, frequency: f32, amplitude: f32) -> Vec<AudioSampleType> {
        let phase_increment = TAU * frequency / sample_rate;
        (0..len)
            .map(|i| {
                let envelope = (-(i as f32 / len as f32) * 8.0).exp();
                (i as f32 * phase_increment).sin() * envelope * amplitude
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use more_asserts::{assert_gt, assert_le};

    #[test]
    fn synthesized_clicks() {
        let waveforms = TickWaveforms::synthesized(SampleRate(48_000));
        let accented = waveforms.tick_waveform(true);
        let regular = waveforms.tick_waveform(false);
        assert_eq!(accented.len(), 480);
        assert_eq!(regular.len(), 480);
        assert_ne!(accented, regular);

        let peak = |samples: &[f32]| samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        assert_le!(peak(accented), TickWaveforms::ACCENTED_AMPLITUDE);
        assert_le!(peak(regular), TickWaveforms::REGULAR_AMPLITUDE);
        assert_gt!(peak(accented), peak(regular));

        // Decays toward silence.
        assert_gt!(peak(&accented[..48]), peak(&accented[432..]));
    }

    #[test]
    fn silent_and_supplied() {
        let silent = TickWaveforms::silent();
        assert!(silent.tick_waveform(true).is_empty());
        assert!(silent.tick_waveform(false).is_empty());

        let supplied = TickWaveforms::new_with(vec![1.0, 1.0], vec![0.5]);
        assert_eq!(supplied.tick_waveform(true), &[1.0, 1.0]);
        assert_eq!(supplied.tick_waveform(false), &[0.5]);
        assert_eq!(supplied.clone(), supplied);
    }
}
