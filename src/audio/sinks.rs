// Copyright (c) 2024 Mike Tsao

use crate::{
    error::MetronomeError,
    types::{AudioSampleType, SampleRate},
};
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Why an [AudioSink] refused samples.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SinkError {
    /// The underlying device or file reported an error. The sink is unusable.
    #[error("audio device failed: {0}")]
    Device(String),
    /// The sink has already been shut down.
    #[error("audio sink is closed")]
    Closed,
}

/// A streaming mono audio output.
///
/// [write()](AudioSink::write) may block until the device has room, and may
/// accept fewer samples than offered. The caller is responsible for offering
/// the rest.
pub trait AudioSink: Send + core::fmt::Debug {
    /// Writes as many of `samples` as the sink will take, returning that
    /// count.
    fn write(&mut self, samples: &[AudioSampleType]) -> Result<usize, SinkError>;

    /// Discards anything written but not yet played. Sinks with no playback
    /// queue use this to persist what they have so far.
    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    #[allow(missing_docs)]
    fn pause(&mut self) {}

    #[allow(missing_docs)]
    fn play(&mut self) {}

    /// The rate at which the sink consumes samples.
    fn sample_rate(&self) -> SampleRate;
}
impl<S: AudioSink + ?Sized> AudioSink for Box<S> {
    fn write(&mut self, samples: &[AudioSampleType]) -> Result<usize, SinkError> {
        (**self).write(samples)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn play(&mut self) {
        (**self).play()
    }

    fn sample_rate(&self) -> SampleRate {
        (**self).sample_rate()
    }
}
impl<S: AudioSink + ?Sized> AudioSink for &mut S {
    fn write(&mut self, samples: &[AudioSampleType]) -> Result<usize, SinkError> {
        (**self).write(samples)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn play(&mut self) {
        (**self).play()
    }

    fn sample_rate(&self) -> SampleRate {
        (**self).sample_rate()
    }
}
impl From<SinkError> for MetronomeError {
    fn from(value: SinkError) -> Self {
        MetronomeError::Device(value.to_string())
    }
}

/// An [AudioSink] that keeps every sample in memory. Clones share the same
/// buffer, so a clone can be inspected after the original has been handed
/// off to another thread.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    sample_rate: SampleRate,
    samples: Arc<Mutex<Vec<AudioSampleType>>>,
    is_paused: Arc<AtomicBool>,
    fail_after: Option<usize>,
    max_write: Option<usize>,
}
impl AudioSink for MemorySink {
    fn write(&mut self, samples: &[AudioSampleType]) -> Result<usize, SinkError> {
        let mut buffer = self.samples.lock().map_err(|_| SinkError::Closed)?;
        let mut accepted = samples.len();
        if let Some(max_write) = self.max_write {
            accepted = accepted.min(max_write);
        }
        if let Some(fail_after) = self.fail_after {
            let remaining = fail_after.saturating_sub(buffer.len());
            if remaining == 0 && !samples.is_empty() {
                return Err(SinkError::Device(format!(
                    "simulated failure after {fail_after} samples"
                )));
            }
            accepted = accepted.min(remaining);
        }
        buffer.extend_from_slice(&samples[..accepted]);
        Ok(accepted)
    }

    fn pause(&mut self) {
        self.is_paused.store(true, Ordering::Relaxed);
    }

    fn play(&mut self) {
        self.is_paused.store(false, Ordering::Relaxed);
    }

    fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }
}
impl MemorySink {
    #[allow(missing_docs)]
    pub fn new_with(sample_rate: SampleRate) -> Self {
        Self {
            sample_rate,
            ..Default::default()
        }
    }

    /// Makes the sink fail with [SinkError::Device] once it holds `samples`
    /// samples.
    pub fn fail_after(mut self, samples: usize) -> Self {
        self.fail_after = Some(samples);
        self
    }

    /// Limits how many samples a single write accepts, to imitate a device
    /// with a small buffer. Zero makes every write accept nothing.
    pub fn max_write(mut self, samples: usize) -> Self {
        self.max_write = Some(samples);
        self
    }

    /// A copy of everything written so far.
    pub fn samples(&self) -> Vec<AudioSampleType> {
        self.samples
            .lock()
            .map(|buffer| buffer.clone())
            .unwrap_or_default()
    }

    /// How many samples have been written so far.
    pub fn len(&self) -> usize {
        self.samples.lock().map(|buffer| buffer.len()).unwrap_or_default()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[allow(missing_docs)]
    pub fn is_paused(&self) -> bool {
        self.is_paused.load(Ordering::Relaxed)
    }
}

#[cfg(feature = "hound")]
pub use wav::WavSink;

#[cfg(feature = "hound")]
mod wav {
    use super::{AudioSink, SinkError};
    use crate::types::{AudioSampleType, SampleRate};
    use std::{fs::File, io::BufWriter, path::Path};

    /// An [AudioSink] that writes a mono 32-bit float WAV file.
    pub struct WavSink {
        sample_rate: SampleRate,
        writer: Option<hound::WavWriter<BufWriter<File>>>,
    }
    impl core::fmt::Debug for WavSink {
        fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            f.debug_struct("WavSink")
                .field("sample_rate", &self.sample_rate)
                .field("writer", &"(skipped)")
                .finish()
        }
    }
    impl WavSink {
        /// Creates (or truncates) the file at `path`.
        pub fn create<P: AsRef<Path>>(path: P, sample_rate: SampleRate) -> anyhow::Result<Self> {
            let spec = hound::WavSpec {
                channels: 1,
                sample_rate: sample_rate.into(),
                bits_per_sample: 32,
                sample_format: hound::SampleFormat::Float,
            };
            Ok(Self {
                sample_rate,
                writer: Some(hound::WavWriter::create(path, spec)?),
            })
        }

        /// Writes the WAV header and closes the file.
        pub fn finish(&mut self) -> Result<(), SinkError> {
            match self.writer.take() {
                Some(writer) => writer
                    .finalize()
                    .map_err(|e| SinkError::Device(e.to_string())),
                None => Err(SinkError::Closed),
            }
        }
    }
    impl AudioSink for WavSink {
        fn write(&mut self, samples: &[AudioSampleType]) -> Result<usize, SinkError> {
            let writer = self.writer.as_mut().ok_or(SinkError::Closed)?;
            for sample in samples {
                writer
                    .write_sample(*sample)
                    .map_err(|e| SinkError::Device(e.to_string()))?;
            }
            Ok(samples.len())
        }

        fn flush(&mut self) -> Result<(), SinkError> {
            self.writer
                .as_mut()
                .ok_or(SinkError::Closed)?
                .flush()
                .map_err(|e| SinkError::Device(e.to_string()))
        }

        fn sample_rate(&self) -> SampleRate {
            self.sample_rate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_records_and_shares() {
        let sink = MemorySink::new_with(SampleRate(8_000));
        let mut writer = sink.clone();
        assert_eq!(writer.write(&[0.1, 0.2, 0.3]), Ok(3));
        assert_eq!(sink.samples(), vec![0.1, 0.2, 0.3]);
        assert_eq!(sink.sample_rate(), SampleRate(8_000));

        writer.pause();
        assert!(sink.is_paused());
        writer.play();
        assert!(!sink.is_paused());
    }

    #[test]
    fn memory_sink_limits() {
        let mut sink = MemorySink::default().max_write(2).fail_after(5);
        assert_eq!(sink.write(&[0.0; 10]), Ok(2));
        assert_eq!(sink.write(&[0.0; 10]), Ok(2));
        assert_eq!(sink.write(&[0.0; 10]), Ok(1));
        assert!(matches!(sink.write(&[0.0; 10]), Err(SinkError::Device(_))));
        assert_eq!(sink.len(), 5);
    }

    #[cfg(feature = "hound")]
    #[test]
    fn wav_sink_writes_readable_file() {
        let mut path = std::env::temp_dir();
        path.push(format!("metrum-wav-sink-{}.wav", std::process::id()));

        let mut sink = WavSink::create(&path, SampleRate(22_050)).unwrap();
        assert_eq!(sink.write(&[0.5, -0.5, 0.25]), Ok(3));
        sink.finish().unwrap();
        assert_eq!(sink.write(&[0.0]), Err(SinkError::Closed));

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, 22_050);
        let samples: Vec<f32> = reader.into_samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0.5, -0.5, 0.25]);
        let _ = std::fs::remove_file(&path);
    }
}
