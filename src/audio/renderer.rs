// Copyright (c) 2024 Mike Tsao

use super::{AudioSink, SinkError, WaveformProvider};
use crate::types::{AudioSampleType, SampleRate};
use core::sync::atomic::{AtomicBool, Ordering};
use log::trace;
use std::sync::Arc;

/// How many samples fill `period_ns` at `sample_rate`, rounded to the nearest
/// sample.
pub fn period_samples(period_ns: u64, sample_rate: SampleRate) -> usize {
    (period_ns as f64 / 1_000_000_000.0 * sample_rate.0 as f64).round() as usize
}

/// Writes one beat's worth of audio at a time: the tick waveform (or nothing,
/// for a rest) followed by enough silence to fill the beat's whole period.
///
/// Writes block until the sink takes every sample. The only way to cut a
/// period short is the interrupt flag, which another thread can raise
/// through the handle returned by [interrupt_flag()](Self::interrupt_flag).
#[derive(Debug)]
pub struct AudioRenderer<S: AudioSink, W: WaveformProvider> {
    sink: S,
    waveforms: W,
    silence: Vec<AudioSampleType>,
    interrupt: Arc<AtomicBool>,
}
impl<S: AudioSink, W: WaveformProvider> AudioRenderer<S, W> {
    /// The default size of each silence write, in frames.
    pub const DEFAULT_SILENCE_CHUNK_FRAMES: usize = 1024;

    /// `silence_chunk_frames` sets the largest silence write. Zero is treated
    /// as one.
    pub fn new_with(sink: S, waveforms: W, silence_chunk_frames: usize) -> Self {
        Self {
            sink,
            waveforms,
            silence: vec![0.0; silence_chunk_frames.max(1)],
            interrupt: Default::default(),
        }
    }

    /// Renders one period. Returns how many samples were written, which is
    /// exactly [period_samples()] unless the interrupt flag was raised along
    /// the way.
    pub fn render(
        &mut self,
        period_ns: u64,
        is_accented: bool,
        is_rest: bool,
    ) -> Result<usize, SinkError> {
        let period = period_samples(period_ns, self.sink.sample_rate());
        let waveform: &[AudioSampleType] = if is_rest {
            &[]
        } else {
            self.waveforms.tick_waveform(is_accented)
        };
        let waveform = &waveform[..waveform.len().min(period)];

        let mut written = Self::write_fully(&mut self.sink, waveform, &self.interrupt)?;
        if written < waveform.len() {
            trace!("interrupted after {written} of {period} samples");
            return Ok(written);
        }
        while written < period {
            let chunk = (period - written).min(self.silence.len());
            let chunk_written =
                Self::write_fully(&mut self.sink, &self.silence[..chunk], &self.interrupt)?;
            written += chunk_written;
            if chunk_written < chunk {
                trace!("interrupted after {written} of {period} samples");
                break;
            }
        }
        Ok(written)
    }

    // A sink that accepts nothing means the device is busy, so yield and try
    // again.
    fn write_fully(
        sink: &mut S,
        mut samples: &[AudioSampleType],
        interrupt: &AtomicBool,
    ) -> Result<usize, SinkError> {
        let mut written = 0;
        while !samples.is_empty() {
            if interrupt.load(Ordering::Acquire) {
                break;
            }
            let count = sink.write(samples)?.min(samples.len());
            if count == 0 {
                std::thread::yield_now();
                continue;
            }
            written += count;
            samples = &samples[count..];
        }
        Ok(written)
    }

    /// A handle for cutting the current and future periods short from
    /// another thread.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    #[allow(missing_docs)]
    pub fn interrupt(&self) {
        self.interrupt.store(true, Ordering::Release);
    }

    /// Lets rendering proceed again after an interrupt.
    pub fn clear_interrupt(&self) {
        self.interrupt.store(false, Ordering::Release);
    }

    #[allow(missing_docs)]
    pub fn is_interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Acquire)
    }

    /// Discards audio that the sink hasn't played yet.
    pub fn flush(&mut self) -> Result<(), SinkError> {
        self.sink.flush()
    }

    #[allow(missing_docs)]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    #[allow(missing_docs)]
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    #[allow(missing_docs)]
    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{MemorySink, TickWaveforms};
    use std::time::Duration;

    fn renderer(sink: MemorySink, chunk: usize) -> AudioRenderer<MemorySink, TickWaveforms> {
        AudioRenderer::new_with(
            sink,
            TickWaveforms::new_with(vec![1.0; 100], vec![0.5; 100]),
            chunk,
        )
    }

    #[test]
    fn period_sample_rounding() {
        assert_eq!(period_samples(1_000_000_000, SampleRate(44_100)), 44_100);
        assert_eq!(period_samples(500_000_000, SampleRate(44_100)), 22_050);
        // 10 µs at 44.1 KHz is 0.441 samples.
        assert_eq!(period_samples(10_000, SampleRate(44_100)), 0);
        // 34 µs is 1.4994 samples, 35 µs is 1.5435.
        assert_eq!(period_samples(34_000, SampleRate(44_100)), 1);
        assert_eq!(period_samples(35_000, SampleRate(44_100)), 2);
    }

    #[test]
    fn writes_exactly_one_period() {
        let sink = MemorySink::new_with(SampleRate(1_000));
        let mut renderer = renderer(sink.clone(), 64);

        for (period_ns, expected) in [
            (1_000_000_000u64, 1_000usize),
            (50_000_000, 50),
            (333_333_333, 333),
            (1_600_000, 2),
            (0, 0),
        ] {
            let before = sink.len();
            assert_eq!(renderer.render(period_ns, true, false), Ok(expected));
            assert_eq!(sink.len() - before, expected, "period {period_ns} ns");
        }
    }

    #[test]
    fn tick_then_silence() {
        let sink = MemorySink::new_with(SampleRate(1_000));
        let mut renderer = renderer(sink.clone(), 7);
        assert_eq!(renderer.render(250_000_000, false, false), Ok(250));

        let samples = sink.samples();
        assert!(samples[..100].iter().all(|s| *s == 0.5));
        assert!(samples[100..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn waveform_longer_than_period_is_truncated() {
        let sink = MemorySink::new_with(SampleRate(1_000));
        let mut renderer = renderer(sink.clone(), 1024);
        assert_eq!(renderer.render(30_000_000, true, false), Ok(30));
        assert_eq!(sink.samples(), vec![1.0; 30]);
    }

    #[test]
    fn rest_is_all_silence() {
        let sink = MemorySink::new_with(SampleRate(1_000));
        let mut renderer = renderer(sink.clone(), 16);
        assert_eq!(renderer.render(200_000_000, true, true), Ok(200));
        assert!(sink.samples().iter().all(|s| *s == 0.0));
    }

    #[test]
    fn partial_writes_are_completed() {
        let sink = MemorySink::new_with(SampleRate(1_000)).max_write(3);
        let mut renderer = renderer(sink.clone(), 10);
        assert_eq!(renderer.render(125_000_000, true, false), Ok(125));
        assert_eq!(sink.len(), 125);
    }

    #[test]
    fn interrupt_abandons_period() {
        let sink = MemorySink::new_with(SampleRate(1_000));
        let mut renderer = renderer(sink.clone(), 10);
        renderer.interrupt();
        assert_eq!(renderer.render(1_000_000_000, true, false), Ok(0));
        assert!(sink.is_empty());

        renderer.clear_interrupt();
        assert_eq!(renderer.render(1_000_000_000, true, false), Ok(1_000));
    }

    #[test]
    fn interrupt_releases_stuck_write() {
        let sink = MemorySink::new_with(SampleRate(1_000)).max_write(0);
        let mut renderer = renderer(sink, 10);
        let flag = renderer.interrupt_flag();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            flag.store(true, Ordering::Release);
        });
        assert_eq!(renderer.render(1_000_000_000, true, false), Ok(0));
        handle.join().unwrap();
    }

    #[test]
    fn device_failure_is_reported() {
        let sink = MemorySink::new_with(SampleRate(1_000)).fail_after(150);
        let mut renderer = renderer(sink.clone(), 32);
        assert_eq!(renderer.render(100_000_000, true, false), Ok(100));
        assert!(matches!(
            renderer.render(100_000_000, false, false),
            Err(SinkError::Device(_))
        ));
        assert_eq!(sink.len(), 150);
    }
}
