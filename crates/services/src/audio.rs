// Copyright (c) 2024 Mike Tsao

//! [CpalAudioSink] streams metronome audio to the
//! [cpal](https://crates.io/crates/cpal) default output device.

use core::{fmt::Debug, time::Duration};
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    BufferSize, FromSample, Sample as CpalSample, SizedSample, Stream, StreamConfig,
    SupportedStreamConfig,
};
use crossbeam::{
    channel::{Receiver, Sender},
    queue::ArrayQueue,
};
use delegate::delegate;
use log::{error, info, warn};
use metrum::{
    audio::{AudioSink, SinkError},
    types::{AudioSampleType, SampleRate},
};
use std::sync::{Arc, Mutex};

/// A ring buffer of mono samples that the audio stream consumes.
struct AudioQueue(Arc<ArrayQueue<AudioSampleType>>);
impl AudioQueue {
    fn new(buffer_size: usize) -> Self {
        Self(Arc::new(ArrayQueue::new(buffer_size)))
    }

    delegate! {
        to self.0 {
            fn len(&self) -> usize;
            fn capacity(&self) -> usize;
            fn pop(&self) -> Option<AudioSampleType>;
            fn push(&self, sample: AudioSampleType) -> Result<(), AudioSampleType>;
        }
    }
}
impl Clone for AudioQueue {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

#[derive(Debug)]
enum StreamCommand {
    Play,
    Pause,
    Quit,
}

/// The first error cpal reported for the stream, if any.
type StreamFailure = Arc<Mutex<Option<String>>>;

/// Wrapper for cpal structs. [WrappedStream] exists because the cpal stream
/// isn't `Send`, so it needs to live in its own thread, and we manage that
/// thread here.
struct WrappedStream {
    commands: Sender<StreamCommand>,
    failure: StreamFailure,

    sample_rate: usize,
    channel_count: u16,
}
impl Debug for WrappedStream {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WrappedStream")
            .field("cpal_stream", &"(skipped)")
            .field("sample_rate", &self.sample_rate)
            .field("channel_count", &self.channel_count)
            .finish()
    }
}
impl WrappedStream {
    /// period_size is the size, in frames, of a single group of frames in the
    /// audio buffer. <https://www.alsa-project.org/wiki/FramesPeriods>
    fn new_with(period_size: usize, queue: &AudioQueue) -> anyhow::Result<Self> {
        let (_host, device, config) = Self::host_device_setup()?;
        let (commands, command_receiver) = crossbeam::channel::unbounded();
        let (setup_sender, setup_receiver) = crossbeam::channel::bounded(1);
        let failure = StreamFailure::default();

        // Stream creation needs to live in its own thread because it isn't
        // `Send`. See <https://github.com/RustAudio/cpal/issues/818> for more
        // discussion.
        let config_clone = config.clone();
        let queue_clone = queue.clone();
        let failure_clone = Arc::clone(&failure);
        std::thread::spawn(move || {
            match Self::stream_setup_for(
                &device,
                config_clone,
                period_size,
                queue_clone,
                failure_clone,
            ) {
                Ok(cpal_stream) => {
                    let _ = setup_sender.send(Ok(()));
                    Self::run(cpal_stream, command_receiver);
                }
                Err(e) => {
                    let _ = setup_sender.send(Err(e));
                }
            }
        });
        setup_receiver.recv()??;

        Ok(Self {
            commands,
            failure,
            sample_rate: config.sample_rate().0 as usize,
            channel_count: config.channels(),
        })
    }

    fn run(cpal_stream: Stream, receiver: Receiver<StreamCommand>) {
        while let Ok(command) = receiver.recv() {
            let result = match command {
                StreamCommand::Play => cpal_stream.play().map_err(anyhow::Error::from),
                StreamCommand::Pause => cpal_stream.pause().map_err(anyhow::Error::from),
                StreamCommand::Quit => break,
            };
            if let Err(e) = result {
                warn!("While handling {command:?}: {e:?}");
            }
        }
    }

    /// Returns the default host, device, and stream config (all of which are
    /// cpal concepts).
    fn host_device_setup(
    ) -> anyhow::Result<(cpal::Host, cpal::Device, cpal::SupportedStreamConfig), anyhow::Error>
    {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow::Error::msg("Default output device is not available"))?;
        let config = device.default_output_config()?;

        let config = SupportedStreamConfig::new(
            config.channels(),
            config.sample_rate(),
            *config.buffer_size(),
            config.sample_format(),
        );
        Ok((host, device, config))
    }

    /// Creates and returns a Stream for the given device and config. The Stream
    /// will consume the data in the supplied [AudioQueue]. This function is
    /// actually a wrapper around the generic [stream_make<T>()].
    fn stream_setup_for(
        device: &cpal::Device,
        config: SupportedStreamConfig,
        period_size: usize,
        queue: AudioQueue,
        failure: StreamFailure,
    ) -> anyhow::Result<Stream, anyhow::Error> {
        let sample_format = config.sample_format();
        let mut config: StreamConfig = config.into();

        // We set buffer size here, rather than in host_device_setup(), because
        // it's troublesome to create a [cpal::SupportedBufferSize] on the fly.
        config.buffer_size = BufferSize::Fixed(period_size as u32);

        match sample_format {
            cpal::SampleFormat::I8 => Self::stream_make::<i8>(&config, device, queue, failure),
            cpal::SampleFormat::I16 => Self::stream_make::<i16>(&config, device, queue, failure),
            cpal::SampleFormat::I32 => Self::stream_make::<i32>(&config, device, queue, failure),
            cpal::SampleFormat::I64 => Self::stream_make::<i64>(&config, device, queue, failure),
            cpal::SampleFormat::U8 => Self::stream_make::<u8>(&config, device, queue, failure),
            cpal::SampleFormat::U16 => Self::stream_make::<u16>(&config, device, queue, failure),
            cpal::SampleFormat::U32 => Self::stream_make::<u32>(&config, device, queue, failure),
            cpal::SampleFormat::U64 => Self::stream_make::<u64>(&config, device, queue, failure),
            cpal::SampleFormat::F32 => Self::stream_make::<f32>(&config, device, queue, failure),
            cpal::SampleFormat::F64 => Self::stream_make::<f64>(&config, device, queue, failure),
            _ => Err(anyhow::anyhow!("Unexpected sample format {sample_format:?}")),
        }
    }

    /// Generic portion of stream_setup_for().
    fn stream_make<T>(
        config: &cpal::StreamConfig,
        device: &cpal::Device,
        queue: AudioQueue,
        failure: StreamFailure,
    ) -> Result<Stream, anyhow::Error>
    where
        T: SizedSample + FromSample<AudioSampleType>,
    {
        let err_fn = move |err| {
            error!("Error from output sound stream: {err}");
            if let Ok(mut failure) = failure.lock() {
                failure.get_or_insert_with(|| format!("{err}"));
            }
        };

        let channel_count = config.channels as usize;
        let stream = device.build_output_stream(
            config,
            move |output: &mut [T], _: &cpal::OutputCallbackInfo| {
                Self::on_window(output, channel_count, &queue)
            },
            err_fn,
            None,
        )?;
        Ok(stream)
    }

    /// cpal callback that supplies samples from the AudioQueue, converting them
    /// if needed to the stream's expected data type. Each mono sample goes to
    /// every channel. An empty queue plays silence.
    fn on_window<T>(output: &mut [T], channel_count: usize, queue: &AudioQueue)
    where
        T: CpalSample + FromSample<AudioSampleType>,
    {
        for frame in output.chunks_exact_mut(channel_count) {
            let sample = T::from_sample(queue.pop().unwrap_or_default());
            frame.iter_mut().for_each(|s| *s = sample);
        }
    }

    fn send(&self, command: StreamCommand) {
        if let Err(e) = self.commands.send(command) {
            warn!("While sending to audio stream: {e:?}");
        }
    }

    fn failure(&self) -> Option<String> {
        self.failure.lock().ok().and_then(|failure| failure.clone())
    }
}
impl Drop for WrappedStream {
    fn drop(&mut self) {
        let _ = self.commands.send(StreamCommand::Quit);
    }
}

/// An [AudioSink] that plays through the default output device.
///
/// Writes go into a ring buffer that the device drains. When the buffer is
/// full, a write waits briefly for room and then returns however many samples
/// fit, possibly none.
#[derive(Debug)]
pub struct CpalAudioSink {
    queue: AudioQueue,
    stream: WrappedStream,
}
impl Debug for AudioQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AudioQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}
impl AudioSink for CpalAudioSink {
    fn write(&mut self, samples: &[AudioSampleType]) -> Result<usize, SinkError> {
        if let Some(failure) = self.stream.failure() {
            return Err(SinkError::Device(failure));
        }
        if self.queue.len() >= self.queue.capacity() {
            std::thread::sleep(self.poll_interval());
        }
        let mut count = 0;
        for sample in samples {
            if self.queue.push(*sample).is_err() {
                break;
            }
            count += 1;
        }
        Ok(count)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        while self.queue.pop().is_some() {}
        Ok(())
    }

    fn pause(&mut self) {
        self.stream.send(StreamCommand::Pause);
    }

    fn play(&mut self) {
        self.stream.send(StreamCommand::Play);
    }

    fn sample_rate(&self) -> SampleRate {
        SampleRate::new(self.stream.sample_rate)
    }
}
impl CpalAudioSink {
    /// A reasonable period size. This value is on the upper edge of perceptible
    /// latency for 44.1KHz (512 / 44100 = 11.6 milliseconds).
    const SUGGESTED_PERIOD_SIZE: usize = 512;

    /// The ring buffer holds this many periods, so that the device can play
    /// one while the metronome writes the next.
    const PERIODS_IN_QUEUE: usize = 3;

    /// Opens the default output device with a ring buffer whose size is
    /// based on the given period size, or a reasonable default if none is
    /// provided. A "period" is a chunk of the audio buffer that the audio
    /// interface reads at once.
    pub fn new_with(period_size: Option<usize>) -> anyhow::Result<Self> {
        let period_size = period_size.unwrap_or(Self::SUGGESTED_PERIOD_SIZE).max(1);
        let queue = AudioQueue::new(period_size * Self::PERIODS_IN_QUEUE);
        let stream = WrappedStream::new_with(period_size, &queue)?;
        info!(
            "opened output device at {} Hz with {} channels",
            stream.sample_rate, stream.channel_count
        );
        Ok(Self { queue, stream })
    }

    /// How many channels the device plays. Every channel gets the same mono
    /// signal.
    pub fn channel_count(&self) -> u16 {
        self.stream.channel_count
    }

    // A quarter of the time the full queue takes to play.
    fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(
            self.queue.capacity() as f64 / self.stream.sample_rate.max(1) as f64 / 4.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_queue() {
        let queue = AudioQueue::new(2);
        assert_eq!(queue.pop(), None);

        assert_eq!(queue.push(0.5), Ok(()));
        assert_eq!(queue.push(-0.5), Ok(()));
        assert_eq!(queue.push(0.25), Err(0.25), "queue is full");
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(), Some(0.5));
    }

    #[test]
    fn on_window_fans_out_and_pads() {
        let queue = AudioQueue::new(8);
        let _ = queue.push(0.5);
        let _ = queue.push(-1.0);
        let mut output = [1.0f32; 6];
        WrappedStream::on_window(&mut output, 2, &queue);
        assert_eq!(output, [0.5, 0.5, -1.0, -1.0, 0.0, 0.0]);
    }
}
