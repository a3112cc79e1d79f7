// Copyright (c) 2024 Mike Tsao

//! Turning fired beats into a continuous stream of samples.

/// The most commonly used imports.
pub mod prelude {
    pub use super::{AudioRenderer, AudioSink, MemorySink, SinkError, TickWaveforms, WaveformProvider};
}

#[cfg(feature = "hound")]
pub use offline::export_to_wav;
pub use offline::render_cycles;
pub use renderer::{period_samples, AudioRenderer};
#[cfg(feature = "hound")]
pub use sinks::WavSink;
pub use sinks::{AudioSink, MemorySink, SinkError};
pub use waveforms::{TickWaveforms, WaveformProvider};

mod offline;
mod renderer;
mod sinks;
mod waveforms;
