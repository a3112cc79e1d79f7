// Copyright (c) 2024 Mike Tsao

//! Common data types used throughout the system.

/// The most commonly used imports.
pub mod prelude {
    pub use super::{AudioSampleType, BeatValue, SampleRate, Tempo, TimeSignature};
}

pub use time::{BeatValue, SampleRate, Tempo, TimeSignature};

/// The fundamental type of an audio sample. Every buffer in this crate is
/// mono.
pub type AudioSampleType = f32;

mod time;
