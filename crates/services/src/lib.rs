// Copyright (c) 2024 Mike Tsao

//! Wrappers around third-party device crates that plug them into the
//! [metrum] scheduler.

#![deny(missing_docs)]

/// The most commonly used imports.
pub mod prelude {
    #[cfg(feature = "audio")]
    pub use super::CpalAudioSink;
}

#[cfg(feature = "audio")]
pub use audio::CpalAudioSink;

#[cfg(feature = "audio")]
mod audio;
