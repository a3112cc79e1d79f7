// Copyright (c) 2024 Mike Tsao

//! Errors reported by the scheduling core.

use thiserror::Error;

/// Everything that can go wrong while configuring or running a metronome.
///
/// Configuration errors are returned synchronously by the call that tried to
/// make the change, and nothing is clamped behind the caller's back. Device
/// errors end the current playback session.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MetronomeError {
    /// Zero BPM, or a tempo beyond [crate::types::Tempo::MAX_VALUE].
    #[error("tempo of {0} BPM is out of range")]
    InvalidTempo(u32),

    /// The beat value multiplier must be a positive, finite number.
    #[error("beat value {0} must be positive and finite")]
    InvalidBeatValue(f32),

    /// The top of a time signature was zero, or its bottom wasn't a power of
    /// two.
    #[error("time signature {top}/{bottom} is invalid")]
    InvalidTimeSignature {
        #[allow(missing_docs)]
        top: u32,
        #[allow(missing_docs)]
        bottom: u32,
    },

    /// A rhythm needs at least one measure.
    #[error("a rhythm needs at least one measure")]
    EmptyRhythm,

    /// A tuplet that contains no notes.
    #[error("tuplet at measure {measure}, element {element} has no notes")]
    EmptyTuplet {
        #[allow(missing_docs)]
        measure: usize,
        #[allow(missing_docs)]
        element: usize,
    },

    /// A tuplet ratio with a zero term.
    #[error("tuplet ratio {0}:{1} is invalid")]
    InvalidTupletRatio(u32, u32),

    /// A note whose base duration is zero, negative, or not finite.
    #[error("note duration {0} must be positive and finite")]
    InvalidNoteDuration(f64),

    /// A beat would last longer than
    /// [MAX_BEAT_DELAY_NS](crate::scheduling::MAX_BEAT_DELAY_NS) at the
    /// current tempo and beat value.
    #[error("a beat lasting {0} ns is too long to schedule")]
    BeatTooLong(f64),

    /// The audio output failed. The playback session that hit it has been
    /// stopped.
    #[error("audio device error: {0}")]
    Device(String),

    /// The metronome service thread has gone away.
    #[error("the metronome service is no longer running")]
    ServiceUnavailable,
}

/// Shorthand for results whose error is a [MetronomeError].
pub type Result<T> = core::result::Result<T, MetronomeError>;
