// Copyright (c) 2024 Mike Tsao

#![deny(missing_docs, unused_imports, unused_variables)]
#![allow(rustdoc::private_intra_doc_links)]

//! Metrum keeps time. Given a [Rhythm] of measures, notes, rests, and
//! tuplets, plus a tempo, it produces a continuous stream of tick and silence
//! samples that stays in step with a monotonic clock for as long as it runs.
//!
//! There are several ways to use it, depending on how much control you need.
//!
//! * *Easiest*: Create a [MetronomeService] with an [AudioSink](audio::AudioSink)
//! and a set of tick waveforms, then send it commands. It runs the scheduler
//! and audio writes on its own thread.
//! * *Offline*: Use [render_cycles()](audio::render_cycles) to render a rhythm
//! into any sink as fast as possible, for example into a WAV file.
//! * *Bring your own timers*: Drive a [TickScheduler] yourself. It hands out
//! the ticks to arm and tells you which fired ticks to play.
//! * *Just the model*: Use [flatten()](composition::flatten) to turn a
//! [Rhythm] into the timed beats it represents.

/// A collection of imports that are useful to users of this crate. `use
/// metrum::prelude::*;` for easier onboarding.
pub mod prelude {
    pub use super::{
        audio::prelude::*,
        composition::prelude::*,
        error::MetronomeError,
        metronome::prelude::*,
        scheduling::prelude::*,
        tap_tempo::TapTempoEstimator,
        traits::ProvidesService,
        types::prelude::*,
        util::prelude::*,
    };
}

// Fundamental structures that are important enough to re-export at top level.
pub use {
    composition::Rhythm, error::MetronomeError, metronome::MetronomeService,
    scheduling::TickScheduler, tap_tempo::TapTempoEstimator,
};

pub mod audio;
pub mod composition;
pub mod error;
pub mod metronome;
pub mod scheduling;
pub mod tap_tempo;
pub mod traits;
pub mod types;
pub mod util;
