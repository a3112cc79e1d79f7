// Copyright (c) 2024 Mike Tsao

//! The channel-based metronome service, which owns the timer and audio thread.

/// The most commonly used imports.
pub mod prelude {
    pub use super::{MetronomeEvent, MetronomeInput, MetronomeService, Subscription};
}

pub use observers::{ObserverId, Subscription};
pub use service::{MetronomeEvent, MetronomeInput, MetronomeService, MetronomeSnapshot};

mod observers;
mod service;
