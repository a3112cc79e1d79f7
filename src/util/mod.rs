// Copyright (c) 2024 Mike Tsao

//! System utilities.

/// Commonly used imports.
pub mod prelude {
    pub use super::{CrossbeamChannel, MetronomeSettings, MetronomeSettingsBuilder};
}

pub use channels::CrossbeamChannel;
pub use settings::{MetronomeSettings, MetronomeSettingsBuilder, MetronomeSettingsBuilderError};

mod channels;
mod settings;
