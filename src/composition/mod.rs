// Copyright (c) 2024 Mike Tsao

//! The rhythm model: measures of notes, rests, and tuplets, and the flattener
//! that turns them into a list of timed beats.

/// The most commonly used imports.
pub mod prelude {
    pub use super::{flatten, Beat, Element, Measure, Note, Rhythm, Tuplet};
}

pub use flatten::{flatten, Beat};
pub use rhythm::{Element, Measure, Note, Rhythm, Tuplet};

mod flatten;
mod rhythm;
