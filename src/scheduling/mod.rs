// Copyright (c) 2024 Mike Tsao

//! Turning beats into timed events: clocks, one-shot timers, and the tick
//! scheduler's lookahead state machine.

/// The most commonly used imports.
pub mod prelude {
    pub use super::{
        ArmedTick, FiredTick, ManualClock, MonotonicClock, SystemClock, TickScheduler,
        LOOKAHEAD_DEPTH,
    };
}

pub use clock::{ManualClock, MonotonicClock, SystemClock};
pub(crate) use scheduler::check_timing;
pub use scheduler::{
    beat_delay_ns, ArmedTick, FiredTick, PlayState, TickScheduler, LOOKAHEAD_DEPTH,
    MAX_BEAT_DELAY_NS,
};
pub use timers::TimerQueue;

mod clock;
mod scheduler;
mod timers;
