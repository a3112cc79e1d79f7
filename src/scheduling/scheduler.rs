// Copyright (c) 2024 Mike Tsao

use super::MonotonicClock;
use crate::{
    composition::{flatten, Beat, Rhythm},
    error::{MetronomeError, Result},
    types::Tempo,
};
use log::{debug, trace, warn};
use strum_macros::Display;

/// How many beats are kept scheduled ahead of real time.
pub const LOOKAHEAD_DEPTH: u8 = 4;

/// The longest single beat the scheduler accepts: one hour.
pub const MAX_BEAT_DELAY_NS: u64 = 3_600_000_000_000;

const NANOS_PER_MINUTE: f64 = 60_000_000_000.0;

/// Converts a beat's musical length into nanoseconds at the given tempo.
///
/// `beat_value` turns fractions of a whole note into beats: with a value of 4,
/// a quarter note lasts one beat.
pub fn beat_delay_ns(beat: &Beat, tempo: Tempo, beat_value: f32) -> u64 {
    exact_delay_ns(beat, tempo, beat_value).round() as u64
}

fn exact_delay_ns(beat: &Beat, tempo: Tempo, beat_value: f32) -> f64 {
    beat.duration() * NANOS_PER_MINUTE / tempo.bpm() as f64 * beat_value as f64
}

/// Checks that a tempo and beat value are usable, and that none of `beats`
/// would last longer than [MAX_BEAT_DELAY_NS] with them.
pub(crate) fn check_timing(beats: &[Beat], tempo: Tempo, beat_value: f32) -> Result<()> {
    Tempo::new_with(tempo.bpm())?;
    if !(beat_value.is_finite() && beat_value > 0.0) {
        return Err(MetronomeError::InvalidBeatValue(beat_value));
    }
    beats.iter().try_for_each(|beat| {
        let delay_ns = exact_delay_ns(beat, tempo, beat_value);
        if delay_ns <= MAX_BEAT_DELAY_NS as f64 {
            Ok(())
        } else {
            Err(MetronomeError::BeatTooLong(delay_ns))
        }
    })
}

#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq)]
pub enum PlayState {
    #[default]
    Stopped,
    Running,
}

/// A beat that has been scheduled and is waiting for its timer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArmedTick {
    /// The scheduler generation at arming time. The tick is stale once the
    /// scheduler's generation moves on.
    pub generation: u64,
    /// Clock time at which the timer should fire.
    pub due_ns: u64,
    /// How far in the future `due_ns` was when the tick was armed.
    pub fire_delay_ns: u64,
    /// The beat's own length at the tempo in effect when it was armed.
    pub delay_ns: u64,
    #[allow(missing_docs)]
    pub beat: Beat,
}

/// What a live timer delivers to the audio side.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FiredTick {
    #[allow(missing_docs)]
    pub beat: Beat,
    /// The period to fill with audio, in nanoseconds.
    pub delay_ns: u64,
}

/// The tick scheduler's state machine.
///
/// [TickScheduler] doesn't own any timers or threads. [start()](Self::start)
/// and [fill_lookahead()](Self::fill_lookahead) hand back [ArmedTick]s for the
/// caller to put on a timer, and the caller passes each one back to
/// [on_timer()](Self::on_timer) when it fires.
///
/// Every scheduled time is the previous scheduled time plus the previous
/// beat's ideal length, so scheduling error doesn't accumulate. The only
/// exception is after a stall long enough that the next due time has already
/// passed, in which case that next time is moved up to "now" rather than
/// trying to catch up.
#[derive(Debug)]
pub struct TickScheduler {
    rhythm: Rhythm,
    beats: Vec<Beat>,
    state: PlayState,
    enabled: bool,
    tempo: Tempo,
    beat_value: f32,
    cursor: isize,
    in_flight_count: u8,
    next_due_ns: u64,
    generation: u64,
}
impl Default for TickScheduler {
    fn default() -> Self {
        let rhythm = Rhythm::default();
        Self {
            beats: flatten(&rhythm),
            rhythm,
            state: Default::default(),
            enabled: true,
            tempo: Default::default(),
            beat_value: 4.0,
            cursor: -1,
            in_flight_count: 0,
            next_due_ns: 0,
            generation: 0,
        }
    }
}
impl TickScheduler {
    #[allow(missing_docs)]
    pub fn new_with(rhythm: Rhythm, tempo: Tempo, beat_value: f32) -> Result<Self> {
        let beats = flatten(&rhythm);
        check_timing(&beats, tempo, beat_value)?;
        Ok(Self {
            beats,
            rhythm,
            tempo,
            beat_value,
            ..Default::default()
        })
    }

    /// Begins playback and returns the first [LOOKAHEAD_DEPTH] ticks to arm.
    /// Does nothing if already playing, if disabled, or if the rhythm has no
    /// notes.
    pub fn start(&mut self, clock: &dyn MonotonicClock) -> Vec<ArmedTick> {
        if self.state == PlayState::Running {
            warn!("start() ignored: already running");
            return Vec::default();
        }
        if !self.enabled {
            warn!("start() ignored: scheduler is disabled");
            return Vec::default();
        }
        if self.beats.is_empty() {
            warn!("start() ignored: rhythm has no notes");
            return Vec::default();
        }
        self.cursor = -1;
        self.in_flight_count = 0;
        self.generation += 1;
        self.next_due_ns = clock.now_ns();
        self.state = PlayState::Running;
        debug!(
            "start: generation {} at {} with {} per beat value {}",
            self.generation, self.next_due_ns, self.tempo, self.beat_value
        );
        self.fill_lookahead(clock)
    }

    /// Stops playback and invalidates every armed tick. Returns whether it
    /// was playing.
    pub fn stop(&mut self) -> bool {
        let was_playing = self.is_playing();
        self.state = PlayState::Stopped;
        self.cursor = -1;
        self.in_flight_count = 0;
        self.next_due_ns = 0;
        self.generation += 1;
        was_playing
    }

    /// Replaces the rhythm, stopping first if necessary. Playback must be
    /// restarted explicitly. Returns whether playback was stopped. A rhythm
    /// with a beat that's too long at the current tempo is rejected, and
    /// playback is left alone.
    pub fn set_rhythm(&mut self, rhythm: Rhythm) -> Result<bool> {
        let beats = flatten(&rhythm);
        check_timing(&beats, self.tempo, self.beat_value)?;
        let was_playing = if self.is_playing() {
            self.stop()
        } else {
            self.generation += 1;
            false
        };
        self.beats = beats;
        self.rhythm = rhythm;
        Ok(was_playing)
    }

    /// Changes the tempo. Ticks already armed keep the delay they were armed
    /// with; the next newly scheduled beat uses the new tempo.
    pub fn set_bpm(&mut self, bpm: u32) -> Result<()> {
        let tempo = Tempo::new_with(bpm)?;
        check_timing(&self.beats, tempo, self.beat_value)?;
        self.tempo = tempo;
        Ok(())
    }

    /// Changes the beat value multiplier, with the same timing rule as
    /// [set_bpm()](Self::set_bpm).
    pub fn set_beat_value(&mut self, beat_value: f32) -> Result<()> {
        check_timing(&self.beats, self.tempo, beat_value)?;
        self.beat_value = beat_value;
        Ok(())
    }

    /// A disabled scheduler refuses to start. Disabling a running scheduler
    /// stops it. Returns whether playback was stopped.
    pub fn set_enabled(&mut self, enabled: bool) -> bool {
        self.enabled = enabled;
        if !enabled && self.is_playing() {
            self.stop()
        } else {
            false
        }
    }

    /// Handles a fired timer. Returns `None` if the tick is stale, meaning it
    /// was armed before the latest start, stop, or rhythm change. Otherwise
    /// the caller should render the returned tick and then call
    /// [fill_lookahead()](Self::fill_lookahead).
    pub fn on_timer(&mut self, tick: &ArmedTick) -> Option<FiredTick> {
        if self.state != PlayState::Running || tick.generation != self.generation {
            trace!(
                "discarding stale tick from generation {} (now {})",
                tick.generation,
                self.generation
            );
            return None;
        }
        self.in_flight_count = self.in_flight_count.saturating_sub(1);
        Some(FiredTick {
            beat: tick.beat,
            delay_ns: tick.delay_ns,
        })
    }

    /// Schedules beats until [LOOKAHEAD_DEPTH] are in flight, returning the
    /// newly armed ticks. Returns nothing unless running.
    pub fn fill_lookahead(&mut self, clock: &dyn MonotonicClock) -> Vec<ArmedTick> {
        let mut armed = Vec::default();
        if self.state != PlayState::Running || self.beats.is_empty() {
            return armed;
        }
        while self.in_flight_count < LOOKAHEAD_DEPTH {
            self.cursor = (self.cursor + 1).rem_euclid(self.beats.len() as isize);
            let beat = self.beats[self.cursor as usize];
            let delay_ns = beat_delay_ns(&beat, self.tempo, self.beat_value);

            let now = clock.now_ns();
            if self.next_due_ns < now {
                if self.next_due_ns != 0 {
                    debug!(
                        "fell behind by {} ns; resuming from now",
                        now - self.next_due_ns
                    );
                }
                self.next_due_ns = now;
            }
            let due_ns = self.next_due_ns;
            self.next_due_ns = self.next_due_ns.saturating_add(delay_ns);
            self.in_flight_count += 1;

            trace!(
                "armed beat {}.{} due {} (+{} ns)",
                beat.measure_index,
                beat.position_in_measure,
                due_ns,
                due_ns - now
            );
            armed.push(ArmedTick {
                generation: self.generation,
                due_ns,
                fire_delay_ns: due_ns - now,
                delay_ns,
                beat,
            });
        }
        armed
    }

    #[allow(missing_docs)]
    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Running
    }

    #[allow(missing_docs)]
    pub fn play_state(&self) -> PlayState {
        self.state
    }

    #[allow(missing_docs)]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The flattened beats of the current rhythm.
    pub fn current_beats(&self) -> &[Beat] {
        &self.beats
    }

    #[allow(missing_docs)]
    pub fn rhythm(&self) -> &Rhythm {
        &self.rhythm
    }

    #[allow(missing_docs)]
    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    #[allow(missing_docs)]
    pub fn beat_value(&self) -> f32 {
        self.beat_value
    }

    #[allow(missing_docs)]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// How many armed ticks haven't fired yet.
    pub fn in_flight_count(&self) -> u8 {
        self.in_flight_count
    }
}
