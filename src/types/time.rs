// Copyright (c) 2024 Mike Tsao

//! Tempo, time signatures, and audio sample rates.

use crate::error::{MetronomeError, Result};
use core::fmt::{self, Display};
use derivative::Derivative;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use strum_macros::{EnumIter, FromRepr, IntoStaticStr};
use synonym::Synonym;

/// Beats per minute. Always a whole number.
#[derive(Synonym, Serialize, Derivative)]
#[derivative(Default)]
#[synonym(skip(Default, Display))]
pub struct Tempo(#[derivative(Default(value = "120"))] pub u32);
impl<'de> Deserialize<'de> for Tempo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        Self::new_with(u32::deserialize(deserializer)?).map_err(D::Error::custom)
    }
}
impl Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{} BPM", self.0))
    }
}
impl Tempo {
    /// The largest value we'll allow.
    pub const MAX_VALUE: u32 = 1024;

    /// The smallest value we'll allow. Zero would mean a beat never ends.
    pub const MIN_VALUE: u32 = 1;

    /// Creates a [Tempo], rejecting values outside
    /// [MIN_VALUE](Self::MIN_VALUE)..=[MAX_VALUE](Self::MAX_VALUE).
    pub fn new_with(bpm: u32) -> Result<Self> {
        if Self::range().contains(&bpm) {
            Ok(Self(bpm))
        } else {
            Err(MetronomeError::InvalidTempo(bpm))
        }
    }

    /// The raw BPM value.
    pub const fn bpm(&self) -> u32 {
        self.0
    }

    /// Beats per second.
    pub fn bps(&self) -> f64 {
        self.0 as f64 / 60.0
    }

    /// MIN..=MAX
    pub const fn range() -> core::ops::RangeInclusive<u32> {
        Self::MIN_VALUE..=Self::MAX_VALUE
    }
}

/// The note value that a caller wants to hear as one beat. Its discriminant is
/// the denominator of the note value, which is also the multiplier that turns
/// a fraction of a whole note into a number of beats.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, EnumIter, FromRepr, IntoStaticStr, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum BeatValue {
    /// semibreve
    Whole = 1,
    /// minim
    Half = 2,
    /// crotchet
    #[default]
    Quarter = 4,
    /// quaver
    Eighth = 8,
    /// semiquaver
    Sixteenth = 16,
    /// demisemiquaver
    ThirtySecond = 32,
    /// hemidemisemiquaver
    SixtyFourth = 64,
}
impl BeatValue {
    /// The `beat_value` multiplier the scheduler expects for this note value.
    pub fn multiplier(&self) -> f32 {
        *self as u32 as f32
    }

    /// Maps a time-signature bottom number to a [BeatValue].
    pub fn from_denominator(denominator: u32) -> Option<Self> {
        Self::from_repr(denominator as usize)
    }
}

/// [TimeSignature] represents a music [time
/// signature](https://en.wikipedia.org/wiki/Time_signature).
///
/// The top number says how many beats are in a measure, and the bottom number
/// says which note value gets a beat. 3/8 is three eighth-notes per measure.
///
/// The scheduler never looks at a measure's time signature. It only times the
/// notes that the measure contains, so a measure whose notes don't add up to
/// `top / bottom` plays exactly as written.
#[derive(Clone, Copy, Debug, Derivative, Eq, PartialEq, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(rename_all = "kebab-case", try_from = "UncheckedTimeSignature")]
pub struct TimeSignature {
    /// The number of beats in a measure.
    #[derivative(Default(value = "4"))]
    pub top: u32,

    /// The value of a beat, as a reciprocal. Always a power of two.
    #[derivative(Default(value = "4"))]
    pub bottom: u32,
}
impl Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{}/{}", self.top, self.bottom))
    }
}
#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct UncheckedTimeSignature {
    top: u32,
    bottom: u32,
}
impl TryFrom<UncheckedTimeSignature> for TimeSignature {
    type Error = MetronomeError;

    fn try_from(value: UncheckedTimeSignature) -> Result<Self> {
        Self::new_with(value.top, value.bottom)
    }
}
#[allow(missing_docs)]
impl TimeSignature {
    /// C time = common time = 4/4
    /// <https://en.wikipedia.org/wiki/Time_signature>
    pub const COMMON_TIME: Self = TimeSignature { top: 4, bottom: 4 };

    /// 𝄵 time = cut common time = alla breve = 2/2
    /// <https://en.wikipedia.org/wiki/Time_signature>
    pub const CUT_TIME: Self = TimeSignature { top: 2, bottom: 2 };

    pub fn new_with(top: u32, bottom: u32) -> Result<Self> {
        if top == 0 || !bottom.is_power_of_two() {
            Err(MetronomeError::InvalidTimeSignature { top, bottom })
        } else {
            Ok(Self { top, bottom })
        }
    }

    /// Checks a signature that might not have come from
    /// [new_with()](Self::new_with).
    pub fn validate(&self) -> Result<()> {
        Self::new_with(self.top, self.bottom).map(|_| ())
    }

    /// The nominal length of one measure as a fraction of a whole note.
    pub fn measure_duration(&self) -> f64 {
        self.top as f64 / self.bottom as f64
    }

    /// The note value of one beat, if it is one that [BeatValue] names.
    pub fn beat_value(&self) -> Option<BeatValue> {
        BeatValue::from_denominator(self.bottom)
    }

    pub fn top(&self) -> u32 {
        self.top
    }

    pub fn bottom(&self) -> u32 {
        self.bottom
    }
}

/// Samples per second. Always a positive integer; cannot be zero.
#[derive(Synonym, Serialize, Deserialize, Derivative)]
#[derivative(Default)]
#[synonym(skip(Default))]
#[serde(rename_all = "kebab-case")]
pub struct SampleRate(#[derivative(Default(value = "44100"))] pub usize);
#[allow(missing_docs)]
impl SampleRate {
    pub const DEFAULT_SAMPLE_RATE: usize = 44100;
    pub const DEFAULT: SampleRate = SampleRate::new(Self::DEFAULT_SAMPLE_RATE);

    pub const fn new(value: usize) -> Self {
        if value != 0 {
            Self(value)
        } else {
            Self(Self::DEFAULT_SAMPLE_RATE)
        }
    }
}
impl From<SampleRate> for f64 {
    fn from(value: SampleRate) -> Self {
        value.0 as f64
    }
}
impl From<SampleRate> for u32 {
    fn from(value: SampleRate) -> Self {
        value.0 as u32
    }
}
