// Copyright (c) 2024 Mike Tsao

use crate::{
    error::{MetronomeError, Result},
    types::TimeSignature,
};
use serde::{Deserialize, Serialize};

/// A single played or rested note.
///
/// Durations are fractions of a whole note, so 0.25 is a quarter note. Dots
/// lengthen the note: one dot makes it 1.5x as long, two dots 1.75x, and so
/// on.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Note {
    /// The undotted length of the note, as a fraction of a whole note.
    pub base_duration: f64,
    /// A rest produces silence for its duration.
    pub is_rest: bool,
    /// Accented notes use the accented tick waveform.
    pub is_accented: bool,
    /// How many augmentation dots follow the note.
    #[serde(default)]
    pub dot_count: u8,
}
#[allow(missing_docs)]
impl Note {
    pub const WHOLE: f64 = 1.0;
    pub const HALF: f64 = 0.5;
    pub const QUARTER: f64 = 0.25;
    pub const EIGHTH: f64 = 0.125;
    pub const SIXTEENTH: f64 = 0.0625;

    pub const fn new_with(base_duration: f64, is_rest: bool, is_accented: bool, dot_count: u8) -> Self {
        Self {
            base_duration,
            is_rest,
            is_accented,
            dot_count,
        }
    }

    /// A note that sounds a tick.
    pub const fn tick(base_duration: f64, is_accented: bool) -> Self {
        Self::new_with(base_duration, false, is_accented, 0)
    }

    /// A note that keeps silent.
    pub const fn rest(base_duration: f64) -> Self {
        Self::new_with(base_duration, true, false, 0)
    }

    /// Returns a copy of this note with the given number of dots.
    pub const fn dotted(self, dot_count: u8) -> Self {
        Self { dot_count, ..self }
    }

    /// How long the note actually lasts, as a fraction of a whole note.
    pub fn sounded_duration(&self) -> f64 {
        self.base_duration * (2.0 - 2.0f64.powi(-(self.dot_count as i32)))
    }

    fn validate(&self) -> Result<()> {
        if self.base_duration.is_finite() && self.base_duration > 0.0 {
            Ok(())
        } else {
            Err(MetronomeError::InvalidNoteDuration(self.base_duration))
        }
    }
}

/// A group of notes squeezed (or stretched) to fit the time of a different
/// number of notes. A `ratio` of (3, 2) is a triplet: three notes in the time
/// of two.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Tuplet {
    /// (notes played, notes whose time they take)
    pub ratio: (u32, u32),
    /// The notes of the group, in order.
    pub notes: Vec<Note>,
}
impl Tuplet {
    /// Creates a [Tuplet], rejecting ratios with a zero term and empty groups.
    pub fn new_with(ratio: (u32, u32), notes: Vec<Note>) -> Result<Self> {
        let r = Self { ratio, notes };
        r.validate(0, 0)?;
        Ok(r)
    }

    /// Three notes in the time of two.
    pub fn triplet(notes: Vec<Note>) -> Result<Self> {
        Self::new_with((3, 2), notes)
    }

    /// The factor applied to each contained note's sounded duration.
    pub fn scale(&self) -> f64 {
        self.ratio.1 as f64 / self.ratio.0 as f64
    }

    fn validate(&self, measure: usize, element: usize) -> Result<()> {
        if self.ratio.0 == 0 || self.ratio.1 == 0 {
            return Err(MetronomeError::InvalidTupletRatio(self.ratio.0, self.ratio.1));
        }
        if self.notes.is_empty() {
            return Err(MetronomeError::EmptyTuplet { measure, element });
        }
        self.notes.iter().try_for_each(Note::validate)
    }
}

/// One item in a measure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Element {
    #[allow(missing_docs)]
    Note(Note),
    #[allow(missing_docs)]
    Tuplet(Tuplet),
}
impl From<Note> for Element {
    fn from(value: Note) -> Self {
        Element::Note(value)
    }
}
impl From<Tuplet> for Element {
    fn from(value: Tuplet) -> Self {
        Element::Tuplet(value)
    }
}
impl Element {
    /// How many beats this element flattens into.
    pub fn note_count(&self) -> usize {
        match self {
            Element::Note(_) => 1,
            Element::Tuplet(tuplet) => tuplet.notes.len(),
        }
    }
}

/// A time signature plus the notes that fill it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Measure {
    #[allow(missing_docs)]
    pub time_signature: TimeSignature,
    #[allow(missing_docs)]
    pub elements: Vec<Element>,
}
impl Measure {
    #[allow(missing_docs)]
    pub fn new_with(time_signature: TimeSignature, elements: Vec<Element>) -> Self {
        Self {
            time_signature,
            elements,
        }
    }

    /// The number of notes in the measure, counting each note of a tuplet.
    pub fn note_count(&self) -> usize {
        self.elements.iter().map(Element::note_count).sum()
    }

    /// The total sounded length of the measure's notes. This isn't required
    /// to match the time signature.
    pub fn sounded_duration(&self) -> f64 {
        self.elements
            .iter()
            .map(|element| match element {
                Element::Note(note) => note.sounded_duration(),
                Element::Tuplet(tuplet) => tuplet
                    .notes
                    .iter()
                    .map(|note| note.sounded_duration() * tuplet.scale())
                    .sum(),
            })
            .sum()
    }
}

/// One loop cycle of a metronome pattern. A [Rhythm] always has at least one
/// measure, and every tuplet in it has at least one note.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Measure>", into = "Vec<Measure>")]
pub struct Rhythm {
    measures: Vec<Measure>,
}
impl Default for Rhythm {
    fn default() -> Self {
        Self::simple(TimeSignature::COMMON_TIME, true)
    }
}
impl TryFrom<Vec<Measure>> for Rhythm {
    type Error = MetronomeError;

    fn try_from(measures: Vec<Measure>) -> Result<Self> {
        Self::new_with(measures)
    }
}
impl From<Rhythm> for Vec<Measure> {
    fn from(rhythm: Rhythm) -> Self {
        rhythm.measures
    }
}
impl Rhythm {
    /// Creates a [Rhythm] from its measures.
    pub fn new_with(measures: Vec<Measure>) -> Result<Self> {
        if measures.is_empty() {
            return Err(MetronomeError::EmptyRhythm);
        }
        for (measure_index, measure) in measures.iter().enumerate() {
            measure.time_signature.validate()?;
            for (element_index, element) in measure.elements.iter().enumerate() {
                match element {
                    Element::Note(note) => note.validate()?,
                    Element::Tuplet(tuplet) => tuplet.validate(measure_index, element_index)?,
                }
            }
        }
        Ok(Self { measures })
    }

    /// A single measure of one plain tick per beat of the time signature,
    /// optionally accenting the downbeat.
    pub fn simple(time_signature: TimeSignature, accent_first: bool) -> Self {
        let base_duration = 1.0 / time_signature.bottom.max(1) as f64;
        let elements = (0..time_signature.top)
            .map(|i| Note::tick(base_duration, accent_first && i == 0).into())
            .collect();
        Self {
            measures: vec![Measure::new_with(time_signature, elements)],
        }
    }

    #[allow(missing_docs)]
    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }

    /// The number of beats this rhythm flattens into.
    pub fn note_count(&self) -> usize {
        self.measures.iter().map(Measure::note_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn dotted_durations() {
        let note = Note::tick(Note::QUARTER, false);
        assert_eq!(note.sounded_duration(), 0.25);
        assert_eq!(note.dotted(1).sounded_duration(), 0.375);
        assert!(approx_eq!(
            f64,
            note.dotted(2).sounded_duration(),
            0.4375,
            epsilon = 1e-12
        ));
    }

    #[test]
    fn tuplet_validation() {
        assert_eq!(
            Tuplet::new_with((3, 0), vec![Note::tick(Note::EIGHTH, false)]),
            Err(MetronomeError::InvalidTupletRatio(3, 0))
        );
        assert_eq!(
            Tuplet::triplet(vec![]),
            Err(MetronomeError::EmptyTuplet {
                measure: 0,
                element: 0
            })
        );
        let triplet = Tuplet::triplet(vec![Note::tick(Note::EIGHTH, false); 3]).unwrap();
        assert!(approx_eq!(f64, triplet.scale(), 2.0 / 3.0, ulps = 2));
    }

    #[test]
    fn rhythm_validation() {
        assert_eq!(Rhythm::new_with(vec![]), Err(MetronomeError::EmptyRhythm));

        // An empty measure is fine.
        assert!(Rhythm::new_with(vec![Measure::default()]).is_ok());

        let bad_tuplet = Tuplet {
            ratio: (3, 2),
            notes: vec![],
        };
        let measures = vec![
            Measure::new_with(
                TimeSignature::COMMON_TIME,
                vec![Note::tick(Note::QUARTER, true).into()],
            ),
            Measure::new_with(
                TimeSignature::COMMON_TIME,
                vec![Note::rest(Note::HALF).into(), bad_tuplet.into()],
            ),
        ];
        assert_eq!(
            Rhythm::new_with(measures),
            Err(MetronomeError::EmptyTuplet {
                measure: 1,
                element: 1
            })
        );

        let measures = vec![Measure::new_with(
            TimeSignature::COMMON_TIME,
            vec![Note::tick(0.0, false).into()],
        )];
        assert_eq!(
            Rhythm::new_with(measures),
            Err(MetronomeError::InvalidNoteDuration(0.0))
        );
    }

    #[test]
    fn rhythm_rejects_bad_time_signatures() {
        let bad = TimeSignature { top: 4, bottom: 3 };
        assert_eq!(
            Rhythm::new_with(vec![Measure::new_with(bad, vec![])]),
            Err(MetronomeError::InvalidTimeSignature { top: 4, bottom: 3 })
        );
        assert!(
            serde_json::from_str::<Rhythm>(r#"[{"time-signature":{"top":0,"bottom":6},"elements":[]}]"#)
                .is_err()
        );
    }

    #[test]
    fn simple_rhythm() {
        let rhythm = Rhythm::simple(TimeSignature::new_with(3, 8).unwrap(), true);
        assert_eq!(rhythm.measures().len(), 1);
        assert_eq!(rhythm.note_count(), 3);
        let measure = &rhythm.measures()[0];
        assert_eq!(measure.sounded_duration(), 0.375);
        assert_eq!(
            measure.elements[0],
            Element::Note(Note::tick(Note::EIGHTH, true))
        );
        assert_eq!(
            measure.elements[1],
            Element::Note(Note::tick(Note::EIGHTH, false))
        );
    }

    #[test]
    fn deserialization_validates() {
        let rhythm = Rhythm::default();
        let json = serde_json::to_string(&rhythm).unwrap();
        let restored: Rhythm = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, rhythm);

        assert!(
            serde_json::from_str::<Rhythm>("[]").is_err(),
            "an empty measure list shouldn't deserialize"
        );
    }
}
