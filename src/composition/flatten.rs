// Copyright (c) 2024 Mike Tsao

use super::rhythm::{Element, Note, Rhythm};
use serde::{Deserialize, Serialize};

/// One flattened interval of a [Rhythm]: either a tick or a rest, and how
/// long it lasts.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Beat {
    /// The sounded duration as a fraction of a whole note. Negative for a
    /// rest.
    pub duration_signed: f64,
    #[allow(missing_docs)]
    pub is_accented: bool,
    /// Which measure of the rhythm this beat came from.
    pub measure_index: usize,
    /// The 0-based note index within its measure. Tuplet notes count
    /// individually.
    pub position_in_measure: usize,
}
impl Beat {
    fn from_note(note: &Note, scale: f64, measure_index: usize, position_in_measure: usize) -> Self {
        let duration = note.sounded_duration() * scale;
        Self {
            duration_signed: if note.is_rest { -duration } else { duration },
            is_accented: note.is_accented,
            measure_index,
            position_in_measure,
        }
    }

    /// Whether this beat is silent.
    pub fn is_rest(&self) -> bool {
        self.duration_signed.is_sign_negative()
    }

    /// The magnitude of the beat's duration.
    pub fn duration(&self) -> f64 {
        self.duration_signed.abs()
    }
}

/// Turns a [Rhythm] into the ordered list of [Beat]s that the scheduler
/// cycles through. Tuplets expand in place, one [Beat] per contained note.
pub fn flatten(rhythm: &Rhythm) -> Vec<Beat> {
    let mut beats = Vec::with_capacity(rhythm.note_count());
    for (measure_index, measure) in rhythm.measures().iter().enumerate() {
        let mut position = 0;
        for element in measure.elements.iter() {
            match element {
                Element::Note(note) => {
                    beats.push(Beat::from_note(note, 1.0, measure_index, position));
                    position += 1;
                }
                Element::Tuplet(tuplet) => {
                    let scale = tuplet.scale();
                    for note in tuplet.notes.iter() {
                        beats.push(Beat::from_note(note, scale, measure_index, position));
                        position += 1;
                    }
                }
            }
        }
    }
    beats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        composition::{Measure, Tuplet},
        types::TimeSignature,
    };
    use float_cmp::approx_eq;

    fn mixed_rhythm() -> Rhythm {
        Rhythm::new_with(vec![
            Measure::new_with(
                TimeSignature::COMMON_TIME,
                vec![
                    Note::tick(Note::QUARTER, true).into(),
                    Tuplet::triplet(vec![
                        Note::tick(Note::EIGHTH, false),
                        Note::rest(Note::EIGHTH),
                        Note::tick(Note::EIGHTH, false),
                    ])
                    .unwrap()
                    .into(),
                    Note::tick(Note::QUARTER, false).dotted(1).into(),
                    Note::rest(Note::EIGHTH).into(),
                ],
            ),
            Measure::new_with(TimeSignature::new_with(3, 4).unwrap(), vec![]),
            Measure::new_with(
                TimeSignature::new_with(3, 4).unwrap(),
                vec![Note::tick(Note::HALF, true).dotted(1).into()],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn four_quarter_notes() {
        let rhythm = Rhythm::simple(TimeSignature::COMMON_TIME, true);
        let beats = flatten(&rhythm);
        assert_eq!(beats.len(), 4);
        for (i, beat) in beats.iter().enumerate() {
            assert_eq!(beat.position_in_measure, i);
            assert_eq!(beat.measure_index, 0);
            assert_eq!(beat.duration_signed, 0.25);
            assert_eq!(beat.is_accented, i == 0);
        }
    }

    #[test]
    fn flattening_is_deterministic_and_counts_notes() {
        let rhythm = mixed_rhythm();
        let first = flatten(&rhythm);
        let second = flatten(&rhythm);
        assert_eq!(first, second);
        assert_eq!(first.len(), rhythm.note_count());
        assert_eq!(first.len(), 7, "1 + 3 (tuplet) + 1 + 1 + 0 + 1");
    }

    #[test]
    fn positions_count_notes_not_elements() {
        let beats = flatten(&mixed_rhythm());
        let positions: Vec<(usize, usize)> = beats
            .iter()
            .map(|b| (b.measure_index, b.position_in_measure))
            .collect();
        assert_eq!(
            positions,
            vec![(0, 0), (0, 1), (0, 2), (0, 3), (0, 4), (0, 5), (2, 0)],
            "the empty second measure should contribute nothing"
        );
    }

    #[test]
    fn rest_sign_matches_source_note() {
        let beats = flatten(&mixed_rhythm());
        let rests: Vec<bool> = beats.iter().map(Beat::is_rest).collect();
        assert_eq!(rests, vec![false, false, true, false, false, true, false]);
        for beat in beats.iter() {
            assert_eq!(beat.is_rest(), beat.duration_signed < 0.0);
        }
    }

    #[test]
    fn scaled_and_dotted_durations() {
        let beats = flatten(&mixed_rhythm());
        assert!(approx_eq!(f64, beats[1].duration(), 0.125 * 2.0 / 3.0, ulps = 2));
        assert!(approx_eq!(f64, beats[2].duration_signed, -0.125 * 2.0 / 3.0, ulps = 2));
        assert_eq!(beats[4].duration(), 0.375);
        assert_eq!(beats[6].duration(), 0.75);
    }
}
