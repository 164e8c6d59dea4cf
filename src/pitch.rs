//! # Pitch Resolver
//!
//! Turns a scale degree (1-7), an optional written accidental and a count of
//! octave marks into an absolute pitch for the active key.
//!
//! Degree 1 sits in octave 4 (the tonic nearest above middle C's octave
//! start). Each higher degree takes the next letter; the octave number comes
//! from that letter, so the C after B always starts a new octave regardless
//! of key.
//!
//! ## Written accidentals
//! - Degree not altered by the key: `#`/`b` raise/lower it and are displayed.
//! - Degree already altered by the key: any written `#`/`b` cancels the key's
//!   alteration and the note is printed with a natural sign. In F major, `#4`
//!   is B natural, never B double-sharp.

use crate::ast::{Accidental, KeySignature, Mode, NoteName, ResolvedPitch};

const MAJOR_INTERVALS: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];
const NATURAL_MINOR_INTERVALS: [i32; 7] = [0, 2, 3, 5, 7, 8, 10];

/// Reference octave for unmarked degree 1
pub const REFERENCE_OCTAVE: i32 = 4;

/// Octave range MusicXML accepts; octave marks beyond it pin to the edge
const OCTAVE_RANGE: (i32, i32) = (0, 9);

fn intervals(mode: Mode) -> &'static [i32; 7] {
    match mode {
        Mode::Major => &MAJOR_INTERVALS,
        Mode::Minor => &NATURAL_MINOR_INTERVALS,
    }
}

/// Letter, octave bucket and the alteration the key applies to a degree
fn diatonic(degree: u8, key: &KeySignature) -> (NoteName, i32, i32) {
    let letter_index = key.root.index() + degree as i32 - 1;
    let letter = NoteName::from_index(letter_index);
    let bucket = REFERENCE_OCTAVE + letter_index / 7;

    let natural_midi = (bucket + 1) * 12 + letter.pitch_class();
    let scale_midi = key.root_midi() + intervals(key.mode)[degree as usize - 1];
    (letter, bucket, scale_midi - natural_midi)
}

/// Semitone change the key signature applies to `degree` (0 when unaltered)
pub fn key_alteration(degree: u8, key: &KeySignature) -> i32 {
    if !(1..=7).contains(&degree) {
        return 0;
    }
    diatonic(degree, key).2
}

/// Resolve a degree to an absolute pitch. Returns `None` for rests (0) and
/// degrees outside 1-7.
pub fn resolve(
    degree: u8,
    accidental: Option<Accidental>,
    octave_marks: i8,
    key: &KeySignature,
) -> Option<ResolvedPitch> {
    if !(1..=7).contains(&degree) {
        return None;
    }

    let (step, bucket, key_alter) = diatonic(degree, key);
    let written = match accidental {
        Some(Accidental::Sharp) => 1,
        Some(Accidental::Flat) => -1,
        Some(Accidental::Natural) | None => 0,
    };

    let (alter, display) = if key_alter == 0 {
        let display = match written {
            1 => Some(Accidental::Sharp),
            -1 => Some(Accidental::Flat),
            _ => None,
        };
        (written, display)
    } else if written == 0 {
        (key_alter, None)
    } else {
        (0, Some(Accidental::Natural))
    };

    Some(ResolvedPitch {
        step,
        alter: alter as i8,
        octave: (bucket + octave_marks as i32).clamp(OCTAVE_RANGE.0, OCTAVE_RANGE.1) as i8,
        accidental: display,
    })
}

/// Degree spelling of a MIDI note in `key`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DegreeSpelling {
    pub degree: u8,
    pub accidental: Option<Accidental>,
    pub octave_marks: i8,
}

/// Spell a MIDI note number as a degree of `key`. Scale tones need no
/// accidental; other tones are written as `#` of the degree below, or `b`
/// of the degree above when that spelling does not land on the pitch.
pub fn spell_midi(midi: i32, key: &KeySignature) -> DegreeSpelling {
    let pitch_class = midi.rem_euclid(12);
    let lands = |degree: u8, accidental: Option<Accidental>| {
        resolve(degree, accidental, 0, key)
            .filter(|pitch| pitch.midi().rem_euclid(12) == pitch_class)
            .map(|pitch| (degree, accidental, pitch.midi()))
    };

    let candidate = (1..=7u8)
        .find_map(|degree| lands(degree, None))
        .or_else(|| (1..=7u8).find_map(|degree| lands(degree, Some(Accidental::Sharp))))
        .or_else(|| (1..=7u8).find_map(|degree| lands(degree, Some(Accidental::Flat))));

    match candidate {
        Some((degree, accidental, base_midi)) => DegreeSpelling {
            degree,
            accidental,
            octave_marks: ((midi - base_midi) / 12) as i8,
        },
        // Every pitch class is reachable from a diatonic degree by one semitone
        None => DegreeSpelling {
            degree: 1,
            accidental: None,
            octave_marks: 0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> KeySignature {
        KeySignature::from_str(s).unwrap()
    }

    #[test]
    fn test_c_major_scale() {
        let k = key("1=C");
        let steps: Vec<_> = (1..=7)
            .map(|d| resolve(d, None, 0, &k).unwrap())
            .map(|p| (p.step, p.alter, p.octave))
            .collect();
        assert_eq!(
            steps,
            vec![
                (NoteName::C, 0, 4),
                (NoteName::D, 0, 4),
                (NoteName::E, 0, 4),
                (NoteName::F, 0, 4),
                (NoteName::G, 0, 4),
                (NoteName::A, 0, 4),
                (NoteName::B, 0, 4),
            ]
        );
    }

    #[test]
    fn test_octave_wraps_at_c() {
        // G major: 4 is C5, not C4
        let k = key("1=G");
        let p = resolve(4, None, 0, &k).unwrap();
        assert_eq!((p.step, p.octave), (NoteName::C, 5));
        let p = resolve(7, None, 0, &k).unwrap();
        assert_eq!((p.step, p.alter, p.octave), (NoteName::F, 1, 5));
    }

    #[test]
    fn test_octave_marks() {
        let k = key("1=C");
        assert_eq!(resolve(1, None, 1, &k).unwrap().octave, 5);
        assert_eq!(resolve(1, None, -2, &k).unwrap().octave, 2);
    }

    #[test]
    fn test_octave_marks_pin_to_range() {
        let k = key("1=C");
        assert_eq!(resolve(1, None, 5, &k).unwrap().octave, 9);
        assert_eq!(resolve(1, None, 127, &k).unwrap().octave, 9);
        assert_eq!(resolve(1, None, -128, &k).unwrap().octave, 0);
        assert_eq!(resolve(7, None, i8::MAX, &key("1=G")).unwrap().octave, 9);
    }

    #[test]
    fn test_rest_and_invalid_degrees() {
        let k = key("1=C");
        assert_eq!(resolve(0, None, 0, &k), None);
        assert_eq!(resolve(8, None, 0, &k), None);
    }

    #[test]
    fn test_explicit_sharp_in_c() {
        let p = resolve(4, Some(Accidental::Sharp), 0, &key("1=C")).unwrap();
        assert_eq!((p.step, p.alter), (NoteName::F, 1));
        assert_eq!(p.accidental, Some(Accidental::Sharp));
        assert_eq!(p.midi(), 66);
    }

    #[test]
    fn test_sharp_cancels_key_flat() {
        // F major flats B; #4 is a natural B
        let p = resolve(4, Some(Accidental::Sharp), 0, &key("1=F")).unwrap();
        assert_eq!(p.step, NoteName::B);
        assert_eq!(p.alter, 0);
        assert_eq!(p.accidental, Some(Accidental::Natural));
    }

    #[test]
    fn test_duplicate_flat_cancels_too() {
        let p = resolve(4, Some(Accidental::Flat), 0, &key("1=F")).unwrap();
        assert_eq!(p.alter, 0);
        assert_eq!(p.accidental, Some(Accidental::Natural));
    }

    #[test]
    fn test_key_alteration_without_accidental() {
        let p = resolve(4, None, 0, &key("1=F")).unwrap();
        assert_eq!((p.step, p.alter, p.accidental), (NoteName::B, -1, None));
        assert_eq!(key_alteration(4, &key("1=F")), -1);
        assert_eq!(key_alteration(1, &key("1=F")), 0);
    }

    #[test]
    fn test_minor_key_uses_natural_minor() {
        // E minor: F sharp, no D sharp
        let k = key("6=E");
        let p = resolve(2, None, 0, &k).unwrap();
        assert_eq!((p.step, p.alter), (NoteName::F, 1));
        let p = resolve(7, None, 0, &k).unwrap();
        assert_eq!((p.step, p.alter, p.octave), (NoteName::D, 0, 5));
        // harmonic-minor leading tone needs an explicit sharp
        let p = resolve(7, Some(Accidental::Sharp), 0, &k).unwrap();
        assert_eq!((p.step, p.alter), (NoteName::D, 1));
    }

    #[test]
    fn test_flat_root() {
        let k = key("1=Eb");
        let p = resolve(1, None, 0, &k).unwrap();
        assert_eq!((p.step, p.alter, p.octave), (NoteName::E, -1, 4));
        let p = resolve(4, None, 0, &k).unwrap();
        assert_eq!((p.step, p.alter, p.octave), (NoteName::A, -1, 4));
        let p = resolve(6, None, 0, &k).unwrap();
        assert_eq!((p.step, p.alter, p.octave), (NoteName::C, 0, 5));
    }

    #[test]
    fn test_spell_scale_tones() {
        let k = key("1=D");
        assert_eq!(
            spell_midi(62, &k),
            DegreeSpelling { degree: 1, accidental: None, octave_marks: 0 }
        );
        assert_eq!(
            spell_midi(73 + 12, &k),
            DegreeSpelling { degree: 7, accidental: None, octave_marks: 1 }
        );
        assert_eq!(
            spell_midi(50, &k),
            DegreeSpelling { degree: 1, accidental: None, octave_marks: -1 }
        );
    }

    #[test]
    fn test_spell_chromatic_tones_round_trip() {
        for k in ["1=C", "1=F", "1=D", "1=Bb", "6=A", "6=E"] {
            let k = key(k);
            for midi in 48..84 {
                let s = spell_midi(midi, &k);
                let p = resolve(s.degree, s.accidental, s.octave_marks, &k).unwrap();
                assert_eq!(p.midi(), midi, "key {} midi {}", k, midi);
            }
        }
    }
}
