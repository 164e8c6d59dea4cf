//! # Event Model
//!
//! Format-agnostic types produced by the JPW parser and consumed by the
//! renderers (`musicxml`, `lilypond`) and by measure grouping (`semantic`).
//!
//! ## Type Hierarchy
//! ```text
//! Event (enum, insertion order = musical order)
//!   ├── Note
//!   │     ├── degree / accidental / octave_marks (as written)
//!   │     ├── pitch: ResolvedPitch (step, alter, octave, displayed accidental)
//!   │     ├── duration: Duration (halvings, extensions, dots as written)
//!   │     ├── beats: Rational32 (sounding length, tuplet ratio applied)
//!   │     ├── notated: NotatedDuration (type + dots)
//!   │     ├── tuplet: Option<TupletInfo>
//!   │     └── slur_start / slur_end / accent / ornament
//!   ├── Rest (same duration fields as Note)
//!   ├── Barline { style, repeat, closes, opens }
//!   ├── TupletGroup { actual_notes, normal_notes, members }
//!   ├── Directive { text }
//!   └── ScopeClose { scope }   (owed repeat/volta closings at end of input)
//! ```
//!
//! ## Durations
//! All beat values are exact rationals measured in quarter notes, so a
//! triplet eighth is exactly `1/3` and measure sums never drift.
//!
//! ## Octaves
//! Octave numbers follow scientific pitch notation (middle C = C4). The
//! octave of a degree is taken from its diatonic letter, so in G major
//! degree 4 is C5, not C4.

use num_rational::Rational32;
use serde::Serialize;
use std::fmt;

/// Time signature (e.g., 4/4, 3/4, 6/8)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeSignature {
    pub beats: u8,
    pub beat_type: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            beats: 4,
            beat_type: 4,
        }
    }
}

impl TimeSignature {
    /// Parse a meter string like "3/4".
    pub fn from_str(s: &str) -> Option<Self> {
        let (num, den) = s.trim().split_once('/')?;
        let beats: u8 = num.trim().parse().ok()?;
        let beat_type: u8 = den.trim().parse().ok()?;
        if beats == 0 || !beat_type.is_power_of_two() {
            return None;
        }
        Some(Self { beats, beat_type })
    }

    /// Length of a full measure in quarter-note beats (6/8 = 3).
    pub fn measure_beats(&self) -> Rational32 {
        Rational32::new(self.beats as i32 * 4, self.beat_type as i32)
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.beats, self.beat_type)
    }
}

/// Note letters C through B
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum NoteName {
    #[default]
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl NoteName {
    const ALL: [NoteName; 7] = [
        NoteName::C,
        NoteName::D,
        NoteName::E,
        NoteName::F,
        NoteName::G,
        NoteName::A,
        NoteName::B,
    ];

    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'C' => Some(NoteName::C),
            'D' => Some(NoteName::D),
            'E' => Some(NoteName::E),
            'F' => Some(NoteName::F),
            'G' => Some(NoteName::G),
            'A' => Some(NoteName::A),
            'B' => Some(NoteName::B),
            _ => None,
        }
    }

    /// Position in C D E F G A B (0-6)
    pub fn index(self) -> i32 {
        match self {
            NoteName::C => 0,
            NoteName::D => 1,
            NoteName::E => 2,
            NoteName::F => 3,
            NoteName::G => 4,
            NoteName::A => 5,
            NoteName::B => 6,
        }
    }

    pub fn from_index(index: i32) -> Self {
        Self::ALL[index.rem_euclid(7) as usize]
    }

    /// Semitones above C of the natural letter
    pub fn pitch_class(self) -> i32 {
        match self {
            NoteName::C => 0,
            NoteName::D => 2,
            NoteName::E => 4,
            NoteName::F => 5,
            NoteName::G => 7,
            NoteName::A => 9,
            NoteName::B => 11,
        }
    }

    /// Position of the natural letter on the circle of fifths (F = -1 ... B = 5)
    pub fn fifths(self) -> i32 {
        match self {
            NoteName::F => -1,
            NoteName::C => 0,
            NoteName::G => 1,
            NoteName::D => 2,
            NoteName::A => 3,
            NoteName::E => 4,
            NoteName::B => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NoteName::C => "C",
            NoteName::D => "D",
            NoteName::E => "E",
            NoteName::F => "F",
            NoteName::G => "G",
            NoteName::A => "A",
            NoteName::B => "B",
        }
    }
}

/// Mode for key signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Mode {
    #[default]
    Major,
    Minor,
}

/// Active key, written in JPW as `1=C` (major, degree 1 is C) or
/// `6=A` (minor, the stated root is the tonic).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct KeySignature {
    pub root: NoteName,
    pub root_alter: i8,
    pub mode: Mode,
}

impl KeySignature {
    pub fn new(root: NoteName, root_alter: i8, mode: Mode) -> Self {
        Self {
            root,
            root_alter,
            mode,
        }
    }

    /// Parse a key string like "1=C", "1=Bb", "1=#F" or "6=A".
    /// A bare root ("G", "Eb") is read as major.
    pub fn from_str(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        let (mode, root) = match trimmed.split_once('=') {
            Some((degree, root)) => {
                let mode = match degree.trim() {
                    "1" => Mode::Major,
                    "6" => Mode::Minor,
                    _ => return None,
                };
                (mode, root.trim())
            }
            None => (Mode::Major, trimmed),
        };

        // Accidental may come before or after the letter: "#F", "F#", "bB", "Bb"
        let mut chars = root.chars();
        let (letter, alter) = match (chars.next(), chars.next(), chars.next()) {
            (Some(l), None, None) => (NoteName::from_char(l)?, 0),
            (Some('#'), Some(l), None) => (NoteName::from_char(l)?, 1),
            (Some('b'), Some(l), None) if NoteName::from_char(l).is_some() => {
                (NoteName::from_char(l)?, -1)
            }
            (Some(l), Some('#'), None) => (NoteName::from_char(l)?, 1),
            (Some(l), Some('b'), None) => (NoteName::from_char(l)?, -1),
            _ => return None,
        };
        Some(Self::new(letter, alter, mode))
    }

    /// Number of sharps (positive) or flats (negative) in the signature.
    /// Minor keys use the signature of their relative major.
    pub fn fifths(&self) -> i8 {
        let major = self.root.fifths() + 7 * self.root_alter as i32;
        let fifths = match self.mode {
            Mode::Major => major,
            Mode::Minor => major - 3,
        };
        fifths as i8
    }

    /// MIDI number of the tonic in octave 4
    pub fn root_midi(&self) -> i32 {
        60 + self.root.pitch_class() + self.root_alter as i32
    }

    pub fn root_name(&self) -> String {
        let accidental = match self.root_alter {
            1 => "#",
            -1 => "b",
            _ => "",
        };
        format!("{}{}", self.root.as_str(), accidental)
    }
}

impl fmt::Display for KeySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let degree = match self.mode {
            Mode::Major => 1,
            Mode::Minor => 6,
        };
        write!(f, "{}={}", degree, self.root_name())
    }
}

/// Displayed accidental sign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Accidental {
    Sharp,
    Flat,
    Natural,
}

impl Accidental {
    pub fn musicxml_name(self) -> &'static str {
        match self {
            Accidental::Sharp => "sharp",
            Accidental::Flat => "flat",
            Accidental::Natural => "natural",
        }
    }
}

/// Absolute pitch after key resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedPitch {
    pub step: NoteName,
    pub alter: i8,
    pub octave: i8,
    /// Sign to print in front of the note, if any
    pub accidental: Option<Accidental>,
}

impl ResolvedPitch {
    /// MIDI note number (C4 = 60)
    pub fn midi(&self) -> i32 {
        (self.octave as i32 + 1) * 12 + self.step.pitch_class() + self.alter as i32
    }
}

/// Standard notated duration types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoteType {
    Breve,
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
    SixtyFourth,
}

impl NoteType {
    pub const ALL: [NoteType; 8] = [
        NoteType::Breve,
        NoteType::Whole,
        NoteType::Half,
        NoteType::Quarter,
        NoteType::Eighth,
        NoteType::Sixteenth,
        NoteType::ThirtySecond,
        NoteType::SixtyFourth,
    ];

    /// Undotted length in quarter-note beats
    pub fn beats(self) -> Rational32 {
        match self {
            NoteType::Breve => Rational32::from_integer(8),
            NoteType::Whole => Rational32::from_integer(4),
            NoteType::Half => Rational32::from_integer(2),
            NoteType::Quarter => Rational32::from_integer(1),
            NoteType::Eighth => Rational32::new(1, 2),
            NoteType::Sixteenth => Rational32::new(1, 4),
            NoteType::ThirtySecond => Rational32::new(1, 8),
            NoteType::SixtyFourth => Rational32::new(1, 16),
        }
    }

    /// MusicXML type name
    pub fn musicxml_type(self) -> &'static str {
        match self {
            NoteType::Breve => "breve",
            NoteType::Whole => "whole",
            NoteType::Half => "half",
            NoteType::Quarter => "quarter",
            NoteType::Eighth => "eighth",
            NoteType::Sixteenth => "16th",
            NoteType::ThirtySecond => "32nd",
            NoteType::SixtyFourth => "64th",
        }
    }

    /// Lilypond duration number
    pub fn lilypond_value(self) -> &'static str {
        match self {
            NoteType::Breve => "\\breve",
            NoteType::Whole => "1",
            NoteType::Half => "2",
            NoteType::Quarter => "4",
            NoteType::Eighth => "8",
            NoteType::Sixteenth => "16",
            NoteType::ThirtySecond => "32",
            NoteType::SixtyFourth => "64",
        }
    }
}

/// Notated type plus dot count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NotatedDuration {
    pub note_type: NoteType,
    pub dots: u8,
}

impl Default for NotatedDuration {
    fn default() -> Self {
        Self {
            note_type: NoteType::Quarter,
            dots: 0,
        }
    }
}

/// Duration modifiers as written after a degree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Duration {
    pub halvings: u8,   // _ (each halves the base unit)
    pub extensions: u8, // - (each adds one beat)
    pub dots: u8,       // . (standard augmentation dot)
}

/// Tuplet information for a member (e.g., triplet = 3 notes in the time of 2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TupletInfo {
    pub actual_notes: u8, // Number of notes played (e.g., 3 for triplet)
    pub normal_notes: u8, // Number of notes in normal time (e.g., 2 for triplet)
    pub is_start: bool,   // First member of the group
    pub is_stop: bool,    // Last member of the group
}

impl TupletInfo {
    /// Create tuplet info for a standard tuplet
    pub fn new(actual_notes: u8) -> Self {
        // 2 in the time of 1, 3 in 2, 4 in 3, then 5/6/7... in the time of 4
        let normal_notes = if actual_notes <= 4 {
            actual_notes.saturating_sub(1).max(1)
        } else {
            4
        };
        Self::with_ratio(actual_notes, normal_notes)
    }

    pub fn with_ratio(actual_notes: u8, normal_notes: u8) -> Self {
        Self {
            actual_notes,
            normal_notes,
            is_start: false,
            is_stop: false,
        }
    }

    /// Factor applied to each member's written length
    pub fn scale(&self) -> Rational32 {
        Rational32::new(self.normal_notes as i32, self.actual_notes as i32)
    }

    /// Ratio of a member nested inside `outer`: the two ratios multiplied
    pub fn within(&self, outer: &TupletInfo) -> Self {
        Self::with_ratio(
            self.actual_notes.saturating_mul(outer.actual_notes),
            self.normal_notes.saturating_mul(outer.normal_notes),
        )
    }
}

/// Ornament marks a decoration can attach to a note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Ornament {
    Prall,
    Mordent,
    Trill,
    Turn,
    Fermata,
}

/// A resolved note
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    pub degree: u8,
    pub accidental: Option<Accidental>, // Explicit # or b as written
    pub octave_marks: i8,               // ' = +1, , = -1
    pub pitch: ResolvedPitch,
    pub duration: Duration,
    pub beats: Rational32,
    pub notated: NotatedDuration,
    pub tuplet: Option<TupletInfo>,
    pub slur_start: bool,
    pub slur_end: bool,
    pub accent: bool,
    pub ornament: Option<Ornament>,
}

/// A resolved rest (degree 0)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rest {
    pub duration: Duration,
    pub beats: Rational32,
    pub notated: NotatedDuration,
    pub tuplet: Option<TupletInfo>,
}

/// Visual barline style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BarStyle {
    Regular,
    LightLight,
    LightHeavy,
    HeavyLight,
    HeavyHeavy,
}

impl BarStyle {
    pub fn musicxml_name(self) -> &'static str {
        match self {
            BarStyle::Regular => "regular",
            BarStyle::LightLight => "light-light",
            BarStyle::LightHeavy => "light-heavy",
            BarStyle::HeavyLight => "heavy-light",
            BarStyle::HeavyHeavy => "heavy-heavy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RepeatDirection {
    Forward,
    Backward,
    Both,
}

impl RepeatDirection {
    pub fn is_forward(self) -> bool {
        matches!(self, RepeatDirection::Forward | RepeatDirection::Both)
    }

    pub fn is_backward(self) -> bool {
        matches!(self, RepeatDirection::Backward | RepeatDirection::Both)
    }
}

/// An open repeat structure that owes a closing marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Scope {
    Repeat,
    Volta(u8),
}

/// A barline and the repeat/volta scopes it closes and opens
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Barline {
    pub style: BarStyle,
    pub repeat: Option<RepeatDirection>,
    /// Scopes closed here, innermost first
    pub closes: Vec<Scope>,
    /// Scopes opened here, outermost first
    pub opens: Vec<Scope>,
}

impl Barline {
    pub fn plain(style: BarStyle) -> Self {
        Self {
            style,
            repeat: None,
            closes: Vec::new(),
            opens: Vec::new(),
        }
    }

    /// Volta number this barline starts, if any
    pub fn volta_opened(&self) -> Option<u8> {
        self.opens.iter().find_map(|scope| match scope {
            Scope::Volta(n) => Some(*n),
            Scope::Repeat => None,
        })
    }

    /// Volta number this barline ends, if any
    pub fn volta_closed(&self) -> Option<u8> {
        self.closes.iter().find_map(|scope| match scope {
            Scope::Volta(n) => Some(*n),
            Scope::Repeat => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TupletGroup {
    pub actual_notes: u8,
    pub normal_notes: u8,
    pub members: Vec<Event>,
}

/// Verbatim `$(...)` text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Directive {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Note(Note),
    Rest(Rest),
    Barline(Barline),
    TupletGroup(TupletGroup),
    Directive(Directive),
    ScopeClose { scope: Scope },
}

impl Event {
    /// Sounding length in quarter-note beats (zero for structural events)
    pub fn beats(&self) -> Rational32 {
        match self {
            Event::Note(note) => note.beats,
            Event::Rest(rest) => rest.beats,
            Event::TupletGroup(group) => group.members.iter().map(Event::beats).sum(),
            Event::Barline(_) | Event::Directive(_) | Event::ScopeClose { .. } => {
                Rational32::from_integer(0)
            }
        }
    }

    pub fn is_musical(&self) -> bool {
        matches!(
            self,
            Event::Note(_) | Event::Rest(_) | Event::TupletGroup(_)
        )
    }
}

/// Document metadata from the `.Title` section
#[derive(Debug, Clone, Default, Serialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub composer: Option<String>,
    pub key: KeySignature,
    pub time: TimeSignature,
    pub tempo: Option<u16>, // Quarter-note BPM
}

/// One bar of music, bounded by barlines
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measure {
    pub number: usize,
    /// Barline in front of the measure: a copy of the previous right barline
    /// when that one opens a scope, or a barline written before any content
    pub left: Option<Barline>,
    pub events: Vec<Event>,
    pub right: Option<Barline>,
    /// Scopes still open at end of input, closed after this measure
    pub closes: Vec<Scope>,
}

impl Measure {
    pub fn beats(&self) -> Rational32 {
        self.events.iter().map(Event::beats).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_from_str() {
        assert_eq!(
            KeySignature::from_str("1=C"),
            Some(KeySignature::new(NoteName::C, 0, Mode::Major))
        );
        assert_eq!(
            KeySignature::from_str("1=Bb"),
            Some(KeySignature::new(NoteName::B, -1, Mode::Major))
        );
        assert_eq!(
            KeySignature::from_str("1=#F"),
            Some(KeySignature::new(NoteName::F, 1, Mode::Major))
        );
        assert_eq!(
            KeySignature::from_str("6=a"),
            Some(KeySignature::new(NoteName::A, 0, Mode::Minor))
        );
        assert_eq!(KeySignature::from_str("3=C"), None);
        assert_eq!(KeySignature::from_str("1=H"), None);
    }

    #[test]
    fn test_key_fifths() {
        assert_eq!(KeySignature::from_str("1=C").unwrap().fifths(), 0);
        assert_eq!(KeySignature::from_str("1=F").unwrap().fifths(), -1);
        assert_eq!(KeySignature::from_str("1=D").unwrap().fifths(), 2);
        assert_eq!(KeySignature::from_str("1=Eb").unwrap().fifths(), -3);
        assert_eq!(KeySignature::from_str("6=A").unwrap().fifths(), 0);
        assert_eq!(KeySignature::from_str("6=E").unwrap().fifths(), 1);
        assert_eq!(KeySignature::from_str("6=D").unwrap().fifths(), -1);
    }

    #[test]
    fn test_key_display() {
        assert_eq!(KeySignature::from_str("1=#F").unwrap().to_string(), "1=F#");
        assert_eq!(KeySignature::from_str("6=A").unwrap().to_string(), "6=A");
    }

    #[test]
    fn test_time_signature() {
        let ts = TimeSignature::from_str("6/8").unwrap();
        assert_eq!(ts.measure_beats(), Rational32::from_integer(3));
        assert_eq!(TimeSignature::from_str("3/5"), None);
        assert_eq!(TimeSignature::from_str("x/4"), None);
    }

    #[test]
    fn test_tuplet_info_ratio() {
        assert_eq!(TupletInfo::new(3).normal_notes, 2);
        assert_eq!(TupletInfo::new(5).normal_notes, 4);
        assert_eq!(TupletInfo::new(2).normal_notes, 1);
        assert_eq!(TupletInfo::new(3).scale(), Rational32::new(2, 3));
    }

    #[test]
    fn test_tuplet_info_within() {
        let nested = TupletInfo::new(3).within(&TupletInfo::new(3));
        assert_eq!((nested.actual_notes, nested.normal_notes), (9, 4));
        assert_eq!(nested.scale(), Rational32::new(4, 9));
    }

    #[test]
    fn test_pitch_midi() {
        let pitch = ResolvedPitch {
            step: NoteName::B,
            alter: -1,
            octave: 4,
            accidental: None,
        };
        assert_eq!(pitch.midi(), 70);
    }
}
