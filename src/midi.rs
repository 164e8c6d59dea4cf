//! MIDI import: the first track that has notes, read as a single melodic
//! line and written out as a JPW document.

use crate::ast::{Accidental, Duration, KeySignature, Metadata, Mode, NoteName, TimeSignature};
use crate::duration::{modifier_text, modifiers_for, written_beats, IMPORT_TOLERANCE};
use crate::error::{JpwError, Result};
use crate::pitch::spell_midi;
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use num_rational::Rational32;
use std::collections::HashMap;

/// Gaps shorter than this fraction of a beat are timing noise, not rests
const REST_THRESHOLD: f64 = 0.05;
const BARS_PER_LINE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportedNote {
    pub key: u8,
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone)]
pub struct MidiImport {
    pub metadata: Metadata,
    pub ticks_per_beat: u32,
    /// Sorted by start tick
    pub notes: Vec<ImportedNote>,
}

/// Parse a standard MIDI file.
pub fn read_midi(bytes: &[u8]) -> Result<MidiImport> {
    let smf = Smf::parse(bytes).map_err(|e| JpwError::MidiError(e.to_string()))?;
    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(ticks) => ticks.as_int() as u32,
        Timing::Timecode(..) => {
            return Err(JpwError::MidiError(
                "timecode-based timing is not supported".to_string(),
            ))
        }
    };
    if ticks_per_beat == 0 {
        return Err(JpwError::MidiError("zero ticks per beat".to_string()));
    }

    let mut meta = MetaInfo::default();
    let mut notes = None;
    for (index, track) in smf.tracks.iter().enumerate() {
        meta.read(track);
        if notes.is_none() {
            let track_notes = collect_notes(track);
            if !track_notes.is_empty() {
                log::info!("using track {} ({} notes)", index, track_notes.len());
                notes = Some(track_notes);
            }
        }
    }
    let notes = notes.ok_or_else(|| JpwError::MidiError("no track contains notes".to_string()))?;

    Ok(MidiImport {
        metadata: meta.into_metadata(),
        ticks_per_beat,
        notes,
    })
}

/// First value of each meta event found across all tracks
#[derive(Debug, Default)]
struct MetaInfo {
    title: Option<String>,
    key: Option<KeySignature>,
    time: Option<TimeSignature>,
    tempo: Option<u16>,
}

impl MetaInfo {
    fn read(&mut self, track: &[TrackEvent]) {
        for event in track {
            let TrackEventKind::Meta(message) = event.kind else {
                continue;
            };
            match message {
                MetaMessage::TrackName(name) if self.title.is_none() => {
                    let name = String::from_utf8_lossy(name).trim().to_string();
                    if !name.is_empty() {
                        self.title = Some(name);
                    }
                }
                MetaMessage::Tempo(micros) if self.tempo.is_none() => {
                    let micros = micros.as_int();
                    if micros > 0 {
                        let bpm = (60_000_000.0 / micros as f64).round();
                        self.tempo = Some(bpm.clamp(1.0, u16::MAX as f64) as u16);
                    }
                }
                MetaMessage::TimeSignature(beats, power, _, _) if self.time.is_none() => {
                    if beats > 0 && power <= 6 {
                        self.time = Some(TimeSignature {
                            beats,
                            beat_type: 1 << power,
                        });
                    }
                }
                MetaMessage::KeySignature(fifths, minor) if self.key.is_none() => {
                    self.key = key_from_fifths(fifths, minor);
                }
                _ => {}
            }
        }
    }

    fn into_metadata(self) -> Metadata {
        Metadata {
            title: self.title,
            composer: None,
            key: self.key.unwrap_or_default(),
            time: self.time.unwrap_or_default(),
            tempo: self.tempo,
        }
    }
}

/// Completed notes of one track, sorted by start
fn collect_notes(track: &[TrackEvent]) -> Vec<ImportedNote> {
    let mut now: u32 = 0;
    let mut sounding: HashMap<u8, u32> = HashMap::new();
    let mut notes = Vec::new();

    for event in track {
        now = now.saturating_add(event.delta.as_int());
        let TrackEventKind::Midi { message, .. } = event.kind else {
            continue;
        };
        match message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                sounding.insert(key.as_int(), now);
            }
            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                if let Some(start) = sounding.remove(&key.as_int()) {
                    notes.push(ImportedNote {
                        key: key.as_int(),
                        start,
                        end: now,
                    });
                }
            }
            _ => {}
        }
    }

    notes.sort_by_key(|note| note.start);
    notes
}

/// Key signature from a MIDI sharps/flats count
pub fn key_from_fifths(fifths: i8, minor: bool) -> Option<KeySignature> {
    const MAJOR: [(NoteName, i8); 15] = [
        (NoteName::C, -1),
        (NoteName::G, -1),
        (NoteName::D, -1),
        (NoteName::A, -1),
        (NoteName::E, -1),
        (NoteName::B, -1),
        (NoteName::F, 0),
        (NoteName::C, 0),
        (NoteName::G, 0),
        (NoteName::D, 0),
        (NoteName::A, 0),
        (NoteName::E, 0),
        (NoteName::B, 0),
        (NoteName::F, 1),
        (NoteName::C, 1),
    ];
    const MINOR: [(NoteName, i8); 15] = [
        (NoteName::A, -1),
        (NoteName::E, -1),
        (NoteName::B, -1),
        (NoteName::F, 0),
        (NoteName::C, 0),
        (NoteName::G, 0),
        (NoteName::D, 0),
        (NoteName::A, 0),
        (NoteName::E, 0),
        (NoteName::B, 0),
        (NoteName::F, 1),
        (NoteName::C, 1),
        (NoteName::G, 1),
        (NoteName::D, 1),
        (NoteName::A, 1),
    ];

    let index = usize::try_from(fifths as i32 + 7).ok()?;
    let (table, mode) = if minor {
        (&MINOR, Mode::Minor)
    } else {
        (&MAJOR, Mode::Major)
    };
    let (root, alter) = *table.get(index)?;
    Some(KeySignature::new(root, alter, mode))
}

fn beats_between(start: u32, end: u32, ticks_per_beat: u32) -> f64 {
    end.saturating_sub(start) as f64 / ticks_per_beat as f64
}

fn duration_for(beats: f64) -> Duration {
    modifiers_for(beats, IMPORT_TOLERANCE).unwrap_or_else(|| {
        log::warn!("{:.3} beats has no JPW spelling; written as a quarter", beats);
        Duration::default()
    })
}

/// JPW tokens with their written lengths
fn voice_tokens(import: &MidiImport) -> Vec<(String, Duration)> {
    let key = &import.metadata.key;
    let mut tokens = Vec::new();
    let mut last_end = 0;

    for note in &import.notes {
        let gap = beats_between(last_end, note.start, import.ticks_per_beat);
        if gap > REST_THRESHOLD {
            let duration = duration_for(gap);
            tokens.push((format!("0{}", modifier_text(&duration)), duration));
        }

        if note.end <= note.start {
            log::debug!("skipping zero-length note {} at tick {}", note.key, note.start);
            continue;
        }

        let duration = duration_for(beats_between(note.start, note.end, import.ticks_per_beat));
        let spelling = spell_midi(note.key as i32, key);
        let mut token = String::new();
        match spelling.accidental {
            Some(Accidental::Sharp) => token.push('#'),
            Some(Accidental::Flat) => token.push('b'),
            _ => {}
        }
        token.push(char::from(b'0' + spelling.degree));
        if spelling.octave_marks > 0 {
            token.push_str(&"'".repeat(spelling.octave_marks as usize));
        } else if spelling.octave_marks < 0 {
            token.push_str(&",".repeat(spelling.octave_marks.unsigned_abs() as usize));
        }
        token.push_str(&modifier_text(&duration));
        tokens.push((token, duration));

        last_end = note.end;
    }

    tokens
}

/// Write an imported melody as a JPW document.
pub fn to_jpw(import: &MidiImport) -> String {
    let metadata = &import.metadata;
    let mut jpw = String::new();

    jpw.push_str(".Title\n");
    if let Some(title) = &metadata.title {
        jpw.push_str(&format!("Title = {{{}}}\n", title));
    }
    jpw.push_str(&format!("KeyAndMeters = {{{},{}}}\n", metadata.key, metadata.time));
    if let Some(tempo) = metadata.tempo {
        jpw.push_str(&format!("Expression = {{J={}}}\n", tempo));
    }
    jpw.push_str("\n.Voice\n");

    let measure = metadata.time.measure_beats();
    let mut filled = Rational32::from_integer(0);
    let mut bars = 0;
    let mut line: Vec<String> = Vec::new();

    for (token, duration) in voice_tokens(import) {
        line.push(token);
        filled += written_beats(&duration);
        if filled >= measure {
            line.push("|".to_string());
            filled = Rational32::from_integer(0);
            bars += 1;
            if bars % BARS_PER_LINE == 0 {
                jpw.push_str(&line.join(" "));
                jpw.push('\n');
                line.clear();
            }
        }
    }
    if !line.is_empty() {
        jpw.push_str(&line.join(" "));
        jpw.push('\n');
    }

    jpw
}
