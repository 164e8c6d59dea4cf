//! Integration tests for the JPW converters
//!
//! Tests the full pipelines from JPW documents (or MIDI files) to output text.

use jpw::{
    convert_to_lilypond, convert_to_musicxml, group_measures, jpw_to_events_json,
    jpw_to_lilypond, jpw_to_musicxml, midi_to_jpw, parse_voice, read_document, DiagnosticKind,
    Event, JpwError, KeySignature, NoteName, NoteType, ParseOptions, RenderOptions, TimeSignature,
    Vocabulary,
};
use num_rational::Rational32;
use pretty_assertions::assert_eq;
use std::io::Write;

const JASMINE: &str = r#".Options
PageSize=A4
.Title
Title = {Jasmine Flower}
WordsByAndMusicBy = {Jiangsu folk song}
KeyAndMeters = {1=F,2/4}
Expression = {J=72}
.Voice
// first phrase
3 3_ 5_ | 6_ 1'_ 1'_ 6_ | 5 5_ 6_ | 5- |
$(rit.) (3 2_ 1_) | {(3}2_ 3_ 5_) 3 | 1- |]
.Words
hao yi duo mei li de mo li hua
"#;

fn notes(events: &[Event]) -> Vec<&jpw::Note> {
    let mut out = Vec::new();
    for event in events {
        match event {
            Event::Note(note) => out.push(note),
            Event::TupletGroup(group) => out.extend(notes(&group.members)),
            _ => {}
        }
    }
    out
}

#[test]
fn test_document_to_musicxml() {
    let conversion = jpw_to_musicxml(JASMINE);
    let xml = &conversion.output;
    assert!(xml.contains("<work-title>Jasmine Flower</work-title>"));
    assert!(xml.contains("<creator type=\"composer\">Jiangsu folk song</creator>"));
    assert!(xml.contains("<fifths>-1</fifths>"));
    assert!(xml.contains("<beats>2</beats>"));
    assert!(xml.contains("<per-minute>72</per-minute>"));
    assert!(xml.contains("<words>rit.</words>"));
    assert!(xml.contains("<slur type=\"start\" number=\"1\"/>"));
    assert!(xml.contains("<actual-notes>3</actual-notes>"));
    assert_eq!(xml.matches("<measure number=").count(), 7);
    assert!(conversion.diagnostics.is_empty(), "{:?}", conversion.diagnostics);
}

#[test]
fn test_document_to_lilypond() {
    let conversion = jpw_to_lilypond(JASMINE);
    let ly = &conversion.output;
    assert!(ly.contains("title = \"Jasmine Flower\""));
    assert!(ly.contains("\\key f \\major"));
    assert!(ly.contains("\\time 2/4"));
    assert!(ly.contains("a'4 a'8 c''8"));
    assert!(ly.contains("\\tuplet 3/2 { g'8 a'8 c''8 }"));
    assert!(ly.contains("\\bar \"|.\""));
}

#[test]
fn test_events_json_dump() {
    let json = jpw_to_events_json(JASMINE).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["metadata"]["tempo"], 72);
    assert_eq!(value["closing_markers"], 0);
    assert_eq!(value["events"][0]["type"], "note");
}

#[test]
fn test_duration_modifiers() {
    let voice = parse_voice("1_ 1- 1. 1__ 1_. 1--", &ParseOptions::default());
    let beats: Vec<Rational32> = notes(&voice.events).iter().map(|n| n.beats).collect();
    assert_eq!(
        beats,
        vec![
            Rational32::new(1, 2),
            Rational32::from_integer(2),
            Rational32::new(3, 2),
            Rational32::new(1, 4),
            Rational32::new(3, 4),
            Rational32::from_integer(3),
        ]
    );
    let types: Vec<(NoteType, u8)> = notes(&voice.events)
        .iter()
        .map(|n| (n.notated.note_type, n.notated.dots))
        .collect();
    assert_eq!(
        types,
        vec![
            (NoteType::Eighth, 0),
            (NoteType::Half, 0),
            (NoteType::Quarter, 1),
            (NoteType::Sixteenth, 0),
            (NoteType::Eighth, 1),
            (NoteType::Half, 1),
        ]
    );
}

#[test]
fn test_key_aware_pitches() {
    let options = ParseOptions {
        key: KeySignature::from_str("1=D").unwrap(),
        ..ParseOptions::default()
    };
    let voice = parse_voice("1 3 7 b7 1'", &options);
    let pitches: Vec<(NoteName, i8, i8)> = notes(&voice.events)
        .iter()
        .map(|n| (n.pitch.step, n.pitch.alter, n.pitch.octave))
        .collect();
    assert_eq!(
        pitches,
        vec![
            (NoteName::D, 0, 4),
            (NoteName::F, 1, 4),
            (NoteName::C, 1, 5),
            (NoteName::C, 0, 5),
            (NoteName::D, 0, 5),
        ]
    );
}

#[test]
fn test_repeats_balance_through_measures() {
    let text = "|: 1 2 3 4 |[1. 5 6 7 1' :| |[2. 1 2 3 4 |]";
    let voice = parse_voice(text, &ParseOptions::default());
    assert_eq!(voice.closing_markers, 0);
    let (measures, diagnostics) = group_measures(&voice.events, &TimeSignature::default());
    assert_eq!(measures.len(), 3);
    assert!(diagnostics.is_empty());
}

#[test]
fn test_recovery_keeps_going() {
    let voice = parse_voice("1 ? 2 ) 8 3{Nope}", &ParseOptions::default());
    assert_eq!(notes(&voice.events).len(), 3);
    let kinds: Vec<DiagnosticKind> = voice.diagnostics.iter().map(|d| d.kind).collect();
    assert_eq!(
        kinds,
        vec![
            DiagnosticKind::UnknownCharacter,
            DiagnosticKind::UnmatchedSlurClose,
            DiagnosticKind::UnknownDegree,
            DiagnosticKind::UnknownDecoration,
        ]
    );
}

#[test]
fn test_read_utf16_file_with_vocabulary_file() {
    let source = ".Title\nKeyAndMeters = {6=A,3/4}\n.Voice\n1{Chan} 2 3\n";
    let mut jpw_file = tempfile::NamedTempFile::new().unwrap();
    jpw_file.write_all(&[0xFF, 0xFE]).unwrap();
    let units: Vec<u8> = source.encode_utf16().flat_map(u16::to_le_bytes).collect();
    jpw_file.write_all(&units).unwrap();

    let mut yaml_file = tempfile::NamedTempFile::new().unwrap();
    yaml_file.write_all(b"decorations:\n  Chan: fermata\n").unwrap();

    let document = read_document(jpw_file.path()).unwrap();
    let vocabulary = Vocabulary::load(yaml_file.path()).unwrap();

    let conversion = convert_to_musicxml(&document, &vocabulary, &RenderOptions { divisions: 4 });
    assert!(conversion.output.contains("<mode>minor</mode>"));
    assert!(conversion.output.contains("<fermata/>"));
    assert!(conversion.output.contains("<divisions>4</divisions>"));
    assert!(conversion.output.contains("<step>A</step>"));

    let ly = convert_to_lilypond(&document, &vocabulary).output;
    assert!(ly.contains("\\key a \\minor"));
    assert!(ly.contains("a'4\\fermata b'4 c''4"));
}

#[test]
fn test_missing_input_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = read_document(&dir.path().join("nope.jpw"));
    assert!(matches!(result, Err(JpwError::InputUnavailable { .. })));
}

#[test]
fn test_midi_to_jpw_round_trip() {
    use midly::{
        Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind,
    };

    let mut track = vec![
        TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Meta(MetaMessage::KeySignature(-1, false)),
        },
        TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(600_000u32.into())),
        },
    ];
    // F4 G4 A4 Bb4 as quarters, then C5 as a half
    for (key, length) in [(65u8, 96u32), (67, 96), (69, 96), (70, 96), (72, 192)] {
        track.push(TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Midi {
                channel: 0u8.into(),
                message: MidiMessage::NoteOn {
                    key: key.into(),
                    vel: 80u8.into(),
                },
            },
        });
        track.push(TrackEvent {
            delta: length.into(),
            kind: TrackEventKind::Midi {
                channel: 0u8.into(),
                message: MidiMessage::NoteOff {
                    key: key.into(),
                    vel: 0u8.into(),
                },
            },
        });
    }
    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let smf = Smf {
        header: Header::new(Format::SingleTrack, Timing::Metrical(96u16.into())),
        tracks: vec![track],
    };
    let mut bytes = Vec::new();
    smf.write_std(&mut bytes).unwrap();

    let jpw = midi_to_jpw(&bytes).unwrap();
    assert!(jpw.contains("KeyAndMeters = {1=F,4/4}"));
    assert!(jpw.contains("Expression = {J=100}"));
    assert!(jpw.contains("1 2 3 4 | 5-\n"));

    let conversion = jpw_to_musicxml(&jpw);
    assert!(conversion.output.contains("<fifths>-1</fifths>"));
    assert!(conversion.output.contains("<type>half</type>"));
    assert!(conversion.diagnostics.is_empty());
}
