//! # Public API
//!
//! Conversion pipelines built from the parser, measure grouping and the renderers.
//!
//! ## Conversion Functions
//!
//! - [`jpw_to_musicxml()`] - JPW document text to MusicXML
//! - [`jpw_to_lilypond()`] - JPW document text to Lilypond
//! - [`jpw_to_events_json()`] - JPW document text to a JSON dump of the resolved events
//! - [`midi_to_jpw()`] - standard MIDI file bytes to JPW document text
//!
//! The `convert_*` variants take an already-read [`JpwDocument`] plus a
//! decoration vocabulary, for callers that load files or YAML themselves.
//!
//! ## Typical Usage
//!
//! ```rust
//! use jpw::jpw_to_musicxml;
//!
//! let source = ".Title\nTitle = {Scale}\nKeyAndMeters = {1=D,4/4}\n.Voice\n1 2 3 4 | 5 6 7 1' |]\n";
//!
//! let conversion = jpw_to_musicxml(source);
//! assert!(conversion.output.contains("<fifths>2</fifths>"));
//! assert!(conversion.diagnostics.is_empty());
//! ```
//!
//! Conversions never fail on malformed notation: problems come back as
//! diagnostics next to the output.

use crate::ast::{Event, Metadata};
use crate::diagnostics::Diagnostic;
use crate::document::{parse_document, JpwDocument};
use crate::error::Result;
use crate::lilypond::to_lilypond;
use crate::midi::{read_midi, to_jpw};
use crate::musicxml::{to_musicxml, RenderOptions};
use crate::parser::{parse_voice, ParseOptions, ParsedVoice};
use crate::semantic::group_measures;
use crate::vocabulary::Vocabulary;
use serde::Serialize;

/// Rendered output plus every diagnostic found on the way
#[derive(Debug, Clone)]
pub struct Conversion {
    pub output: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse a document's voice against its own key and meter.
pub fn parse_document_voice(document: &JpwDocument, vocabulary: &Vocabulary) -> ParsedVoice {
    let options = ParseOptions {
        key: document.metadata.key,
        time: document.metadata.time,
        vocabulary: vocabulary.clone(),
    };
    parse_voice(&document.voice, &options)
}

/// Convert JPW document text to MusicXML with the built-in vocabulary.
pub fn jpw_to_musicxml(source: &str) -> Conversion {
    convert_to_musicxml(
        &parse_document(source),
        &Vocabulary::default(),
        &RenderOptions::default(),
    )
}

pub fn convert_to_musicxml(
    document: &JpwDocument,
    vocabulary: &Vocabulary,
    options: &RenderOptions,
) -> Conversion {
    let voice = parse_document_voice(document, vocabulary);
    let (measures, measure_diagnostics) = group_measures(&voice.events, &document.metadata.time);

    let mut diagnostics = voice.diagnostics;
    diagnostics.extend(measure_diagnostics);

    Conversion {
        output: to_musicxml(&measures, &document.metadata, options),
        diagnostics,
    }
}

/// Convert JPW document text to Lilypond with the built-in vocabulary.
pub fn jpw_to_lilypond(source: &str) -> Conversion {
    convert_to_lilypond(&parse_document(source), &Vocabulary::default())
}

pub fn convert_to_lilypond(document: &JpwDocument, vocabulary: &Vocabulary) -> Conversion {
    let voice = parse_document_voice(document, vocabulary);
    Conversion {
        output: to_lilypond(&voice.events, &document.metadata),
        diagnostics: voice.diagnostics,
    }
}

#[derive(Serialize)]
struct EventDump<'a> {
    metadata: &'a Metadata,
    events: &'a [Event],
    closing_markers: usize,
    diagnostics: &'a [Diagnostic],
}

/// Pretty JSON of the resolved event stream, for inspection and tooling.
pub fn jpw_to_events_json(source: &str) -> Result<String> {
    convert_to_events_json(&parse_document(source), &Vocabulary::default())
}

pub fn convert_to_events_json(document: &JpwDocument, vocabulary: &Vocabulary) -> Result<String> {
    let voice = parse_document_voice(document, vocabulary);
    let dump = EventDump {
        metadata: &document.metadata,
        events: &voice.events,
        closing_markers: voice.closing_markers,
        diagnostics: &voice.diagnostics,
    };
    Ok(serde_json::to_string_pretty(&dump)?)
}

/// Convert standard MIDI file bytes to JPW document text.
///
/// # Errors
/// Returns [`crate::JpwError::MidiError`] if the bytes are not a MIDI file
/// or no track contains notes.
pub fn midi_to_jpw(bytes: &[u8]) -> Result<String> {
    let import = read_midi(bytes)?;
    log::info!(
        "importing {} notes in {} {}",
        import.notes.len(),
        import.metadata.key,
        import.metadata.time
    );
    Ok(to_jpw(&import))
}
