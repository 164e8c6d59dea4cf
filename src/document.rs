//! # Document Module
//!
//! Reads `.jpw` files: byte decoding, section splitting and `.Title` metadata.
//!
//! ## Layout
//! A JPW file is a list of sections, each introduced by a line starting
//! with `.`:
//! ```text
//! .Title
//! Title = {Jasmine Flower}
//! KeyAndMeters = {1=F,2/4}
//! Expression = {J=72}
//! .Voice
//! 3 3_ 5_ 6_ 1'_ 1'_ 6_ | 5 5_ 6_ 5- |
//! ```
//! Only `.Title` and `.Voice` carry anything the converters use. The other
//! known sections (`.Options`, `.Fonts`, `.Words`, `.Attachments`, `.Page`)
//! are skipped, as are blank lines and `//` comment lines.
//!
//! ## Encodings
//! UTF-16 with a byte order mark, UTF-8 with or without one, BOM-less
//! UTF-16LE and finally GBK are accepted. Anything else is `JpwError::Decode`.

use crate::ast::{KeySignature, Metadata, TimeSignature};
use crate::error::{JpwError, Result};
use encoding_rs::GBK;
use std::fs;
use std::path::Path;

/// A decoded JPW file
#[derive(Debug, Clone, Default)]
pub struct JpwDocument {
    pub metadata: Metadata,
    /// `.Voice` lines joined with `\n`
    pub voice: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Options,
    Fonts,
    Title,
    Voice,
    Words,
    Attachments,
    Page,
}

impl Section {
    fn from_header(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "options" => Some(Section::Options),
            "fonts" => Some(Section::Fonts),
            "title" => Some(Section::Title),
            "voice" => Some(Section::Voice),
            "words" => Some(Section::Words),
            "attachments" => Some(Section::Attachments),
            "page" => Some(Section::Page),
            _ => None,
        }
    }
}

/// Read and decode a JPW file from disk.
pub fn read_document(path: &Path) -> Result<JpwDocument> {
    let bytes = fs::read(path).map_err(|source| JpwError::InputUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    let text = decode(&bytes).ok_or_else(|| JpwError::Decode {
        path: path.to_path_buf(),
    })?;
    log::info!("read {} ({} bytes)", path.display(), bytes.len());
    Ok(parse_document(&text))
}

/// Decode file bytes, trying UTF-16 with BOM, UTF-8, BOM-less UTF-16LE, then GBK.
pub fn decode(bytes: &[u8]) -> Option<String> {
    if let Some(body) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        log::debug!("decoding as UTF-16LE (BOM)");
        return decode_utf16(body, u16::from_le_bytes);
    }
    if let Some(body) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        log::debug!("decoding as UTF-16BE (BOM)");
        return decode_utf16(body, u16::from_be_bytes);
    }

    let body = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(body) {
        if !text.contains('\0') {
            log::debug!("decoding as UTF-8");
            return Some(text.to_string());
        }
    }

    if looks_like_utf16le(bytes) {
        log::debug!("decoding as UTF-16LE (no BOM)");
        if let Some(text) = decode_utf16(bytes, u16::from_le_bytes) {
            return Some(text);
        }
    }

    let (text, had_errors) = GBK.decode_without_bom_handling(bytes);
    if had_errors {
        return None;
    }
    log::debug!("decoding as GBK");
    Some(text.into_owned())
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    char::decode_utf16(units).collect::<std::result::Result<String, _>>().ok()
}

/// Even length and mostly zero high bytes
fn looks_like_utf16le(bytes: &[u8]) -> bool {
    if bytes.is_empty() || bytes.len() % 2 != 0 {
        return false;
    }
    let zero_high = bytes.iter().skip(1).step_by(2).filter(|b| **b == 0).count();
    zero_high * 2 >= bytes.len() / 2
}

/// Split decoded text into sections and read the metadata.
pub fn parse_document(text: &str) -> JpwDocument {
    let mut section = None;
    let mut title_lines = Vec::new();
    let mut voice_lines = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }
        if let Some(name) = line.strip_prefix('.') {
            section = Section::from_header(name);
            if section.is_none() {
                log::debug!("skipping unknown section '{}'", name.trim());
            }
            continue;
        }
        match section {
            Some(Section::Title) => title_lines.push(line),
            Some(Section::Voice) => voice_lines.push(line),
            _ => {}
        }
    }

    let metadata = parse_title(&title_lines);
    log::debug!(
        "document: key {}, time {}, {} voice lines",
        metadata.key,
        metadata.time,
        voice_lines.len()
    );
    JpwDocument {
        metadata,
        voice: voice_lines.join("\n"),
    }
}

/// Read `Name = value` entries from the `.Title` section.
/// Malformed values are logged and leave the defaults in place.
pub fn parse_title(lines: &[&str]) -> Metadata {
    let mut metadata = Metadata::default();
    for line in lines {
        if let Err(e) = apply_title_entry(&mut metadata, line) {
            log::warn!("{}", e);
        }
    }
    metadata
}

fn apply_title_entry(metadata: &mut Metadata, line: &str) -> Result<()> {
    let Some((name, value)) = line.split_once('=') else {
        return Ok(());
    };
    let value = strip_braces(value);

    match name.trim().to_ascii_lowercase().as_str() {
        "keyandmeters" => {
            let (key, time) = parse_key_and_meters(value)?;
            metadata.key = key;
            metadata.time = time;
        }
        "title" => {
            if !value.is_empty() {
                metadata.title = Some(value.to_string());
            }
        }
        "wordsbyandmusicby" => {
            if !value.is_empty() {
                metadata.composer = Some(value.to_string());
            }
        }
        "expression" => metadata.tempo = Some(parse_tempo(value)?),
        _ => {}
    }
    Ok(())
}

fn strip_braces(value: &str) -> &str {
    let value = value.trim();
    let value = value.strip_prefix('{').unwrap_or(value);
    value.strip_suffix('}').unwrap_or(value).trim()
}

/// "1=C,4/4" or "6=A,3/4"
fn parse_key_and_meters(value: &str) -> Result<(KeySignature, TimeSignature)> {
    let (key, time) = value
        .split_once(',')
        .ok_or_else(|| JpwError::MetadataError(format!("KeyAndMeters '{}' needs key and meter", value)))?;
    let key = KeySignature::from_str(key)
        .ok_or_else(|| JpwError::MetadataError(format!("unknown key '{}'", key.trim())))?;
    let time = TimeSignature::from_str(time)
        .ok_or_else(|| JpwError::MetadataError(format!("unknown meter '{}'", time.trim())))?;
    Ok((key, time))
}

/// "J=120" (quarter-note beats per minute)
fn parse_tempo(value: &str) -> Result<u16> {
    let bpm = value
        .split_once('=')
        .filter(|(unit, _)| unit.trim().eq_ignore_ascii_case("j"))
        .and_then(|(_, bpm)| bpm.trim().parse::<u16>().ok())
        .filter(|bpm| *bpm > 0);
    bpm.ok_or_else(|| JpwError::MetadataError(format!("unknown tempo expression '{}'", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Mode, NoteName};
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const SAMPLE: &str = ".Options\nFont=Song\n.Title\nTitle = {Jasmine Flower}\nWordsByAndMusicBy = {Folk song}\nKeyAndMeters = {1=F,2/4}\nExpression = {J=72}\n\n.Voice\n// intro\n3 3_ 5_ |\n6_ 1'_ 5 |\n.Words\nhao yi duo\n";

    #[test]
    fn test_sections_and_metadata() {
        let doc = parse_document(SAMPLE);
        assert_eq!(doc.voice, "3 3_ 5_ |\n6_ 1'_ 5 |");
        assert_eq!(doc.metadata.title.as_deref(), Some("Jasmine Flower"));
        assert_eq!(doc.metadata.composer.as_deref(), Some("Folk song"));
        assert_eq!(doc.metadata.key, KeySignature::new(NoteName::F, 0, Mode::Major));
        assert_eq!(doc.metadata.time, TimeSignature { beats: 2, beat_type: 4 });
        assert_eq!(doc.metadata.tempo, Some(72));
    }

    #[test]
    fn test_minor_key_and_lowercase_header() {
        let doc = parse_document(".title\nKeyAndMeters={6=bB,3/8}\n.voice\n6\n");
        assert_eq!(doc.metadata.key, KeySignature::new(NoteName::B, -1, Mode::Minor));
        assert_eq!(doc.metadata.time, TimeSignature { beats: 3, beat_type: 8 });
        assert_eq!(doc.voice, "6");
    }

    #[test]
    fn test_bad_metadata_keeps_defaults() {
        let doc = parse_document(".Title\nKeyAndMeters = {1=H,4/4}\nExpression = {fast}\n.Voice\n1\n");
        assert_eq!(doc.metadata.key, KeySignature::default());
        assert_eq!(doc.metadata.tempo, None);
    }

    #[test]
    fn test_key_and_meters_errors() {
        assert!(matches!(
            parse_key_and_meters("1=C"),
            Err(JpwError::MetadataError(_))
        ));
        assert!(parse_key_and_meters("1=C,4/3").is_err());
        assert_eq!(parse_tempo("J = 96").unwrap(), 96);
    }

    #[test]
    fn test_decode_utf8_with_and_without_bom() {
        assert_eq!(decode(b"1 2 3").as_deref(), Some("1 2 3"));
        assert_eq!(decode(b"\xEF\xBB\xBF1 2 3").as_deref(), Some("1 2 3"));
    }

    #[test]
    fn test_decode_utf16() {
        let text = ".Voice\n1 2 3";
        let le: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
        let be: Vec<u8> = text.encode_utf16().flat_map(u16::to_be_bytes).collect();

        let mut with_bom = vec![0xFF, 0xFE];
        with_bom.extend(&le);
        assert_eq!(decode(&with_bom).as_deref(), Some(text));

        let mut be_bom = vec![0xFE, 0xFF];
        be_bom.extend(&be);
        assert_eq!(decode(&be_bom).as_deref(), Some(text));

        assert_eq!(decode(&le).as_deref(), Some(text));
    }

    #[test]
    fn test_decode_gbk() {
        // "中文" in GBK is not valid UTF-8
        let mut bytes = b".Title\nTitle = {".to_vec();
        bytes.extend([0xD6, 0xD0, 0xCE, 0xC4]);
        bytes.extend(b"}\n.Voice\n1 2\n");
        let text = decode(&bytes).unwrap();
        assert_eq!(parse_document(&text).metadata.title.as_deref(), Some("中文"));
    }

    #[test]
    fn test_read_gbk_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b".Title\nWordsByAndMusicBy = {").unwrap();
        file.write_all(&[0xC3, 0xF1, 0xB8, 0xE8]).unwrap();
        file.write_all(b"}\n.Voice\n5 6\n").unwrap();

        let doc = read_document(file.path()).unwrap();
        assert_eq!(doc.metadata.composer.as_deref(), Some("民歌"));
        assert_eq!(doc.voice, "5 6");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(decode(&[0xC3, 0x28, 0xFF]), None);
    }

    #[test]
    fn test_read_document_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut bytes = vec![0xFF, 0xFE];
        bytes.extend(SAMPLE.encode_utf16().flat_map(u16::to_le_bytes));
        file.write_all(&bytes).unwrap();

        let doc = read_document(file.path()).unwrap();
        assert_eq!(doc.metadata.tempo, Some(72));
        assert!(doc.voice.starts_with("3 3_"));
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_document(&dir.path().join("missing.jpw")).unwrap_err();
        assert!(matches!(err, JpwError::InputUnavailable { .. }));
    }
}
