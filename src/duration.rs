//! # Duration Resolver
//!
//! Maps JPW duration modifiers to exact beat values and back.
//!
//! ## Forward
//! `beats = (1/2^u + h) * dot_factor(d)` where `u` counts `_`, `h` counts `-`
//! and `d` counts `.`. One dot gives `3/2`, two dots give `7/4`: each dot
//! adds half of the previous increment, not a flat `1.5^d`.
//!
//! ## Type lookup
//! The written (unscaled) value is matched against the standard types from
//! breve to 64th with 0, 1 or 2 dots. A value with no close match falls back
//! to a plain quarter and the caller records a diagnostic.
//!
//! ## Tuplets
//! Members keep the notated type of their written value; only the sounding
//! length is scaled by `normal/actual`.
//!
//! ## Reverse
//! `modifiers_for` finds the `(u, h, d)` triple with the fewest modifiers
//! whose value lies within a tolerance of the requested length. MIDI import
//! uses it with a loose tolerance.

use crate::ast::{Duration, NotatedDuration, NoteType, TupletInfo};
use num_rational::Rational32;

/// Default tolerance for type lookup, in beats
pub const TYPE_TOLERANCE: f64 = 0.001;

/// Tolerance used when mapping performed (MIDI) lengths back to modifiers
pub const IMPORT_TOLERANCE: f64 = 0.01;

const MAX_HALVINGS: u8 = 6;
const MAX_EXTENSIONS: u8 = 8;
const MAX_DOTS: u8 = 2;

/// Result of resolving one note or rest
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedDuration {
    /// Sounding length with any tuplet ratio applied
    pub beats: Rational32,
    pub notated: NotatedDuration,
    /// False when the written value had no standard type and fell back to a quarter
    pub matched: bool,
}

/// Floating-point view of a beat value
pub fn as_f64(beats: Rational32) -> f64 {
    *beats.numer() as f64 / *beats.denom() as f64
}

/// Multiplier for `dots` augmentation dots: (2^(d+1) - 1) / 2^d
pub fn dot_factor(dots: u8) -> Rational32 {
    let d = dots.min(MAX_DOTS) as u32;
    Rational32::new(2i32.pow(d + 1) - 1, 2i32.pow(d))
}

/// Written length of a modifier set, before any tuplet scaling
pub fn written_beats(duration: &Duration) -> Rational32 {
    let halvings = duration.halvings.min(16) as u32;
    let base = Rational32::new(1, 2i32.pow(halvings)) + Rational32::from_integer(duration.extensions as i32);
    base * dot_factor(duration.dots)
}

/// Nearest standard type (with up to two dots) within `tolerance` beats
pub fn notated_type(beats: Rational32, tolerance: f64) -> Option<NotatedDuration> {
    let target = as_f64(beats);
    let mut best: Option<(f64, NotatedDuration)> = None;

    for note_type in NoteType::ALL {
        for dots in 0..=MAX_DOTS {
            let value = as_f64(note_type.beats() * dot_factor(dots));
            let error = (value - target).abs();
            if error > tolerance {
                continue;
            }
            if best.map_or(true, |(best_error, _)| error < best_error) {
                best = Some((error, NotatedDuration { note_type, dots }));
            }
        }
    }

    best.map(|(_, notated)| notated)
}

/// Resolve written modifiers (and tuplet membership) to beats and a notated type.
pub fn resolve(duration: &Duration, tuplet: Option<&TupletInfo>) -> ResolvedDuration {
    let written = written_beats(duration);
    let (notated, matched) = match notated_type(written, TYPE_TOLERANCE) {
        Some(notated) => (notated, true),
        None => (NotatedDuration::default(), false),
    };
    let beats = match tuplet {
        Some(info) => written * info.scale(),
        None => written,
    };
    ResolvedDuration {
        beats,
        notated,
        matched,
    }
}

/// Convert beats to MusicXML-style ticks, rounded to the nearest division.
pub fn to_ticks(beats: Rational32, divisions: u32) -> u32 {
    let ticks = (beats * Rational32::from_integer(divisions as i32)).round();
    ticks.to_integer().max(0) as u32
}

/// Fewest-modifier `(u, h, d)` whose written length is within `tolerance` of `beats`.
pub fn modifiers_for(beats: f64, tolerance: f64) -> Option<Duration> {
    let mut best: Option<(u8, f64, Duration)> = None;

    for halvings in 0..=MAX_HALVINGS {
        for extensions in 0..=MAX_EXTENSIONS {
            for dots in 0..=MAX_DOTS {
                let candidate = Duration {
                    halvings,
                    extensions,
                    dots,
                };
                let value = as_f64(written_beats(&candidate));
                let error = (value - beats).abs();
                if error > tolerance {
                    continue;
                }
                let cost = halvings + extensions + dots;
                let better = match best {
                    None => true,
                    Some((best_cost, best_error, _)) => {
                        cost < best_cost || (cost == best_cost && error < best_error)
                    }
                };
                if better {
                    best = Some((cost, error, candidate));
                }
            }
        }
    }

    best.map(|(_, _, duration)| duration)
}

/// Exact reverse mapping for a rational length
pub fn modifiers_for_exact(beats: Rational32) -> Option<Duration> {
    modifiers_for(as_f64(beats), 1e-9)
}

/// Render modifiers as JPW text (`_` first, then `-`, then dots)
pub fn modifier_text(duration: &Duration) -> String {
    let mut text = String::new();
    text.push_str(&"_".repeat(duration.halvings as usize));
    text.push_str(&"-".repeat(duration.extensions as usize));
    text.push_str(&".".repeat(duration.dots as usize));
    text
}
