//! Event Assembler: turns accumulated modifiers into resolved events and
//! appends them in order.
//!
//! The most recent note (or tuplet group) is held back until the next note,
//! barline or end of line, so a following `)` or `{Name}` can still mark it.
//! Rests and directives seen while a note is held queue up behind it.
//! Events are never touched once they leave the holdback.

use crate::ast::{Accidental, Duration, Event, KeySignature, Note, Rest, TupletInfo};
use crate::duration;
use crate::pitch;

/// Modifiers collected for the note or rest being read
#[derive(Debug, Clone)]
pub struct PendingNote {
    pub degree: u8,
    pub accidental: Option<Accidental>,
    pub octave_marks: i8,
    pub duration: Duration,
    pub line: usize,
    pub column: usize,
    /// False for unknown degrees (8, 9): modifiers are swallowed and nothing is emitted
    pub valid: bool,
}

impl PendingNote {
    pub fn new(degree: u8, accidental: Option<Accidental>, line: usize, column: usize) -> Self {
        Self {
            degree,
            accidental,
            octave_marks: 0,
            duration: Duration::default(),
            line,
            column,
            valid: degree <= 7,
        }
    }

    pub fn is_rest(&self) -> bool {
        self.degree == 0
    }
}

/// Outcome of finalizing a pending note
pub enum Finalized {
    Note(Note),
    Rest(Rest),
    Nothing,
}

/// Duration scaling for the context being parsed
#[derive(Debug, Clone, Copy)]
pub struct TupletScope {
    /// Ratio members carry, folded with any enclosing tuplets
    pub ratio: TupletInfo,
}

impl TupletScope {
    pub fn enter(outer: Option<&TupletScope>, info: TupletInfo) -> Self {
        let ratio = match outer {
            Some(outer) => info.within(&outer.ratio),
            None => info,
        };
        Self { ratio }
    }
}

/// Resolve a pending note against the key and tuplet scope. The second value
/// is false when the duration had no standard type.
pub fn finalize(
    pending: PendingNote,
    key: &KeySignature,
    tuplet: Option<&TupletScope>,
) -> (Finalized, bool) {
    if !pending.valid {
        return (Finalized::Nothing, true);
    }

    let info = tuplet.map(|scope| scope.ratio);
    let resolved = duration::resolve(&pending.duration, info.as_ref());
    let beats = resolved.beats;

    log::trace!(
        "finalize degree {} {:?} -> {} beats",
        pending.degree,
        pending.duration,
        beats
    );

    if pending.is_rest() {
        let rest = Rest {
            duration: pending.duration,
            beats,
            notated: resolved.notated,
            tuplet: info,
        };
        return (Finalized::Rest(rest), resolved.matched);
    }

    match pitch::resolve(pending.degree, pending.accidental, pending.octave_marks, key) {
        Some(resolved_pitch) => {
            let note = Note {
                degree: pending.degree,
                accidental: pending.accidental,
                octave_marks: pending.octave_marks,
                pitch: resolved_pitch,
                duration: pending.duration,
                beats,
                notated: resolved.notated,
                tuplet: info,
                slur_start: false,
                slur_end: false,
                accent: false,
                ornament: None,
            };
            (Finalized::Note(note), resolved.matched)
        }
        None => (Finalized::Nothing, resolved.matched),
    }
}

/// First note of an event, looking inside tuplet groups
pub fn first_note_mut(event: &mut Event) -> Option<&mut Note> {
    match event {
        Event::Note(note) => Some(note),
        Event::TupletGroup(group) => group.members.iter_mut().find_map(first_note_mut),
        _ => None,
    }
}

/// Last note of an event, looking inside tuplet groups
pub fn last_note_mut(event: &mut Event) -> Option<&mut Note> {
    match event {
        Event::Note(note) => Some(note),
        Event::TupletGroup(group) => group.members.iter_mut().rev().find_map(last_note_mut),
        _ => None,
    }
}

/// Number of notes in an event, counting tuplet members
pub fn note_count(event: &Event) -> usize {
    match event {
        Event::Note(_) => 1,
        Event::TupletGroup(group) => group.members.iter().map(note_count).sum(),
        _ => 0,
    }
}

#[derive(Debug, Default)]
pub struct Assembler {
    events: Vec<Event>,
    held: Option<Event>,
    trailing: Vec<Event>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold a note or tuplet group, releasing the previous one
    pub fn hold(&mut self, event: Event) {
        self.flush();
        self.held = Some(event);
    }

    /// Append a rest or directive, behind the held note if there is one
    pub fn push_passive(&mut self, event: Event) {
        if self.held.is_some() {
            self.trailing.push(event);
        } else {
            self.events.push(event);
        }
    }

    /// Append a barline or scope marker
    pub fn push_boundary(&mut self, event: Event) {
        self.flush();
        self.events.push(event);
    }

    pub fn flush(&mut self) {
        if let Some(held) = self.held.take() {
            self.events.push(held);
        }
        self.events.append(&mut self.trailing);
    }

    pub fn held_last_note_mut(&mut self) -> Option<&mut Note> {
        self.held.as_mut().and_then(last_note_mut)
    }

    pub fn finish(mut self) -> Vec<Event> {
        self.flush();
        self.events
    }
}
