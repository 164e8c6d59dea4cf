//! # Parser Module
//!
//! Turns JPW voice text into a flat, fully resolved event sequence.
//!
//! ## Pipeline
//! One linear pass per voice. The `Scanner` hands out lexemes; the parse
//! context drives the `Tracker` state machine, accumulates modifiers for
//! the note being read, resolves pitch and duration when the note ends, and
//! hands the result to the `Assembler`.
//!
//! ## Notation
//! - Degrees `1`-`7`, rest `0`, with an optional `#`/`b` written before the digit
//! - `'` / `,` raise / lower one octave, `_` halves, `-` adds a beat, `.` dots
//! - `( ... )` slur, `{Name}` decoration on the note it follows (only
//!   directives may sit in between; whitespace or a rest ends the chance)
//! - `$( ... )` directive text, kept verbatim
//! - `{(3}1 2 3)` tuplet; ratio `N` or `N:M`
//! - `|`, `||`, `|]`, `|:`, `:|`, `:|:`, `|[1.`, `||[2.`, `[|]` barlines
//! - `//` comment to end of line
//!
//! ## When a note ends
//! A pending note is finalized when a new digit or accidental starts, at
//! whitespace, at any bracket, directive or barline, and at end of line.
//! Slurs and the assembler holdback never cross a line end.
//!
//! ## Recovery
//! Parsing never fails. Every problem is recorded as a `Diagnostic` on the
//! result and the offending input is skipped.
//!
//! ## Entry Point
//! `parse_voice(text: &str, options: &ParseOptions) -> ParsedVoice`
//!
//! ## Example
//! ```rust
//! use jpw::parser::{parse_voice, ParseOptions};
//! use jpw::ast::Event;
//!
//! let voice = parse_voice("(1 2 3) |", &ParseOptions::default());
//! assert_eq!(voice.events.len(), 4);
//! assert!(matches!(&voice.events[0], Event::Note(n) if n.slur_start));
//! assert_eq!(voice.closing_markers, 0);
//! ```

pub mod assembler;
pub mod tracker;


use crate::ast::*;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::lexer::{BarToken, Lexeme, Located, Scanner};
use crate::vocabulary::{Decoration, Vocabulary};
use assembler::{first_note_mut, note_count, Assembler, Finalized, PendingNote, TupletScope};
use tracker::{RepeatStructure, Tracker, TrackerState};

/// Context a voice is parsed against
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub key: KeySignature,
    /// Used only for measure checks after parsing
    pub time: TimeSignature,
    pub vocabulary: Vocabulary,
}

#[derive(Debug, Clone)]
pub struct ParsedVoice {
    pub events: Vec<Event>,
    /// Repeat/volta scopes that were still open at end of input
    pub closing_markers: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse one voice.
pub fn parse_voice(text: &str, options: &ParseOptions) -> ParsedVoice {
    let mut context = Context::new(Scanner::new(text), options, None);
    context.run();
    let (events, owed, diagnostics) = context.finish();
    let diagnostics = diagnostics.into_vec();
    log::debug!(
        "parsed {} events, {} closing markers, {} diagnostics",
        events.len(),
        owed.len(),
        diagnostics.len()
    );
    ParsedVoice {
        events,
        closing_markers: owed.len(),
        diagnostics,
    }
}

/// Slur being read
#[derive(Debug, Default)]
struct SlurSpan {
    /// Next note gets `slur_start`
    start_pending: bool,
    notes: usize,
    line: usize,
    column: usize,
}

/// All mutable state of one parse invocation
struct Context<'a, 'o> {
    scanner: Scanner<'a>,
    options: &'o ParseOptions,
    tracker: Tracker,
    repeats: RepeatStructure,
    assembler: Assembler,
    diagnostics: Diagnostics,
    pending: Option<PendingNote>,
    /// `#`/`b` waiting for its digit
    accidental: Option<(Accidental, usize, usize)>,
    tuplet: Option<TupletScope>,
    slur: SlurSpan,
    /// The held note can still take a `{Name}` decoration
    decoratable: bool,
}

impl<'a, 'o> Context<'a, 'o> {
    fn new(scanner: Scanner<'a>, options: &'o ParseOptions, tuplet: Option<TupletScope>) -> Self {
        let base = if tuplet.is_some() {
            TrackerState::InTuplet
        } else {
            TrackerState::Normal
        };
        Self {
            scanner,
            options,
            tracker: Tracker::new(base),
            repeats: RepeatStructure::new(),
            assembler: Assembler::new(),
            diagnostics: Diagnostics::new(),
            pending: None,
            accidental: None,
            tuplet,
            slur: SlurSpan::default(),
            decoratable: false,
        }
    }

    fn run(&mut self) {
        while let Some(Located {
            lexeme,
            line,
            column,
        }) = self.scanner.next_lexeme()
        {
            match lexeme {
                Lexeme::Digit(degree) => self.begin_note(degree, line, column),
                Lexeme::Accidental(accidental) => {
                    self.finalize_pending();
                    self.drop_dangling_accidental();
                    self.accidental = Some((accidental, line, column));
                }
                Lexeme::OctaveUp => self.modify('\'', line, column, |p| {
                    p.octave_marks = p.octave_marks.saturating_add(1)
                }),
                Lexeme::OctaveDown => self.modify(',', line, column, |p| {
                    p.octave_marks = p.octave_marks.saturating_sub(1)
                }),
                Lexeme::Halve => self.modify('_', line, column, |p| {
                    p.duration.halvings = p.duration.halvings.saturating_add(1)
                }),
                Lexeme::Extend => self.modify('-', line, column, |p| {
                    p.duration.extensions = p.duration.extensions.saturating_add(1)
                }),
                Lexeme::Dot => self.dot(line, column),
                Lexeme::DirectiveOpen => self.directive(line, column),
                Lexeme::DecorationOpen => self.decoration(line, column),
                Lexeme::TupletOpen => self.tuplet(line, column),
                Lexeme::SlurOpen => self.open_slur(line, column),
                Lexeme::SlurClose => self.close_slur(line, column),
                Lexeme::Bar(token) => self.barline(token, line, column),
                Lexeme::Whitespace => {
                    self.finalize_pending();
                    self.drop_dangling_accidental();
                    self.decoratable = false;
                }
                Lexeme::Comment => self.finalize_pending(),
                Lexeme::Newline => self.end_line(),
                Lexeme::Unknown(c) => {
                    self.finalize_pending();
                    self.diagnostics.at(
                        DiagnosticKind::UnknownCharacter,
                        line,
                        column,
                        format!("unknown character '{}' skipped", c),
                    );
                }
            }
        }
        self.end_line();
    }

    fn begin_note(&mut self, degree: u8, line: usize, column: usize) {
        self.finalize_pending();
        let mut accidental = self.accidental.take().map(|(accidental, _, _)| accidental);

        if degree > 7 {
            self.diagnostics.at(
                DiagnosticKind::UnknownDegree,
                line,
                column,
                format!("unknown degree '{}' skipped", degree),
            );
        } else if degree == 0 && accidental.is_some() {
            self.diagnostics.at(
                DiagnosticKind::DanglingAccidental,
                line,
                column,
                "accidental before a rest ignored",
            );
            accidental = None;
        }

        self.pending = Some(PendingNote::new(degree, accidental, line, column));
    }

    fn modify(&mut self, symbol: char, line: usize, column: usize, apply: impl FnOnce(&mut PendingNote)) {
        match self.pending.as_mut() {
            Some(pending) => apply(pending),
            None => self.diagnostics.at(
                DiagnosticKind::StrayModifier,
                line,
                column,
                format!("modifier '{}' without a note ignored", symbol),
            ),
        }
    }

    fn dot(&mut self, line: usize, column: usize) {
        let excess = match self.pending.as_mut() {
            None => {
                self.diagnostics.at(
                    DiagnosticKind::StrayModifier,
                    line,
                    column,
                    "modifier '.' without a note ignored",
                );
                return;
            }
            Some(pending) if pending.duration.dots >= 2 => true,
            Some(pending) => {
                pending.duration.dots += 1;
                false
            }
        };
        if excess {
            self.diagnostics.at(
                DiagnosticKind::ExcessDots,
                line,
                column,
                "more than two dots; extra dot ignored",
            );
        }
    }

    fn drop_dangling_accidental(&mut self) {
        if let Some((_, line, column)) = self.accidental.take() {
            self.diagnostics.at(
                DiagnosticKind::DanglingAccidental,
                line,
                column,
                "accidental not followed by a degree",
            );
        }
    }

    fn finalize_pending(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let (line, column) = (pending.line, pending.column);
        let (finalized, matched) = assembler::finalize(pending, &self.options.key, self.tuplet.as_ref());
        if !matched {
            self.diagnostics.at(
                DiagnosticKind::UnmatchedDuration,
                line,
                column,
                "duration has no standard notated type; written as a quarter",
            );
        }

        match finalized {
            Finalized::Note(mut note) => {
                if self.slur.start_pending {
                    note.slur_start = true;
                    self.slur.start_pending = false;
                }
                if self.tracker.in_slur() {
                    self.slur.notes += 1;
                }
                self.assembler.hold(Event::Note(note));
                self.decoratable = true;
            }
            Finalized::Rest(rest) => {
                self.assembler.push_passive(Event::Rest(rest));
                self.decoratable = false;
            }
            Finalized::Nothing => {}
        }
    }

    fn directive(&mut self, line: usize, column: usize) {
        self.finalize_pending();
        self.tracker.enter(TrackerState::InDirective);
        let payload = self.scanner.take_balanced('(', ')');
        if !payload.terminated {
            self.diagnostics.at(
                DiagnosticKind::UnterminatedDirective,
                line,
                column,
                "directive not closed before end of line",
            );
        }
        self.assembler
            .push_passive(Event::Directive(Directive { text: payload.text }));
        self.tracker.leave_payload();
    }

    fn decoration(&mut self, line: usize, column: usize) {
        self.finalize_pending();
        self.tracker.enter(TrackerState::InDecoration);
        let payload = self.scanner.take_until('}');
        self.tracker.leave_payload();

        if !payload.terminated {
            self.diagnostics.at(
                DiagnosticKind::UnterminatedDecoration,
                line,
                column,
                "decoration not closed before end of line",
            );
            return;
        }

        let name = payload.text.trim();
        let Some(decoration) = self.options.vocabulary.lookup(name) else {
            self.diagnostics.at(
                DiagnosticKind::UnknownDecoration,
                line,
                column,
                format!("unknown decoration '{}' ignored", name),
            );
            return;
        };

        let target = if self.decoratable {
            self.assembler.held_last_note_mut()
        } else {
            None
        };
        match target {
            Some(note) => match decoration {
                Decoration::Accent => note.accent = true,
                Decoration::Ornament(ornament) => note.ornament = Some(ornament),
            },
            None => self.diagnostics.at(
                DiagnosticKind::DecorationWithoutNote,
                line,
                column,
                format!("decoration '{}' has no note to attach to", name),
            ),
        }
    }

    fn open_slur(&mut self, line: usize, column: usize) {
        self.finalize_pending();
        if self.tracker.in_slur() {
            self.diagnostics.at(
                DiagnosticKind::NestedSlur,
                line,
                column,
                "slur opened inside a slur ignored",
            );
            return;
        }
        self.tracker.enter(TrackerState::InSlur);
        self.slur = SlurSpan {
            start_pending: true,
            notes: 0,
            line,
            column,
        };
    }

    fn close_slur(&mut self, line: usize, column: usize) {
        self.finalize_pending();
        if !self.tracker.in_slur() {
            self.diagnostics.at(
                DiagnosticKind::UnmatchedSlurClose,
                line,
                column,
                "')' without an open slur ignored",
            );
            return;
        }
        self.end_slur(false);
    }

    /// Close the open slur at the held note. `at_line_end` marks a slur the
    /// input never closed.
    fn end_slur(&mut self, at_line_end: bool) {
        let (line, column) = (self.slur.line, self.slur.column);
        if at_line_end {
            self.diagnostics.at(
                DiagnosticKind::UnclosedSlur,
                line,
                column,
                "slur not closed before end of line",
            );
        }

        match self.slur.notes {
            0 => {
                if !at_line_end {
                    self.diagnostics
                        .at(DiagnosticKind::EmptySlur, line, column, "slur without notes ignored");
                }
            }
            1 => {
                if let Some(note) = self.assembler.held_last_note_mut() {
                    note.slur_start = false;
                }
                if !at_line_end {
                    self.diagnostics.at(
                        DiagnosticKind::EmptySlur,
                        line,
                        column,
                        "slur over a single note ignored",
                    );
                }
            }
            _ => {
                if let Some(note) = self.assembler.held_last_note_mut() {
                    note.slur_end = true;
                }
            }
        }

        self.slur = SlurSpan::default();
        self.tracker.leave_slur();
    }

    fn barline(&mut self, token: BarToken, line: usize, column: usize) {
        self.finalize_pending();
        self.drop_dangling_accidental();

        if self.tracker.in_tuplet() {
            self.diagnostics.at(
                DiagnosticKind::NotAllowedInTuplet,
                line,
                column,
                "barline inside a tuplet ignored",
            );
            return;
        }
        if self.tracker.in_slur() {
            log::debug!("barline {:?} inside slur at {}:{} ignored", token, line, column);
            return;
        }

        let barline = self.repeats.apply(token);
        self.assembler.push_boundary(Event::Barline(barline));
        self.decoratable = false;
    }

    fn tuplet(&mut self, line: usize, column: usize) {
        self.finalize_pending();

        let ratio = self.scanner.take_until('}');
        if !ratio.terminated {
            self.diagnostics.at(
                DiagnosticKind::UnterminatedTuplet,
                line,
                column,
                "tuplet ratio not closed with '}'",
            );
            return;
        }
        let info = parse_ratio(&ratio.text).unwrap_or_else(|| {
            self.diagnostics.at(
                DiagnosticKind::TupletRatio,
                line,
                column,
                format!("tuplet ratio '{}' not understood; using 3:2", ratio.text),
            );
            TupletInfo::with_ratio(3, 2)
        });

        let (body_line, body_column) = (self.scanner.line(), self.scanner.column());
        let body = self.scanner.take_balanced('(', ')');
        if !body.terminated {
            self.diagnostics.at(
                DiagnosticKind::UnterminatedTuplet,
                line,
                column,
                "tuplet not closed before end of line",
            );
        }

        let scope = TupletScope::enter(self.tuplet.as_ref(), info);

        let mut child = Context::new(
            Scanner::with_origin(&body.text, body_line, body_column),
            self.options,
            Some(scope),
        );
        child.run();
        let (members, _, diagnostics) = child.finish();
        self.diagnostics.absorb(diagnostics);

        self.push_tuplet_group(info, members, line, column);
    }

    fn push_tuplet_group(&mut self, info: TupletInfo, mut members: Vec<Event>, line: usize, column: usize) {
        if !members.iter().any(Event::is_musical) {
            self.diagnostics.at(
                DiagnosticKind::EmptyTuplet,
                line,
                column,
                "tuplet without notes or rests ignored",
            );
            for member in members {
                self.assembler.push_passive(member);
            }
            return;
        }

        mark_tuplet_bounds(&mut members);
        let mut group = Event::TupletGroup(TupletGroup {
            actual_notes: info.actual_notes,
            normal_notes: info.normal_notes,
            members,
        });

        let notes = note_count(&group);
        if notes == 0 {
            self.assembler.push_passive(group);
            return;
        }
        if self.slur.start_pending {
            if let Some(note) = first_note_mut(&mut group) {
                note.slur_start = true;
            }
            self.slur.start_pending = false;
        }
        if self.tracker.in_slur() {
            self.slur.notes += notes;
        }
        self.assembler.hold(group);
        self.decoratable = true;
    }

    fn end_line(&mut self) {
        self.finalize_pending();
        self.drop_dangling_accidental();
        if self.tracker.in_slur() {
            self.end_slur(true);
        }
        self.assembler.flush();
        self.decoratable = false;
    }

    /// Emit owed closing markers and hand back the events.
    fn finish(self) -> (Vec<Event>, Vec<Scope>, Diagnostics) {
        let owed = self.repeats.finish();
        let mut assembler = self.assembler;
        for scope in &owed {
            assembler.push_boundary(Event::ScopeClose { scope: *scope });
        }
        if !owed.is_empty() {
            log::debug!("{} repeat scopes still open at end of input", owed.len());
        }
        (assembler.finish(), owed, self.diagnostics)
    }
}

/// Parse a tuplet ratio: "N" (standard normal count) or "N:M".
fn parse_ratio(text: &str) -> Option<TupletInfo> {
    let text = text.trim();
    let (actual, normal) = match text.split_once(':') {
        Some((actual, normal)) => (
            actual.trim().parse::<u8>().ok()?,
            Some(normal.trim().parse::<u8>().ok()?),
        ),
        None => (text.parse::<u8>().ok()?, None),
    };
    if actual < 2 {
        return None;
    }
    match normal {
        Some(0) => None,
        Some(normal) => Some(TupletInfo::with_ratio(actual, normal)),
        None => Some(TupletInfo::new(actual)),
    }
}

fn tuplet_info_mut(event: &mut Event) -> Option<&mut TupletInfo> {
    match event {
        Event::Note(note) => note.tuplet.as_mut(),
        Event::Rest(rest) => rest.tuplet.as_mut(),
        _ => None,
    }
}

/// Flag the first and last direct members of a tuplet
fn mark_tuplet_bounds(members: &mut [Event]) {
    if let Some(info) = members.iter_mut().find_map(tuplet_info_mut) {
        info.is_start = true;
    }
    if let Some(info) = members.iter_mut().rev().find_map(tuplet_info_mut) {
        info.is_stop = true;
    }
}
