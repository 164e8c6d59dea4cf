//! Recoverable problems found while reading notation.
//!
//! Nothing recorded here stops a conversion. Each diagnostic is kept on the
//! parse result and also reported through `log::warn!`.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    UnknownCharacter,
    UnknownDegree,
    StrayModifier,
    DanglingAccidental,
    ExcessDots,
    UnmatchedSlurClose,
    UnclosedSlur,
    EmptySlur,
    NestedSlur,
    UnterminatedDirective,
    UnterminatedDecoration,
    UnknownDecoration,
    DecorationWithoutNote,
    TupletRatio,
    UnterminatedTuplet,
    EmptyTuplet,
    NotAllowedInTuplet,
    UnmatchedDuration,
    MeasureLength,
}

/// Source position (1-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub position: Option<Position>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(pos) => write!(f, "line {}, column {}: {}", pos.line, pos.column, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Collects diagnostics for one parse and mirrors them to the log.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, kind: DiagnosticKind, position: Option<Position>, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            kind,
            position,
            message: message.into(),
        };
        log::warn!("{}", diagnostic);
        self.items.push(diagnostic);
    }

    pub fn at(&mut self, kind: DiagnosticKind, line: usize, column: usize, message: impl Into<String>) {
        self.report(kind, Some(Position { line, column }), message);
    }

    /// Move diagnostics from a nested parse into this collection without logging them twice.
    pub fn absorb(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}
