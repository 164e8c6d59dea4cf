pub mod api;
pub mod ast;
pub mod diagnostics;
pub mod document;
pub mod duration;
pub mod error;
pub mod lexer;
pub mod lilypond;
pub mod midi;
pub mod musicxml;
pub mod parser;
pub mod pitch;
pub mod semantic;
pub mod vocabulary;

pub use api::*;
pub use ast::*;
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use document::{read_document, JpwDocument};
pub use error::*;
pub use lilypond::to_lilypond;
pub use musicxml::{to_musicxml, RenderOptions};
pub use parser::{parse_voice, ParseOptions, ParsedVoice};
pub use semantic::group_measures;
pub use vocabulary::{Decoration, Vocabulary};
