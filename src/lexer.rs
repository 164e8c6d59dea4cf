//! # Scanner
//!
//! Character cursor over JPW voice text. Each call to `next_lexeme` classifies
//! what starts at the cursor and consumes it, including multi-character
//! barlines (`|:`, `:|:`, `[|]`, `||[2.`). The parser pulls lexemes one at a
//! time and may push one back.
//!
//! Bracketed payloads (`$(...)`, `{...}`, tuplet bodies) are read raw with
//! `take_balanced` / `take_until` once the parser has seen the opener.
//!
//! Unknown characters are returned as `Lexeme::Unknown` one at a time; the
//! scanner never fails.

use crate::ast::Accidental;

/// Barline shapes recognized in the voice text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarToken {
    Single,       // |
    Double,       // ||
    Final,        // |]
    RepeatOpen,   // |:
    RepeatClose,  // :|
    RepeatBoth,   // :|:
    FinalVariant, // [|]
    Volta { number: u8, double: bool }, // |[N or ||[N (optional trailing '.')
}

#[derive(Debug, Clone, PartialEq)]
pub enum Lexeme {
    Digit(u8),
    Accidental(Accidental), // # or b, written before the degree
    OctaveUp,               // '
    OctaveDown,             // ,
    Halve,                  // _
    Extend,                 // -
    Dot,                    // .
    DirectiveOpen,          // $(
    DecorationOpen,         // {
    TupletOpen,             // {(
    SlurOpen,               // (
    SlurClose,              // )
    Bar(BarToken),
    Whitespace,
    Comment, // // to end of line
    Newline,
    Unknown(char),
}

/// A lexeme with its position in the source
#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub lexeme: Lexeme,
    pub line: usize,
    pub column: usize,
}

/// Raw text read up to a closing character
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub text: String,
    /// False when the line or input ended before the closer
    pub terminated: bool,
}

pub struct Scanner<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
    position: usize,
    pushed_back: Option<Located>,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a str) -> Self {
        Self::with_origin(input, 1, 1)
    }

    /// Scanner whose positions start at `line`/`column`, for text cut out of a larger source.
    pub fn with_origin(input: &'a str, line: usize, column: usize) -> Self {
        Self {
            input,
            chars: input.chars().peekable(),
            line,
            column,
            position: 0,
            pushed_back: None,
        }
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.position += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<&char> {
        self.chars.peek()
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.position..]
    }

    fn advance_by(&mut self, count: usize) {
        for _ in 0..count {
            self.advance();
        }
    }

    /// Return a lexeme so the next call to `next_lexeme` yields it again.
    pub fn push_back(&mut self, located: Located) {
        self.pushed_back = Some(located);
    }

    pub fn next_lexeme(&mut self) -> Option<Located> {
        if let Some(located) = self.pushed_back.take() {
            return Some(located);
        }

        let c = *self.peek()?;
        let line = self.line;
        let column = self.column;

        let lexeme = match c {
            '0'..='9' => {
                self.advance();
                Lexeme::Digit(c as u8 - b'0')
            }
            '#' => {
                self.advance();
                Lexeme::Accidental(Accidental::Sharp)
            }
            'b' => {
                self.advance();
                Lexeme::Accidental(Accidental::Flat)
            }
            '\'' => {
                self.advance();
                Lexeme::OctaveUp
            }
            ',' => {
                self.advance();
                Lexeme::OctaveDown
            }
            '_' => {
                self.advance();
                Lexeme::Halve
            }
            '-' => {
                self.advance();
                Lexeme::Extend
            }
            '.' => {
                self.advance();
                Lexeme::Dot
            }
            '$' if self.remaining().starts_with("$(") => {
                self.advance_by(2);
                Lexeme::DirectiveOpen
            }
            '{' if self.remaining().starts_with("{(") => {
                self.advance_by(2);
                Lexeme::TupletOpen
            }
            '{' => {
                self.advance();
                Lexeme::DecorationOpen
            }
            '(' => {
                self.advance();
                Lexeme::SlurOpen
            }
            ')' => {
                self.advance();
                Lexeme::SlurClose
            }
            '|' => Lexeme::Bar(self.scan_bar_from_pipe()),
            ':' if self.remaining().starts_with(":|:") => {
                self.advance_by(3);
                Lexeme::Bar(BarToken::RepeatBoth)
            }
            ':' if self.remaining().starts_with(":|") => {
                self.advance_by(2);
                Lexeme::Bar(BarToken::RepeatClose)
            }
            '[' if self.remaining().starts_with("[|]") => {
                self.advance_by(3);
                Lexeme::Bar(BarToken::FinalVariant)
            }
            '/' if self.remaining().starts_with("//") => {
                while let Some(&next) = self.peek() {
                    if next == '\n' {
                        break;
                    }
                    self.advance();
                }
                Lexeme::Comment
            }
            '\n' => {
                self.advance();
                Lexeme::Newline
            }
            c if c.is_whitespace() => {
                while let Some(&next) = self.peek() {
                    if next == '\n' || !next.is_whitespace() {
                        break;
                    }
                    self.advance();
                }
                Lexeme::Whitespace
            }
            other => {
                self.advance();
                Lexeme::Unknown(other)
            }
        };

        Some(Located {
            lexeme,
            line,
            column,
        })
    }

    /// Lex a barline starting at '|'
    fn scan_bar_from_pipe(&mut self) -> BarToken {
        let rest = self.remaining();
        if rest.starts_with("|]") {
            self.advance_by(2);
            return BarToken::Final;
        }
        if rest.starts_with("||[") {
            if let Some(number) = self.volta_number_after(3) {
                return BarToken::Volta {
                    number,
                    double: true,
                };
            }
        }
        if rest.starts_with("|[") {
            if let Some(number) = self.volta_number_after(2) {
                return BarToken::Volta {
                    number,
                    double: false,
                };
            }
        }
        if rest.starts_with("||") {
            self.advance_by(2);
            return BarToken::Double;
        }
        if rest.starts_with("|:") {
            self.advance_by(2);
            return BarToken::RepeatOpen;
        }
        self.advance();
        BarToken::Single
    }

    /// Consume `prefix_len` chars plus the volta digits (and an optional '.')
    /// when digits follow the prefix.
    fn volta_number_after(&mut self, prefix_len: usize) -> Option<u8> {
        let digits: String = self.remaining()[prefix_len..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if digits.is_empty() {
            return None;
        }
        let number = digits.parse::<u8>().unwrap_or(u8::MAX);
        self.advance_by(prefix_len + digits.len());
        if let Some(&'.') = self.peek() {
            self.advance();
        }
        Some(number)
    }

    /// Read raw text up to the `close` that balances an already-consumed `open`.
    /// Stops (unterminated) at a newline or end of input, leaving the newline unread.
    pub fn take_balanced(&mut self, open: char, close: char) -> Payload {
        let mut depth = 1;
        let mut text = String::new();
        while let Some(&c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
            if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    return Payload {
                        text,
                        terminated: true,
                    };
                }
            }
            text.push(c);
        }
        Payload {
            text,
            terminated: false,
        }
    }

    /// Read raw text up to the next `close` on the current line.
    pub fn take_until(&mut self, close: char) -> Payload {
        let mut text = String::new();
        while let Some(&c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
            if c == close {
                return Payload {
                    text,
                    terminated: true,
                };
            }
            text.push(c);
        }
        Payload {
            text,
            terminated: false,
        }
    }
}
