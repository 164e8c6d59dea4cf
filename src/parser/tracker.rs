//! Structural Tracker: parse mode plus the repeat/volta nesting structure.

use crate::ast::{BarStyle, Barline, RepeatDirection, Scope};
use crate::lexer::BarToken;

/// Current parse mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Normal,
    InDirective,
    InDecoration,
    InSlur,
    InTuplet,
}

/// Mode machine for one parse context. A tuplet body is parsed by a child
/// context whose resting state is `InTuplet` instead of `Normal`.
#[derive(Debug)]
pub struct Tracker {
    base: TrackerState,
    state: TrackerState,
    /// State to return to when a directive or decoration payload ends
    resume: TrackerState,
}

impl Tracker {
    pub fn new(base: TrackerState) -> Self {
        Self {
            base,
            state: base,
            resume: base,
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn in_slur(&self) -> bool {
        self.state == TrackerState::InSlur
    }

    pub fn in_tuplet(&self) -> bool {
        self.base == TrackerState::InTuplet
    }

    pub fn enter(&mut self, next: TrackerState) {
        log::trace!("tracker {:?} -> {:?}", self.state, next);
        if matches!(next, TrackerState::InDirective | TrackerState::InDecoration) {
            self.resume = self.state;
        }
        self.state = next;
    }

    /// Leave a directive/decoration payload
    pub fn leave_payload(&mut self) {
        log::trace!("tracker {:?} -> {:?}", self.state, self.resume);
        self.state = self.resume;
    }

    /// Leave a slur, back to the context's resting state
    pub fn leave_slur(&mut self) {
        log::trace!("tracker {:?} -> {:?}", self.state, self.base);
        self.state = self.base;
        self.resume = self.base;
    }
}

/// Open repeat and volta scopes, outermost first.
#[derive(Debug, Default)]
pub struct RepeatStructure {
    open: Vec<Scope>,
}

impl RepeatStructure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.open.len()
    }

    fn has_volta(&self) -> bool {
        self.open.iter().any(|scope| matches!(scope, Scope::Volta(_)))
    }

    fn has_repeat(&self) -> bool {
        self.open.contains(&Scope::Repeat)
    }

    /// Close every open scope, innermost first
    fn close_all(&mut self) -> Vec<Scope> {
        let mut closed = Vec::with_capacity(self.open.len());
        while let Some(scope) = self.open.pop() {
            closed.push(scope);
        }
        closed
    }

    fn close_volta(&mut self) -> Option<Scope> {
        let index = self
            .open
            .iter()
            .rposition(|scope| matches!(scope, Scope::Volta(_)))?;
        Some(self.open.remove(index))
    }

    /// Apply a barline token and describe what it closes and opens.
    pub fn apply(&mut self, token: BarToken) -> Barline {
        let mut barline = match token {
            BarToken::Single => Barline::plain(BarStyle::Regular),
            BarToken::Double => Barline::plain(BarStyle::LightLight),
            BarToken::Final => Barline::plain(BarStyle::LightHeavy),
            BarToken::FinalVariant => Barline::plain(BarStyle::HeavyHeavy),
            BarToken::RepeatOpen => Barline::plain(BarStyle::HeavyLight),
            BarToken::RepeatClose => Barline::plain(BarStyle::LightHeavy),
            BarToken::RepeatBoth => Barline::plain(BarStyle::HeavyHeavy),
            BarToken::Volta { double, .. } => Barline::plain(if double {
                BarStyle::LightLight
            } else {
                BarStyle::Regular
            }),
        };

        match token {
            BarToken::Single | BarToken::Double => {}
            BarToken::Final | BarToken::FinalVariant => {
                barline.closes = self.close_all();
            }
            BarToken::RepeatOpen => {
                // owed scopes are flushed before a new repeat starts
                barline.closes = self.close_all();
                barline.repeat = Some(RepeatDirection::Forward);
                self.open.push(Scope::Repeat);
                barline.opens.push(Scope::Repeat);
            }
            BarToken::RepeatClose => {
                barline.repeat = Some(RepeatDirection::Backward);
                if self.has_volta() {
                    barline.closes.extend(self.close_volta());
                } else if self.has_repeat() {
                    barline.closes = self.close_all();
                }
            }
            BarToken::RepeatBoth => {
                barline.repeat = Some(RepeatDirection::Both);
                barline.closes = self.close_all();
                self.open.push(Scope::Repeat);
                barline.opens.push(Scope::Repeat);
            }
            BarToken::Volta { number, .. } => {
                barline.closes.extend(self.close_volta());
                if !self.has_repeat() {
                    self.open.push(Scope::Repeat);
                    barline.opens.push(Scope::Repeat);
                }
                self.open.push(Scope::Volta(number));
                barline.opens.push(Scope::Volta(number));
            }
        }

        log::debug!(
            "barline {:?}: closes {:?}, opens {:?}, depth {}",
            token,
            barline.closes,
            barline.opens,
            self.depth()
        );
        barline
    }

    /// Scopes still owed at end of input, innermost first
    pub fn finish(mut self) -> Vec<Scope> {
        self.close_all()
    }
}
