//! # Measure Grouping Module
//!
//! Splits a parsed voice into measures and checks their lengths.
//!
//! ## Purpose
//! The parser produces one flat event stream per voice. Renderers and
//! length checks want measures instead: the events between two barlines,
//! plus the barlines on either side.
//!
//! ## Grouping Rules
//! - A barline after content ends the current measure and becomes its right barline
//! - If that barline opens a repeat or volta, the next measure gets a copy as its left barline
//! - A barline met before any content in a measure becomes (or merges into) that
//!   measure's left barline; whatever it closes is moved to the previous measure's right
//! - `ScopeClose` markers are attached to the last measure with content
//!
//! ## Measure Length
//! - Each measure's length (sum of sounding beats) should match the time signature
//! - The first measure may be a pickup and the last may be incomplete, so both are exempt
//! - A mismatch is a `MeasureLength` diagnostic; it never stops a conversion
//!
//! ## Entry Point
//! `group_measures(events: &[Event], time: &TimeSignature) -> (Vec<Measure>, Vec<Diagnostic>)`
//!
//! ## Example
//! ```rust
//! use jpw::ast::TimeSignature;
//! use jpw::parser::{parse_voice, ParseOptions};
//! use jpw::semantic::group_measures;
//!
//! let voice = parse_voice("5 | 1 2 3 4 | 5", &ParseOptions::default());
//! let (measures, diagnostics) = group_measures(&voice.events, &TimeSignature::default());
//! assert_eq!(measures.len(), 3);
//! assert!(diagnostics.is_empty());
//! ```

use crate::ast::*;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};

/// Group events into measures and check measure lengths.
pub fn group_measures(events: &[Event], time: &TimeSignature) -> (Vec<Measure>, Vec<Diagnostic>) {
    let mut measures: Vec<Measure> = Vec::new();
    let mut current = empty_measure(1, None);

    for event in events {
        match event {
            Event::Barline(barline) if current.events.is_empty() => {
                if let Some(previous) = measures.last_mut() {
                    merge_closing(previous, barline);
                }
                current.left = Some(match current.left.take() {
                    Some(left) => merge_opening(left, barline),
                    None => barline.clone(),
                });
            }
            Event::Barline(barline) => {
                let next_left = opens_anything(barline).then(|| barline.clone());
                current.right = Some(barline.clone());
                let number = current.number + 1;
                measures.push(std::mem::replace(&mut current, empty_measure(number, next_left)));
            }
            Event::ScopeClose { scope } => {
                if current.events.is_empty() {
                    if let Some(previous) = measures.last_mut() {
                        previous.closes.push(*scope);
                        continue;
                    }
                }
                current.closes.push(*scope);
            }
            other => current.events.push(other.clone()),
        }
    }

    if !current.events.is_empty() || (measures.is_empty() && !current.closes.is_empty()) {
        measures.push(current);
    }

    let diagnostics = check_lengths(&measures, time);
    log::debug!("grouped {} measures", measures.len());
    (measures, diagnostics)
}

fn empty_measure(number: usize, left: Option<Barline>) -> Measure {
    Measure {
        number,
        left,
        events: Vec::new(),
        right: None,
        closes: Vec::new(),
    }
}

fn opens_anything(barline: &Barline) -> bool {
    !barline.opens.is_empty() || barline.repeat.is_some_and(RepeatDirection::is_forward)
}

fn combine_repeats(a: Option<RepeatDirection>, b: Option<RepeatDirection>) -> Option<RepeatDirection> {
    let forward = a.is_some_and(RepeatDirection::is_forward) || b.is_some_and(RepeatDirection::is_forward);
    let backward = a.is_some_and(RepeatDirection::is_backward) || b.is_some_and(RepeatDirection::is_backward);
    match (forward, backward) {
        (true, true) => Some(RepeatDirection::Both),
        (true, false) => Some(RepeatDirection::Forward),
        (false, true) => Some(RepeatDirection::Backward),
        (false, false) => None,
    }
}

/// Move the closing half of a leading barline onto the previous measure's right side
fn merge_closing(previous: &mut Measure, barline: &Barline) {
    let backward = barline.repeat.filter(|r| r.is_backward()).map(|_| RepeatDirection::Backward);
    if barline.closes.is_empty() && backward.is_none() {
        return;
    }
    let right = previous
        .right
        .get_or_insert_with(|| Barline::plain(barline.style));
    right.closes.extend(barline.closes.iter().copied());
    right.repeat = combine_repeats(right.repeat, backward);
}

/// Two barlines in a row before any content: keep the later style, union the rest
fn merge_opening(mut left: Barline, barline: &Barline) -> Barline {
    if barline.style != BarStyle::Regular {
        left.style = barline.style;
    }
    left.repeat = combine_repeats(left.repeat, barline.repeat);
    left.opens.extend(barline.opens.iter().copied());
    left
}

fn check_lengths(measures: &[Measure], time: &TimeSignature) -> Vec<Diagnostic> {
    let mut diagnostics = Diagnostics::new();
    let expected = time.measure_beats();
    let last = measures.len().saturating_sub(1);

    for (i, measure) in measures.iter().enumerate() {
        if i == 0 || i == last {
            continue;
        }
        let actual = measure.beats();
        if actual != expected {
            diagnostics.report(
                DiagnosticKind::MeasureLength,
                None,
                format!(
                    "measure {} has {} beats, expected {} for {}",
                    measure.number, actual, expected, time
                ),
            );
        }
    }

    diagnostics.into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_voice, ParseOptions};
    use num_rational::Rational32;

    fn group(text: &str) -> (Vec<Measure>, Vec<Diagnostic>) {
        let voice = parse_voice(text, &ParseOptions::default());
        group_measures(&voice.events, &TimeSignature::default())
    }

    #[test]
    fn test_full_measures() {
        let (measures, diagnostics) = group("1 2 3 4 | 5 6 7 1' |]");
        assert_eq!(measures.len(), 2);
        assert_eq!(measures[0].number, 1);
        assert_eq!(measures[1].number, 2);
        assert_eq!(measures[0].beats(), Rational32::from_integer(4));
        assert_eq!(measures[1].right.as_ref().map(|b| b.style), Some(BarStyle::LightHeavy));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_pickup_and_last_measure_exempt() {
        let (measures, diagnostics) = group("5 | 1 2 3 4 | 5-");
        assert_eq!(measures.len(), 3);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_measure_too_long() {
        let (_, diagnostics) = group("1 | 1 2 3 4 5 | 1");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::MeasureLength);
        assert!(diagnostics[0].message.contains("measure 2"));
    }

    #[test]
    fn test_triplet_fills_beat() {
        let (_, diagnostics) = group("1 | {(3}1_ 2_ 3_) 2 3 4 | 1");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_other_time_signature() {
        let voice = parse_voice("1 | 1 2 3 | 1", &ParseOptions::default());
        let three_four = TimeSignature::from_str("3/4").unwrap();
        let (_, diagnostics) = group_measures(&voice.events, &three_four);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_leading_barline_becomes_left() {
        let (measures, _) = group("|: 1 2 3 4 :|");
        assert_eq!(measures.len(), 1);
        let left = measures[0].left.as_ref().unwrap();
        assert_eq!(left.repeat, Some(RepeatDirection::Forward));
        let right = measures[0].right.as_ref().unwrap();
        assert_eq!(right.repeat, Some(RepeatDirection::Backward));
    }

    #[test]
    fn test_opening_barline_copied_to_next_measure() {
        let (measures, _) = group("1 2 3 4 |: 5 6 7 1' :|");
        assert_eq!(measures.len(), 2);
        assert!(measures[0].left.is_none());
        assert_eq!(
            measures[1].left.as_ref().and_then(|b| b.repeat),
            Some(RepeatDirection::Forward)
        );
    }

    #[test]
    fn test_volta_after_backward_repeat() {
        let (measures, _) = group("|: 1 2 3 4 |[1. 5 6 7 1' :| |[2. 1 2 3 4 |]");
        assert_eq!(measures.len(), 3);
        assert_eq!(measures[1].left.as_ref().and_then(Barline::volta_opened), Some(1));
        assert_eq!(measures[1].right.as_ref().and_then(Barline::volta_closed), Some(1));
        assert_eq!(measures[2].left.as_ref().and_then(Barline::volta_opened), Some(2));
        assert_eq!(
            measures[2].right.as_ref().map(|b| b.closes.clone()),
            Some(vec![Scope::Volta(2), Scope::Repeat])
        );
    }

    #[test]
    fn test_owed_scopes_attach_to_last_measure() {
        let (measures, _) = group("1 2 3 4 |[1. 5 6 7 1' |");
        assert_eq!(measures.len(), 2);
        assert_eq!(measures[1].closes, vec![Scope::Volta(1), Scope::Repeat]);
    }

    #[test]
    fn test_empty_voice() {
        let (measures, diagnostics) = group("");
        assert!(measures.is_empty());
        assert!(diagnostics.is_empty());
    }
}
