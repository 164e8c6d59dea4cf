//! Lilypond output with absolute octaves and English note names.

use crate::ast::*;

const LINE_LIMIT: usize = 60;
const INDENT: &str = "    ";

/// Render a parsed voice as a complete Lilypond file.
pub fn to_lilypond(events: &[Event], metadata: &Metadata) -> String {
    let mut ly = String::new();

    ly.push_str("\\version \"2.18.2\"\n");
    ly.push_str("\\language \"english\"\n\n");

    ly.push_str("\\header {\n");
    if let Some(title) = &metadata.title {
        ly.push_str(&format!("  title = \"{}\"\n", quote(title)));
    }
    if let Some(composer) = &metadata.composer {
        ly.push_str(&format!("  composer = \"{}\"\n", quote(composer)));
    }
    ly.push_str("}\n\n");

    ly.push_str("\\score {\n");
    ly.push_str("  {\n");
    ly.push_str(&format!("{}\\clef treble\n", INDENT));
    ly.push_str(&format!("{}{}\n", INDENT, key_command(&metadata.key)));
    ly.push_str(&format!("{}\\time {}\n", INDENT, metadata.time));
    if let Some(tempo) = metadata.tempo {
        ly.push_str(&format!("{}\\tempo 4 = {}\n", INDENT, tempo));
    }

    let mut tokens: Vec<(String, bool)> = Vec::new();
    for event in events {
        event_tokens(event, &mut tokens);
    }
    if !matches!(events.last(), Some(Event::Barline(_))) {
        tokens.push(("\\bar \"|.\"".to_string(), true));
    }

    let mut line = String::new();
    for (token, is_bar) in tokens {
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&token);
        if is_bar && line.len() > LINE_LIMIT {
            ly.push_str(INDENT);
            ly.push_str(&line);
            ly.push('\n');
            line.clear();
        }
    }
    if !line.is_empty() {
        ly.push_str(INDENT);
        ly.push_str(&line);
        ly.push('\n');
    }

    ly.push_str("  }\n");
    ly.push_str("  \\layout {\n    \\context { \\Score }\n  }\n");
    ly.push_str("  \\midi {\n    \\context { \\Score }\n  }\n");
    ly.push_str("}\n");
    ly
}

/// Tokens for one event; the flag marks a barline, after which a line may wrap
fn event_tokens(event: &Event, tokens: &mut Vec<(String, bool)>) {
    match event {
        Event::Note(note) => tokens.push((note_token(note), false)),
        Event::Rest(rest) => tokens.push((format!("r{}", duration_token(&rest.notated)), false)),
        Event::TupletGroup(group) => {
            let mut inner = Vec::new();
            for member in &group.members {
                event_tokens(member, &mut inner);
            }
            let body: Vec<String> = inner.into_iter().map(|(token, _)| token).collect();
            tokens.push((
                format!(
                    "\\tuplet {}/{} {{ {} }}",
                    group.actual_notes,
                    group.normal_notes,
                    body.join(" ")
                ),
                false,
            ));
        }
        Event::Directive(directive) => {
            tokens.push((format!("<>^\\markup {{ \"{}\" }}", quote(&directive.text)), false))
        }
        Event::Barline(barline) => barline_tokens(barline, tokens),
        Event::ScopeClose { scope: Scope::Volta(_) } => {
            tokens.push(("\\set Score.repeatCommands = #'((volta #f))".to_string(), false))
        }
        Event::ScopeClose { scope: Scope::Repeat } => {}
    }
}

fn note_token(note: &Note) -> String {
    let mut token = pitch_name(note.pitch.step, note.pitch.alter);
    let marks = note.pitch.octave as i32 - 3;
    if marks > 0 {
        token.push_str(&"'".repeat(marks as usize));
    } else if marks < 0 {
        token.push_str(&",".repeat(marks.unsigned_abs() as usize));
    }
    if note.pitch.accidental == Some(Accidental::Natural) {
        token.push('!');
    }
    token.push_str(&duration_token(&note.notated));
    if note.accent {
        token.push_str("->");
    }
    if let Some(ornament) = note.ornament {
        token.push_str(match ornament {
            Ornament::Prall => "\\prall",
            Ornament::Mordent => "\\mordent",
            Ornament::Trill => "\\trill",
            Ornament::Turn => "\\turn",
            Ornament::Fermata => "\\fermata",
        });
    }
    if note.slur_start {
        token.push('(');
    }
    if note.slur_end {
        token.push(')');
    }
    token
}

fn pitch_name(step: NoteName, alter: i8) -> String {
    let mut name = step.as_str().to_lowercase();
    let sign = if alter > 0 { "s" } else { "f" };
    name.push_str(&sign.repeat(alter.unsigned_abs() as usize));
    name
}

fn duration_token(notated: &NotatedDuration) -> String {
    format!(
        "{}{}",
        notated.note_type.lilypond_value(),
        ".".repeat(notated.dots as usize)
    )
}

fn key_command(key: &KeySignature) -> String {
    let mode = match key.mode {
        Mode::Major => "\\major",
        Mode::Minor => "\\minor",
    };
    format!("\\key {} {}", pitch_name(key.root, key.root_alter), mode)
}

fn barline_tokens(barline: &Barline, tokens: &mut Vec<(String, bool)>) {
    let glyph = match barline.repeat {
        Some(RepeatDirection::Forward) => Some(".|:"),
        Some(RepeatDirection::Backward) => Some(":|."),
        Some(RepeatDirection::Both) => Some(":..:"),
        None => match barline.style {
            BarStyle::Regular => None,
            BarStyle::LightLight => Some("||"),
            BarStyle::LightHeavy => Some("|."),
            BarStyle::HeavyLight => Some(".|"),
            BarStyle::HeavyHeavy => Some(".."),
        },
    };

    let mut commands = Vec::new();
    if barline.volta_closed().is_some() {
        commands.push("(volta #f)".to_string());
    }
    if let Some(number) = barline.volta_opened() {
        commands.push(format!("(volta \"{}.\")", number));
    }
    // volta brackets end at the barline, so the glyph goes first when closing
    let closing_only = barline.volta_opened().is_none();

    let bar = match glyph {
        Some(glyph) => format!("\\bar \"{}\"", glyph),
        None => "|".to_string(),
    };
    let volta = (!commands.is_empty())
        .then(|| format!("\\set Score.repeatCommands = #'({})", commands.join(" ")));

    match volta {
        Some(volta) if closing_only => {
            tokens.push((volta, false));
            tokens.push((bar, true));
        }
        Some(volta) => {
            tokens.push((bar, false));
            tokens.push((volta, true));
        }
        None => tokens.push((bar, true)),
    }
}

/// Escape text for a Lilypond string literal
fn quote(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_voice, ParseOptions};

    fn render(text: &str, metadata: &Metadata) -> String {
        let options = ParseOptions {
            key: metadata.key,
            time: metadata.time,
            ..ParseOptions::default()
        };
        let voice = parse_voice(text, &options);
        to_lilypond(&voice.events, metadata)
    }

    #[test]
    fn test_header_and_score_blocks() {
        let metadata = Metadata {
            title: Some("Say \"hi\"".to_string()),
            composer: None,
            key: KeySignature::from_str("1=Bb").unwrap(),
            time: TimeSignature::from_str("3/4").unwrap(),
            tempo: Some(88),
        };
        let ly = render("1 2 3", &metadata);
        assert!(ly.contains("\\version \"2.18.2\""));
        assert!(ly.contains("\\language \"english\""));
        assert!(ly.contains("title = \"Say \\\"hi\\\"\""));
        assert!(ly.contains("\\key bf \\major"));
        assert!(ly.contains("\\time 3/4"));
        assert!(ly.contains("\\tempo 4 = 88"));
        assert!(ly.contains("bf'4 c''4 d''4"));
        assert!(ly.contains("\\layout"));
        assert!(ly.contains("\\midi"));
    }

    #[test]
    fn test_absolute_octaves_and_durations() {
        let ly = render("1 5,_ 3'. 0-", &Metadata::default());
        assert!(ly.contains("c'4 g8 e''4. r2"));
    }

    #[test]
    fn test_slurs_and_marks() {
        let ly = render("(1{ZhongYin} 2 3{BoYin})", &Metadata::default());
        assert!(ly.contains("c'4->( d'4 e'4\\prall)"));
    }

    #[test]
    fn test_tuplet_and_accidentals() {
        let ly = render("{(3}#1_ 2_ b3_)", &Metadata::default());
        assert!(ly.contains("\\tuplet 3/2 { cs'8 d'8 ef'8 }"));
    }

    #[test]
    fn test_natural_is_forced() {
        let metadata = Metadata {
            key: KeySignature::from_str("1=F").unwrap(),
            ..Metadata::default()
        };
        let ly = render("#4", &metadata);
        assert!(ly.contains("b'!4"));
    }

    #[test]
    fn test_repeat_and_volta_commands() {
        let ly = render("|: 1 |[1. 2 :| |[2. 3 |]", &Metadata::default());
        assert!(ly.contains("\\bar \".|:\""));
        assert!(ly.contains("\\set Score.repeatCommands = #'((volta \"1.\"))"));
        assert!(ly.contains("\\set Score.repeatCommands = #'((volta #f)) \\bar \":|.\""));
        assert!(ly.contains("\\set Score.repeatCommands = #'((volta \"2.\"))"));
        assert!(ly.ends_with("}\n"));
        assert_eq!(ly.matches("\\bar \"|.\"").count(), 1);
    }

    #[test]
    fn test_final_bar_added() {
        let ly = render("1 2 | 3 4", &Metadata::default());
        assert!(ly.contains("c'4 d'4 | e'4 f'4 \\bar \"|.\""));
    }

    #[test]
    fn test_directive_markup() {
        let ly = render("1 $(rit.) 2", &Metadata::default());
        assert!(ly.contains("<>^\\markup { \"rit.\" }"));
    }

    #[test]
    fn test_lines_wrap_after_barline() {
        let text = vec!["1 2 3 4 |"; 8].join(" ");
        let ly = render(&text, &Metadata::default());
        let music_lines = ly.lines().filter(|l| l.contains("c'4 d'4")).count();
        assert!(music_lines > 1);
        assert!(ly.lines().all(|l| l.len() < LINE_LIMIT + 20));
    }
}
