use crate::ast::*;
use crate::duration::to_ticks;
use quick_xml::escape::escape;

/// Rendering knobs for MusicXML output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Ticks per quarter note
    pub divisions: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        // divisible by 2, 3 and 8, so triplets and 32nds land on whole ticks
        Self { divisions: 24 }
    }
}

/// Convert grouped measures to a MusicXML score-partwise document
pub fn to_musicxml(measures: &[Measure], metadata: &Metadata, options: &RenderOptions) -> String {
    let mut xml = String::new();

    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(r#"<!DOCTYPE score-partwise PUBLIC "-//Recordare//DTD MusicXML 4.0 Partwise//EN" "http://www.musicxml.org/dtds/partwise.dtd">"#);
    xml.push('\n');
    xml.push_str(r#"<score-partwise version="4.0">"#);
    xml.push('\n');

    if let Some(title) = &metadata.title {
        xml.push_str("  <work>\n");
        xml.push_str(&format!("    <work-title>{}</work-title>\n", escape(title.as_str())));
        xml.push_str("  </work>\n");
    }

    if let Some(composer) = &metadata.composer {
        xml.push_str("  <identification>\n");
        xml.push_str(&format!(
            "    <creator type=\"composer\">{}</creator>\n",
            escape(composer.as_str())
        ));
        xml.push_str("  </identification>\n");
    }

    xml.push_str("  <part-list>\n");
    xml.push_str("    <score-part id=\"P1\">\n");
    xml.push_str("      <part-name>Music</part-name>\n");
    xml.push_str("    </score-part>\n");
    xml.push_str("  </part-list>\n");

    xml.push_str("  <part id=\"P1\">\n");

    if measures.is_empty() {
        // a score needs at least one measure to carry the attributes
        let empty = Measure {
            number: 1,
            left: None,
            events: Vec::new(),
            right: None,
            closes: Vec::new(),
        };
        xml.push_str(&measure_to_xml(&empty, metadata, options, true, true));
    }
    for (i, measure) in measures.iter().enumerate() {
        xml.push_str(&measure_to_xml(
            measure,
            metadata,
            options,
            i == 0,
            i + 1 == measures.len(),
        ));
    }

    xml.push_str("  </part>\n");
    xml.push_str("</score-partwise>\n");

    log::debug!("rendered {} measures as MusicXML", measures.len());
    xml
}

fn measure_to_xml(
    measure: &Measure,
    metadata: &Metadata,
    options: &RenderOptions,
    include_attributes: bool,
    is_last: bool,
) -> String {
    let mut xml = String::new();

    xml.push_str(&format!("    <measure number=\"{}\">\n", measure.number));

    if let Some(left) = &measure.left {
        xml.push_str(&left_barline_to_xml(left));
    }

    if include_attributes {
        xml.push_str(&attributes_to_xml(metadata, options));
        if let Some(tempo) = metadata.tempo {
            xml.push_str(&tempo_to_xml(tempo));
        }
    }

    for event in &measure.events {
        xml.push_str(&event_to_xml(event, options));
    }

    xml.push_str(&right_barline_to_xml(measure, is_last));

    xml.push_str("    </measure>\n");
    xml
}

fn attributes_to_xml(metadata: &Metadata, options: &RenderOptions) -> String {
    let mode = match metadata.key.mode {
        Mode::Major => "major",
        Mode::Minor => "minor",
    };

    let mut xml = String::new();
    xml.push_str("      <attributes>\n");
    xml.push_str(&format!("        <divisions>{}</divisions>\n", options.divisions));
    xml.push_str("        <key>\n");
    xml.push_str(&format!("          <fifths>{}</fifths>\n", metadata.key.fifths()));
    xml.push_str(&format!("          <mode>{}</mode>\n", mode));
    xml.push_str("        </key>\n");
    xml.push_str("        <time>\n");
    xml.push_str(&format!("          <beats>{}</beats>\n", metadata.time.beats));
    xml.push_str(&format!(
        "          <beat-type>{}</beat-type>\n",
        metadata.time.beat_type
    ));
    xml.push_str("        </time>\n");
    xml.push_str("        <clef>\n");
    xml.push_str("          <sign>G</sign>\n");
    xml.push_str("          <line>2</line>\n");
    xml.push_str("        </clef>\n");
    xml.push_str("      </attributes>\n");
    xml
}

fn tempo_to_xml(tempo: u16) -> String {
    let mut xml = String::new();
    xml.push_str("      <direction placement=\"above\">\n");
    xml.push_str("        <direction-type>\n");
    xml.push_str("          <metronome>\n");
    xml.push_str("            <beat-unit>quarter</beat-unit>\n");
    xml.push_str(&format!("            <per-minute>{}</per-minute>\n", tempo));
    xml.push_str("          </metronome>\n");
    xml.push_str("        </direction-type>\n");
    xml.push_str(&format!("        <sound tempo=\"{}\"/>\n", tempo));
    xml.push_str("      </direction>\n");
    xml
}

fn left_barline_to_xml(barline: &Barline) -> String {
    let forward = barline.repeat.is_some_and(RepeatDirection::is_forward);
    let volta = barline.volta_opened();
    if !forward && volta.is_none() {
        return String::new();
    }

    let mut xml = String::new();
    xml.push_str("      <barline location=\"left\">\n");
    if forward {
        xml.push_str("        <bar-style>heavy-light</bar-style>\n");
    }
    if let Some(number) = volta {
        xml.push_str(&format!(
            "        <ending number=\"{}\" type=\"start\">{}.</ending>\n",
            number, number
        ));
    }
    if forward {
        xml.push_str("        <repeat direction=\"forward\"/>\n");
    }
    xml.push_str("      </barline>\n");
    xml
}

fn right_barline_to_xml(measure: &Measure, is_last: bool) -> String {
    let (style, backward, closed) = match &measure.right {
        Some(right) => (
            right.style,
            right.repeat.is_some_and(RepeatDirection::is_backward),
            right.volta_closed(),
        ),
        None if is_last => (BarStyle::LightHeavy, false, None),
        None => (BarStyle::Regular, false, None),
    };
    let owed = measure.closes.iter().find_map(|scope| match scope {
        Scope::Volta(n) => Some(*n),
        Scope::Repeat => None,
    });

    let style = if backward { BarStyle::LightHeavy } else { style };
    if style == BarStyle::Regular && !backward && closed.is_none() && owed.is_none() {
        return String::new();
    }

    let mut xml = String::new();
    xml.push_str("      <barline location=\"right\">\n");
    xml.push_str(&format!("        <bar-style>{}</bar-style>\n", style.musicxml_name()));
    if let Some(number) = closed {
        xml.push_str(&format!("        <ending number=\"{}\" type=\"stop\"/>\n", number));
    } else if let Some(number) = owed {
        xml.push_str(&format!(
            "        <ending number=\"{}\" type=\"discontinue\"/>\n",
            number
        ));
    }
    if backward {
        xml.push_str("        <repeat direction=\"backward\"/>\n");
    }
    xml.push_str("      </barline>\n");
    xml
}

fn event_to_xml(event: &Event, options: &RenderOptions) -> String {
    match event {
        Event::Note(note) => note_to_xml(note, options),
        Event::Rest(rest) => rest_to_xml(rest, options),
        Event::TupletGroup(group) => group
            .members
            .iter()
            .map(|member| event_to_xml(member, options))
            .collect(),
        Event::Directive(directive) => directive_to_xml(directive),
        Event::Barline(_) | Event::ScopeClose { .. } => String::new(),
    }
}

fn note_to_xml(note: &Note, options: &RenderOptions) -> String {
    let mut xml = String::new();

    xml.push_str("      <note>\n");

    xml.push_str("        <pitch>\n");
    xml.push_str(&format!("          <step>{}</step>\n", note.pitch.step.as_str()));
    if note.pitch.alter != 0 {
        xml.push_str(&format!("          <alter>{}</alter>\n", note.pitch.alter));
    }
    xml.push_str(&format!("          <octave>{}</octave>\n", note.pitch.octave));
    xml.push_str("        </pitch>\n");

    xml.push_str(&format!(
        "        <duration>{}</duration>\n",
        to_ticks(note.beats, options.divisions)
    ));
    xml.push_str("        <voice>1</voice>\n");
    xml.push_str(&type_to_xml(&note.notated));

    if let Some(accidental) = note.pitch.accidental {
        xml.push_str(&format!(
            "        <accidental>{}</accidental>\n",
            accidental.musicxml_name()
        ));
    }

    if let Some(tuplet) = note.tuplet {
        xml.push_str(&time_modification_to_xml(&tuplet));
    }

    let mut notations = String::new();
    if let Some(tuplet) = note.tuplet {
        notations.push_str(&tuplet_notation_to_xml(&tuplet));
    }
    if note.slur_start {
        notations.push_str("          <slur type=\"start\" number=\"1\"/>\n");
    }
    if note.slur_end {
        notations.push_str("          <slur type=\"stop\" number=\"1\"/>\n");
    }
    if note.accent {
        notations.push_str("          <articulations>\n");
        notations.push_str("            <accent/>\n");
        notations.push_str("          </articulations>\n");
    }
    match note.ornament {
        Some(Ornament::Fermata) => notations.push_str("          <fermata/>\n"),
        Some(ornament) => {
            let name = match ornament {
                Ornament::Prall => "inverted-mordent",
                Ornament::Mordent => "mordent",
                Ornament::Trill => "trill-mark",
                Ornament::Turn => "turn",
                Ornament::Fermata => "fermata",
            };
            notations.push_str("          <ornaments>\n");
            notations.push_str(&format!("            <{}/>\n", name));
            notations.push_str("          </ornaments>\n");
        }
        None => {}
    }
    if !notations.is_empty() {
        xml.push_str("        <notations>\n");
        xml.push_str(&notations);
        xml.push_str("        </notations>\n");
    }

    xml.push_str("      </note>\n");
    xml
}

fn rest_to_xml(rest: &Rest, options: &RenderOptions) -> String {
    let mut xml = String::new();

    xml.push_str("      <note>\n");
    xml.push_str("        <rest/>\n");
    xml.push_str(&format!(
        "        <duration>{}</duration>\n",
        to_ticks(rest.beats, options.divisions)
    ));
    xml.push_str("        <voice>1</voice>\n");
    xml.push_str(&type_to_xml(&rest.notated));

    if let Some(tuplet) = rest.tuplet {
        xml.push_str(&time_modification_to_xml(&tuplet));
        let notation = tuplet_notation_to_xml(&tuplet);
        if !notation.is_empty() {
            xml.push_str("        <notations>\n");
            xml.push_str(&notation);
            xml.push_str("        </notations>\n");
        }
    }

    xml.push_str("      </note>\n");
    xml
}

fn type_to_xml(notated: &NotatedDuration) -> String {
    let mut xml = format!("        <type>{}</type>\n", notated.note_type.musicxml_type());
    for _ in 0..notated.dots {
        xml.push_str("        <dot/>\n");
    }
    xml
}

fn time_modification_to_xml(tuplet: &TupletInfo) -> String {
    let mut xml = String::new();
    xml.push_str("        <time-modification>\n");
    xml.push_str(&format!("          <actual-notes>{}</actual-notes>\n", tuplet.actual_notes));
    xml.push_str(&format!("          <normal-notes>{}</normal-notes>\n", tuplet.normal_notes));
    xml.push_str("        </time-modification>\n");
    xml
}

fn tuplet_notation_to_xml(tuplet: &TupletInfo) -> String {
    let mut xml = String::new();
    if tuplet.is_start {
        xml.push_str("          <tuplet type=\"start\" bracket=\"yes\"/>\n");
    }
    if tuplet.is_stop {
        xml.push_str("          <tuplet type=\"stop\"/>\n");
    }
    xml
}

fn directive_to_xml(directive: &Directive) -> String {
    let mut xml = String::new();
    xml.push_str("      <direction placement=\"above\">\n");
    xml.push_str("        <direction-type>\n");
    xml.push_str(&format!(
        "          <words>{}</words>\n",
        escape(directive.text.as_str())
    ));
    xml.push_str("        </direction-type>\n");
    xml.push_str("      </direction>\n");
    xml
}
