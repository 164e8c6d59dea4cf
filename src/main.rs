use clap::{Args, Parser, Subcommand};
use jpw::{
    convert_to_events_json, convert_to_lilypond, convert_to_musicxml, midi_to_jpw, read_document,
    JpwError, RenderOptions, Vocabulary,
};
use log::LevelFilter;
use std::path::{Path, PathBuf};
use std::{env, fs, process};

/// Convert JPW numbered notation to MusicXML or Lilypond, or MIDI back to JPW.
///
/// Logging is controlled with RUST_LOG; see docs for the env_logger crate.
/// If RUST_LOG is not set, the log level defaults to Info.
/// Notation problems are reported as warnings and never stop a conversion.
#[derive(Parser)]
#[command(version, about, long_about = None, verbatim_doc_comment)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a .jpw file to MusicXML
    Xml {
        #[command(flatten)]
        input: JpwInput,
        /// Ticks per quarter note
        #[arg(long, default_value_t = RenderOptions::default().divisions)]
        divisions: u32,
    },
    /// Convert a .jpw file to Lilypond
    Ly {
        #[command(flatten)]
        input: JpwInput,
    },
    /// Dump the resolved event stream of a .jpw file as JSON
    Events {
        #[command(flatten)]
        input: JpwInput,
    },
    /// Convert a standard MIDI file to .jpw
    FromMidi {
        input: PathBuf,
        /// Output file; standard output if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct JpwInput {
    input: PathBuf,
    /// Output file; standard output if omitted
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// YAML file adding decoration names (`decorations: { Name: accent|prall|mordent|trill|turn|fermata }`)
    #[arg(long)]
    vocabulary: Option<PathBuf>,
}

impl JpwInput {
    fn vocabulary(&self) -> jpw::Result<Vocabulary> {
        match &self.vocabulary {
            Some(path) => Vocabulary::load(path),
            None => Ok(Vocabulary::default()),
        }
    }
}

fn write_output(output: Option<&Path>, text: &str) -> jpw::Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text)?;
            log::info!("wrote {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

fn report(count: usize) {
    if count > 0 {
        log::info!("{} notation problems reported", count);
    }
}

fn run() -> jpw::Result<()> {
    let cli = Cli::parse();
    let mut log_builder = env_logger::builder();
    if env::var("RUST_LOG").is_err() {
        log_builder.filter_level(LevelFilter::Info);
    }
    log_builder.init();

    match cli.command {
        Commands::Xml { input, divisions } => {
            let vocabulary = input.vocabulary()?;
            let document = read_document(&input.input)?;
            let conversion = convert_to_musicxml(&document, &vocabulary, &RenderOptions { divisions });
            report(conversion.diagnostics.len());
            write_output(input.output.as_deref(), &conversion.output)
        }
        Commands::Ly { input } => {
            let vocabulary = input.vocabulary()?;
            let document = read_document(&input.input)?;
            let conversion = convert_to_lilypond(&document, &vocabulary);
            report(conversion.diagnostics.len());
            write_output(input.output.as_deref(), &conversion.output)
        }
        Commands::Events { input } => {
            let vocabulary = input.vocabulary()?;
            let document = read_document(&input.input)?;
            let json = convert_to_events_json(&document, &vocabulary)?;
            write_output(input.output.as_deref(), &format!("{}\n", json))
        }
        Commands::FromMidi { input, output } => {
            let bytes = fs::read(&input).map_err(|source| JpwError::InputUnavailable {
                path: input.clone(),
                source,
            })?;
            let jpw = midi_to_jpw(&bytes)?;
            write_output(output.as_deref(), &jpw)
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
