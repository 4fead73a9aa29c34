//! Heartsense: heart disease screening from a clinical intake form.
//!
//! Main entry point for the command-line assessment.
//!
//! ```bash
//! heartsense [--model-dir DIR] [--json] [PATIENT.json|-]
//! ```
//!
//! Without a patient file the form's default values are assessed.
//!
//! The bundled `models/` directory is unsigned. Either sign it first with
//! `model_tool sign models` (and point `HEARTSENSE_MODEL_SIGNING_PUBKEY_B64_FILE`
//! at the public key), or set `HEARTSENSE_ALLOW_UNSIGNED_MODELS=1` in a debug build.

use std::fs::File;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use heartsense::adapters::sanitize::SanitizingMakeWriter;
use heartsense::config::{LogMode, Settings};
use heartsense::{Assessment, PredictionService, RawPatientInput};

const USAGE: &str = "Usage: heartsense [--model-dir DIR] [--json] [PATIENT.json|-]";

#[derive(Debug, Default)]
struct Args {
    model_dir: Option<PathBuf>,
    json: bool,
    patient: Option<String>,
}

fn parse_args() -> Result<Option<Args>> {
    let mut parsed = Args::default();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--model-dir" => {
                let dir = args.next().context(USAGE)?;
                parsed.model_dir = Some(PathBuf::from(dir));
            }
            "--json" => parsed.json = true,
            "-h" | "--help" => {
                println!("{USAGE}");
                return Ok(None);
            }
            flag if flag.starts_with("--") => bail!("Unknown arg: {flag}\n{USAGE}"),
            _ if parsed.patient.is_none() => parsed.patient = Some(arg),
            _ => bail!("{USAGE}"),
        }
    }

    Ok(Some(parsed))
}

fn read_patient(source: Option<&str>) -> Result<RawPatientInput> {
    let input = match source {
        None => return Ok(RawPatientInput::default()),
        Some("-") => {
            let stdin = std::io::stdin().lock();
            RawPatientInput::from_json_reader(stdin)
                .context("Failed to read patient from stdin")?
        }
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open patient file {path:?}"))?;
            RawPatientInput::from_json_reader(file)
                .with_context(|| format!("Failed to read patient file {path:?}"))?
        }
    };
    Ok(input)
}

fn print_report(assessment: &Assessment) {
    let result = &assessment.result;
    println!("Model: {} {}", assessment.model.name, assessment.model.version);
    println!();
    println!("  Not Heart Patient   {:>3}%", result.no_disease_percent());
    println!("  Heart Patient       {:>3}%", result.disease_percent());
    println!();
    println!("{}", assessment.sentence);
}

fn main() -> Result<()> {
    let Some(args) = parse_args()? else {
        return Ok(());
    };

    let mut settings = Settings::from_env();
    if let Some(dir) = args.model_dir {
        settings.model_dir = dir;
    }

    // Initialize logging. stdout is reserved for the report.
    let (writer, _guard) = match settings.log_mode {
        LogMode::File => {
            if let Some(parent) = settings.log_file.parent() {
                // Best-effort: the open below reports the real failure.
                let _ = std::fs::create_dir_all(parent);
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&settings.log_file)
                .with_context(|| format!("Failed to open log file {:?}", settings.log_file))?;
            tracing_appender::non_blocking(file)
        }
        LogMode::Stderr => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(SanitizingMakeWriter::new(writer)),
        )
        .init();

    let input = read_patient(args.patient.as_deref())?;
    let service = PredictionService::shared(&settings)
        .with_context(|| format!("Failed to load classifier from {:?}", settings.model_dir))?;
    let assessment = service.assess(&input)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&assessment)?);
    } else {
        print_report(&assessment);
    }

    Ok(())
}
