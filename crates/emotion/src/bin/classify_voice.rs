use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde_json::json;
use tracing_subscriber::EnvFilter;
use vigil_audio::CpalBackend;
use vigil_domain::{CsvLog, Settings, RECORD_SOURCE};
use vigil_emotion::{ArtifactClassifier, EmotionService};

#[derive(Parser, Debug)]
#[command(author, version, about = "Detect the emotion in a voice clip", long_about = None)]
struct Cli {
    /// Audio file to analyse (wav, mp3, flac, ogg)
    #[arg(required_unless_present = "record", conflicts_with = "record")]
    input: Option<PathBuf>,
    /// Record from the default microphone instead of reading a file
    #[arg(short, long)]
    record: bool,
    /// Settings file (defaults to the per-user config)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Classifier artifact, overrides the configured path
    #[arg(short, long)]
    model: Option<PathBuf>,
    /// Request log, overrides the configured path
    #[arg(short, long)]
    log: Option<PathBuf>,
    /// Capture length in seconds when recording
    #[arg(long)]
    seconds: Option<f32>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::load_or_default(cli.config.as_deref())?.emotion;
    if let Some(model) = cli.model {
        settings.model_path = model;
    }
    if let Some(log) = cli.log {
        settings.log_path = log;
    }
    if let Some(seconds) = cli.seconds {
        settings.capture_seconds = seconds;
    }
    settings.validate().context("invalid emotion settings")?;

    let classifier = ArtifactClassifier::load(&settings.model_path)
        .with_context(|| format!("load classifier {:?}", settings.model_path))?;
    let log = CsvLog::open(&settings.log_path)?;
    let mut service = EmotionService::new(classifier, log, &settings);

    let (source, outcome) = match cli.input {
        Some(path) => {
            let source = path.display().to_string();
            (source, service.analyze_file(&path))
        }
        None => (
            RECORD_SOURCE.to_string(),
            service.analyze_recording(&CpalBackend::new()),
        ),
    };

    match outcome {
        Ok(outcome) => {
            let report = json!({ "source": source, "result": outcome });
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(err) => {
            let report = json!({ "source": source, "error": err.to_string() });
            println!("{}", serde_json::to_string_pretty(&report)?);
            Err(err.into())
        }
    }
}
