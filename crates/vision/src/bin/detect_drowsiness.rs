use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vigil_domain::Settings;
use vigil_vision::{annotate, DrowsinessDetector};

#[derive(Parser, Debug)]
#[command(author, version, about = "Flag drowsy faces in a still image", long_about = None)]
struct Cli {
    /// Image to analyse
    input: PathBuf,
    /// Write the annotated image here
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Settings file (defaults to the per-user config)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Face cascade, overrides the configured path
    #[arg(long)]
    face_cascade: Option<PathBuf>,
    /// Eye cascade, overrides the configured path
    #[arg(long)]
    eye_cascade: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::load_or_default(cli.config.as_deref())?.drowsiness;
    if let Some(path) = cli.face_cascade {
        settings.face_cascade = path;
    }
    if let Some(path) = cli.eye_cascade {
        settings.eye_cascade = path;
    }

    let detector = DrowsinessDetector::from_settings(&settings).context("load cascades")?;
    let image =
        image::open(&cli.input).with_context(|| format!("open image {:?}", cli.input))?;
    let result = detector.analyze(&image);

    if let Some(output) = &cli.output {
        annotate(&image, &result)
            .save(output)
            .with_context(|| format!("write annotated image {:?}", output))?;
        info!(path = %output.display(), "annotated image written");
    }

    let report = json!({
        "source": cli.input.display().to_string(),
        "drowsy_count": result.drowsy_count,
        "faces": result.faces,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
