use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vigil_audio::load_clip;
use vigil_domain::{FeatureVector, Settings};
use vigil_emotion::{FeatureExtractor, FrequencyGate};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Extract voice emotion features for classifier training"
)]
struct Args {
    /// JSON list of `{ "path": .., "emotion": .. }` entries
    input: PathBuf,
    /// Where to write the feature rows (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Sample rate clips are resampled to before extraction
    #[arg(long, default_value_t = 16_000)]
    sample_rate: u32,
    /// Keep only clips accepted by the pitch gate
    #[arg(long)]
    gated: bool,
    /// Settings file supplying the gate band and pitch range
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct AnnotatedClip {
    path: PathBuf,
    emotion: String,
}

#[derive(Debug, Serialize)]
struct FeatureRow {
    path: PathBuf,
    emotion: String,
    median_hz: Option<f32>,
    features: FeatureVector,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let settings = Settings::load_or_default(args.config.as_deref())?.emotion;
    let file = File::open(&args.input).with_context(|| format!("open {:?}", args.input))?;
    let clips: Vec<AnnotatedClip> = serde_json::from_reader(BufReader::new(file))?;
    info!(count = clips.len(), "loaded annotations");

    let gate = FrequencyGate::from_settings(&settings);
    let extractor = FeatureExtractor::from_settings(&settings);
    let mut rows = Vec::with_capacity(clips.len());
    for clip in clips {
        let audio = match load_clip(&clip.path, args.sample_rate) {
            Ok(audio) => audio,
            Err(err) => {
                warn!(path = %clip.path.display(), "skipping unreadable clip: {err:#}");
                continue;
            }
        };
        let decision = gate.evaluate(&audio);
        if args.gated && !decision.accepted {
            continue;
        }
        let features = extractor.extract(&audio)?;
        rows.push(FeatureRow {
            path: clip.path,
            emotion: clip.emotion,
            median_hz: decision.is_measured().then_some(decision.median_hz),
            features,
        });
    }
    info!(rows = rows.len(), "features extracted");

    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("create {:?}", path))?,
        )),
        None => Box::new(std::io::stdout().lock()),
    };
    serde_json::to_writer_pretty(&mut writer, &rows)?;
    writeln!(writer)?;
    Ok(())
}
