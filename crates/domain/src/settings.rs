//! Persisted settings shared by the desktop app and the command line tools.
//!
//! Settings live as JSON under the platform config directory
//! (`~/.config/vigil/settings.json` on Linux). Every field has a default, so a
//! partial file or no file at all is valid.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::band::FrequencyBand;
use crate::DomainError;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub emotion: EmotionSettings,
    pub drowsiness: DrowsinessSettings,
}

/// Upper bound for a single microphone capture.
pub const MAX_CAPTURE_SECONDS: f32 = 600.0;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmotionSettings {
    /// Classifier artifact (JSON bundle).
    pub model_path: PathBuf,
    /// Append-only CSV request log.
    pub log_path: PathBuf,
    /// Length of a microphone capture.
    pub capture_seconds: f32,
    /// Accepted band for the clip's median f0.
    pub gate: FrequencyBand,
    /// Search range for the pitch tracker.
    pub pitch: FrequencyBand,
    /// Frames quieter than this RMS carry no pitch.
    pub silence_rms: f32,
}

impl Default for EmotionSettings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models").join("voice_emotion_model.json"),
            log_path: PathBuf::from("voice_emotion_logs.csv"),
            capture_seconds: 4.0,
            gate: FrequencyBand::default_gate(),
            pitch: FrequencyBand::default_pitch_range(),
            silence_rms: 1e-4,
        }
    }
}

impl EmotionSettings {
    pub fn validate(&self) -> Result<(), DomainError> {
        self.gate.validate()?;
        self.pitch.validate()?;
        if !(self.capture_seconds > 0.0 && self.capture_seconds <= MAX_CAPTURE_SECONDS) {
            return Err(DomainError::validation(format!(
                "capture length must be in (0, {MAX_CAPTURE_SECONDS}] seconds, got {}",
                self.capture_seconds
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DrowsinessSettings {
    /// OpenCV-format Haar cascade for frontal faces.
    pub face_cascade: PathBuf,
    /// OpenCV-format Haar cascade for eyes.
    pub eye_cascade: PathBuf,
    pub face_scale_factor: f32,
    pub face_min_neighbors: u32,
    pub eye_scale_factor: f32,
    pub eye_min_neighbors: u32,
    /// Faces with fewer detected eyes than this are drowsy.
    pub min_eyes_awake: usize,
}

impl Default for DrowsinessSettings {
    fn default() -> Self {
        Self {
            face_cascade: PathBuf::from("models").join("haarcascade_frontalface_default.xml"),
            eye_cascade: PathBuf::from("models").join("haarcascade_eye.xml"),
            face_scale_factor: 1.3,
            face_min_neighbors: 5,
            eye_scale_factor: 1.1,
            eye_min_neighbors: 3,
            min_eyes_awake: 2,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), DomainError> {
        self.emotion.validate()?;
        for (name, factor) in [
            ("face", self.drowsiness.face_scale_factor),
            ("eye", self.drowsiness.eye_scale_factor),
        ] {
            if !(factor > 1.0) {
                return Err(DomainError::validation(format!(
                    "{name} scale factor must be greater than 1"
                )));
            }
        }
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("read settings {:?}", path))?;
        let settings: Settings =
            serde_json::from_str(&data).with_context(|| format!("parse settings {:?}", path))?;
        settings.validate()?;
        info!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Explicit path if given, else the user config file, else defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => {
                debug!("no settings file, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

pub fn default_path() -> Option<PathBuf> {
    let base = dirs::config_dir()?;
    Some(base.join("vigil").join("settings.json"))
}
