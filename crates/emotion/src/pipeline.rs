use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use vigil_audio::{load_clip, resample, AudioError, CaptureBackend, CaptureConfig, CaptureError};
use vigil_domain::{
    AudioClip, DomainError, EmotionLabel, EmotionSettings, LogRecord, LogSink, RECORD_SOURCE,
};

use crate::classifier::{ClassifierError, EmotionClassifier};
use crate::features::FeatureExtractor;
use crate::gate::FrequencyGate;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not read audio: {0}")]
    Acquisition(String),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error("could not write request log: {0}")]
    Log(#[from] DomainError),
}

/// Result of one emotion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Detected { emotion: EmotionLabel, median_hz: f32 },
    /// The clip's median f0 fell outside the gate band, or was unmeasurable (NaN).
    Rejected { median_hz: f32 },
}

impl Outcome {
    pub fn median_hz(&self) -> f32 {
        match self {
            Self::Detected { median_hz, .. } | Self::Rejected { median_hz } => *median_hz,
        }
    }

    pub fn emotion(&self) -> Option<&EmotionLabel> {
        match self {
            Self::Detected { emotion, .. } => Some(emotion),
            Self::Rejected { .. } => None,
        }
    }

    /// User-facing summary carrying the label (when any) and the measured frequency.
    pub fn message(&self) -> String {
        match self {
            Self::Detected { emotion, median_hz } => {
                format!("Detected emotion: {emotion}\n(f0 \u{2248} {median_hz:.0} Hz)")
            }
            Self::Rejected { median_hz } => format!(
                "Voice outside the accepted pitch band (median f0 {median_hz:.1} Hz), emotion not analysed."
            ),
        }
    }
}

/// Runs gate, feature extraction and classification for each request and
/// appends one log row per processed clip.
pub struct EmotionService<C, L> {
    classifier: C,
    log: L,
    gate: FrequencyGate,
    extractor: FeatureExtractor,
    capture_seconds: f32,
}

impl<C: EmotionClassifier, L: LogSink> EmotionService<C, L> {
    pub fn new(classifier: C, log: L, settings: &EmotionSettings) -> Self {
        Self {
            classifier,
            log,
            gate: FrequencyGate::from_settings(settings),
            extractor: FeatureExtractor::from_settings(settings),
            capture_seconds: settings.capture_seconds,
        }
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    /// Length of each microphone capture.
    pub fn capture_seconds(&self) -> f32 {
        self.capture_seconds
    }

    #[instrument(skip(self, clip), fields(samples = clip.len(), sample_rate = clip.sample_rate))]
    pub fn analyze_clip(&mut self, source: &str, clip: &AudioClip) -> Result<Outcome, PipelineError> {
        let target_rate = self.classifier.sample_rate();
        let resampled;
        let clip = if clip.sample_rate == target_rate {
            clip
        } else {
            resampled = AudioClip {
                samples: resample(&clip.samples, clip.sample_rate, target_rate)?,
                sample_rate: target_rate,
            };
            &resampled
        };

        let decision = self.gate.evaluate(clip);
        if !decision.accepted {
            info!(median_hz = decision.median_hz, "clip rejected by pitch gate");
            self.log
                .append(&LogRecord::new(source, None, false, decision.note()))?;
            return Ok(Outcome::Rejected {
                median_hz: decision.median_hz,
            });
        }

        let features = self.extractor.extract(clip)?;
        let emotion = self.classifier.predict(&features)?;
        info!(%emotion, median_hz = decision.median_hz, "emotion detected");
        self.log.append(&LogRecord::new(
            source,
            Some(emotion.to_string()),
            true,
            decision.note(),
        ))?;
        Ok(Outcome::Detected {
            emotion,
            median_hz: decision.median_hz,
        })
    }

    /// Decodes an audio file and analyses it. The log source is the file name.
    pub fn analyze_file(&mut self, path: &Path) -> Result<Outcome, PipelineError> {
        let clip = load_clip(path, self.classifier.sample_rate()).map_err(|err| {
            warn!(path = %path.display(), "failed to load audio: {err:#}");
            PipelineError::Acquisition(format!("{err:#}"))
        })?;
        let source = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.analyze_clip(&source, &clip)
    }

    /// Records from `backend` for the configured duration and analyses the clip.
    pub fn analyze_recording<B: CaptureBackend + ?Sized>(
        &mut self,
        backend: &B,
    ) -> Result<Outcome, PipelineError> {
        let config = CaptureConfig {
            seconds: self.capture_seconds,
            target_rate: self.classifier.sample_rate(),
        };
        let clip = backend.record(&config)?;
        self.analyze_clip(RECORD_SOURCE, &clip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_audio::NullBackend;
    use vigil_domain::{read_log, CsvLog, FeatureVector, MemoryLog};

    struct FixedClassifier {
        labels: Vec<EmotionLabel>,
    }

    impl FixedClassifier {
        fn new(label: &str) -> Self {
            Self {
                labels: vec![EmotionLabel::new(label)],
            }
        }
    }

    impl EmotionClassifier for FixedClassifier {
        fn labels(&self) -> &[EmotionLabel] {
            &self.labels
        }

        fn sample_rate(&self) -> u32 {
            16_000
        }

        fn predict(&self, _features: &FeatureVector) -> Result<EmotionLabel, ClassifierError> {
            Ok(self.labels[0].clone())
        }
    }

    struct BrokenClassifier;

    impl EmotionClassifier for BrokenClassifier {
        fn labels(&self) -> &[EmotionLabel] {
            &[]
        }

        fn sample_rate(&self) -> u32 {
            16_000
        }

        fn predict(&self, _features: &FeatureVector) -> Result<EmotionLabel, ClassifierError> {
            Err(ClassifierError::Invalid("broken".to_string()))
        }
    }

    struct FailingBackend;

    impl CaptureBackend for FailingBackend {
        fn record(&self, _config: &CaptureConfig) -> Result<AudioClip, CaptureError> {
            Err(CaptureError::NoInputDevice)
        }
    }

    fn tone(freq: f32, sample_rate: u32, seconds: f32) -> AudioClip {
        let samples = (0..(sample_rate as f32 * seconds) as usize)
            .map(|i| 0.4 * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect();
        AudioClip::new(samples, sample_rate).unwrap()
    }

    fn service<C: EmotionClassifier>(classifier: C) -> EmotionService<C, MemoryLog> {
        EmotionService::new(classifier, MemoryLog::new(), &EmotionSettings::default())
    }

    fn note_hz(note: &str) -> f32 {
        note.trim_start_matches("f0_med=")
            .trim_end_matches("Hz")
            .parse()
            .unwrap()
    }

    #[test]
    fn in_band_tone_is_classified_and_logged() {
        let mut service = service(FixedClassifier::new("happy"));
        let outcome = service.analyze_clip("clip.wav", &tone(200.0, 16_000, 4.0)).unwrap();

        assert_eq!(outcome.emotion().map(|e| e.as_str()), Some("happy"));
        assert!((outcome.median_hz() - 200.0).abs() < 1.0);
        let records = &service.log().records;
        assert_eq!(records.len(), 1);
        assert!(records[0].gate_passed);
        assert_eq!(records[0].source, "clip.wav");
        assert_eq!(records[0].emotion.as_deref(), Some("happy"));
        assert!((note_hz(&records[0].note) - 200.0).abs() < 1.0);
    }

    #[test]
    fn outcome_message_names_label_and_frequency() {
        let detected = Outcome::Detected {
            emotion: EmotionLabel::new("sad"),
            median_hz: 201.6,
        };
        assert_eq!(detected.message(), "Detected emotion: sad\n(f0 \u{2248} 202 Hz)");
        let rejected = Outcome::Rejected { median_hz: 120.04 };
        assert!(rejected.message().contains("120.0 Hz"), "{}", rejected.message());
        assert_eq!(service(FixedClassifier::new("sad")).capture_seconds(), 4.0);
    }

    #[test]
    fn low_tone_is_rejected_without_emotion() {
        let mut service = service(FixedClassifier::new("happy"));
        let outcome = service.analyze_clip("low.wav", &tone(120.0, 16_000, 4.0)).unwrap();

        assert!(matches!(outcome, Outcome::Rejected { .. }));
        let records = &service.log().records;
        assert_eq!(records.len(), 1);
        assert!(!records[0].gate_passed);
        assert_eq!(records[0].emotion, None);
        assert!((note_hz(&records[0].note) - 120.0).abs() <= 1.0, "{}", records[0].note);
    }

    #[test]
    fn clips_are_resampled_to_model_rate() {
        let mut service = service(FixedClassifier::new("calm"));
        let outcome = service.analyze_clip("hi-rate.wav", &tone(200.0, 44_100, 2.0)).unwrap();
        assert!((outcome.median_hz() - 200.0).abs() < 2.0);
        assert!(outcome.emotion().is_some());
    }

    #[test]
    fn silent_recording_is_rejected_and_logged() {
        let mut service = service(FixedClassifier::new("happy"));
        let outcome = service.analyze_recording(&NullBackend).unwrap();
        assert!(outcome.median_hz().is_nan());
        let record = &service.log().records[0];
        assert_eq!(record.source, RECORD_SOURCE);
        assert_eq!(record.note, "f0_med=nanHz");
    }

    #[test]
    fn acquisition_failures_write_no_row() {
        let mut service = service(FixedClassifier::new("happy"));
        let err = service.analyze_file(Path::new("does-not-exist.wav")).unwrap_err();
        assert!(matches!(err, PipelineError::Acquisition(_)));
        let err = service.analyze_recording(&FailingBackend).unwrap_err();
        assert!(matches!(err, PipelineError::Capture(CaptureError::NoInputDevice)));
        assert!(service.log().records.is_empty());
    }

    #[test]
    fn classifier_failure_is_reported_not_logged() {
        let mut service = service(BrokenClassifier);
        let err = service.analyze_clip("x.wav", &tone(200.0, 16_000, 2.0)).unwrap_err();
        assert!(matches!(err, PipelineError::Classifier(_)));
        assert!(service.log().records.is_empty());
    }

    #[test]
    fn csv_log_gets_one_row_per_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("requests.csv");
        let log = CsvLog::open(&path).unwrap();
        let mut service =
            EmotionService::new(FixedClassifier::new("sad"), log, &EmotionSettings::default());
        service.analyze_clip("a.wav", &tone(200.0, 16_000, 2.0)).unwrap();
        service.analyze_clip("b.wav", &tone(120.0, 16_000, 2.0)).unwrap();

        let rows = read_log(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].emotion.as_deref(), Some("sad"));
        assert!(rows[0].gate_passed);
        assert_eq!(rows[1].emotion, None);
        assert!(!rows[1].gate_passed);
    }

    #[test]
    fn outcome_serialises_with_status_tag() {
        let outcome = Outcome::Detected {
            emotion: EmotionLabel::new("happy"),
            median_hz: 201.5,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "detected");
        assert_eq!(json["emotion"], "happy");
    }
}
