//! Emotion classifier artifact.
//!
//! The artifact is a JSON bundle holding the label list, the sample rate the
//! model was trained at, an optional standard scaler and a decision model:
//!
//! ```json
//! {
//!   "emotions": ["angry", "happy", "neutral", "sad"],
//!   "sr": 16000,
//!   "scaler": { "mean": [..34], "scale": [..34] },
//!   "model": { "kind": "linear", "coef": [[..34], ..], "intercept": [..] }
//! }
//! ```
//!
//! `kind` may also be `nearest_centroid` with a `centroids` matrix. Either
//! model may carry `classes`, mapping decision rows to label indices.

use std::path::Path;

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

use vigil_domain::{EmotionLabel, FeatureVector, FEATURE_LEN};

pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("failed to read classifier artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed classifier artifact: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid classifier artifact: {0}")]
    Invalid(String),
}

fn invalid<T>(message: impl Into<String>) -> Result<T, ClassifierError> {
    Err(ClassifierError::Invalid(message.into()))
}

/// Maps a feature vector to one of a fixed set of emotion labels.
pub trait EmotionClassifier {
    fn labels(&self) -> &[EmotionLabel];
    /// Rate clips must be at before feature extraction.
    fn sample_rate(&self) -> u32;
    fn predict(&self, features: &FeatureVector) -> Result<EmotionLabel, ClassifierError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub emotions: Vec<String>,
    #[serde(default = "default_sample_rate")]
    pub sr: u32,
    #[serde(default)]
    pub scaler: Option<ScalerFile>,
    pub model: ModelFile,
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerFile {
    pub mean: Vec<f32>,
    pub scale: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelFile {
    Linear {
        coef: Vec<Vec<f32>>,
        intercept: Vec<f32>,
        #[serde(default)]
        classes: Option<Vec<usize>>,
    },
    NearestCentroid {
        centroids: Vec<Vec<f32>>,
        #[serde(default)]
        classes: Option<Vec<usize>>,
    },
}

#[derive(Debug, Clone)]
struct Scaler {
    mean: Array1<f32>,
    scale: Array1<f32>,
}

impl Scaler {
    fn transform(&self, x: ArrayView1<f32>) -> Array1<f32> {
        (&x - &self.mean) / &self.scale
    }
}

#[derive(Debug, Clone)]
enum DecisionModel {
    Linear {
        coef: Array2<f32>,
        intercept: Array1<f32>,
    },
    NearestCentroid {
        centroids: Array2<f32>,
    },
}

impl DecisionModel {
    /// Index of the winning decision output; ties go to the lowest index.
    fn decide(&self, x: ArrayView1<f32>) -> usize {
        match self {
            Self::Linear { coef, intercept } => {
                let scores = coef.dot(&x) + intercept;
                if scores.len() == 1 {
                    usize::from(scores[0] > 0.0)
                } else {
                    first_extreme(scores.iter().copied(), |candidate, best| candidate > best)
                }
            }
            Self::NearestCentroid { centroids } => {
                let distances = centroids
                    .rows()
                    .into_iter()
                    .map(|row| {
                        row.iter()
                            .zip(x.iter())
                            .map(|(c, v)| (c - v) * (c - v))
                            .sum::<f32>()
                    });
                first_extreme(distances, |candidate, best| candidate < best)
            }
        }
    }

    /// Number of distinct outputs `decide` can return.
    fn outputs(&self) -> usize {
        match self {
            Self::Linear { coef, .. } if coef.nrows() == 1 => 2,
            Self::Linear { coef, .. } => coef.nrows(),
            Self::NearestCentroid { centroids } => centroids.nrows(),
        }
    }
}

fn first_extreme(values: impl Iterator<Item = f32>, better: impl Fn(f32, f32) -> bool) -> usize {
    let mut best: Option<(usize, f32)> = None;
    for (index, value) in values.enumerate() {
        match best {
            Some((_, current)) if !better(value, current) => {}
            _ => best = Some((index, value)),
        }
    }
    best.map(|(index, _)| index).unwrap_or(0)
}

/// Classifier backed by a validated JSON artifact.
#[derive(Debug, Clone)]
pub struct ArtifactClassifier {
    labels: Vec<EmotionLabel>,
    sample_rate: u32,
    scaler: Option<Scaler>,
    model: DecisionModel,
    classes: Vec<usize>,
}

impl ArtifactClassifier {
    #[instrument]
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let text = std::fs::read_to_string(path).map_err(|source| ClassifierError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let classifier = Self::from_json(&text)?;
        info!(
            labels = classifier.labels.len(),
            sample_rate = classifier.sample_rate,
            "classifier artifact loaded"
        );
        Ok(classifier)
    }

    pub fn from_json(text: &str) -> Result<Self, ClassifierError> {
        Self::from_artifact(serde_json::from_str(text)?)
    }

    pub fn from_artifact(artifact: ArtifactFile) -> Result<Self, ClassifierError> {
        if artifact.emotions.is_empty() {
            return invalid("emotion list is empty");
        }
        if artifact.sr == 0 {
            return invalid("sample rate must be positive");
        }
        let scaler = artifact.scaler.map(build_scaler).transpose()?;
        let (model, classes) = match artifact.model {
            ModelFile::Linear {
                coef,
                intercept,
                classes,
            } => {
                let coef = matrix("coef", coef)?;
                if intercept.len() != coef.nrows() {
                    return invalid(format!(
                        "intercept has {} entries for {} coefficient rows",
                        intercept.len(),
                        coef.nrows()
                    ));
                }
                let intercept = vector("intercept", intercept, coef.nrows())?;
                (DecisionModel::Linear { coef, intercept }, classes)
            }
            ModelFile::NearestCentroid { centroids, classes } => {
                let centroids = matrix("centroids", centroids)?;
                (DecisionModel::NearestCentroid { centroids }, classes)
            }
        };

        let outputs = model.outputs();
        let classes = classes.unwrap_or_else(|| (0..outputs).collect());
        if classes.len() != outputs {
            return invalid(format!(
                "model has {outputs} outputs but {} class entries",
                classes.len()
            ));
        }
        if let Some(bad) = classes.iter().find(|c| **c >= artifact.emotions.len()) {
            return invalid(format!(
                "class index {bad} out of range for {} emotions",
                artifact.emotions.len()
            ));
        }
        debug!(outputs, "decision model validated");

        Ok(Self {
            labels: artifact.emotions.into_iter().map(EmotionLabel::new).collect(),
            sample_rate: artifact.sr,
            scaler,
            model,
            classes,
        })
    }
}

fn build_scaler(file: ScalerFile) -> Result<Scaler, ClassifierError> {
    let mean = vector("scaler mean", file.mean, FEATURE_LEN)?;
    // zero-variance features are left unscaled
    let scale = vector("scaler scale", file.scale, FEATURE_LEN)?
        .mapv(|s| if s == 0.0 { 1.0 } else { s });
    Ok(Scaler { mean, scale })
}

fn check_values(name: &str, values: &[f32], len: usize) -> Result<(), ClassifierError> {
    if values.len() != len {
        return invalid(format!("{name} has {} values, expected {len}", values.len()));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return invalid(format!("{name} contains non-finite values"));
    }
    Ok(())
}

fn vector(name: &str, values: Vec<f32>, len: usize) -> Result<Array1<f32>, ClassifierError> {
    check_values(name, &values, len)?;
    Ok(Array1::from(values))
}

fn matrix(name: &str, rows: Vec<Vec<f32>>) -> Result<Array2<f32>, ClassifierError> {
    if rows.is_empty() {
        return invalid(format!("{name} has no rows"));
    }
    let n_rows = rows.len();
    let mut flat = Vec::with_capacity(n_rows * FEATURE_LEN);
    for (index, row) in rows.into_iter().enumerate() {
        check_values(&format!("{name} row {index}"), &row, FEATURE_LEN)?;
        flat.extend(row);
    }
    Array2::from_shape_vec((n_rows, FEATURE_LEN), flat)
        .map_err(|e| ClassifierError::Invalid(format!("{name}: {e}")))
}

impl EmotionClassifier for ArtifactClassifier {
    fn labels(&self) -> &[EmotionLabel] {
        &self.labels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn predict(&self, features: &FeatureVector) -> Result<EmotionLabel, ClassifierError> {
        let raw = ArrayView1::from(features.as_slice());
        let scaled = match &self.scaler {
            Some(scaler) => scaler.transform(raw),
            None => raw.to_owned(),
        };
        let output = self.model.decide(scaled.view());
        let label = self
            .classes
            .get(output)
            .and_then(|class| self.labels.get(*class))
            .cloned()
            .ok_or_else(|| ClassifierError::Invalid(format!("no label for output {output}")))?;
        debug!(output, %label, "classified");
        Ok(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn one_hot(index: usize, value: f32) -> Vec<f32> {
        let mut row = vec![0.0; FEATURE_LEN];
        row[index] = value;
        row
    }

    fn features(values: &[(usize, f32)]) -> FeatureVector {
        let mut array = [0.0f32; FEATURE_LEN];
        for (index, value) in values {
            array[*index] = *value;
        }
        FeatureVector::from_array(array)
    }

    fn linear_artifact() -> serde_json::Value {
        json!({
            "emotions": ["angry", "happy", "sad"],
            "model": {
                "kind": "linear",
                "coef": [one_hot(0, 1.0), one_hot(1, 1.0), one_hot(2, 1.0)],
                "intercept": [0.0, 0.0, 0.0]
            }
        })
    }

    #[test]
    fn linear_model_picks_argmax() {
        let classifier = ArtifactClassifier::from_json(&linear_artifact().to_string()).unwrap();
        assert_eq!(classifier.sample_rate(), DEFAULT_SAMPLE_RATE);
        assert_eq!(classifier.labels().len(), 3);
        let label = classifier.predict(&features(&[(1, 2.0), (2, 1.0)])).unwrap();
        assert_eq!(label.as_str(), "happy");
    }

    #[test]
    fn ties_resolve_to_first_row() {
        let classifier = ArtifactClassifier::from_json(&linear_artifact().to_string()).unwrap();
        let label = classifier.predict(&features(&[])).unwrap();
        assert_eq!(label.as_str(), "angry");
    }

    #[test]
    fn binary_linear_uses_sign() {
        let artifact = json!({
            "emotions": ["calm", "angry"],
            "sr": 22050,
            "model": { "kind": "linear", "coef": [one_hot(5, 1.0)], "intercept": [-1.0] }
        });
        let classifier = ArtifactClassifier::from_json(&artifact.to_string()).unwrap();
        assert_eq!(classifier.sample_rate(), 22_050);
        assert_eq!(classifier.predict(&features(&[(5, 3.0)])).unwrap().as_str(), "angry");
        assert_eq!(classifier.predict(&features(&[(5, 0.5)])).unwrap().as_str(), "calm");
    }

    #[test]
    fn scaler_is_applied_before_decision() {
        let mut mean = vec![0.0; FEATURE_LEN];
        mean[0] = 100.0;
        let mut scale = vec![1.0; FEATURE_LEN];
        scale[3] = 0.0;
        let artifact = json!({
            "emotions": ["low", "high"],
            "scaler": { "mean": mean, "scale": scale },
            "model": { "kind": "linear", "coef": [one_hot(0, 1.0)], "intercept": [0.0] }
        });
        let classifier = ArtifactClassifier::from_json(&artifact.to_string()).unwrap();
        assert_eq!(classifier.predict(&features(&[(0, 90.0)])).unwrap().as_str(), "low");
        assert_eq!(classifier.predict(&features(&[(0, 110.0), (3, 5.0)])).unwrap().as_str(), "high");
    }

    #[test]
    fn nearest_centroid_with_class_map() {
        let artifact = json!({
            "emotions": ["neutral", "happy", "sad"],
            "model": {
                "kind": "nearest_centroid",
                "centroids": [one_hot(0, 10.0), one_hot(0, -10.0)],
                "classes": [2, 1]
            }
        });
        let classifier = ArtifactClassifier::from_json(&artifact.to_string()).unwrap();
        assert_eq!(classifier.predict(&features(&[(0, 8.0)])).unwrap().as_str(), "sad");
        assert_eq!(classifier.predict(&features(&[(0, -3.0)])).unwrap().as_str(), "happy");
    }

    #[test]
    fn prediction_is_deterministic() {
        let classifier = ArtifactClassifier::from_json(&linear_artifact().to_string()).unwrap();
        let input = features(&[(0, 0.3), (1, 0.2), (2, 0.31)]);
        let first = classifier.predict(&input).unwrap();
        for _ in 0..10 {
            assert_eq!(classifier.predict(&input).unwrap(), first);
        }
    }

    #[test]
    fn rejects_wrong_dimensions() {
        let artifact = json!({
            "emotions": ["a", "b"],
            "model": { "kind": "linear", "coef": [[1.0, 2.0]], "intercept": [0.0] }
        });
        let err = ArtifactClassifier::from_json(&artifact.to_string()).unwrap_err();
        assert!(matches!(err, ClassifierError::Invalid(_)), "{err}");

        let artifact = json!({
            "emotions": ["a"],
            "model": { "kind": "linear", "coef": [one_hot(0, 1.0), one_hot(1, 1.0)], "intercept": [0.0, 0.0] }
        });
        assert!(ArtifactClassifier::from_json(&artifact.to_string()).is_err());
    }

    #[test]
    fn rejects_unknown_model_kind() {
        let artifact = json!({ "emotions": ["a"], "model": { "kind": "svm" } });
        let err = ArtifactClassifier::from_json(&artifact.to_string()).unwrap_err();
        assert!(matches!(err, ClassifierError::Parse(_)));
    }

    #[test]
    fn loads_from_disk_and_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(linear_artifact().to_string().as_bytes())
            .unwrap();
        assert!(ArtifactClassifier::load(&path).is_ok());

        let missing = ArtifactClassifier::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(missing, ClassifierError::Io { .. }));
    }
}
