use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const N_MFCC: usize = 13;
/// MFCC means and stds, then centroid, rolloff, ZCR and f0 as (mean, std) pairs.
pub const FEATURE_LEN: usize = 2 * N_MFCC + 8;

const CENTROID_OFFSET: usize = 2 * N_MFCC;
const ROLLOFF_OFFSET: usize = CENTROID_OFFSET + 2;
const ZCR_OFFSET: usize = ROLLOFF_OFFSET + 2;
const PITCH_OFFSET: usize = ZCR_OFFSET + 2;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct EmotionLabel(String);

impl EmotionLabel {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mean and population standard deviation of a per-frame statistic.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct FrameStats {
    pub mean: f32,
    pub std: f32,
}

impl FrameStats {
    pub fn of(values: &[f32]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().map(|v| *v as f64).sum::<f64>() / n;
        let var = values
            .iter()
            .map(|v| {
                let d = *v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        Self {
            mean: mean as f32,
            std: var.sqrt() as f32,
        }
    }
}

/// Fixed-layout input to the emotion classifier. Serialized as a plain
/// `FEATURE_LEN`-long sequence.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeatureVector([f32; FEATURE_LEN]);

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

impl<'de> Deserialize<'de> for FeatureVector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = Vec::<f32>::deserialize(deserializer)?;
        let len = values.len();
        let array: [f32; FEATURE_LEN] = values.try_into().map_err(|_| {
            D::Error::invalid_length(len, &format!("{FEATURE_LEN} feature values").as_str())
        })?;
        Ok(Self(array))
    }
}

impl FeatureVector {
    pub fn from_array(values: [f32; FEATURE_LEN]) -> Self {
        Self(values)
    }

    pub fn from_parts(
        mfcc: &[FrameStats; N_MFCC],
        centroid: FrameStats,
        rolloff: FrameStats,
        zcr: FrameStats,
        pitch: FrameStats,
    ) -> Self {
        let mut values = [0.0f32; FEATURE_LEN];
        for (index, stats) in mfcc.iter().enumerate() {
            values[index] = stats.mean;
            values[N_MFCC + index] = stats.std;
        }
        for (offset, stats) in [
            (CENTROID_OFFSET, centroid),
            (ROLLOFF_OFFSET, rolloff),
            (ZCR_OFFSET, zcr),
            (PITCH_OFFSET, pitch),
        ] {
            values[offset] = stats.mean;
            values[offset + 1] = stats.std;
        }
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn mfcc_means(&self) -> &[f32] {
        &self.0[..N_MFCC]
    }

    pub fn mfcc_stds(&self) -> &[f32] {
        &self.0[N_MFCC..CENTROID_OFFSET]
    }

    pub fn centroid(&self) -> FrameStats {
        self.pair(CENTROID_OFFSET)
    }

    pub fn rolloff(&self) -> FrameStats {
        self.pair(ROLLOFF_OFFSET)
    }

    pub fn zcr(&self) -> FrameStats {
        self.pair(ZCR_OFFSET)
    }

    pub fn pitch(&self) -> FrameStats {
        self.pair(PITCH_OFFSET)
    }

    fn pair(&self, offset: usize) -> FrameStats {
        FrameStats {
            mean: self.0[offset],
            std: self.0[offset + 1],
        }
    }
}

/// Outcome of fundamental-frequency tracking over a clip.
#[derive(Clone, Debug, PartialEq)]
pub enum PitchEstimate {
    /// Per-frame f0 in Hz for every frame that carried signal.
    Measured(Vec<f32>),
    Unmeasurable,
}

impl PitchEstimate {
    pub fn from_frames(frames: Vec<f32>) -> Self {
        let frames: Vec<f32> = frames.into_iter().filter(|f| f.is_finite()).collect();
        if frames.is_empty() {
            Self::Unmeasurable
        } else {
            Self::Measured(frames)
        }
    }

    pub fn median(&self) -> Option<f32> {
        match self {
            Self::Measured(frames) => {
                let mut sorted = frames.clone();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    Some((sorted[mid - 1] + sorted[mid]) / 2.0)
                } else {
                    Some(sorted[mid])
                }
            }
            Self::Unmeasurable => None,
        }
    }

    /// Mean and std of the measured frames, zeros when unmeasurable.
    pub fn stats(&self) -> FrameStats {
        match self {
            Self::Measured(frames) => FrameStats::of(frames),
            Self::Unmeasurable => FrameStats::default(),
        }
    }
}

/// Result of the pitch-band gate. `median_hz` is NaN when no pitch could be measured.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct GateDecision {
    pub accepted: bool,
    pub median_hz: f32,
}

impl GateDecision {
    pub fn rejected_unmeasurable() -> Self {
        Self {
            accepted: false,
            median_hz: f32::NAN,
        }
    }

    pub fn is_measured(&self) -> bool {
        self.median_hz.is_finite()
    }

    /// Log note in the `f0_med=180.3Hz` form.
    pub fn note(&self) -> String {
        if self.is_measured() {
            format!("f0_med={:.1}Hz", self.median_hz)
        } else {
            "f0_med=nanHz".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn feature_layout_holds_every_statistic() {
        assert_eq!(FEATURE_LEN, 34);
        let mfcc = [FrameStats { mean: 1.0, std: 2.0 }; N_MFCC];
        let vector = FeatureVector::from_parts(
            &mfcc,
            FrameStats { mean: 3.0, std: 4.0 },
            FrameStats { mean: 5.0, std: 6.0 },
            FrameStats { mean: 7.0, std: 8.0 },
            FrameStats { mean: 9.0, std: 10.0 },
        );
        assert_eq!(vector.as_slice().len(), 34);
        assert!(vector.mfcc_means().iter().all(|v| *v == 1.0));
        assert!(vector.mfcc_stds().iter().all(|v| *v == 2.0));
        assert_eq!(&vector.as_slice()[26..], &[3.0f32, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
        assert_eq!(vector.pitch(), FrameStats { mean: 9.0, std: 10.0 });
        assert_eq!(vector.zcr(), FrameStats { mean: 7.0, std: 8.0 });
    }

    #[test]
    fn feature_vector_serializes_as_flat_list() {
        let vector = FeatureVector::from_array(std::array::from_fn(|i| i as f32));
        let json = serde_json::to_string(&vector).unwrap();
        assert!(json.starts_with("[0.0,1.0,"));
        let back: FeatureVector = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vector);

        let short = serde_json::to_string(&vec![0.0f32; 32]).unwrap();
        let err = serde_json::from_str::<FeatureVector>(&short).unwrap_err();
        assert!(err.to_string().contains("34 feature values"), "{err}");
    }

    #[test]
    fn frame_stats_use_population_std() {
        let stats = FrameStats::of(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_relative_eq!(stats.mean, 5.0);
        assert_relative_eq!(stats.std, 2.0);
        assert_eq!(FrameStats::of(&[]), FrameStats::default());
    }

    #[test]
    fn pitch_median_even_and_odd() {
        let odd = PitchEstimate::from_frames(vec![210.0, 190.0, 200.0]);
        assert_eq!(odd.median(), Some(200.0));
        let even = PitchEstimate::from_frames(vec![100.0, 300.0, 200.0, 400.0]);
        assert_eq!(even.median(), Some(250.0));
    }

    #[test]
    fn non_finite_frames_are_dropped() {
        let estimate = PitchEstimate::from_frames(vec![f32::NAN, f32::INFINITY]);
        assert_eq!(estimate, PitchEstimate::Unmeasurable);
        assert_eq!(estimate.median(), None);
        assert_eq!(estimate.stats(), FrameStats::default());
    }

    #[test]
    fn gate_note_formats() {
        let decision = GateDecision {
            accepted: false,
            median_hz: 120.0,
        };
        assert_eq!(decision.note(), "f0_med=120.0Hz");
        assert_eq!(GateDecision::rejected_unmeasurable().note(), "f0_med=nanHz");
    }
}
