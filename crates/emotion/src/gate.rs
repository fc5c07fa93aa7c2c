use tracing::{debug, instrument};

use vigil_audio::YinTracker;
use vigil_domain::{AudioClip, EmotionSettings, FrequencyBand, GateDecision};

/// Accepts a clip when its median f0 falls inside a configured band.
///
/// The band is a plain pitch heuristic. Clips without a measurable pitch are
/// rejected.
#[derive(Debug, Clone)]
pub struct FrequencyGate {
    band: FrequencyBand,
    pitch_range: FrequencyBand,
    silence_rms: f32,
}

impl FrequencyGate {
    pub fn new(band: FrequencyBand, pitch_range: FrequencyBand, silence_rms: f32) -> Self {
        Self {
            band,
            pitch_range,
            silence_rms,
        }
    }

    pub fn from_settings(settings: &EmotionSettings) -> Self {
        Self::new(settings.gate, settings.pitch, settings.silence_rms)
    }

    pub fn band(&self) -> FrequencyBand {
        self.band
    }

    #[instrument(skip_all, fields(samples = clip.len(), sample_rate = clip.sample_rate))]
    pub fn evaluate(&self, clip: &AudioClip) -> GateDecision {
        let tracker = YinTracker::new(clip.sample_rate, self.pitch_range, self.silence_rms);
        let Some(median_hz) = tracker.track(&clip.samples).median() else {
            debug!("no measurable pitch, rejecting");
            return GateDecision::rejected_unmeasurable();
        };
        let accepted = self.band.contains(median_hz);
        debug!(median_hz, accepted, "gate decision");
        GateDecision {
            accepted,
            median_hz,
        }
    }
}

impl Default for FrequencyGate {
    fn default() -> Self {
        Self::from_settings(&EmotionSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f32, seconds: f32) -> AudioClip {
        let sr = 16_000;
        let samples = (0..(sr as f32 * seconds) as usize)
            .map(|i| 0.3 * (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin())
            .collect();
        AudioClip::new(samples, sr).unwrap()
    }

    #[test]
    fn accepts_tone_inside_band() {
        let decision = FrequencyGate::default().evaluate(&tone(200.0, 2.0));
        assert!(decision.accepted);
        assert!((decision.median_hz - 200.0).abs() < 1.0);
    }

    #[test]
    fn rejects_tone_outside_band() {
        let gate = FrequencyGate::default();
        assert!(!gate.evaluate(&tone(120.0, 2.0)).accepted);
        assert!(!gate.evaluate(&tone(300.0, 2.0)).accepted);
    }

    #[test]
    fn silence_fails_closed() {
        let decision = FrequencyGate::default().evaluate(&AudioClip::silence(16_000, 1.0));
        assert!(!decision.accepted);
        assert!(decision.median_hz.is_nan());
        assert_eq!(decision.note(), "f0_med=nanHz");

        let empty = AudioClip::new(Vec::new(), 16_000).unwrap();
        assert!(!FrequencyGate::default().evaluate(&empty).accepted);
    }

    #[test]
    fn band_is_configurable() {
        let gate = FrequencyGate::new(
            FrequencyBand::new(100.0, 140.0).unwrap(),
            FrequencyBand::default_pitch_range(),
            1e-4,
        );
        assert!(gate.evaluate(&tone(120.0, 2.0)).accepted);
        assert!(!gate.evaluate(&tone(200.0, 2.0)).accepted);
    }
}
