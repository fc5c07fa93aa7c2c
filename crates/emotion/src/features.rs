//! 34-value acoustic summary of a clip: MFCC mean/std, spectral centroid,
//! rolloff, zero-crossing rate and f0, each reduced to mean and std.

use tracing::{debug, instrument};

use vigil_audio::dsp::{normalize_buffer, pad_to_min_duration};
use vigil_audio::spectral::{spectral_centroid, spectral_rolloff, zero_crossing_rate, Mfcc};
use vigil_audio::{AudioError, Stft, YinTracker};
use vigil_domain::{
    AudioClip, EmotionSettings, FeatureVector, FrameStats, FrequencyBand, N_MFCC,
};

pub const N_FFT: usize = 2048;
pub const HOP: usize = 512;
pub const N_MELS: usize = 128;
pub const ROLLOFF_PERCENT: f32 = 0.85;
/// Shorter clips are zero-padded up to this length before analysis.
pub const MIN_CLIP_SECONDS: f32 = 1.0;

#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    pitch_range: FrequencyBand,
    silence_rms: f32,
}

impl FeatureExtractor {
    pub fn new(pitch_range: FrequencyBand, silence_rms: f32) -> Self {
        Self {
            pitch_range,
            silence_rms,
        }
    }

    pub fn from_settings(settings: &EmotionSettings) -> Self {
        Self::new(settings.pitch, settings.silence_rms)
    }

    #[instrument(skip_all, fields(samples = clip.len(), sample_rate = clip.sample_rate))]
    pub fn extract(&self, clip: &AudioClip) -> Result<FeatureVector, AudioError> {
        let sr = clip.sample_rate;
        let mut samples = pad_to_min_duration(&clip.samples, sr, MIN_CLIP_SECONDS);
        let peak = normalize_buffer(&mut samples);
        debug!(padded = samples.len(), peak = peak.magnitude(), "prepared clip");

        let stft = Stft::new(N_FFT, HOP)?;
        let magnitudes = stft.magnitudes(&samples)?;
        let freqs = stft.bin_frequencies(sr);

        let coefficients = Mfcc::new(sr, N_FFT, N_MELS, N_MFCC).compute(&magnitudes);
        let mut mfcc = [FrameStats::default(); N_MFCC];
        for (index, stats) in mfcc.iter_mut().enumerate() {
            let column: Vec<f32> = coefficients.iter().map(|frame| frame[index]).collect();
            *stats = FrameStats::of(&column);
        }

        let centroid = FrameStats::of(&spectral_centroid(&magnitudes, &freqs));
        let rolloff = FrameStats::of(&spectral_rolloff(&magnitudes, &freqs, ROLLOFF_PERCENT));
        let zcr = FrameStats::of(&zero_crossing_rate(&samples, N_FFT, HOP));
        let pitch = YinTracker::new(sr, self.pitch_range, self.silence_rms)
            .track(&samples)
            .stats();

        debug!(frames = magnitudes.len(), f0_mean = pitch.mean, "features extracted");
        Ok(FeatureVector::from_parts(&mfcc, centroid, rolloff, zcr, pitch))
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::from_settings(&EmotionSettings::default())
    }
}
