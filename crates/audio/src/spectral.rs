//! Frame-level spectral descriptors: MFCC, centroid, rolloff and zero-crossing rate.
//!
//! Conventions follow the common audio-analysis defaults: Slaney mel scale with
//! area-normalised triangles, power-to-dB with an 80 dB dynamic range and an
//! orthonormal DCT-II.

use crate::dsp::{centered_frames, PadMode};

const MIN_LOG_HZ: f64 = 1000.0;
const LINEAR_HZ_PER_MEL: f64 = 200.0 / 3.0;
const AMIN: f32 = 1e-10;
const TOP_DB: f32 = 80.0;
/// Samples at or below this magnitude count as zero for crossing detection.
const ZCR_THRESHOLD: f32 = 1e-10;

fn min_log_mel() -> f64 {
    MIN_LOG_HZ / LINEAR_HZ_PER_MEL
}

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        min_log_mel() + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / LINEAR_HZ_PER_MEL
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= min_log_mel() {
        MIN_LOG_HZ * (log_step() * (mel - min_log_mel())).exp()
    } else {
        mel * LINEAR_HZ_PER_MEL
    }
}

/// Triangular mel filters over the bins of an `n_fft`-point spectrum.
#[derive(Debug, Clone)]
pub struct MelFilterBank {
    weights: Vec<Vec<f32>>,
}

impl MelFilterBank {
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize, fmin: f32, fmax: f32) -> Self {
        let bins = n_fft / 2 + 1;
        let fft_freqs: Vec<f64> = (0..bins)
            .map(|bin| bin as f64 * sample_rate as f64 / n_fft as f64)
            .collect();
        let mel_min = hz_to_mel(fmin as f64);
        let mel_max = hz_to_mel(fmax as f64);
        let edges: Vec<f64> = (0..n_mels + 2)
            .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (n_mels + 1) as f64))
            .collect();

        let weights = (0..n_mels)
            .map(|m| {
                let lower_width = edges[m + 1] - edges[m];
                let upper_width = edges[m + 2] - edges[m + 1];
                let enorm = 2.0 / (edges[m + 2] - edges[m]);
                fft_freqs
                    .iter()
                    .map(|f| {
                        let lower = (f - edges[m]) / lower_width;
                        let upper = (edges[m + 2] - f) / upper_width;
                        (lower.min(upper).max(0.0) * enorm) as f32
                    })
                    .collect()
            })
            .collect();
        Self { weights }
    }

    pub fn n_mels(&self) -> usize {
        self.weights.len()
    }

    pub fn apply(&self, power: &[f32]) -> Vec<f32> {
        self.weights
            .iter()
            .map(|row| row.iter().zip(power).map(|(w, p)| w * p).sum())
            .collect()
    }
}

/// Mel-frequency cepstral coefficients from a magnitude spectrogram.
#[derive(Debug, Clone)]
pub struct Mfcc {
    filters: MelFilterBank,
    dct: Vec<Vec<f32>>,
}

impl Mfcc {
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize, n_mfcc: usize) -> Self {
        let filters = MelFilterBank::new(sample_rate, n_fft, n_mels, 0.0, sample_rate as f32 / 2.0);
        Self {
            dct: dct_ortho(n_mfcc, n_mels),
            filters,
        }
    }

    pub fn n_mfcc(&self) -> usize {
        self.dct.len()
    }

    /// One coefficient row per frame.
    pub fn compute(&self, magnitudes: &[Vec<f32>]) -> Vec<Vec<f32>> {
        let mut log_mel: Vec<Vec<f32>> = magnitudes
            .iter()
            .map(|frame| {
                let power: Vec<f32> = frame.iter().map(|m| m * m).collect();
                self.filters
                    .apply(&power)
                    .into_iter()
                    .map(|e| 10.0 * e.max(AMIN).log10())
                    .collect()
            })
            .collect();

        let peak = log_mel
            .iter()
            .flatten()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max);
        let floor = peak - TOP_DB;
        for value in log_mel.iter_mut().flatten() {
            *value = value.max(floor);
        }

        log_mel
            .iter()
            .map(|frame| {
                self.dct
                    .iter()
                    .map(|basis| basis.iter().zip(frame).map(|(b, x)| b * x).sum())
                    .collect()
            })
            .collect()
    }
}

fn dct_ortho(n_out: usize, n_in: usize) -> Vec<Vec<f32>> {
    let n = n_in as f64;
    (0..n_out)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            (0..n_in)
                .map(|i| {
                    let angle = std::f64::consts::PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n);
                    (scale * angle.cos()) as f32
                })
                .collect()
        })
        .collect()
}

/// Magnitude-weighted mean frequency per frame; silent frames give 0.
pub fn spectral_centroid(magnitudes: &[Vec<f32>], freqs: &[f32]) -> Vec<f32> {
    magnitudes
        .iter()
        .map(|frame| {
            let total: f32 = frame.iter().sum();
            if total <= f32::MIN_POSITIVE {
                return 0.0;
            }
            frame.iter().zip(freqs).map(|(m, f)| m * f).sum::<f32>() / total
        })
        .collect()
}

/// Lowest frequency below which `roll_percent` of each frame's magnitude lies.
pub fn spectral_rolloff(magnitudes: &[Vec<f32>], freqs: &[f32], roll_percent: f32) -> Vec<f32> {
    magnitudes
        .iter()
        .map(|frame| {
            let total: f32 = frame.iter().sum();
            let threshold = roll_percent * total;
            let mut cumulative = 0.0f32;
            for (m, f) in frame.iter().zip(freqs) {
                cumulative += m;
                if cumulative >= threshold {
                    return *f;
                }
            }
            freqs.last().copied().unwrap_or(0.0)
        })
        .collect()
}

/// Fraction of sign changes per centred frame (edge-padded).
pub fn zero_crossing_rate(samples: &[f32], frame_length: usize, hop: usize) -> Vec<f32> {
    centered_frames(samples, frame_length, hop, PadMode::Edge)
        .iter()
        .map(|frame| {
            let negative = |s: &f32| s.abs() > ZCR_THRESHOLD && s.is_sign_negative();
            let crossings = frame
                .windows(2)
                .filter(|pair| negative(&pair[0]) != negative(&pair[1]))
                .count();
            crossings as f32 / frame.len() as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stft::Stft;
    use approx::assert_abs_diff_eq;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn mel_scale_round_trips() {
        for hz in [0.0, 440.0, 1000.0, 4000.0, 8000.0] {
            assert_abs_diff_eq!(mel_to_hz(hz_to_mel(hz)), hz, epsilon = 1e-6);
        }
        assert_abs_diff_eq!(hz_to_mel(1000.0), 15.0, epsilon = 1e-9);
    }

    #[test]
    fn filter_bank_shape() {
        let bank = MelFilterBank::new(16_000, 2048, 128, 0.0, 8000.0);
        assert_eq!(bank.n_mels(), 128);
        let energies = bank.apply(&vec![1.0; 1025]);
        assert!(energies.iter().all(|e| *e >= 0.0));
        assert!(energies.iter().any(|e| *e > 0.0));
    }

    #[test]
    fn dct_rows_are_orthonormal() {
        let dct = dct_ortho(4, 16);
        for a in 0..4 {
            for b in 0..4 {
                let dot: f32 = dct[a].iter().zip(&dct[b]).map(|(x, y)| x * y).sum();
                let expected = if a == b { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(dot, expected, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn silent_mfcc_is_constant_floor() {
        let stft = Stft::new(2048, 512).unwrap();
        let mags = stft.magnitudes(&vec![0.0; 16_000]).unwrap();
        let mfcc = Mfcc::new(16_000, 2048, 128, 13).compute(&mags);
        assert_eq!(mfcc.len(), 32);
        assert!(mfcc.iter().all(|row| row.len() == 13));
        let expected_c0 = (1.0f32 / 128.0).sqrt() * 128.0 * -100.0;
        assert_abs_diff_eq!(mfcc[0][0], expected_c0, epsilon = 1e-2);
        assert_abs_diff_eq!(mfcc[0][5], 0.0, epsilon = 1e-2);
    }

    #[test]
    fn centroid_and_rolloff_follow_tone() {
        let stft = Stft::new(2048, 512).unwrap();
        let freqs = stft.bin_frequencies(16_000);
        let low = stft.magnitudes(&sine(250.0, 16_000, 16_000)).unwrap();
        let high = stft.magnitudes(&sine(4000.0, 16_000, 16_000)).unwrap();
        let low_centroid = spectral_centroid(&low, &freqs)[16];
        let high_centroid = spectral_centroid(&high, &freqs)[16];
        assert!((low_centroid - 250.0).abs() < 50.0, "{low_centroid}");
        assert!((high_centroid - 4000.0).abs() < 100.0, "{high_centroid}");
        assert!(spectral_rolloff(&high, &freqs, 0.85)[16] > spectral_rolloff(&low, &freqs, 0.85)[16]);
    }

    /// Exactly 128 cycles per 2048-sample frame, so the Hann spectrum is bins
    /// 127..=129 with magnitudes 256, 512, 256.
    fn bin_aligned_1khz(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f64::consts::PI * (i % 16) as f64 / 16.0).sin() as f32)
            .collect()
    }

    #[test]
    fn slaney_reference_points() {
        assert_abs_diff_eq!(hz_to_mel(440.0), 6.6, epsilon = 1e-9);
        assert_abs_diff_eq!(mel_to_hz(30.0), 2804.644_130_7, epsilon = 1e-4);
        // area-normalised triangles integrate to ~1 once wider than a bin
        let bank = MelFilterBank::new(16_000, 2048, 128, 0.0, 8000.0);
        let area: f32 = bank.weights[100].iter().sum::<f32>() * 16_000.0 / 2048.0;
        assert_abs_diff_eq!(area, 0.999_14, epsilon = 1e-3);
    }

    #[test]
    fn mfcc_of_bin_aligned_tone_matches_reference() {
        let stft = Stft::new(2048, 512).unwrap();
        let mags = stft.magnitudes(&bin_aligned_1khz(16_000)).unwrap();
        assert_abs_diff_eq!(mags[16][128], 512.0, epsilon = 1e-2);
        assert_abs_diff_eq!(mags[16][129], 256.0, epsilon = 1e-2);

        let mfcc = Mfcc::new(16_000, 2048, 128, 13).compute(&mags);
        let expected = [
            -424.5328, 13.7797, -13.3806, -27.254, -14.1272, 12.9337, 27.1033, 14.4198,
            -12.4428, -26.853, -14.6545, 11.9123, 26.5048,
        ];
        for (got, want) in mfcc[16].iter().zip(expected) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-2);
        }
        // interior frames see the same spectrum
        for (a, b) in mfcc[5].iter().zip(&mfcc[20]) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-3);
        }
    }

    #[test]
    fn centroid_and_rolloff_of_bin_aligned_tone() {
        let stft = Stft::new(2048, 512).unwrap();
        let freqs = stft.bin_frequencies(16_000);
        let mags = stft.magnitudes(&bin_aligned_1khz(16_000)).unwrap();
        assert_abs_diff_eq!(spectral_centroid(&mags, &freqs)[16], 1000.0, epsilon = 0.5);
        // cumulative magnitude is 0.75 at bin 128 and 1.0 at bin 129
        assert_eq!(spectral_rolloff(&mags, &freqs, 0.85)[16], 1007.8125);
        assert_eq!(spectral_rolloff(&mags, &freqs, 0.7)[16], 1000.0);
    }

    #[test]
    fn silent_frames_have_zero_descriptors() {
        let freqs: Vec<f32> = (0..5).map(|b| b as f32 * 100.0).collect();
        let silent = vec![vec![0.0; 5]; 3];
        assert_eq!(spectral_centroid(&silent, &freqs), vec![0.0; 3]);
        assert_eq!(spectral_rolloff(&silent, &freqs, 0.85), vec![0.0; 3]);
    }

    #[test]
    fn zcr_counts_sign_changes() {
        let alternating: Vec<f32> = (0..4096).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let rates = zero_crossing_rate(&alternating, 2048, 512);
        assert!(rates[4] > 0.99);
        assert!(zero_crossing_rate(&vec![0.0; 4096], 2048, 512)
            .iter()
            .all(|r| *r == 0.0));
        let slow = zero_crossing_rate(&sine(100.0, 16_000, 16_000), 2048, 512);
        assert!(slow[10] < 0.02);
    }
}
