use std::sync::Arc;

use realfft::{RealFftPlanner, RealToComplex};

use crate::dsp::{centered_frames, PadMode};
use crate::error::AudioError;

/// Short-time Fourier transform over centred, Hann-windowed frames.
pub struct Stft {
    n_fft: usize,
    hop: usize,
    window: Vec<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
}

impl Stft {
    pub fn new(n_fft: usize, hop: usize) -> Result<Self, AudioError> {
        if n_fft < 2 || hop == 0 {
            return Err(AudioError::InvalidParameter(format!(
                "stft needs n_fft >= 2 and hop > 0, got n_fft={n_fft} hop={hop}"
            )));
        }
        let mut planner = RealFftPlanner::<f32>::new();
        Ok(Self {
            n_fft,
            hop,
            window: hann_periodic(n_fft),
            fft: planner.plan_fft_forward(n_fft),
        })
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Centre frequency of each bin in Hz.
    pub fn bin_frequencies(&self, sample_rate: u32) -> Vec<f32> {
        (0..self.bins())
            .map(|bin| bin as f32 * sample_rate as f32 / self.n_fft as f32)
            .collect()
    }

    /// Magnitude spectrogram, one `bins()`-long row per frame.
    pub fn magnitudes(&self, samples: &[f32]) -> Result<Vec<Vec<f32>>, AudioError> {
        let frames = centered_frames(samples, self.n_fft, self.hop, PadMode::Constant);
        let mut input = self.fft.make_input_vec();
        let mut spectrum = self.fft.make_output_vec();
        let mut rows = Vec::with_capacity(frames.len());
        for frame in frames {
            for ((slot, sample), w) in input.iter_mut().zip(frame.iter()).zip(self.window.iter()) {
                *slot = sample * w;
            }
            self.fft
                .process(&mut input, &mut spectrum)
                .map_err(|e| AudioError::Fft(e.to_string()))?;
            rows.push(spectrum.iter().map(|c| c.norm()).collect());
        }
        Ok(rows)
    }
}

fn hann_periodic(len: usize) -> Vec<f32> {
    (0..len)
        .map(|n| {
            let phase = 2.0 * std::f64::consts::PI * n as f64 / len as f64;
            (0.5 - 0.5 * phase.cos()) as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn peak_bin_tracks_tone() {
        let stft = Stft::new(2048, 512).unwrap();
        let rows = stft.magnitudes(&sine(1000.0, 16_000, 16_000)).unwrap();
        assert_eq!(rows.len(), 32);
        let middle = &rows[16];
        let (peak_bin, _) = middle
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert_eq!(peak_bin, 128);
        assert_eq!(stft.bin_frequencies(16_000)[peak_bin], 1000.0);
    }

    #[test]
    fn silence_has_zero_spectrum() {
        let stft = Stft::new(512, 128).unwrap();
        let rows = stft.magnitudes(&[0.0; 1024]).unwrap();
        assert!(rows.iter().flatten().all(|m| *m == 0.0));
    }

    #[test]
    fn rejects_zero_hop() {
        assert!(Stft::new(512, 0).is_err());
    }
}
