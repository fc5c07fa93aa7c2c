//! YIN fundamental-frequency tracker.
//!
//! For each centred frame the cumulative-mean-normalised difference function is
//! evaluated over the lag range implied by `[fmin, fmax]`. The first local
//! minimum under the trough threshold gives the period, refined by parabolic
//! interpolation; frames without such a trough fall back to the global minimum.
//! Frames whose RMS is below the silence floor carry no pitch and are skipped.

use tracing::debug;

use vigil_domain::{FrequencyBand, PitchEstimate};

use crate::dsp::{centered_frames, rms, PadMode};

pub const YIN_FRAME_LENGTH: usize = 2048;
pub const YIN_HOP: usize = YIN_FRAME_LENGTH / 4;
pub const YIN_TROUGH_THRESHOLD: f32 = 0.1;

#[derive(Debug, Clone)]
pub struct YinTracker {
    sample_rate: u32,
    range: FrequencyBand,
    frame_length: usize,
    win_length: usize,
    hop: usize,
    trough_threshold: f32,
    silence_rms: f32,
}

impl YinTracker {
    pub fn new(sample_rate: u32, range: FrequencyBand, silence_rms: f32) -> Self {
        Self {
            sample_rate,
            range,
            frame_length: YIN_FRAME_LENGTH,
            win_length: YIN_FRAME_LENGTH / 2,
            hop: YIN_HOP,
            trough_threshold: YIN_TROUGH_THRESHOLD,
            silence_rms,
        }
    }

    /// Lag bounds in samples, or `None` when the range cannot be resolved at this rate.
    fn period_bounds(&self) -> Option<(usize, usize)> {
        let sr = self.sample_rate as f32;
        let min_period = (sr / self.range.max_hz).floor() as usize;
        let max_period = ((sr / self.range.min_hz).ceil() as usize)
            .min(self.frame_length - self.win_length - 1);
        if min_period < 1 || max_period <= min_period + 1 {
            return None;
        }
        Some((min_period, max_period))
    }

    pub fn track(&self, samples: &[f32]) -> PitchEstimate {
        if samples.is_empty() {
            return PitchEstimate::Unmeasurable;
        }
        let Some((min_period, max_period)) = self.period_bounds() else {
            debug!(sample_rate = self.sample_rate, range = ?self.range, "pitch range not resolvable");
            return PitchEstimate::Unmeasurable;
        };

        let frames = centered_frames(samples, self.frame_length, self.hop, PadMode::Constant);
        let total = frames.len();
        let f0: Vec<f32> = frames
            .iter()
            .filter(|frame| rms(frame) >= self.silence_rms)
            .filter_map(|frame| self.frame_f0(frame, min_period, max_period))
            .collect();
        debug!(frames = total, voiced = f0.len(), "yin tracking done");
        PitchEstimate::from_frames(f0)
    }

    fn frame_f0(&self, frame: &[f32], min_period: usize, max_period: usize) -> Option<f32> {
        let diff = self.difference(frame, max_period);

        let mut cumulative = 0.0f64;
        let mut normalised = Vec::with_capacity(max_period - min_period + 1);
        for tau in 1..=max_period {
            cumulative += diff[tau];
            if tau >= min_period {
                let mean = cumulative / tau as f64;
                normalised.push((diff[tau] / (mean + f64::MIN_POSITIVE)) as f32);
            }
        }

        let index = self
            .first_threshold_trough(&normalised)
            .or_else(|| argmin(&normalised))?;
        let period = min_period as f32 + index as f32 + parabolic_shift(&normalised, index);
        (period > 0.0).then(|| self.sample_rate as f32 / period)
    }

    /// Squared difference between the analysis window and its lagged copy.
    fn difference(&self, frame: &[f32], max_period: usize) -> Vec<f64> {
        let window = &frame[..self.win_length];
        (0..=max_period)
            .map(|tau| {
                window
                    .iter()
                    .zip(&frame[tau..tau + self.win_length])
                    .map(|(a, b)| {
                        let d = (*a - *b) as f64;
                        d * d
                    })
                    .sum()
            })
            .collect()
    }

    fn first_threshold_trough(&self, values: &[f32]) -> Option<usize> {
        let last = values.len().checked_sub(1)?;
        (0..=last).find(|&i| {
            let trough = if i == 0 {
                last > 0 && values[0] < values[1]
            } else if i == last {
                values[i] < values[i - 1]
            } else {
                values[i] < values[i - 1] && values[i] <= values[i + 1]
            };
            trough && values[i] < self.trough_threshold
        })
    }
}

fn argmin(values: &[f32]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
}

fn parabolic_shift(values: &[f32], index: usize) -> f32 {
    if index == 0 || index + 1 >= values.len() {
        return 0.0;
    }
    let (left, centre, right) = (values[index - 1], values[index], values[index + 1]);
    let a = right + left - 2.0 * centre;
    let b = (right - left) / 2.0;
    if b.abs() >= a.abs() {
        0.0
    } else {
        -b / a
    }
}
