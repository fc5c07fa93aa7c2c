#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PeakLevel {
    pub max: f32,
    pub min: f32,
}

impl PeakLevel {
    pub fn silence() -> Self {
        Self { max: 0.0, min: 0.0 }
    }

    pub fn magnitude(&self) -> f32 {
        self.max.abs().max(self.min.abs())
    }
}

/// Scales the buffer so its largest magnitude is 1. Buffers with no measurable
/// peak are left untouched.
pub fn normalize_buffer(buffer: &mut [f32]) -> PeakLevel {
    let mut peak = PeakLevel::silence();
    for sample in buffer.iter() {
        peak.max = peak.max.max(*sample);
        peak.min = peak.min.min(*sample);
    }
    let gain = peak.magnitude();
    if gain < f32::MIN_POSITIVE {
        return peak;
    }
    for sample in buffer.iter_mut() {
        *sample /= gain;
    }
    peak
}

/// Zero-pads to at least `min_seconds`; longer buffers are returned unchanged.
pub fn pad_to_min_duration(samples: &[f32], sample_rate: u32, min_seconds: f32) -> Vec<f32> {
    let min_len = (sample_rate as f32 * min_seconds).ceil() as usize;
    let mut out = samples.to_vec();
    if out.len() < min_len {
        out.resize(min_len, 0.0);
    }
    out
}

/// Averages interleaved frames down to one channel.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PadMode {
    /// Pad with zeros.
    Constant,
    /// Repeat the first and last sample.
    Edge,
}

/// Pads `pad` samples on both sides so frames are centred on hop boundaries.
pub fn center_pad(samples: &[f32], pad: usize, mode: PadMode) -> Vec<f32> {
    let (head, tail) = match mode {
        PadMode::Constant => (0.0, 0.0),
        PadMode::Edge => (
            samples.first().copied().unwrap_or(0.0),
            samples.last().copied().unwrap_or(0.0),
        ),
    };
    let mut out = Vec::with_capacity(samples.len() + 2 * pad);
    out.extend(std::iter::repeat(head).take(pad));
    out.extend_from_slice(samples);
    out.extend(std::iter::repeat(tail).take(pad));
    out
}

/// Number of full frames in a buffer of `len` samples.
pub fn frame_count(len: usize, frame_length: usize, hop: usize) -> usize {
    if len < frame_length || hop == 0 {
        return 0;
    }
    1 + (len - frame_length) / hop
}

/// Iterates centred frames of `frame_length` samples every `hop` samples.
pub fn centered_frames(
    samples: &[f32],
    frame_length: usize,
    hop: usize,
    mode: PadMode,
) -> Vec<Vec<f32>> {
    let padded = center_pad(samples, frame_length / 2, mode);
    let count = frame_count(padded.len(), frame_length, hop);
    (0..count)
        .map(|index| padded[index * hop..index * hop + frame_length].to_vec())
        .collect()
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let energy: f64 = samples.iter().map(|s| (*s as f64) * (*s as f64)).sum();
    (energy / samples.len() as f64).sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_scales_to_unity() {
        let mut buffer = vec![0.5, -1.0, 0.75];
        let peak = normalize_buffer(&mut buffer);
        assert!((peak.max - 0.75).abs() < 1e-6);
        assert!(buffer.iter().all(|s| s.abs() <= 1.0));
        assert!((buffer[1] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_leaves_silence_alone() {
        let mut buffer = vec![0.0; 8];
        let peak = normalize_buffer(&mut buffer);
        assert_eq!(peak, PeakLevel::silence());
        assert!(buffer.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn pads_short_clips_only() {
        assert_eq!(pad_to_min_duration(&[1.0; 10], 100, 1.0).len(), 100);
        assert_eq!(pad_to_min_duration(&[1.0; 150], 100, 1.0).len(), 150);
    }

    #[test]
    fn downmix_averages_frames() {
        let mono = downmix(&[1.0, 0.0, 0.5, 0.5, -1.0, 1.0], 2);
        assert_eq!(mono, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn centered_frame_count_follows_hop() {
        let samples = vec![0.0; 16_000];
        let frames = centered_frames(&samples, 2048, 512, PadMode::Constant);
        assert_eq!(frames.len(), 1 + 16_000 / 512);
        assert!(frames.iter().all(|f| f.len() == 2048));
    }

    #[test]
    fn edge_padding_repeats_ends() {
        let padded = center_pad(&[1.0, 2.0, 3.0], 2, PadMode::Edge);
        assert_eq!(padded, vec![1.0, 1.0, 1.0, 2.0, 3.0, 3.0, 3.0]);
    }
}
