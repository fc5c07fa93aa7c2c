use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Mono floating-point audio at a fixed sample rate.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self, DomainError> {
        if sample_rate == 0 {
            return Err(DomainError::validation("sample rate must be positive"));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn silence(sample_rate: u32, seconds: f32) -> Self {
        let len = (sample_rate as f32 * seconds.max(0.0)).round() as usize;
        Self {
            samples: vec![0.0; len],
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate.max(1) as f32
    }
}
