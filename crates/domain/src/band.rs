use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Closed frequency interval in Hz, `min_hz <= f <= max_hz`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct FrequencyBand {
    pub min_hz: f32,
    pub max_hz: f32,
}

impl FrequencyBand {
    pub fn new(min_hz: f32, max_hz: f32) -> Result<Self, DomainError> {
        if !min_hz.is_finite() || !max_hz.is_finite() {
            return Err(DomainError::validation("band edges must be finite"));
        }
        if min_hz <= 0.0 {
            return Err(DomainError::validation("band lower edge must be positive"));
        }
        if max_hz < min_hz {
            return Err(DomainError::validation(
                "band upper edge must not be below the lower edge",
            ));
        }
        Ok(Self { min_hz, max_hz })
    }

    /// Band used by the voice gate unless configured otherwise.
    pub fn default_gate() -> Self {
        Self {
            min_hz: 165.0,
            max_hz: 255.0,
        }
    }

    /// Search range handed to the pitch tracker.
    pub fn default_pitch_range() -> Self {
        Self {
            min_hz: 80.0,
            max_hz: 400.0,
        }
    }

    /// NaN is never contained.
    pub fn contains(&self, hz: f32) -> bool {
        hz >= self.min_hz && hz <= self.max_hz
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        Self::new(self.min_hz, self.max_hz).map(|_| ())
    }
}

impl Default for FrequencyBand {
    fn default() -> Self {
        Self::default_gate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_validation() {
        assert!(FrequencyBand::new(-1.0, 100.0).is_err());
        assert!(FrequencyBand::new(200.0, 100.0).is_err());
        assert!(FrequencyBand::new(f32::NAN, 100.0).is_err());
        assert!(FrequencyBand::new(100.0, 100.0).is_ok());
    }

    #[test]
    fn band_edges_are_inclusive() {
        let band = FrequencyBand::default_gate();
        assert!(band.contains(165.0));
        assert!(band.contains(255.0));
        assert!(band.contains(200.0));
        assert!(!band.contains(164.9));
        assert!(!band.contains(255.1));
        assert!(!band.contains(f32::NAN));
    }
}
