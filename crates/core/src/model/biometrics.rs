use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum BiometricsError {
    #[error("heart rate must be between 20 and 250 bpm, got {0}")]
    InvalidHeartRate(u16),

    #[error("weight must be between 20 and 400 kg, got {0}")]
    InvalidWeight(f32),
}

/// Optional readings submitted with a completed day.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Biometrics {
    heart_rate: Option<u16>,
    weight_kg: Option<f32>,
}

impl Biometrics {
    /// # Errors
    ///
    /// Returns `BiometricsError` when a reading is outside a plausible range.
    pub fn new(heart_rate: Option<u16>, weight_kg: Option<f32>) -> Result<Self, BiometricsError> {
        if let Some(bpm) = heart_rate {
            if !(20..=250).contains(&bpm) {
                return Err(BiometricsError::InvalidHeartRate(bpm));
            }
        }
        if let Some(kg) = weight_kg {
            if !kg.is_finite() || !(20.0..=400.0).contains(&kg) {
                return Err(BiometricsError::InvalidWeight(kg));
            }
        }
        Ok(Self {
            heart_rate,
            weight_kg,
        })
    }

    #[must_use]
    pub fn heart_rate(&self) -> Option<u16> {
        self.heart_rate
    }

    #[must_use]
    pub fn weight_kg(&self) -> Option<f32> {
        self.weight_kg
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heart_rate.is_none() && self.weight_kg.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plausible_readings() {
        let b = Biometrics::new(Some(142), Some(71.5)).unwrap();
        assert_eq!(b.heart_rate(), Some(142));
        assert!(!b.is_empty());
        assert!(Biometrics::default().is_empty());
    }

    #[test]
    fn rejects_implausible_readings() {
        assert_eq!(
            Biometrics::new(Some(5), None).unwrap_err(),
            BiometricsError::InvalidHeartRate(5)
        );
        assert!(Biometrics::new(None, Some(f32::NAN)).is_err());
        assert!(Biometrics::new(None, Some(900.0)).is_err());
    }
}
