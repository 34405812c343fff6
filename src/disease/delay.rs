use serde::{Deserialize, Serialize};

use crate::error::EpinetError;
use crate::random::Stream;

/// Distribution of the time spent in a state before the next transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "distribution", rename_all = "snake_case")]
pub enum Delay {
    Fixed { value: f64 },
    Exponential { mean: f64 },
    Gamma { shape: f64, scale: f64 },
    Weibull { shape: f64, scale: f64 },
}

impl Delay {
    pub fn validate(&self) -> Result<(), EpinetError> {
        let positive = |name: &str, value: f64| {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(EpinetError::InvalidParameter(format!(
                    "{name} of a delay must be positive, got {value}"
                )))
            }
        };
        match *self {
            Delay::Fixed { value } => {
                if value >= 0.0 && value.is_finite() {
                    Ok(())
                } else {
                    Err(EpinetError::InvalidParameter(format!(
                        "fixed delay must be non-negative, got {value}"
                    )))
                }
            }
            Delay::Exponential { mean } => positive("mean", mean),
            Delay::Gamma { shape, scale } | Delay::Weibull { shape, scale } => {
                positive("shape", shape)?;
                positive("scale", scale)
            }
        }
    }

    pub fn sample(&self, stream: &mut Stream) -> Result<f64, EpinetError> {
        match *self {
            Delay::Fixed { value } => Ok(value),
            Delay::Exponential { mean } => stream.exponential(mean),
            Delay::Gamma { shape, scale } => stream.gamma(shape, scale),
            Delay::Weibull { shape, scale } => stream.weibull(shape, scale),
        }
    }
}
