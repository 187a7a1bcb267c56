//! Log-normal score curves.
//!
//! A curve is specified by its median (the raw value scoring exactly 0.5)
//! and its falloff (the initial point of diminishing returns, where further
//! improvement yields increasingly smaller score gains). Both are in the
//! metric's own units. The score of a value is its complementary percentile
//! under the distribution, so lower raw values score higher.

use crate::error::ScoreError;

/// Gauss error function, Abramowitz & Stegun formula 7.1.26.
/// Maximum absolute error 1.5e-7.
pub fn erf(x: f64) -> f64 {
    let sign = x.signum();
    let x = x.abs();

    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let t = 1.0 / (1.0 + P * x);
    let y = t * (A1 + t * (A2 + t * (A3 + t * (A4 + t * A5))));
    sign * (1.0 - y * (-x * x).exp())
}

/// A validated log-normal score curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreCurve {
    median: f64,
    falloff: f64,
    location: f64,
    shape: f64,
}

impl ScoreCurve {
    /// Solve the distribution parameters from `(median, falloff)`.
    ///
    /// The falloff is the smaller positive root of the third derivative of
    /// the log-normal CDF; the shape parameter is recovered from it in
    /// closed form. The solve loses its positive real solution as `falloff`
    /// approaches `median`, so that boundary is rejected here instead of
    /// producing a curve that scores as a step function.
    pub fn new(median: f64, falloff: f64) -> Result<Self, ScoreError> {
        let degenerate = |detail: &str| ScoreError::DegenerateCurve {
            median,
            falloff,
            detail: detail.to_string(),
        };

        if !median.is_finite() || !falloff.is_finite() || median <= 0.0 || falloff <= 0.0 {
            return Err(degenerate("parameters must be positive and finite"));
        }
        if falloff >= median {
            return Err(degenerate("falloff must lie below the median"));
        }

        let log_ratio = (falloff / median).ln();
        let inner = (log_ratio - 3.0) * (log_ratio - 3.0) - 8.0;
        if inner < 0.0 {
            return Err(degenerate("shape solve has no real solution"));
        }
        let shape = (1.0 - 3.0 * log_ratio - inner.sqrt()).sqrt() / 2.0;
        if !shape.is_finite() || shape <= 0.0 {
            return Err(degenerate("shape solve has no positive solution"));
        }

        Ok(Self {
            median,
            falloff,
            location: median.ln(),
            shape,
        })
    }

    pub fn median(&self) -> f64 {
        self.median
    }

    pub fn falloff(&self) -> f64 {
        self.falloff
    }

    /// Complementary percentile of `value` under the curve, in `[0, 1]`.
    /// Lower raw values score higher; non-positive values score 1.0.
    pub fn score(&self, value: f64) -> f64 {
        if value <= 0.0 {
            return 1.0;
        }
        let standardized = (value.ln() - self.location) / (std::f64::consts::SQRT_2 * self.shape);
        ((1.0 - erf(standardized)) / 2.0).clamp(0.0, 1.0)
    }

    /// The score rounded to the reported 0-100 scale.
    pub fn score_percent(&self, value: f64) -> u8 {
        (self.score(value) * 100.0).round() as u8
    }
}
