//! PERT three-point duration statistics.
//!
//! Pure arithmetic over an (optimistic, most likely, pessimistic) triple of
//! hours: beta-approximation expected value, standard deviation, variance,
//! and the 68%/95% confidence bounds. Nothing in this module touches graph
//! or assignment state.

/// Errors for three-point triple validation.
#[derive(Debug, Clone, PartialEq)]
pub enum EstimateError {
    /// At least one of the three hour values is zero, negative, or NaN.
    NonPositive(f64, f64, f64),
    /// The triple is not weakly increasing.
    NotOrdered(f64, f64, f64),
}

impl std::fmt::Display for EstimateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EstimateError::NonPositive(o, m, p) => {
                write!(f, "estimate hours must be positive: ({}, {}, {})", o, m, p)
            }
            EstimateError::NotOrdered(o, m, p) => {
                write!(
                    f,
                    "expected optimistic <= most likely <= pessimistic, got ({}, {}, {})",
                    o, m, p
                )
            }
        }
    }
}

impl std::error::Error for EstimateError {}

/// A three-point duration estimate in hours.
///
/// The invariant `0 < optimistic <= most_likely <= pessimistic` is checked
/// by [`ThreePoint::new`] and re-checked wherever a triple enters the graph.
/// Violations are reported, never silently reordered.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ThreePoint {
    pub optimistic: f64,
    pub most_likely: f64,
    pub pessimistic: f64,
}

impl ThreePoint {
    /// Build a validated triple.
    pub fn new(optimistic: f64, most_likely: f64, pessimistic: f64) -> Result<Self, EstimateError> {
        let triple = Self {
            optimistic,
            most_likely,
            pessimistic,
        };
        triple.validate()?;
        Ok(triple)
    }

    /// Check the ordering invariant on this triple.
    ///
    /// The comparisons are written so that NaN in any position fails the
    /// positivity check rather than slipping through.
    pub fn validate(&self) -> Result<(), EstimateError> {
        if !(self.optimistic > 0.0 && self.most_likely > 0.0 && self.pessimistic > 0.0) {
            return Err(EstimateError::NonPositive(
                self.optimistic,
                self.most_likely,
                self.pessimistic,
            ));
        }
        if !(self.optimistic <= self.most_likely && self.most_likely <= self.pessimistic) {
            return Err(EstimateError::NotOrdered(
                self.optimistic,
                self.most_likely,
                self.pessimistic,
            ));
        }
        Ok(())
    }

    /// Expected duration: `(o + 4m + p) / 6`.
    pub fn expected(&self) -> f64 {
        (self.optimistic + 4.0 * self.most_likely + self.pessimistic) / 6.0
    }

    /// Standard deviation: `(p - o) / 6`.
    pub fn std_dev(&self) -> f64 {
        (self.pessimistic - self.optimistic) / 6.0
    }

    /// Variance: the standard deviation squared.
    pub fn variance(&self) -> f64 {
        let sd = self.std_dev();
        sd * sd
    }

    /// The full statistics bundle for this triple.
    pub fn stats(&self) -> Estimate {
        let expected = self.expected();
        let std_dev = self.std_dev();
        Estimate {
            expected,
            std_dev,
            variance: std_dev * std_dev,
            ci68: (expected - std_dev, expected + std_dev),
            ci95: (expected - 2.0 * std_dev, expected + 2.0 * std_dev),
        }
    }
}

/// Derived PERT statistics for a single estimate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Estimate {
    /// Weighted expected duration in hours.
    pub expected: f64,
    /// One-sigma spread of the duration.
    pub std_dev: f64,
    /// Square of the standard deviation; sums across independent tasks.
    pub variance: f64,
    /// 68% confidence bounds: expected +/- one standard deviation.
    pub ci68: (f64, f64),
    /// 95% confidence bounds: expected +/- two standard deviations.
    pub ci95: (f64, f64),
}

/// Validate a triple and compute its statistics in one step.
pub fn estimate(
    optimistic: f64,
    most_likely: f64,
    pessimistic: f64,
) -> Result<Estimate, EstimateError> {
    Ok(ThreePoint::new(optimistic, most_likely, pessimistic)?.stats())
}
