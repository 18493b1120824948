//! Trend analysis and lifecycle-phase prediction.
//!
//! Fits a least-squares line through a monthly activity series, classifies
//! the direction from slope and fit quality, and predicts transitions along
//! the technology lifecycle using trend-adjusted base durations.

use serde::{Deserialize, Serialize};

/// Direction of a fitted trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    /// Slope above the threshold with an acceptable fit.
    Rising,
    /// Slope within the threshold band.
    Stable,
    /// Slope below the negative threshold.
    Declining,
    /// Fit quality too poor to classify (R² below the floor).
    Volatile,
}

/// Lifecycle phases, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    /// Early breakthrough activity.
    InnovationTrigger,
    /// Peak of inflated expectations.
    PeakOfExpectations,
    /// Trough of disillusionment.
    TroughOfDisillusionment,
    /// Slope of enlightenment.
    SlopeOfEnlightenment,
    /// Plateau of productivity.
    PlateauOfProductivity,
}

impl LifecyclePhase {
    /// All phases in lifecycle order.
    #[must_use]
    pub const fn ordered() -> &'static [Self] {
        &[
            Self::InnovationTrigger,
            Self::PeakOfExpectations,
            Self::TroughOfDisillusionment,
            Self::SlopeOfEnlightenment,
            Self::PlateauOfProductivity,
        ]
    }

    /// The next phase, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::InnovationTrigger => Some(Self::PeakOfExpectations),
            Self::PeakOfExpectations => Some(Self::TroughOfDisillusionment),
            Self::TroughOfDisillusionment => Some(Self::SlopeOfEnlightenment),
            Self::SlopeOfEnlightenment => Some(Self::PlateauOfProductivity),
            Self::PlateauOfProductivity => None,
        }
    }

    /// Base duration of the phase in months, before trend adjustment.
    #[must_use]
    pub const fn base_duration_months(self) -> f32 {
        match self {
            Self::InnovationTrigger => 18.0,
            Self::PeakOfExpectations => 12.0,
            Self::TroughOfDisillusionment => 24.0,
            Self::SlopeOfEnlightenment => 30.0,
            Self::PlateauOfProductivity => 48.0,
        }
    }
}

/// A monthly activity sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivityPoint {
    /// Year of the sample.
    pub year: i32,
    /// Month (1-12).
    pub month: u32,
    /// Event count in the month.
    pub count: u32,
}

/// A fitted trend with its qualitative factors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendAnalysis {
    /// Classified direction.
    pub direction: TrendDirection,
    /// Fitted slope, events per month.
    pub slope: f32,
    /// Coefficient of determination of the fit.
    pub r_squared: f32,
    /// Confidence in the analysis, clamped to [0.1, 0.9].
    pub confidence: f32,
    /// Positive factors observed.
    pub factors: Vec<String>,
    /// Risks observed.
    pub risks: Vec<String>,
}

/// A lifecycle transition prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhasePrediction {
    /// Current phase.
    pub current_phase: LifecyclePhase,
    /// Next phase, `None` at the plateau.
    pub next_phase: Option<LifecyclePhase>,
    /// Expected months until the transition, trend-adjusted.
    pub months_to_transition: Option<f32>,
    /// Confidence in the prediction, clamped to [0.1, 0.9].
    pub confidence: f32,
}

/// Thresholds for trend classification.
#[derive(Debug, Clone, Copy)]
pub struct TrendOptions {
    /// |slope| below this is stable.
    pub slope_threshold: f32,
    /// R² below this is volatile.
    pub volatility_r_squared: f32,
    /// Months of history considered full coverage.
    pub full_history_months: usize,
}

impl Default for TrendOptions {
    fn default() -> Self {
        Self {
            slope_threshold: 0.1,
            volatility_r_squared: 0.3,
            full_history_months: 24,
        }
    }
}

/// Fits and classifies activity trends.
#[derive(Debug, Clone, Default)]
pub struct TrendPredictor {
    options: TrendOptions,
}

impl TrendPredictor {
    /// Creates a predictor with the given thresholds.
    #[must_use]
    pub const fn new(options: TrendOptions) -> Self {
        Self { options }
    }

    /// Analyzes a monthly activity series.
    #[must_use]
    pub fn analyze(&self, series: &[ActivityPoint]) -> TrendAnalysis {
        let (slope, r_squared) = linear_fit(series);

        let direction = if series.len() < 3 || r_squared < self.options.volatility_r_squared {
            TrendDirection::Volatile
        } else if slope > self.options.slope_threshold {
            TrendDirection::Rising
        } else if slope < -self.options.slope_threshold {
            TrendDirection::Declining
        } else {
            TrendDirection::Stable
        };

        let mut factors = Vec::new();
        let mut risks = Vec::new();
        if direction == TrendDirection::Rising {
            factors.push("sustained monthly growth".to_string());
        }
        if r_squared > 0.7 {
            factors.push("consistent activity pattern".to_string());
        }
        if direction == TrendDirection::Volatile {
            risks.push("high variance in monthly activity".to_string());
        }
        if series.len() < 6 {
            risks.push("sparse history".to_string());
        }
        if direction == TrendDirection::Declining {
            risks.push("shrinking activity".to_string());
        }

        let confidence = self.confidence(series.len(), &factors, &risks);

        TrendAnalysis {
            direction,
            slope,
            r_squared,
            confidence,
            factors,
            risks,
        }
    }

    /// Predicts the transition out of the current phase.
    ///
    /// Rising trends shorten the remaining duration, declining trends
    /// stretch it, volatility leaves the base duration untouched but costs
    /// confidence.
    #[must_use]
    pub fn predict_phase(
        &self,
        current_phase: LifecyclePhase,
        trend: &TrendAnalysis,
    ) -> PhasePrediction {
        let next_phase = current_phase.next();
        let months_to_transition = next_phase.map(|_| {
            let base = current_phase.base_duration_months();
            let factor = match trend.direction {
                TrendDirection::Rising => 0.7,
                TrendDirection::Declining => 1.4,
                TrendDirection::Stable | TrendDirection::Volatile => 1.0,
            };
            base * factor
        });

        let mut confidence = trend.confidence;
        if trend.direction == TrendDirection::Volatile {
            confidence -= 0.2;
        }

        PhasePrediction {
            current_phase,
            next_phase,
            months_to_transition,
            confidence: confidence.clamp(0.1, 0.9),
        }
    }

    /// Base confidence from data coverage plus factor bonus minus risk
    /// penalty, clamped to [0.1, 0.9].
    fn confidence(&self, history_months: usize, factors: &[String], risks: &[String]) -> f32 {
        #[allow(clippy::cast_precision_loss)]
        let coverage =
            (history_months as f32 / self.options.full_history_months as f32).min(1.0);
        let base = 0.3 + 0.4 * coverage;
        #[allow(clippy::cast_precision_loss)]
        let adjusted = base + 0.05 * factors.len() as f32 - 0.1 * risks.len() as f32;
        adjusted.clamp(0.1, 0.9)
    }
}

/// Least-squares slope and R² over the series indices.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn linear_fit(series: &[ActivityPoint]) -> (f32, f32) {
    let n = series.len();
    if n < 2 {
        return (0.0, 0.0);
    }
    let n_f = n as f32;
    let xs: Vec<f32> = (0..n).map(|i| i as f32).collect();
    let ys: Vec<f32> = series.iter().map(|p| p.count as f32).collect();

    let mean_x = xs.iter().sum::<f32>() / n_f;
    let mean_y = ys.iter().sum::<f32>() / n_f;

    let mut ss_xy = 0.0;
    let mut ss_xx = 0.0;
    let mut ss_yy = 0.0;
    for i in 0..n {
        let dx = xs[i] - mean_x;
        let dy = ys[i] - mean_y;
        ss_xy += dx * dy;
        ss_xx += dx * dx;
        ss_yy += dy * dy;
    }

    if ss_xx == 0.0 {
        return (0.0, 0.0);
    }
    let slope = ss_xy / ss_xx;
    // Constant series fit perfectly.
    let r_squared = if ss_yy == 0.0 {
        1.0
    } else {
        (ss_xy * ss_xy) / (ss_xx * ss_yy)
    };
    (slope, r_squared)
}
