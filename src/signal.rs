use serde::{Deserialize, Serialize};

use crate::models::{Distribution, ElementScore, FactorScore};
use crate::scale::pooled_distribution;

pub const DEFAULT_MEAN_THRESHOLD: f64 = 3.8;
pub const DEFAULT_NEGATIVE_RATE_THRESHOLD: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Bad = 0,
    Warn = 1,
    Good = 2,
}

impl Signal {
    pub fn level(&self) -> u8 {
        *self as u8
    }

    pub fn label(&self) -> &'static str {
        match self {
            Signal::Good => "good",
            Signal::Warn => "warn",
            Signal::Bad => "bad",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Signal::Good => "green",
            Signal::Warn => "yellow",
            Signal::Bad => "red",
        }
    }

    pub fn display_label(&self) -> &'static str {
        match self {
            Signal::Good => "Healthy",
            Signal::Warn => "Caution",
            Signal::Bad => "Needs improvement",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalThresholds {
    #[serde(default = "default_mean_threshold")]
    pub mean_threshold: f64,
    #[serde(default = "default_negative_rate_threshold")]
    pub negative_rate_threshold: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            mean_threshold: DEFAULT_MEAN_THRESHOLD,
            negative_rate_threshold: DEFAULT_NEGATIVE_RATE_THRESHOLD,
        }
    }
}

fn default_mean_threshold() -> f64 {
    DEFAULT_MEAN_THRESHOLD
}

fn default_negative_rate_threshold() -> f64 {
    DEFAULT_NEGATIVE_RATE_THRESHOLD
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalResult {
    pub signal: Signal,
    pub level: u8,
    pub label: String,
    pub color: String,
}

impl From<Signal> for SignalResult {
    fn from(signal: Signal) -> Self {
        Self {
            signal,
            level: signal.level(),
            label: signal.label().to_string(),
            color: signal.color().to_string(),
        }
    }
}

/// Classifies a (mean, negative-rate) pair. A missing negative rate counts
/// as 0; a missing mean is always `Bad`.
pub fn evaluate(
    mean: Option<f64>,
    negative_rate: Option<f64>,
    thresholds: &SignalThresholds,
) -> Signal {
    let Some(mean) = mean else {
        return Signal::Bad;
    };
    let mean_ok = mean >= thresholds.mean_threshold;
    let rate_ok = negative_rate.unwrap_or(0.0) < thresholds.negative_rate_threshold;

    match (mean_ok, rate_ok) {
        (true, true) => Signal::Good,
        (true, false) | (false, true) => Signal::Warn,
        (false, false) => Signal::Bad,
    }
}

pub fn element_signal(score: &ElementScore, thresholds: &SignalThresholds) -> Signal {
    evaluate(score.mean, Some(score.distribution.bottom2), thresholds)
}

pub fn factor_signal(score: &FactorScore, thresholds: &SignalThresholds) -> Signal {
    weighted_signal(score.mean, score.elements.iter(), thresholds)
}

pub fn category_signal(
    mean: Option<f64>,
    distribution: &Distribution,
    thresholds: &SignalThresholds,
) -> Signal {
    if distribution.n == 0 {
        return Signal::Bad;
    }
    evaluate(mean, Some(distribution.bottom2), thresholds)
}

pub fn overall_signal(
    overall: Option<f64>,
    elements: &[ElementScore],
    thresholds: &SignalThresholds,
) -> Signal {
    weighted_signal(overall, elements.iter(), thresholds)
}

fn weighted_signal<'a, I>(mean: Option<f64>, elements: I, thresholds: &SignalThresholds) -> Signal
where
    I: Iterator<Item = &'a ElementScore>,
{
    let pooled = pooled_distribution(elements.map(|e| &e.distribution));
    if pooled.n == 0 {
        return Signal::Bad;
    }
    evaluate(mean, Some(pooled.bottom2), thresholds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(id: &str, mean: Option<f64>, bottom2: f64, n: usize) -> ElementScore {
        ElementScore {
            element_id: id.to_string(),
            element_name: id.to_string(),
            mean,
            distribution: Distribution {
                bottom2,
                mid: 0.0,
                top2: 1.0 - bottom2,
                n,
            },
        }
    }

    #[test]
    fn boundaries_follow_decision_table() {
        let t = SignalThresholds::default();
        assert_eq!(evaluate(Some(3.8), Some(0.099), &t), Signal::Good);
        assert_eq!(evaluate(Some(3.79), Some(0.099), &t), Signal::Warn);
        assert_eq!(evaluate(Some(3.0), Some(0.20), &t), Signal::Bad);
        assert_eq!(evaluate(Some(4.2), Some(0.10), &t), Signal::Warn);
    }

    #[test]
    fn missing_mean_is_bad_and_missing_rate_is_zero() {
        let t = SignalThresholds::default();
        assert_eq!(evaluate(None, Some(0.0), &t), Signal::Bad);
        assert_eq!(evaluate(Some(4.0), None, &t), Signal::Good);
        assert_eq!(evaluate(Some(3.0), None, &t), Signal::Warn);
    }

    #[test]
    fn thresholds_are_configurable() {
        let strict = SignalThresholds {
            mean_threshold: 4.5,
            negative_rate_threshold: 0.05,
        };
        assert_eq!(evaluate(Some(4.0), Some(0.01), &strict), Signal::Warn);
        assert_eq!(evaluate(Some(4.6), Some(0.01), &strict), Signal::Good);
    }

    #[test]
    fn levels_and_labels_are_stable() {
        assert_eq!(Signal::Bad.level(), 0);
        assert_eq!(Signal::Warn.level(), 1);
        assert_eq!(Signal::Good.level(), 2);
        let result = SignalResult::from(Signal::Warn);
        assert_eq!(result.label, "warn");
        assert_eq!(result.color, "yellow");
    }

    #[test]
    fn factor_signal_weights_negative_rate_by_n() {
        let t = SignalThresholds::default();
        let factor = FactorScore {
            factor_id: "F01".to_string(),
            factor_name: "Vision".to_string(),
            mean: Some(4.0),
            elements: vec![element("E01", Some(4.0), 1.0, 1), element("E02", Some(4.0), 0.0, 99)],
        };
        assert_eq!(factor_signal(&factor, &t), Signal::Good);

        let empty = FactorScore {
            elements: vec![element("E03", None, 0.0, 0)],
            ..factor
        };
        assert_eq!(factor_signal(&empty, &t), Signal::Bad);
    }

    #[test]
    fn overall_signal_without_elements_is_bad() {
        let t = SignalThresholds::default();
        assert_eq!(overall_signal(Some(4.5), &[], &t), Signal::Bad);
    }
}
