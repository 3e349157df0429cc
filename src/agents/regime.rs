//! Market regime classification from recent close history.
//!
//! Pure function of the input series; no state, no side effects.

use crate::domain::{mean, sample_std, MarketRegime};

/// Trailing observations inspected for classification. Shorter series
/// default to sideways rather than erroring.
pub const REGIME_WINDOW: usize = 50;

/// Width of the short moving average inside the window.
const SHORT_SMA_WINDOW: usize = 20;

/// Realized volatility (stddev of period-over-period returns) above which
/// the series is labeled volatile regardless of trend.
const VOLATILITY_THRESHOLD: f64 = 0.03;

/// Classify the trailing window of a close series. First match wins:
/// volatile, then bull (price > SMA20 > SMA50), then bear
/// (price < SMA20 < SMA50), else sideways.
pub fn detect_regime(closes: &[f64]) -> MarketRegime {
    if closes.len() < REGIME_WINDOW {
        return MarketRegime::Sideways;
    }

    let recent = &closes[closes.len() - REGIME_WINDOW..];
    let price = recent[REGIME_WINDOW - 1];
    let sma_short = mean(&recent[REGIME_WINDOW - SHORT_SMA_WINDOW..]);
    let sma_long = mean(recent);

    let returns: Vec<f64> = recent
        .windows(2)
        .filter(|pair| pair[0] != 0.0)
        .map(|pair| pair[1] / pair[0] - 1.0)
        .collect();
    let volatility = sample_std(&returns);

    if volatility > VOLATILITY_THRESHOLD {
        MarketRegime::Volatile
    } else if price > sma_short && sma_short > sma_long {
        MarketRegime::Bull
    } else if price < sma_short && sma_short < sma_long {
        MarketRegime::Bear
    } else {
        MarketRegime::Sideways
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_series_defaults_to_sideways() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        assert_eq!(detect_regime(&closes), MarketRegime::Sideways);
    }

    #[test]
    fn test_flat_series_is_sideways() {
        let closes = vec![100.0; 60];
        assert_eq!(detect_regime(&closes), MarketRegime::Sideways);
    }

    #[test]
    fn test_monotonic_rise_is_bull() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        assert_eq!(detect_regime(&closes), MarketRegime::Bull);
    }

    #[test]
    fn test_monotonic_fall_is_bear() {
        let closes: Vec<f64> = (0..60).map(|i| 200.0 - i as f64).collect();
        assert_eq!(detect_regime(&closes), MarketRegime::Bear);
    }

    #[test]
    fn test_high_volatility_wins_over_trend() {
        // Alternating ±10% swings: realized volatility far above threshold.
        let closes: Vec<f64> = (0..60)
            .map(|i| if i % 2 == 0 { 100.0 } else { 110.0 })
            .collect();
        assert_eq!(detect_regime(&closes), MarketRegime::Volatile);
    }
}
