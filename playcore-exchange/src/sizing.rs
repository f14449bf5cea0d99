//! Translates a [`Signal`] into an order notional per the Play's
//! `risk_model.sizing` rule (§4.9).

use playcore_model::{RuntimeError, Signal, SizingModel, SizingRule};

/// `stop_distance_pct` is only consulted by [`SizingModel::RiskBased`];
/// it is the fractional distance from entry to the play's configured
/// stop-loss, and must be positive or sizing cannot be computed.
pub fn compute_notional(
    sizing: &SizingRule,
    signal: &Signal,
    equity: f64,
    leverage: f64,
    stop_distance_pct: Option<f64>,
) -> Result<f64, RuntimeError> {
    if let Some(notional) = signal.sizing_override {
        return Ok(notional);
    }
    Ok(match sizing.model {
        SizingModel::PercentEquity => equity * sizing.value,
        SizingModel::FixedNotional => sizing.value,
        SizingModel::RiskBased => {
            let stop_distance_pct = stop_distance_pct.unwrap_or(0.0);
            if stop_distance_pct <= 0.0 {
                return Err(RuntimeError::ZeroStopDistance);
            }
            (equity * sizing.value) / stop_distance_pct * leverage
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use playcore_model::Direction;

    fn signal() -> Signal {
        Signal::new("enter", Direction::Long)
    }

    #[test]
    fn percent_equity_scales_with_equity() {
        let rule = SizingRule { model: SizingModel::PercentEquity, value: 0.1 };
        assert_eq!(compute_notional(&rule, &signal(), 10_000.0, 1.0, None).unwrap(), 1_000.0);
    }

    #[test]
    fn fixed_notional_ignores_equity() {
        let rule = SizingRule { model: SizingModel::FixedNotional, value: 500.0 };
        assert_eq!(compute_notional(&rule, &signal(), 10_000.0, 1.0, None).unwrap(), 500.0);
    }

    #[test]
    fn risk_based_requires_nonzero_stop_distance() {
        let rule = SizingRule { model: SizingModel::RiskBased, value: 0.01 };
        assert!(compute_notional(&rule, &signal(), 10_000.0, 1.0, Some(0.0)).is_err());
        assert!(compute_notional(&rule, &signal(), 10_000.0, 1.0, None).is_err());
    }

    #[test]
    fn risk_based_scales_inversely_with_stop_distance() {
        let rule = SizingRule { model: SizingModel::RiskBased, value: 0.01 };
        let tight = compute_notional(&rule, &signal(), 10_000.0, 1.0, Some(0.01)).unwrap();
        let wide = compute_notional(&rule, &signal(), 10_000.0, 1.0, Some(0.05)).unwrap();
        assert!(tight > wide);
    }

    #[test]
    fn sizing_override_wins_over_any_model() {
        let rule = SizingRule { model: SizingModel::PercentEquity, value: 0.1 };
        let sig = signal().with_sizing_override(42.0);
        assert_eq!(compute_notional(&rule, &sig, 10_000.0, 1.0, None).unwrap(), 42.0);
    }
}
