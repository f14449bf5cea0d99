//! The closed registry mapping an [`IndicatorKind`] to a constructor,
//! its warmup-bar formula, and the price fields it reads. This is the
//! single source of truth both the rule evaluator's preflight pass and
//! the feature state builder consult — neither hand-rolls warmup math
//! against a `FeatureSpec` directly.

use crate::indicators::{macd_adx_vortex, moving_average, oscillator, price, stochastic, volatility, volume, Indicator};
use playcore_model::{FeatureSpec, IndicatorKind, PriceField};

pub type IndicatorFactory = fn(&FeatureSpec) -> Box<dyn Indicator>;

#[derive(Debug, Clone, Copy)]
pub struct IndicatorRegistryEntry {
    pub kind: IndicatorKind,
    pub output_keys: &'static [&'static str],
    pub required_fields: &'static [PriceField],
}

fn len(spec: &FeatureSpec) -> usize {
    spec.param_usize("length", 14)
}

/// Build the indicator instance declared by `spec`.
pub fn build(spec: &FeatureSpec) -> Box<dyn Indicator> {
    match spec.kind {
        IndicatorKind::Sma => Box::new(moving_average::Sma::new(len(spec))),
        IndicatorKind::Ema => Box::new(moving_average::Ema::new(len(spec))),
        IndicatorKind::Wma => Box::new(moving_average::Wma::new(len(spec))),
        IndicatorKind::Dema => Box::new(moving_average::Dema::new(len(spec))),
        IndicatorKind::Tema => Box::new(moving_average::Tema::new(len(spec))),
        IndicatorKind::Trima => Box::new(moving_average::Trima::new(len(spec))),
        IndicatorKind::Kama => Box::new(moving_average::Kama::new(len(spec))),
        IndicatorKind::Zlma => Box::new(moving_average::Zlma::new(len(spec))),
        IndicatorKind::Alma => Box::new(moving_average::Alma::new(len(spec))),
        IndicatorKind::Rsi => Box::new(oscillator::Rsi::new(len(spec))),
        IndicatorKind::Atr => Box::new(volatility::Atr::new(len(spec))),
        IndicatorKind::Natr => Box::new(volatility::Natr::new(len(spec))),
        IndicatorKind::Macd => Box::new(macd_adx_vortex::Macd::new(
            spec.param_usize("fast", 12),
            spec.param_usize("slow", 26),
            spec.param_usize("signal", 9),
        )),
        IndicatorKind::BBands => Box::new(volatility::BBands::new(len(spec), spec.param_f64("stddev", 2.0))),
        IndicatorKind::Stoch => Box::new(stochastic::Stoch::new(
            spec.param_usize("k_length", 14),
            spec.param_usize("smooth_k", 3),
            spec.param_usize("smooth_d", 3),
        )),
        IndicatorKind::StochRsi => Box::new(stochastic::StochRsi::new(
            spec.param_usize("rsi_length", 14),
            spec.param_usize("stoch_length", 14),
            spec.param_usize("smooth_k", 3),
            spec.param_usize("smooth_d", 3),
        )),
        IndicatorKind::Cci => Box::new(oscillator::Cci::new(spec.param_usize("length", 20))),
        IndicatorKind::WillR => Box::new(oscillator::WillR::new(len(spec))),
        IndicatorKind::Cmo => Box::new(oscillator::Cmo::new(len(spec))),
        IndicatorKind::Mom => Box::new(oscillator::Mom::new(spec.param_usize("length", 10))),
        IndicatorKind::Roc => Box::new(oscillator::Roc::new(spec.param_usize("length", 10))),
        IndicatorKind::Mfi => Box::new(oscillator::Mfi::new(len(spec))),
        IndicatorKind::Uo => Box::new(oscillator::Uo::new(
            spec.param_usize("short", 7),
            spec.param_usize("medium", 14),
            spec.param_usize("long", 28),
        )),
        IndicatorKind::Adx => Box::new(macd_adx_vortex::Adx::new(len(spec))),
        IndicatorKind::Vortex => Box::new(macd_adx_vortex::Vortex::new(len(spec))),
        IndicatorKind::Obv => Box::new(volume::Obv::new()),
        IndicatorKind::Cmf => Box::new(volume::Cmf::new(spec.param_usize("length", 20))),
        IndicatorKind::Vwap => Box::new(volume::Vwap::new()),
        IndicatorKind::LinReg => Box::new(price::LinReg::new(spec.param_usize("length", 14))),
        IndicatorKind::MidPrice => Box::new(price::MidPrice::new(len(spec))),
        IndicatorKind::Ohlc4 => Box::new(price::Ohlc4::new()),
    }
}

/// Bars of history that must be closed before this indicator's output
/// is no longer `NaN`. Mirrors the warmup multiplier each struct
/// enforces internally; kept here too so preflight can compute
/// `warmup_bars_by_role` without constructing an instance.
pub fn warmup_bars(spec: &FeatureSpec) -> usize {
    match spec.kind {
        IndicatorKind::Sma | IndicatorKind::BBands | IndicatorKind::Cci | IndicatorKind::WillR | IndicatorKind::MidPrice => len(spec),
        IndicatorKind::Ema | IndicatorKind::Wma | IndicatorKind::Trima | IndicatorKind::Kama | IndicatorKind::Zlma | IndicatorKind::Alma => {
            3 * len(spec)
        }
        IndicatorKind::Dema => 4 * len(spec),
        IndicatorKind::Tema => 5 * len(spec),
        IndicatorKind::Rsi | IndicatorKind::Atr | IndicatorKind::Natr | IndicatorKind::Mfi => len(spec) + 1,
        IndicatorKind::Macd => 3 * spec.param_usize("slow", 26) + spec.param_usize("signal", 9),
        IndicatorKind::Stoch => {
            spec.param_usize("k_length", 14) + spec.param_usize("smooth_k", 3) + spec.param_usize("smooth_d", 3)
        }
        IndicatorKind::StochRsi => {
            spec.param_usize("rsi_length", 14)
                + spec.param_usize("stoch_length", 14)
                + spec.param_usize("smooth_k", 3).max(spec.param_usize("smooth_d", 3))
        }
        IndicatorKind::Cmo | IndicatorKind::Mom | IndicatorKind::Roc => spec.param_usize("length", 10) + 1,
        IndicatorKind::Uo => spec.param_usize("long", 28) + 1,
        IndicatorKind::Adx => 2 * len(spec),
        IndicatorKind::Vortex => len(spec) + 1,
        IndicatorKind::Obv | IndicatorKind::Vwap | IndicatorKind::Ohlc4 => 1,
        IndicatorKind::Cmf => spec.param_usize("length", 20),
        IndicatorKind::LinReg => spec.param_usize("length", 14),
    }
}

/// The bar fields this indicator kind reads, used by the preflight gate
/// to decide which OHLCV columns must be present (all kinds currently
/// read at minimum `close`; this lists the rest).
pub fn required_fields(kind: IndicatorKind) -> &'static [PriceField] {
    use PriceField::*;
    match kind {
        IndicatorKind::Atr | IndicatorKind::Natr | IndicatorKind::Adx | IndicatorKind::Vortex | IndicatorKind::WillR
        | IndicatorKind::Stoch | IndicatorKind::MidPrice | IndicatorKind::Uo | IndicatorKind::Cci => &[Close, High, Low],
        IndicatorKind::Mfi | IndicatorKind::Cmf | IndicatorKind::Vwap => &[Close, High, Low, Volume],
        IndicatorKind::Obv => &[Close, Volume],
        IndicatorKind::Ohlc4 => &[Open, High, Low, Close],
        _ => &[Close],
    }
}

pub fn output_keys(kind: IndicatorKind) -> &'static [&'static str] {
    match kind {
        IndicatorKind::Macd => &["macd", "signal", "hist"],
        IndicatorKind::BBands => &["upper", "middle", "lower"],
        IndicatorKind::Stoch | IndicatorKind::StochRsi => &["k", "d"],
        IndicatorKind::Vortex => &["vi_plus", "vi_minus"],
        _ => &["value"],
    }
}
