use playcore_model::RuntimeError;
use thiserror::Error;

/// A [`crate::account::SimulatedExchange::submit`] rejection. Most
/// variants are ordinary (the engine simply doesn't place the order,
/// logs it, and moves on); [`ExchangeError::Runtime`] wraps the fatal
/// §7 `RuntimeError` taxonomy and should propagate as a run-ending
/// defect instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExchangeError {
    #[error("order notional {notional} is below the configured minimum {minimum}")]
    BelowMinNotional { notional: f64, minimum: f64 },

    #[error("leverage {requested} exceeds max_leverage {max}")]
    LeverageExceeded { requested: f64, max: f64 },

    #[error("insufficient free margin: need {required}, have {available}")]
    InsufficientMargin { required: f64, available: f64 },

    #[error("a position is already open for this symbol; isolated margin allows at most one")]
    PositionAlreadyOpen,

    #[error("no open position to close")]
    NoOpenPosition,

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
