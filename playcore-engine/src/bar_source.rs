//! The `BarSource` contract (§6.1): the only way the core reads bars.
//!
//! Historical storage, file formats, and live feeds all implement this
//! trait; `playcore-engine` never depends on a concrete store. The
//! [`validation`](crate::validation) harness's synthetic generators
//! are the only `BarSource` implementation this crate itself ships.

use playcore_model::{Bar, Timeframe};
use smol_str::SmolStr;

/// Result of an optional [`BarSource::fill`] call during preflight's
/// auto-heal loop (§4.8 step 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillReport {
    pub bars_written: u64,
}

/// The bar-data contract the engine consumes. `fetch` is
/// inclusive-exclusive over `[start_ms, end_ms)` and returns only
/// closed bars in strictly increasing timestamp order; `coverage`
/// reports the widest available range (if any); `fill` is an optional
/// healing hook preflight uses only when `auto_sync` is enabled in the
/// run configuration.
pub trait BarSource {
    fn fetch(&self, symbol: &str, tf: Timeframe, start_ms: i64, end_ms: i64) -> Vec<Bar>;

    fn coverage(&self, symbol: &str, tf: Timeframe) -> Option<(i64, i64)>;

    /// Requests that the store backfill `[start_ms, end_ms)` for
    /// `(symbol, tf)`. `None` means this source cannot heal gaps;
    /// preflight then fails fast instead of looping.
    fn fill(&self, _symbol: &str, _tf: Timeframe, _start_ms: i64, _end_ms: i64) -> Option<FillReport> {
        None
    }
}

/// `(symbol, tf)` identity used to key coverage/fetch requests across
/// preflight and the engine's own 1m-subloop driver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceKey {
    pub symbol: SmolStr,
    pub tf: Timeframe,
}

impl SourceKey {
    pub fn new(symbol: impl Into<SmolStr>, tf: Timeframe) -> Self {
        Self { symbol: symbol.into(), tf }
    }
}
