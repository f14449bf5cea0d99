//! The exec-bar hot loop (§4.10, C10): drives `playcore-features` and
//! `playcore-rules` on every exec-role close, with a 1m subloop inside
//! that feeds the simulated exchange and the rollup bucket.
//!
//! Single-threaded and cooperative per §5: no intra-run parallelism,
//! bars are processed in strict timestamp order, and the only
//! suspension point is [`CancelToken`] polled once per exec bar.

use crate::artifacts::{EquityPoint, RunArtifacts};
use crate::bar_source::BarSource;
use crate::play_load::LoadedPlay;
use crate::preflight::{self, AutoSync, PreflightReport};
use indexmap::IndexMap;
use playcore_exchange::{OrderIntent, SimulatedExchange};
use playcore_features::{MultiTFState, SnapshotView};
use playcore_model::{Bar, Direction, ExitReason, RunManifest, RuntimeError, Signal, TerminalStopReason, TfRole, Timeframe};
use playcore_rules::RuleEvaluator;
use playcore_ta::structures::zone::{Zone, ZoneState, ZoneType};
use smol_str::SmolStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A cheap, cloneable handle a caller polls or flips to cooperatively
/// cancel a run between exec bars (§5).
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The window and symbol a single [`Engine`] run covers, plus the
/// optional auto-heal policy preflight should apply.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub symbol: SmolStr,
    pub window_start_ms: i64,
    pub window_end_ms: i64,
    pub auto_sync: AutoSync,
}

/// Result of attempting to start a run: either a [`Engine`] ready to
/// drive, or a preflight failure — in which case only
/// `preflight_report.json` is ever written (§4.8, §7).
#[derive(Debug)]
pub enum PreflightOutcome<'a> {
    Ready(Box<Engine<'a>>),
    Failed(PreflightReport),
}

/// Outcome of a completed (or terminally-stopped) run: full artifacts
/// plus the preflight report that gated it.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub artifacts: RunArtifacts,
    pub terminal_stop: Option<TerminalStopReason>,
}

#[derive(Debug)]
struct RoleFeed {
    bars: Vec<Bar>,
    next_idx: usize,
    bar_idx: i64,
}

/// Drives `playcore-features`, `playcore-rules`, and
/// `playcore-exchange` together for one `(play, symbol, window)` run.
#[derive(Debug)]
pub struct Engine<'a> {
    play: &'a LoadedPlay,
    config: RunConfig,
    multi_tf: MultiTFState,
    evaluator: RuleEvaluator,
    exchange: SimulatedExchange,
    minute_bars: Vec<Bar>,
    other_role_feeds: IndexMap<TfRole, RoleFeed>,
    preflight_report: PreflightReport,
}

impl<'a> Engine<'a> {
    /// Runs preflight, and if it passes, fetches every bar the run
    /// will need up front (bars are consumed from an in-memory
    /// `BarSource` read; live mode would stream instead, but the core
    /// hot loop itself is identical either way per §5).
    pub fn new(play: &'a LoadedPlay, source: &dyn BarSource, config: RunConfig) -> PreflightOutcome<'a> {
        let report = preflight::run_preflight(play, source, &config.symbol, config.window_start_ms, config.window_end_ms, config.auto_sync);
        if !report.is_pass() {
            return PreflightOutcome::Failed(report);
        }

        let widest_start_ms = TfRole::ALL
            .into_iter()
            .map(|role| preflight::required_start_ms(play, role, config.window_start_ms))
            .min()
            .unwrap_or(config.window_start_ms);

        let minute_bars = source.fetch(&config.symbol, Timeframe::M1, widest_start_ms, config.window_end_ms + Timeframe::M1.duration_ms());

        let exec_role = play.play.exec_role;
        let mut other_role_feeds = IndexMap::new();
        for role in TfRole::ALL {
            if role == exec_role {
                continue;
            }
            let tf = play.play.tf_mapping.tf_for(role);
            let start_ms = preflight::required_start_ms(play, role, config.window_start_ms);
            let bars = source.fetch(&config.symbol, tf, start_ms, config.window_end_ms + tf.duration_ms());
            other_role_feeds.insert(role, RoleFeed { bars, next_idx: 0, bar_idx: -1 });
        }

        let multi_tf = match play.fresh_multi_tf_state() {
            Ok(m) => m,
            Err(_) => unreachable!("play already validated by load_play before an Engine is constructed"),
        };
        let evaluator = play.fresh_evaluator();
        let exchange = SimulatedExchange::new(config.symbol.clone(), &play.play.risk_model);

        PreflightOutcome::Ready(Box::new(Self {
            play,
            config,
            multi_tf,
            evaluator,
            exchange,
            minute_bars,
            other_role_feeds,
            preflight_report: report,
        }))
    }

    /// Raises `rollup.touched_<zone_id>` for every exec-role zone whose
    /// entering condition (§4.3: `low ≤ lower` for demand, `high ≥
    /// upper` for supply) is met by this 1m bar — independent of, and
    /// ahead of, the zone's own exec-close `update` call that advances
    /// its state machine on the aggregated exec bar.
    fn mark_intrabar_zone_touches(&mut self, bar_1m: &Bar) {
        let touched: Vec<SmolStr> = self
            .multi_tf
            .exec_state()
            .zone_instances()
            .filter(|(_, zone)| zone_entered(zone, bar_1m))
            .map(|(id, _)| id.clone())
            .collect();
        if touched.is_empty() {
            return;
        }
        let rollup = self.multi_tf.rollup_mut();
        for id in touched {
            rollup.mark_zone_touched(id);
        }
    }

    fn advance_due_roles(&mut self, ts_ms: i64) -> Result<(), RuntimeError> {
        for (role, feed) in self.other_role_feeds.iter_mut() {
            while feed.next_idx < feed.bars.len() && feed.bars[feed.next_idx].ts_close_ms <= ts_ms {
                let bar = feed.bars[feed.next_idx];
                feed.bar_idx += 1;
                self.multi_tf.update_role(*role, feed.bar_idx, &bar)?;
                feed.next_idx += 1;
            }
        }
        Ok(())
    }

    /// Collapses a bar's signals per §4.6: at most one entry per
    /// direction, multiple exits collapse to one. Not fatal when the
    /// exchange rejects an individual intent (e.g. a position is
    /// already open) — only a [`RuntimeError`] from sizing propagates.
    fn submit_signals(&mut self, signals: Vec<Signal>) -> Result<(), RuntimeError> {
        let equity = self.exchange.ledger().equity();
        let mut entry_submitted = false;
        let mut exit_submitted = false;
        for signal in signals {
            match signal.direction {
                Direction::Exit => {
                    if !exit_submitted {
                        self.exchange.close_position(ExitReason::SignalExit);
                        exit_submitted = true;
                    }
                }
                Direction::Long | Direction::Short => {
                    if entry_submitted {
                        continue;
                    }
                    let intent = OrderIntent::from_signal(&signal, &self.play.play.risk_model, equity)?;
                    match self.exchange.submit(intent) {
                        Ok(_) => entry_submitted = true,
                        Err(playcore_exchange::ExchangeError::Runtime(re)) => return Err(re),
                        Err(err) => debug!(tag = %signal.tag, %err, "order intent not submitted"),
                    }
                }
            }
        }
        Ok(())
    }

    /// Runs the full window: the 1m subloop, exec-role rollup
    /// construction, multi-TF updates, rule evaluation, and order
    /// submission, exactly as §4.10 lays out the seven-step procedure.
    pub fn run(mut self, cancel: &CancelToken) -> Result<RunOutcome, RuntimeError> {
        let exec_role = self.play.play.exec_role;
        let exec_tf = self.play.play.exec_tf();
        let mut exec_bar_idx = 0i64;
        let mut equity_curve = Vec::new();
        let mut terminal_stop = None;

        let minute_bars = std::mem::take(&mut self.minute_bars);
        for bar_1m in &minute_bars {
            if cancel.is_cancelled() {
                info!("run cancelled between exec bars");
                break;
            }
            let ts = bar_1m.ts_close_ms;
            let in_window = ts > self.config.window_start_ms && ts <= self.config.window_end_ms;

            self.multi_tf.rollup_mut().push_1m_bar(bar_1m);

            if in_window {
                if let Some(reason) = self.exchange.apply_bar(bar_1m) {
                    terminal_stop = Some(reason);
                }
                self.mark_intrabar_zone_touches(bar_1m);
            }

            self.advance_due_roles(ts)?;

            if exec_tf.is_close(ts) {
                let rollup = self.multi_tf.rollup();
                let exec_bar = Bar::new(ts, rollup.open(), rollup.high(), rollup.low(), rollup.close(), rollup.volume());
                self.multi_tf.update_role(exec_role, exec_bar_idx, &exec_bar)?;
                exec_bar_idx += 1;

                if in_window && terminal_stop.is_none() {
                    let signals = {
                        let ledger = self.exchange.ledger();
                        let snapshot = SnapshotView::new(&self.multi_tf, self.exchange.position(), ledger, self.exchange.mark_price(), self.exchange.last_price());
                        self.evaluator.evaluate(&self.play.compiled, &snapshot)
                    };
                    self.submit_signals(signals)?;

                    let ledger = self.exchange.ledger();
                    equity_curve.push(EquityPoint {
                        ts_close_ms: ts,
                        wallet_balance: ledger.wallet_balance,
                        unrealized_pnl: ledger.unrealized_pnl,
                        equity: ledger.equity(),
                    });
                }
                self.multi_tf.rollup_mut().reset();
            }

            if terminal_stop.is_some() {
                break;
            }
        }

        if let Some(reason) = terminal_stop {
            warn!(?reason, "run ended with a terminal stop");
        }

        let manifest = RunManifest::new(
            &self.play.play,
            &self.config.symbol,
            self.config.window_start_ms,
            self.config.window_end_ms,
            self.play.warmup_bars_by_role.clone(),
            self.play.delay_bars_by_role.clone(),
            terminal_stop,
        )
        .expect("Play and primitives here always serialize");

        let preflight_report_json = serde_json::to_value(PreflightReportSummary::from(&self.preflight_report)).ok();

        Ok(RunOutcome {
            artifacts: RunArtifacts { trades: self.exchange.trades().to_vec(), equity: equity_curve, manifest, preflight_report: preflight_report_json },
            terminal_stop,
        })
    }
}

/// Whether `bar_1m` enters `zone`'s range per §4.3's zone-type-specific
/// entering rule. A zone with no anchor yet (`lower` still `NaN`) or
/// already `Broken` (terminal) never re-touches.
fn zone_entered(zone: &Zone, bar_1m: &Bar) -> bool {
    if zone.lower().is_nan() || zone.state() == ZoneState::Broken {
        return false;
    }
    match zone.zone_type() {
        ZoneType::Demand => bar_1m.low <= zone.lower(),
        ZoneType::Supply => bar_1m.high >= zone.upper(),
    }
}

/// A serializable summary of [`PreflightReport`], since the report
/// itself carries a borrowed `&dyn BarSource`-shaped coverage vector
/// that is already fully owned data but has no `Serialize` derive of
/// its own (preflight is a pass/fail gate, not an artifact type).
#[derive(Debug, serde::Serialize)]
struct PreflightReportSummary {
    symbol: String,
    exec_to_1m_mapping_feasible: bool,
    pass: bool,
    failure: Option<String>,
}

impl From<&PreflightReport> for PreflightReportSummary {
    fn from(report: &PreflightReport) -> Self {
        Self {
            symbol: report.symbol.to_string(),
            exec_to_1m_mapping_feasible: report.exec_to_1m_mapping_feasible,
            pass: report.is_pass(),
            failure: report.failure.as_ref().map(|e| e.to_string()),
        }
    }
}
