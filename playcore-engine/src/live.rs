//! Live mode (§6.2, §5): a `LiveTransport` contract plus the
//! thread-safe runner state machine that wraps it.
//!
//! The core engine's hot loop (`engine::Engine::run`) stays
//! synchronous regardless of mode; live mode only changes where bars
//! come from. A concrete transport (a real exchange websocket client)
//! necessarily runs its own I/O elsewhere — possibly on an async
//! runtime — and feeds [`LiveEvent`]s into the channel returned by
//! [`LiveTransport::subscribe`]. [`LiveRunner`] is the synchronous
//! bridge: it drains that channel into a bounded queue, drives the
//! `Stopped -> Starting -> Running <-> Reconnecting -> Stopping` state
//! machine with exponential backoff on disconnect, and periodically
//! reconciles local position/balance expectations against the
//! transport's own view (§6.2: "periodic reconciliation polls
//! positions/balances and corrects drift").
//!
//! Modeled directly on `barter-data`'s `streams::reconnect` module: the
//! same backoff-policy-plus-state shape, applied to this crate's
//! `LiveTransport` boundary instead of a market-data websocket.

use playcore_exchange::OrderIntent;
use playcore_model::{ClientOrderId, LiveTransientError, Position, Timeframe};
use smol_str::SmolStr;
use std::collections::VecDeque;
use std::sync::mpsc::Receiver;
use std::time::Duration;
use tracing::{info, warn};

/// One event arriving from a [`LiveTransport`] subscription: either a
/// closed bar on one of the subscribed timeframes, or a bare price
/// tick used only to mark-to-market between closes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LiveEvent {
    BarClose { tf: Timeframe, bar: playcore_model::Bar },
    PriceTick { ts_ms: i64, price: f64 },
}

/// `balance()`'s return shape (§6.2).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalletSnapshot {
    pub wallet_balance: f64,
    pub margin_locked: f64,
    pub unrealized_pnl: f64,
}

/// The external collaborator §6.2 names: a live exchange connection.
/// Implementors own whatever async I/O is needed to keep `subscribe`'s
/// channel fed; every method here is otherwise a blocking, synchronous
/// call from the runner's point of view, matching §9's "coroutines /
/// async: only at the transport boundary in live mode."
pub trait LiveTransport: std::fmt::Debug {
    fn subscribe(&mut self, symbol: &str, tf_set: &[Timeframe]) -> Result<Receiver<LiveEvent>, LiveTransientError>;
    fn submit(&mut self, order: OrderIntent) -> Result<ClientOrderId, LiveTransientError>;
    fn cancel(&mut self, order_id: ClientOrderId) -> Result<(), LiveTransientError>;
    fn positions(&self, symbol: &str) -> Result<Option<Position>, LiveTransientError>;
    fn balance(&self) -> Result<WalletSnapshot, LiveTransientError>;
}

/// §6.2's connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Stopped,
    Starting,
    Running,
    Reconnecting,
    Stopping,
}

/// Exponential backoff parameters for [`LiveRunner`] reconnection,
/// shaped like `barter-data`'s `ReconnectionBackoffPolicy`.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub initial_ms: u64,
    pub multiplier: u32,
    pub max_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self { initial_ms: 500, multiplier: 2, max_ms: 30_000 }
    }
}

#[derive(Debug, Clone)]
struct BackoffState {
    policy: BackoffPolicy,
    current_ms: u64,
}

impl BackoffState {
    fn new(policy: BackoffPolicy) -> Self {
        Self { current_ms: policy.initial_ms, policy }
    }

    fn reset(&mut self) {
        self.current_ms = self.policy.initial_ms;
    }

    /// Returns the delay to wait before the next reconnect attempt and
    /// advances the internal state toward `max_ms`. The runner itself
    /// never sleeps — it reports this duration to its caller, who owns
    /// the actual scheduling (§5: the core stays synchronous; only the
    /// transport boundary is async).
    fn next(&mut self) -> Duration {
        let delay = Duration::from_millis(self.current_ms);
        self.current_ms = (self.current_ms.saturating_mul(self.policy.multiplier as u64)).min(self.policy.max_ms);
        delay
    }
}

/// A fixed-capacity FIFO between the transport and the engine (§5:
/// "live mode uses a bounded event queue between the transport and the
/// engine; on queue overflow, the transport drops oldest events and
/// marks the run for reconciliation"). Overflow never panics or
/// blocks; it drops the oldest buffered event and raises
/// [`Self::needs_reconciliation`].
#[derive(Debug)]
struct BoundedEventQueue<T> {
    capacity: usize,
    buf: VecDeque<T>,
    dropped: u64,
    needs_reconciliation: bool,
}

impl<T> BoundedEventQueue<T> {
    fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), buf: VecDeque::new(), dropped: 0, needs_reconciliation: false }
    }

    fn push(&mut self, item: T) {
        if self.buf.len() >= self.capacity {
            self.buf.pop_front();
            self.dropped += 1;
            self.needs_reconciliation = true;
        }
        self.buf.push_back(item);
    }

    fn drain_all(&mut self) -> Vec<T> {
        self.buf.drain(..).collect()
    }
}

/// Drift between the runner's locally expected account state and what
/// the transport reports, surfaced by [`LiveRunner::reconcile`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationReport {
    pub transport_position: Option<Position>,
    pub transport_balance: WalletSnapshot,
    pub queue_events_dropped: u64,
}

/// The synchronous bridge between a [`LiveTransport`] and the engine's
/// per-bar hot loop. Owns the connection state machine, the backoff
/// policy, and the bounded event queue; the engine drains
/// [`Self::drain_events`] once per iteration the way it drains 1m bars
/// from a backtest [`crate::bar_source::BarSource`] in backtest mode.
#[derive(Debug)]
pub struct LiveRunner<T: LiveTransport> {
    transport: T,
    symbol: SmolStr,
    tf_set: Vec<Timeframe>,
    state: RunnerState,
    backoff: BackoffState,
    queue: BoundedEventQueue<LiveEvent>,
    receiver: Option<Receiver<LiveEvent>>,
}

impl<T: LiveTransport> LiveRunner<T> {
    pub fn new(transport: T, symbol: impl Into<SmolStr>, tf_set: Vec<Timeframe>, queue_capacity: usize, backoff_policy: BackoffPolicy) -> Self {
        Self {
            transport,
            symbol: symbol.into(),
            tf_set,
            state: RunnerState::Stopped,
            backoff: BackoffState::new(backoff_policy),
            queue: BoundedEventQueue::new(queue_capacity),
            receiver: None,
        }
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn events_dropped(&self) -> u64 {
        self.queue.dropped
    }

    pub fn needs_reconciliation(&self) -> bool {
        self.queue.needs_reconciliation
    }

    /// `Stopped -> Starting -> Running`, or `Starting -> Stopped` on a
    /// failed subscription (reported, not panicked).
    pub fn start(&mut self) -> Result<(), LiveTransientError> {
        self.state = RunnerState::Starting;
        match self.transport.subscribe(&self.symbol, &self.tf_set) {
            Ok(receiver) => {
                self.receiver = Some(receiver);
                self.backoff.reset();
                self.state = RunnerState::Running;
                info!(symbol = %self.symbol, "live runner started");
                Ok(())
            }
            Err(err) => {
                self.state = RunnerState::Stopped;
                Err(err)
            }
        }
    }

    /// `Running -> Reconnecting`, returning the backoff delay the
    /// caller should wait before calling [`Self::reconnect`].
    pub fn note_disconnect(&mut self, err: &LiveTransientError) -> Duration {
        warn!(symbol = %self.symbol, %err, "live transport disconnected");
        self.state = RunnerState::Reconnecting;
        self.receiver = None;
        self.backoff.next()
    }

    /// Attempts to resubscribe from `Reconnecting`. On success returns
    /// to `Running` and resets backoff; on failure stays
    /// `Reconnecting` with the next (larger) backoff delay.
    pub fn reconnect(&mut self) -> Result<(), Duration> {
        match self.transport.subscribe(&self.symbol, &self.tf_set) {
            Ok(receiver) => {
                self.receiver = Some(receiver);
                self.backoff.reset();
                self.state = RunnerState::Running;
                info!(symbol = %self.symbol, "live runner reconnected");
                Ok(())
            }
            Err(err) => {
                warn!(symbol = %self.symbol, %err, "reconnect attempt failed");
                Err(self.backoff.next())
            }
        }
    }

    /// Drains every event currently buffered on the transport's
    /// channel into the bounded queue (non-blocking), then drains the
    /// queue itself for the engine to consume. Call once per hot-loop
    /// iteration in live mode.
    pub fn drain_events(&mut self) -> Vec<LiveEvent> {
        if let Some(receiver) = &self.receiver {
            while let Ok(event) = receiver.try_recv() {
                self.queue.push(event);
            }
        }
        self.queue.drain_all()
    }

    pub fn submit(&mut self, order: OrderIntent) -> Result<ClientOrderId, LiveTransientError> {
        self.transport.submit(order)
    }

    pub fn cancel(&mut self, order_id: ClientOrderId) -> Result<(), LiveTransientError> {
        self.transport.cancel(order_id)
    }

    /// Polls positions/balance from the transport and clears the
    /// reconciliation flag. The caller (the live engine loop) is
    /// responsible for comparing this against its own local ledger and
    /// correcting drift; this method only fetches the source of truth.
    pub fn reconcile(&mut self) -> Result<ReconciliationReport, LiveTransientError> {
        let transport_position = self.transport.positions(&self.symbol)?;
        let transport_balance = self.transport.balance()?;
        let dropped = self.queue.dropped;
        self.queue.needs_reconciliation = false;
        Ok(ReconciliationReport { transport_position, transport_balance, queue_events_dropped: dropped })
    }

    /// `Running | Reconnecting -> Stopping -> Stopped`.
    pub fn stop(&mut self) {
        self.state = RunnerState::Stopping;
        self.receiver = None;
        self.state = RunnerState::Stopped;
        info!(symbol = %self.symbol, "live runner stopped");
    }
}
