//! Hot-loop throughput: the exec-bar loop (§4.10, C10) must cost
//! O(bars), not O(bars^2), since a backtest's bar count is the one
//! dimension an operator scales freely. This bench drives increasing
//! bar counts through the same synthetic generator the validation
//! harness uses and reports per-bar cost via `Throughput::Elements`.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use indexmap::indexmap;
use playcore_engine::engine::{CancelToken, Engine, PreflightOutcome, RunConfig};
use playcore_engine::play_load::load_play;
use playcore_engine::preflight::AutoSync;
use playcore_engine::validation::{rising_trend_1m, symbol, SyntheticBarSource, VALIDATION_SEED, VALIDATION_SYMBOL};
use playcore_model::feature_spec::Scalar;
use playcore_model::play::{FeeModel, FundingPolicy, RiskModel, SizingModel, SizingRule, SlippageModel, TfMapping};
use playcore_model::{FeatureSpec, IndicatorKind, Play, TfRole, Timeframe};

fn ema_cross_play() -> Play {
    Play {
        id: "bench_ema_cross".into(),
        symbol_universe: vec![VALIDATION_SYMBOL.into()],
        tf_mapping: TfMapping { low_tf: Timeframe::M1, med_tf: Timeframe::M15, high_tf: Timeframe::H1 },
        exec_role: TfRole::LowTf,
        feature_specs: indexmap! { TfRole::LowTf => vec![
            FeatureSpec { id: "ema_fast".into(), kind: IndicatorKind::Ema, params: indexmap!{"length".into() => Scalar::Int(9)} },
            FeatureSpec { id: "ema_slow".into(), kind: IndicatorKind::Ema, params: indexmap!{"length".into() => Scalar::Int(21)} },
        ] },
        structure_specs: indexmap! {},
        actions: indexmap! {
            "enter_long".into() => serde_json::json!({
                "when": {"cross_above": [{"field": "ema_fast.value"}, {"field": "ema_slow.value"}]},
                "direction": "Long"
            }),
            "exit_long".into() => serde_json::json!({
                "when": {"cross_below": [{"field": "ema_fast.value"}, {"field": "ema_slow.value"}]},
                "direction": "Exit"
            }),
        },
        risk_model: RiskModel {
            sizing: SizingRule { model: SizingModel::PercentEquity, value: 0.1 },
            stop_loss: None,
            take_profit: None,
            max_leverage: 1.0,
            initial_equity: 10_000.0,
            fees: FeeModel { taker_bps: 0.0, maker_bps: 0.0 },
            slippage: SlippageModel { bps: 0.0 },
            funding_interval_hours: 8.0,
            funding: FundingPolicy::Disabled,
            min_trade_notional_usdt: 10.0,
            max_drawdown_stop_pct: None,
            equity_floor: None,
        },
        warmup_bars_by_role: None,
        delay_bars_by_role: None,
    }
}

fn seeded_source(total_bars: i64, warmup_pad: i64) -> SyntheticBarSource {
    let source = SyntheticBarSource::new();
    let bars = rising_trend_1m(total_bars, -(warmup_pad * 60_000), 0.02, VALIDATION_SEED);
    source.seed(VALIDATION_SYMBOL, Timeframe::M1, bars);
    source
}

fn bench_hot_loop(c: &mut Criterion) {
    let play = load_play(ema_cross_play()).unwrap();
    let warmup_pad = 100;

    let mut group = c.benchmark_group("HotLoop");
    group.warm_up_time(std::time::Duration::from_secs(1));
    group.measurement_time(std::time::Duration::from_secs(10));
    group.sample_size(20);

    for &bar_count in &[10_000i64, 50_000, 200_000] {
        group.throughput(Throughput::Elements(bar_count as u64));
        group.bench_function(format!("{bar_count}_bars"), |b| {
            b.iter_batched(
                || {
                    let source = seeded_source(bar_count, warmup_pad);
                    let config = RunConfig {
                        symbol: symbol(),
                        window_start_ms: 0,
                        window_end_ms: (bar_count - warmup_pad - 10) * 60_000,
                        auto_sync: AutoSync::default(),
                    };
                    (source, config)
                },
                |(source, config)| match Engine::new(&play, &source, config) {
                    PreflightOutcome::Ready(engine) => engine.run(&CancelToken::new()).unwrap(),
                    PreflightOutcome::Failed(report) => panic!("preflight should pass: {:?}", report.failure),
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_hot_loop);
criterion_main!(benches);
