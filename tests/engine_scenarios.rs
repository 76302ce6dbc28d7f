// ===============================
// tests/engine_scenarios.rs
// ===============================
//
// Drives StrategyEngine with scripted market data and a scripted order sink.
//
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::watch;

use signal_bot_rust::domain::{Leg, Observation, OrderErrorKind, PositionSide, Side};
use signal_bot_rust::engine::{self, EngineSettings, StrategyEngine, TickOutcome};
use signal_bot_rust::error::EngineError;
use signal_bot_rust::execution::{OrderExecutionCoordinator, OrderSink};
use signal_bot_rust::feed::{MarketDataSource, MockFeed};
use signal_bot_rust::gateway::MockOrderSink;
use signal_bot_rust::strategy::crossover::Crossover;
use signal_bot_rust::strategy::momentum::Momentum;
use signal_bot_rust::strategy::pairs::{PairsModel, PairsSpread};
use signal_bot_rust::strategy::{Instruments, SignalStrategy};

/// Fills at the submitted price unless the symbol is blocked or the next
/// planned outcome says otherwise.
#[derive(Default)]
struct ScriptedSink {
    blocked: Mutex<HashSet<String>>,
    plan: Mutex<VecDeque<bool>>,
    seen: Mutex<Vec<Leg>>,
}

impl ScriptedSink {
    fn block(&self, sym: &str) { self.blocked.lock().unwrap().insert(sym.to_string()); }
    fn plan(&self, outcomes: &[bool]) { self.plan.lock().unwrap().extend(outcomes.iter().copied()); }
    fn seen(&self) -> Vec<Leg> { self.seen.lock().unwrap().clone() }
}

#[async_trait]
impl OrderSink for ScriptedSink {
    async fn submit(&self, leg: &Leg) -> Result<f64, OrderErrorKind> {
        self.seen.lock().unwrap().push(leg.clone());
        let planned = self.plan.lock().unwrap().pop_front().unwrap_or(true);
        if !planned || self.blocked.lock().unwrap().contains(&leg.symbol) {
            return Err(OrderErrorKind::Rejected("scripted".into()));
        }
        Ok(leg.price)
    }
}

struct ScriptedFeed(Mutex<VecDeque<Result<Observation, EngineError>>>);

#[async_trait]
impl MarketDataSource for ScriptedFeed {
    async fn fetch(&self) -> Result<Observation, EngineError> {
        self.0
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(EngineError::DataFetch("script exhausted".into())))
    }
}

fn obs_at(ts: DateTime<Utc>, pairs: &[(&str, f64)]) -> Observation {
    let prices: HashMap<String, f64> = pairs.iter().map(|(s, p)| (s.to_string(), *p)).collect();
    Observation::new(ts, prices)
}

fn obs(pairs: &[(&str, f64)]) -> Observation { obs_at(Utc::now(), pairs) }

fn make_engine(strategy: Box<dyn SignalStrategy>, sink: Arc<ScriptedSink>, amount: f64, cooldown: Duration) -> StrategyEngine {
    let coord = OrderExecutionCoordinator::new(sink, Duration::from_secs(5));
    StrategyEngine::new(strategy, coord, EngineSettings { trade_amount: amount, initial_cash: 10_000.0, cooldown })
}

fn btc() -> Instruments { Instruments::Single("BTC".into()) }

#[tokio::test]
async fn pairs_entry_with_one_failed_leg_stays_flat_and_reports_the_fill() {
    let sink = Arc::new(ScriptedSink::default());
    sink.block("BTC");
    let pair = Instruments::Pair { y: "ETH".into(), x: "BTC".into() };
    let mut eng = make_engine(Box::new(PairsSpread::new(pair, PairsModel::Hedge, 3, 3, 1.0)), sink.clone(), 1.0, Duration::ZERO);

    // beta = 2 from y = 2x + 1, spread stays at 1 until the last tick jumps to 10
    for (y, x) in [(21.0, 10.0), (41.0, 20.0), (61.0, 30.0), (51.0, 25.0)] {
        assert!(matches!(eng.on_observation(&obs(&[("ETH", y), ("BTC", x)])).await, TickOutcome::WarmingUp { .. }));
    }
    assert!(matches!(eng.on_observation(&obs(&[("ETH", 71.0), ("BTC", 35.0)])).await, TickOutcome::Hold));

    match eng.on_observation(&obs(&[("ETH", 80.0), ("BTC", 35.0)])).await {
        TickOutcome::Failed(EngineError::PartialFill { filled, failed }) => {
            assert_eq!(filled.len(), 1);
            assert_eq!(filled[0].leg.symbol, "ETH");
            assert_eq!(filled[0].leg.side, Side::Sell);
            assert_eq!(failed.len(), 1);
            assert_eq!(failed[0].leg.symbol, "BTC");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(eng.side(), PositionSide::Flat);
    assert_eq!(eng.positions().entry_price(), None);
    assert_eq!(sink.seen().len(), 2);
}

#[tokio::test]
async fn flip_with_failed_entry_lands_flat() {
    let sink = Arc::new(ScriptedSink::default());
    let mut eng = make_engine(Box::new(Crossover::new(btc(), 1, 2)), sink.clone(), 1.0, Duration::ZERO);

    assert!(matches!(eng.on_observation(&obs(&[("BTC", 100.0)])).await, TickOutcome::WarmingUp { .. }));
    assert!(matches!(
        eng.on_observation(&obs(&[("BTC", 110.0)])).await,
        TickOutcome::Entered(PositionSide::Long)
    ));

    // exit leg fills, the new short entry is rejected
    sink.plan(&[true, false]);
    match eng.on_observation(&obs(&[("BTC", 90.0)])).await {
        TickOutcome::FlipIncomplete { closed, error } => {
            assert_eq!(closed.realized_profit, -20.0);
            assert!(matches!(error, EngineError::OrderFailure(_)));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(eng.side(), PositionSide::Flat);
    assert_eq!(eng.positions().entry_price(), None);
    assert_eq!(eng.accountant().realized(), -20.0);
    assert_eq!(eng.positions().ledger().len(), 1);
}

#[tokio::test]
async fn successful_flip_switches_sides() {
    let sink = Arc::new(ScriptedSink::default());
    let mut eng = make_engine(Box::new(Crossover::new(btc(), 1, 2)), sink.clone(), 1.0, Duration::ZERO);
    for px in [100.0, 110.0] {
        eng.on_observation(&obs(&[("BTC", px)])).await;
    }
    match eng.on_observation(&obs(&[("BTC", 90.0)])).await {
        TickOutcome::Flipped { side, .. } => assert_eq!(side, PositionSide::Short),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(eng.positions().entry_price(), Some(90.0));
    let sides: Vec<Side> = sink.seen().iter().map(|l| l.side).collect();
    assert_eq!(sides, vec![Side::Buy, Side::Sell, Side::Sell]);
}

#[tokio::test]
async fn long_round_trip_credits_price_change_times_size() {
    let sink = Arc::new(ScriptedSink::default());
    let mut eng = make_engine(Box::new(Momentum::new(btc(), 2, 5.0)), sink, 0.5, Duration::ZERO);

    eng.on_observation(&obs(&[("BTC", 100.0)])).await;
    assert!(matches!(eng.on_observation(&obs(&[("BTC", 110.0)])).await, TickOutcome::Entered(PositionSide::Long)));
    assert!(matches!(eng.on_observation(&obs(&[("BTC", 120.0)])).await, TickOutcome::Hold));
    match eng.on_observation(&obs(&[("BTC", 115.0)])).await {
        TickOutcome::Exited(t) => assert_eq!(t.realized_profit, 2.5),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(eng.accountant().realized(), 2.5);
    assert_eq!(eng.accountant().cash(), 10_002.5);
}

#[tokio::test]
async fn failed_single_leg_entry_keeps_prior_state() {
    let sink = Arc::new(ScriptedSink::default());
    sink.block("BTC");
    let mut eng = make_engine(Box::new(Momentum::new(btc(), 2, 5.0)), sink, 1.0, Duration::ZERO);
    eng.on_observation(&obs(&[("BTC", 100.0)])).await;
    assert!(matches!(
        eng.on_observation(&obs(&[("BTC", 110.0)])).await,
        TickOutcome::Failed(EngineError::OrderFailure(_))
    ));
    assert_eq!(eng.side(), PositionSide::Flat);
}

#[tokio::test]
async fn skipped_ticks_leave_buffers_untouched() {
    let sink = Arc::new(ScriptedSink::default());
    let mut eng = make_engine(Box::new(Crossover::new(btc(), 1, 2)), sink, 1.0, Duration::ZERO);
    let feed = ScriptedFeed(Mutex::new(VecDeque::from(vec![
        Ok(obs(&[("BTC", 100.0)])),
        Err(EngineError::DataFetch("timeout".into())),
        Ok(obs(&[("ETH", 3000.0)])),
        Ok(obs(&[("BTC", f64::NAN)])),
        Ok(obs(&[("BTC", 110.0)])),
    ])));

    assert!(matches!(eng.tick(&feed).await, TickOutcome::WarmingUp { need: 2, have: 1 }));
    assert!(matches!(eng.tick(&feed).await, TickOutcome::Skipped(EngineError::DataFetch(_))));
    assert!(matches!(eng.tick(&feed).await, TickOutcome::Skipped(EngineError::MissingSymbol(_))));
    assert!(matches!(eng.tick(&feed).await, TickOutcome::Skipped(EngineError::InvalidPrice { .. })));
    // only 100 and 110 ever reached the buffer
    assert!(matches!(eng.tick(&feed).await, TickOutcome::Entered(PositionSide::Long)));
    assert_eq!(eng.positions().entry_price(), Some(110.0));
}

#[tokio::test]
async fn cooldown_restarts_after_every_executed_trade() {
    let sink = Arc::new(ScriptedSink::default());
    let mut eng = make_engine(Box::new(Momentum::new(btc(), 2, 5.0)), sink.clone(), 1.0, Duration::from_secs(300));
    let t0 = Utc::now();
    let at = |s: i64| t0 + ChronoDuration::seconds(s);

    eng.on_observation(&obs_at(at(0), &[("BTC", 100.0)])).await;
    assert!(matches!(eng.on_observation(&obs_at(at(60), &[("BTC", 110.0)])).await, TickOutcome::Entered(_)));
    // exit signal inside the entry's window is held too
    assert!(matches!(eng.on_observation(&obs_at(at(120), &[("BTC", 100.0)])).await, TickOutcome::CoolingDown));
    assert_eq!(eng.side(), PositionSide::Long);
    match eng.on_observation(&obs_at(at(400), &[("BTC", 95.0)])).await {
        TickOutcome::Exited(t) => assert_eq!(t.realized_profit, -15.0),
        other => panic!("unexpected {other:?}"),
    }
    // the exit opened a fresh window
    assert!(matches!(eng.on_observation(&obs_at(at(401), &[("BTC", 85.0)])).await, TickOutcome::CoolingDown));
    assert_eq!(eng.side(), PositionSide::Flat);
    assert!(matches!(
        eng.on_observation(&obs_at(at(700), &[("BTC", 75.0)])).await,
        TickOutcome::Entered(PositionSide::Short)
    ));
    assert_eq!(sink.seen().len(), 3);
}

#[tokio::test]
async fn loop_stops_after_max_ticks() {
    let symbols = vec!["BTC".to_string()];
    let coord = OrderExecutionCoordinator::new(Arc::new(MockOrderSink::new(0.0, Duration::ZERO)), Duration::from_secs(1));
    let eng = StrategyEngine::new(
        Box::new(Crossover::new(btc(), 2, 3)),
        coord,
        EngineSettings { trade_amount: 0.01, initial_cash: 10_000.0, cooldown: Duration::ZERO },
    );
    let feed: Arc<dyn MarketDataSource> = Arc::new(MockFeed::new(&symbols));
    let (_tx, rx) = watch::channel(false);

    let eng = engine::run(eng, feed, Duration::from_millis(1), Some(5), rx).await;
    assert_eq!(eng.side() == PositionSide::Flat, eng.positions().entry_price().is_none());
}

#[tokio::test]
async fn loop_stops_on_shutdown_signal() {
    let sink = Arc::new(ScriptedSink::default());
    let eng = make_engine(Box::new(Crossover::new(btc(), 1, 2)), sink, 1.0, Duration::ZERO);
    let feed: Arc<dyn MarketDataSource> = Arc::new(MockFeed::new(&["BTC".to_string()]));
    let (tx, rx) = watch::channel(false);

    let task = tokio::spawn(engine::run(eng, feed, Duration::from_secs(3600), None, rx));
    tokio::time::sleep(Duration::from_millis(20)).await;
    tx.send(true).unwrap();
    let eng = tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    assert_eq!(eng.name(), "ma_crossover");
}
