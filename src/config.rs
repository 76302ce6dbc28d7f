// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : signal_bot_rust — polling signal/strategy engine in Rust
Module  : config.rs
Version : 0.5.0
Author  : Kukuh Tripamungkas Wicaksono (Kukuh TW)
License : MIT (see LICENSE)

Summary : Polls a price endpoint on a fixed interval, runs pluggable signal
          strategies (MA, bands, momentum, RSI, breakout, pairs, RL, learned
          policy), drives a per-strategy position state machine with single or
          multi-leg execution, tracks P&L, exposes Prometheus metrics, and
          records JSONL events.

(c) 2025 Kukuh TW. All rights reserved where applicable.
=============================================================================
*/
use std::env;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;
use url::Url;

use crate::error::ConfigError;
use crate::strategy::pairs::PairsModel;
use crate::strategy::rl::RlParams;

/// Mode sumber market data / venue trading
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarketMode {
    Mock,
    Http,
}

impl MarketMode {
    pub fn from_env(key: &str, default_mode: MarketMode) -> MarketMode {
        match env::var(key).unwrap_or_default().to_ascii_lowercase().as_str() {
            "mock" => MarketMode::Mock,
            "http" | "live" => MarketMode::Http,
            _ => default_mode,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MarketMode::Mock => "mock",
            MarketMode::Http => "http",
        }
    }
}

// ===== Strategi =====
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyMode {
    MACrossover,
    TrendFollowing,
    BandBreakout,
    BandReversion,
    Momentum,
    Rsi,
    RangeBreakout,
    PairsSpread,
    RlTabular,
    LearnedPolicy,
}

impl StrategyMode {
    pub fn parse_one(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ma_crossover" | "macrossover" | "ma" | "moving_average" => Some(StrategyMode::MACrossover),
            "band_breakout" | "bollinger_breakout" | "bb" => Some(StrategyMode::BandBreakout),
            "band_reversion" | "bollinger" | "bollinger_reversion" | "br" => Some(StrategyMode::BandReversion),
            "momentum" | "mom" => Some(StrategyMode::Momentum),
            "rsi" => Some(StrategyMode::Rsi),
            "trend_following" | "trend" | "ma_long_only" => Some(StrategyMode::TrendFollowing),
            "range_breakout" | "breakout" => Some(StrategyMode::RangeBreakout),
            "pairs_spread" | "pairs" | "spread" => Some(StrategyMode::PairsSpread),
            "rl_tabular" | "rl" | "reinforcement" => Some(StrategyMode::RlTabular),
            "learned_policy" | "policy" | "gnn" => Some(StrategyMode::LearnedPolicy),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StrategyMode::MACrossover => "ma_crossover",
            StrategyMode::TrendFollowing => "trend_following",
            StrategyMode::BandBreakout => "band_breakout",
            StrategyMode::BandReversion => "band_reversion",
            StrategyMode::Momentum => "momentum",
            StrategyMode::Rsi => "rsi",
            StrategyMode::RangeBreakout => "range_breakout",
            StrategyMode::PairsSpread => "pairs_spread",
            StrategyMode::RlTabular => "rl_tabular",
            StrategyMode::LearnedPolicy => "learned_policy",
        }
    }

    /// Comma separated list; any unknown name is an error rather than silently dropped.
    pub fn parse_list(list: &str) -> Result<Vec<Self>, ConfigError> {
        let mut out: Vec<Self> = Vec::new();
        for t in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let mode = Self::parse_one(t).ok_or_else(|| ConfigError::UnknownStrategy(t.to_string()))?;
            if !out.contains(&mode) {
                out.push(mode);
            }
        }
        Ok(out)
    }

    /// Baca daftar strategi dari `STRATEGIES` (comma separated) atau fallback `STRATEGY` (single).
    pub fn parse_many(env_key_list: &str, env_key_single: &str, default_list: Vec<Self>) -> Result<Vec<Self>, ConfigError> {
        // STRATEGIES=ma_crossover,pairs_spread
        if let Ok(val) = env::var(env_key_list) {
            let out = Self::parse_list(&val)?;
            if !out.is_empty() {
                return Ok(out);
            }
        }
        // Fallback STRATEGY=rsi
        if let Ok(one) = env::var(env_key_single) {
            let out = Self::parse_list(&one)?;
            if !out.is_empty() {
                return Ok(out);
            }
        }
        Ok(default_list)
    }
}

#[derive(Clone, Debug)]
pub struct Args {
    // endpoints
    pub feed_mode: MarketMode,
    pub venue_mode: MarketMode,
    pub market_data_url: Url,
    pub trade_api_url: Url,
    pub user_id: String,

    // sizing / loop
    pub trade_amount: f64,
    pub interval: Duration,
    pub cooldown: Duration,
    pub http_timeout: Duration,
    pub initial_cash: f64,
    pub mock_fill_failure_rate: f64,

    // files/metrics
    pub record_file: Option<String>,
    pub metrics_port: u16,

    // strategy selection
    pub strategy_modes: Vec<StrategyMode>, // bisa lebih dari satu
}

/// Tuning for every strategy variant; each one reads only its own fields.
#[derive(Clone, Debug)]
pub struct StrategyParams {
    pub symbol: String,
    pub pair_y: String,
    pub pair_x: String,

    pub fast_window: usize,
    pub slow_window: usize,
    pub band_window: usize,
    pub band_std_mult: f64,
    pub momentum_period: usize,
    pub momentum_threshold: f64,
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub rsi_exit: f64,
    pub breakout_lookback: usize,

    pub pairs_model: PairsModel,
    pub pairs_calibration_window: usize,
    pub pairs_rolling_window: usize,
    pub pairs_threshold: f64,

    pub rl: RlParams,
    pub policy_weights_file: Option<String>,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            symbol: "BTC".into(),
            pair_y: "ETH".into(),
            pair_x: "BTC".into(),
            fast_window: 10,
            slow_window: 50,
            band_window: 20,
            band_std_mult: 2.0,
            momentum_period: 10,
            momentum_threshold: 50.0,
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            rsi_exit: 50.0,
            breakout_lookback: 20,
            pairs_model: PairsModel::Hedge,
            pairs_calibration_window: 100,
            pairs_rolling_window: 60,
            pairs_threshold: 1.0,
            rl: RlParams::default(),
            policy_weights_file: None,
        }
    }
}

fn num<T: FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

fn url(key: &'static str, default: &str) -> Result<Url, ConfigError> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|source| ConfigError::Url { key, source })
}

fn positive(key: &'static str, v: usize) -> Result<usize, ConfigError> {
    if v == 0 {
        return Err(ConfigError::Invalid { key, reason: "must be > 0".into() });
    }
    Ok(v)
}

fn strategy_params() -> Result<StrategyParams, ConfigError> {
    let d = StrategyParams::default();

    let symbol = env::var("SYMBOL").map(|s| s.trim().to_ascii_uppercase()).unwrap_or(d.symbol);

    // PAIR_SYMBOLS=ETH,BTC  (Y, X)
    let (pair_y, pair_x) = match env::var("PAIR_SYMBOLS") {
        Ok(v) => {
            let parts: Vec<String> = v
                .split(',')
                .map(|x| x.trim())
                .filter(|x| !x.is_empty())
                .map(|x| x.to_ascii_uppercase())
                .collect();
            match parts.as_slice() {
                [y, x] if y != x => (y.clone(), x.clone()),
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "PAIR_SYMBOLS",
                        reason: format!("expected two distinct symbols, got {v:?}"),
                    })
                }
            }
        }
        Err(_) => (d.pair_y, d.pair_x),
    };

    let fast_window = positive("FAST_WINDOW", num("FAST_WINDOW", d.fast_window))?;
    let slow_window = positive("SLOW_WINDOW", num("SLOW_WINDOW", d.slow_window))?;
    if fast_window > slow_window {
        return Err(ConfigError::Invalid {
            key: "FAST_WINDOW",
            reason: format!("{fast_window} is larger than SLOW_WINDOW {slow_window}"),
        });
    }

    let pairs_model = match env::var("PAIRS_MODEL") {
        Ok(v) => PairsModel::parse(&v)
            .ok_or_else(|| ConfigError::Invalid { key: "PAIRS_MODEL", reason: format!("{v:?} (hedge|ratio)") })?,
        Err(_) => d.pairs_model,
    };

    let rl = RlParams {
        ma_window: positive("RL_MA_WINDOW", num("RL_MA_WINDOW", d.rl.ma_window))?,
        trend_threshold: num("RL_TREND_THRESHOLD", d.rl.trend_threshold),
        epsilon: num("RL_EPSILON", d.rl.epsilon).clamp(0.0, 1.0),
        alpha: num("RL_ALPHA", d.rl.alpha),
        gamma: num("RL_GAMMA", d.rl.gamma),
        seed: env::var("RL_SEED").ok().and_then(|s| s.trim().parse().ok()),
    };

    Ok(StrategyParams {
        symbol,
        pair_y,
        pair_x,
        fast_window,
        slow_window,
        band_window: positive("BAND_WINDOW", num("BAND_WINDOW", d.band_window))?,
        band_std_mult: num("BAND_STD_MULT", d.band_std_mult),
        momentum_period: positive("MOMENTUM_PERIOD", num("MOMENTUM_PERIOD", d.momentum_period))?,
        momentum_threshold: num("MOMENTUM_THRESHOLD", d.momentum_threshold),
        rsi_period: positive("RSI_PERIOD", num("RSI_PERIOD", d.rsi_period))?,
        rsi_oversold: num("RSI_OVERSOLD", d.rsi_oversold),
        rsi_overbought: num("RSI_OVERBOUGHT", d.rsi_overbought),
        rsi_exit: num("RSI_EXIT", d.rsi_exit),
        breakout_lookback: positive("BREAKOUT_LOOKBACK", num("BREAKOUT_LOOKBACK", d.breakout_lookback))?,
        pairs_model,
        pairs_calibration_window: positive(
            "PAIRS_CALIBRATION_WINDOW",
            num("PAIRS_CALIBRATION_WINDOW", d.pairs_calibration_window),
        )?,
        pairs_rolling_window: positive("PAIRS_ROLLING_WINDOW", num("PAIRS_ROLLING_WINDOW", d.pairs_rolling_window))?,
        pairs_threshold: num("PAIRS_THRESHOLD", d.pairs_threshold),
        rl,
        policy_weights_file: env::var("POLICY_WEIGHTS_FILE").ok().filter(|s| !s.trim().is_empty()),
    })
}

/// `strategy_override` comes from `--strategy` and wins over STRATEGIES / STRATEGY.
pub fn load(strategy_override: Option<&str>) -> Result<(Args, StrategyParams), ConfigError> {
    // Pastikan .env dibaca (kalau ada); --env-file sudah dimuat di main
    let _ = dotenv();

    // ===== Mode =====
    let feed_mode = MarketMode::from_env("FEED_MODE", MarketMode::Mock);
    let venue_mode = MarketMode::from_env("VENUE_MODE", MarketMode::Mock);

    // ===== Endpoints =====
    let bot_id = env::var("BOT_ID").unwrap_or_else(|_| "local".to_string());
    let market_data_url = url("MARKET_DATA_URL", "http://localhost:3000/api/market-data")?;
    let trade_api_url = url("TRADE_API_URL", &format!("http://localhost:3000/api/bots/{bot_id}/trades"))?;
    let user_id = env::var("USER_ID").unwrap_or_default();

    // ===== Loop / sizing =====
    let trade_amount: f64 = num("TRADE_AMOUNT", 0.01);
    if !(trade_amount.is_finite() && trade_amount > 0.0) {
        return Err(ConfigError::Invalid { key: "TRADE_AMOUNT", reason: format!("{trade_amount} must be > 0") });
    }
    let interval_secs: u64 = num("EVALUATION_INTERVAL_SECS", 60);
    if interval_secs == 0 {
        return Err(ConfigError::Invalid { key: "EVALUATION_INTERVAL_SECS", reason: "must be > 0".into() });
    }

    // ===== Strategy selection =====
    // Contoh:
    //   STRATEGY=rsi
    //   STRATEGIES=ma_crossover,pairs_spread
    let strategy_modes = match strategy_override {
        Some(list) => StrategyMode::parse_list(list)?,
        None => StrategyMode::parse_many("STRATEGIES", "STRATEGY", vec![StrategyMode::MACrossover])?,
    };
    if strategy_modes.is_empty() {
        return Err(ConfigError::Invalid { key: "STRATEGIES", reason: "no strategy selected".into() });
    }

    let args = Args {
        feed_mode,
        venue_mode,
        market_data_url,
        trade_api_url,
        user_id,
        trade_amount,
        interval: Duration::from_secs(interval_secs),
        cooldown: Duration::from_secs(num("COOLDOWN_SECS", 0)),
        http_timeout: Duration::from_millis(num("HTTP_TIMEOUT_MS", 5000)),
        initial_cash: num("INITIAL_CASH", 10_000.0),
        mock_fill_failure_rate: num("MOCK_FILL_FAILURE_RATE", 0.0f64).clamp(0.0, 1.0),
        record_file: env::var("RECORD_FILE").ok().filter(|s| !s.trim().is_empty()),
        metrics_port: num("METRICS_PORT", 9898),
        strategy_modes,
    };

    Ok((args, strategy_params()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_names_and_aliases() {
        assert_eq!(StrategyMode::parse_one(" Bollinger "), Some(StrategyMode::BandReversion));
        assert_eq!(StrategyMode::parse_one("trend_following"), Some(StrategyMode::TrendFollowing));
        assert_eq!(StrategyMode::parse_one("breakout"), Some(StrategyMode::RangeBreakout));
        assert_eq!(StrategyMode::parse_one("nope"), None);
        let modes = [
            StrategyMode::TrendFollowing,
            StrategyMode::RangeBreakout,
            StrategyMode::PairsSpread,
            StrategyMode::RlTabular,
            StrategyMode::LearnedPolicy,
        ];
        for m in modes {
            assert_eq!(StrategyMode::parse_one(m.label()), Some(m));
        }
    }

    #[test]
    fn list_dedups_and_rejects_unknown() {
        let v = StrategyMode::parse_list("rsi, momentum,rsi,,").unwrap();
        assert_eq!(v, vec![StrategyMode::Rsi, StrategyMode::Momentum]);
        assert!(matches!(StrategyMode::parse_list("rsi,macd"), Err(ConfigError::UnknownStrategy(s)) if s == "macd"));
    }

    #[test]
    fn default_params_match_documented_defaults() {
        let d = StrategyParams::default();
        assert_eq!((d.fast_window, d.slow_window, d.band_window), (10, 50, 20));
        assert_eq!((d.pairs_calibration_window, d.pairs_rolling_window), (100, 60));
        assert_eq!(d.pairs_model, PairsModel::Hedge);
        assert_eq!(d.rl.gamma, 0.99);
    }
}
