// ===============================
// src/feed.rs
// ===============================
//
// Market Data adapters (one fetch per evaluation tick):
// - MockFeed : random walk per symbol, for offline runs
// - HttpFeed : GET MARKET_DATA_URL, body {"BTC": 101729.81, "ETH": 3232.82}
//
// Any transport error, timeout, non-2xx or malformed body -> DataFetch.
//
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use url::Url;

use crate::domain::Observation;
use crate::error::EngineError;

#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch(&self) -> Result<Observation, EngineError>;
}

/// Parses `{"SYM": price, ...}`. Prices may also arrive as numeric strings.
pub fn parse_prices(body: &str) -> Result<HashMap<String, f64>, EngineError> {
    let v: serde_json::Value =
        serde_json::from_str(body).map_err(|e| EngineError::DataFetch(format!("malformed body: {e}")))?;
    let obj = v
        .as_object()
        .ok_or_else(|| EngineError::DataFetch("expected a JSON object of prices".into()))?;
    obj.iter()
        .map(|(k, v)| {
            let px = match v {
                serde_json::Value::Number(n) => n.as_f64(),
                serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            px.map(|p| (k.to_ascii_uppercase(), p))
                .ok_or_else(|| EngineError::DataFetch(format!("non-numeric price for {k}: {v}")))
        })
        .collect()
}

pub struct HttpFeed {
    http: reqwest::Client,
    url: Url,
}

impl HttpFeed {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url })
    }
}

#[async_trait]
impl MarketDataSource for HttpFeed {
    async fn fetch(&self) -> Result<Observation, EngineError> {
        let rsp = self
            .http
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| EngineError::DataFetch(e.to_string()))?;
        let code = rsp.status();
        if !code.is_success() {
            return Err(EngineError::DataFetch(format!("http status {code}")));
        }
        let body = rsp.text().await.map_err(|e| EngineError::DataFetch(e.to_string()))?;
        Ok(Observation::new(Utc::now(), parse_prices(&body)?))
    }
}

/// Random walk generator: each fetch moves every symbol by up to ±0.3%.
pub struct MockFeed {
    prices: Mutex<HashMap<String, f64>>,
}

impl MockFeed {
    pub fn new(symbols: &[String]) -> Self {
        let prices = symbols
            .iter()
            .map(|s| {
                let start = match s.as_str() {
                    "BTC" => 100_000.0,
                    "ETH" => 3_200.0,
                    _ => 100.0,
                };
                (s.clone(), start)
            })
            .collect();
        Self { prices: Mutex::new(prices) }
    }
}

#[async_trait]
impl MarketDataSource for MockFeed {
    async fn fetch(&self) -> Result<Observation, EngineError> {
        let mut prices = self
            .prices
            .lock()
            .map_err(|_| EngineError::DataFetch("mock feed state poisoned".into()))?;
        let mut rng = rand::thread_rng();
        for px in prices.values_mut() {
            let step: f64 = rng.gen_range(-0.003..=0.003);
            *px = (*px * (1.0 + step)).max(0.01);
        }
        Ok(Observation::new(Utc::now(), prices.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbers_and_numeric_strings() {
        let p = parse_prices(r#"{"BTC": 101729.81, "eth": "3232.82"}"#).unwrap();
        assert_eq!(p["BTC"], 101_729.81);
        assert_eq!(p["ETH"], 3_232.82);
    }

    #[test]
    fn malformed_bodies_are_data_fetch_errors() {
        for body in ["not json", "[1,2]", r#"{"BTC": null}"#, r#"{"BTC": "abc"}"#] {
            assert!(matches!(parse_prices(body), Err(EngineError::DataFetch(_))), "{body}");
        }
    }

    #[tokio::test]
    async fn mock_feed_reports_every_symbol() {
        let f = MockFeed::new(&["BTC".to_string(), "ETH".to_string()]);
        let o = f.fetch().await.unwrap();
        assert!(o.price("BTC").is_ok());
        assert!(o.price("ETH").is_ok());
        assert!(o.price("SOL").is_err());
    }

    #[tokio::test]
    async fn http_feed_reads_prices_and_maps_server_errors() {
        let ok = crate::testutil::serve_fixed(200, r#"{"BTC": 101729.81, "ETH": "3232.82"}"#).await;
        let o = HttpFeed::new(ok, Duration::from_secs(2)).unwrap().fetch().await.unwrap();
        assert_eq!(o.price("ETH").unwrap(), 3_232.82);

        let down = crate::testutil::serve_fixed(500, "boom").await;
        match HttpFeed::new(down, Duration::from_secs(2)).unwrap().fetch().await {
            Err(EngineError::DataFetch(msg)) => assert!(msg.contains("500"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
