// ===============================
// src/gateway.rs (order sinks)
// ===============================
//
// - MockOrderSink : fills at the submitted price after a short delay,
//                   optional random rejection rate (MOCK_FILL_FAILURE_RATE)
// - HttpOrderSink : POST {side, amount, price, symbol, orderType, userId} to the
//                   trade API; 2xx = filled at the submitted price
//
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::{Leg, OrderErrorKind, Side};
use crate::execution::OrderSink;

pub struct MockOrderSink {
    failure_rate: f64,
    fill_delay: Duration,
}

impl MockOrderSink {
    pub fn new(failure_rate: f64, fill_delay: Duration) -> Self {
        Self { failure_rate: failure_rate.clamp(0.0, 1.0), fill_delay }
    }
}

#[async_trait]
impl OrderSink for MockOrderSink {
    async fn submit(&self, leg: &Leg) -> Result<f64, OrderErrorKind> {
        // jangan simpan ThreadRng melewati .await
        let reject = rand::thread_rng().gen::<f64>() < self.failure_rate;
        sleep(self.fill_delay).await;
        if reject {
            debug!(symbol = %leg.symbol, side = leg.side.as_str(), "mock reject");
            return Err(OrderErrorKind::Rejected("mock rejection".into()));
        }
        Ok(leg.price)
    }
}

#[derive(Debug, Serialize)]
struct TradePayload<'a> {
    side: Side,
    amount: f64,
    price: f64,
    symbol: &'a str,
    #[serde(rename = "orderType")]
    order_type: &'static str,
    #[serde(rename = "userId")]
    user_id: &'a str,
}

pub struct HttpOrderSink {
    http: reqwest::Client,
    url: Url,
    user_id: String,
}

impl HttpOrderSink {
    pub fn new(url: Url, user_id: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url, user_id })
    }
}

#[async_trait]
impl OrderSink for HttpOrderSink {
    async fn submit(&self, leg: &Leg) -> Result<f64, OrderErrorKind> {
        let payload = TradePayload {
            side: leg.side,
            amount: leg.amount,
            price: leg.price,
            symbol: &leg.symbol,
            order_type: "market",
            user_id: &self.user_id,
        };
        let rsp = self.http.post(self.url.clone()).json(&payload).send().await.map_err(|e| {
            if e.is_timeout() {
                OrderErrorKind::Timeout
            } else {
                OrderErrorKind::Transport(e.to_string())
            }
        })?;

        let code = rsp.status();
        let body = rsp.text().await.unwrap_or_default();
        if !code.is_success() {
            warn!(%code, %body, symbol = %leg.symbol, "trade rejected");
            return Err(OrderErrorKind::Rejected(format!("{code}: {body}")));
        }

        // balances hanya di-log, tidak diinterpretasi
        if let Some(b) = serde_json::from_str::<serde_json::Value>(&body).ok().and_then(|v| v.get("balances").cloned()) {
            info!(balances = %b, "balances after trade");
        }
        Ok(leg.price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leg() -> Leg { Leg { symbol: "BTC".into(), side: Side::Sell, amount: 0.01, price: 101_729.81 } }

    #[test]
    fn payload_matches_trade_api_shape() {
        let l = leg();
        let p = TradePayload {
            side: l.side,
            amount: l.amount,
            price: l.price,
            symbol: &l.symbol,
            order_type: "market",
            user_id: "u1",
        };
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"side":"sell","amount":0.01,"price":101729.81,"symbol":"BTC","orderType":"market","userId":"u1"})
        );
    }

    #[tokio::test]
    async fn mock_sink_fills_at_submitted_price() {
        let s = MockOrderSink::new(0.0, Duration::ZERO);
        assert_eq!(s.submit(&leg()).await, Ok(101_729.81));
        let s = MockOrderSink::new(1.0, Duration::ZERO);
        assert!(matches!(s.submit(&leg()).await, Err(OrderErrorKind::Rejected(_))));
    }

    #[tokio::test]
    async fn http_sink_fills_on_2xx_and_rejects_otherwise() {
        let ok = crate::testutil::serve_fixed(200, r#"{"balances": {"BTC": 0.5}}"#).await;
        let s = HttpOrderSink::new(ok, "u1".into(), Duration::from_secs(2)).unwrap();
        assert_eq!(s.submit(&leg()).await, Ok(101_729.81));

        let down = crate::testutil::serve_fixed(500, "insufficient balance").await;
        let s = HttpOrderSink::new(down, "u1".into(), Duration::from_secs(2)).unwrap();
        match s.submit(&leg()).await {
            Err(OrderErrorKind::Rejected(msg)) => {
                assert!(msg.contains("500"), "{msg}");
                assert!(msg.contains("insufficient balance"), "{msg}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
