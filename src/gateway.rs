// ===============================
// src/gateway.rs
// ===============================
//
// PumpPortal Lightning trade API. One POST per trade, api key in the query
// string, SOL-denominated amount. PumpPortal signs and lands the transaction
// with the wallet tied to the key, so nothing is signed here.
//
use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

use crate::config::GatewayCfg;
use crate::domain::{Side, SubmitOutcome, TradeOrder};
use crate::metrics::EXECS;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("http client setup failed: {0}")]
    Client(reqwest::Error),
    #[error("trade request failed: {0}")]
    Transport(reqwest::Error),
}

/// Anything that can place a single trade.
#[async_trait]
pub trait TradeExecutor: Send + Sync {
    async fn execute(&self, side: Side, mint: &str, amount: Decimal) -> Result<SubmitOutcome, GatewayError>;
}

pub struct PumpPortalGateway {
    http: reqwest::Client,
    cfg: GatewayCfg,
}

impl PumpPortalGateway {
    pub fn new(cfg: GatewayCfg) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(GatewayError::Client)?;
        Ok(PumpPortalGateway { http, cfg })
    }

    pub fn build_order(&self, side: Side, mint: &str, amount: Decimal) -> TradeOrder {
        let p = &self.cfg.policy;
        TradeOrder {
            action: side,
            mint: mint.to_string(),
            amount,
            denominated_in_sol: "true".to_string(),
            slippage: p.slippage,
            priority_fee: p.priority_fee,
            pool: p.pool.clone(),
        }
    }
}

#[async_trait]
impl TradeExecutor for PumpPortalGateway {
    async fn execute(&self, side: Side, mint: &str, amount: Decimal) -> Result<SubmitOutcome, GatewayError> {
        let order = self.build_order(side, mint, amount);
        info!(?order, "sending trade request");

        let rsp = self
            .http
            .post(&self.cfg.trade_url)
            .query(&[("api-key", self.cfg.api_key.as_str())])
            .json(&order)
            .send()
            .await;

        let rsp = match rsp {
            Ok(r) => r,
            Err(e) => {
                error!(?e, %mint, "trade request error");
                EXECS.with_label_values(&["error"]).inc();
                return Err(GatewayError::Transport(e));
            }
        };

        let code = rsp.status();
        let text = match rsp.text().await {
            Ok(t) => t,
            Err(e) => {
                error!(?e, %code, %mint, "trade response unreadable");
                EXECS.with_label_values(&["error"]).inc();
                return Err(GatewayError::Transport(e));
            }
        };
        // keep non-JSON bodies verbatim
        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        let outcome = if code == StatusCode::OK {
            info!(%body, %mint, "trade successful");
            SubmitOutcome::Accepted(body)
        } else {
            error!(%code, %body, %mint, "trade failed");
            SubmitOutcome::Rejected { status: code.as_u16(), body }
        };
        EXECS.with_label_values(&[outcome.label()]).inc();
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrderPolicy;
    use mockito::Matcher;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::time::Duration;

    fn cfg(trade_url: String) -> GatewayCfg {
        GatewayCfg {
            trade_url,
            api_key: "test-key".to_string(),
            timeout: Duration::from_secs(5),
            policy: OrderPolicy::default(),
        }
    }

    fn expected_body() -> Value {
        json!({
            "action": "buy",
            "mint": "ABC",
            "amount": 0.01,
            "denominatedInSol": "true",
            "slippage": 1,
            "priorityFee": 0.005,
            "pool": "pump"
        })
    }

    #[test]
    fn order_carries_policy_fields() {
        let gw = PumpPortalGateway::new(cfg("http://127.0.0.1:1/api/trade".into())).unwrap();
        let order = gw.build_order(Side::Buy, "ABC", dec!(0.01));
        assert_eq!(serde_json::to_value(&order).unwrap(), expected_body());
    }

    #[tokio::test]
    async fn posts_order_with_api_key_and_accepts_200() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", "/api/trade")
            .match_query(Matcher::UrlEncoded("api-key".into(), "test-key".into()))
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(expected_body()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"signature":"5abc"}"#)
            .create_async()
            .await;

        let gw = PumpPortalGateway::new(cfg(format!("{}/api/trade", server.url()))).unwrap();
        let out = gw.execute(Side::Buy, "ABC", dec!(0.01)).await.unwrap();

        assert_eq!(out, SubmitOutcome::Accepted(json!({"signature": "5abc"})));
        m.assert_async().await;
    }

    #[tokio::test]
    async fn non_200_is_rejected_with_body() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", "/api/trade")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"errors":["Bad Request"]}"#)
            .expect(1)
            .create_async()
            .await;

        let gw = PumpPortalGateway::new(cfg(format!("{}/api/trade", server.url()))).unwrap();
        let out = gw.execute(Side::Sell, "ABC", dec!(0.01)).await.unwrap();

        assert_eq!(
            out,
            SubmitOutcome::Rejected { status: 400, body: json!({"errors": ["Bad Request"]}) }
        );
        m.assert_async().await;
    }

    #[tokio::test]
    async fn plain_text_body_is_kept() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/trade")
            .match_query(Matcher::Any)
            .with_status(502)
            .with_body("upstream down")
            .create_async()
            .await;

        let gw = PumpPortalGateway::new(cfg(format!("{}/api/trade", server.url()))).unwrap();
        let out = gw.execute(Side::Buy, "ABC", dec!(0.01)).await.unwrap();
        assert_eq!(out, SubmitOutcome::Rejected { status: 502, body: json!("upstream down") });
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        // grab a free port and close it again
        let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let gw = PumpPortalGateway::new(cfg(format!("http://127.0.0.1:{port}/api/trade"))).unwrap();
        let err = gw.execute(Side::Buy, "ABC", dec!(0.01)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }
}
