// ===============================
// src/domain.rs
// ===============================
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side { Buy, Sell }

impl Side {
    pub fn as_str(&self) -> &'static str { match self { Side::Buy => "buy", Side::Sell => "sell" } }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Side {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            _ => Err(MessageError::UnknownTxType(s.to_string())),
        }
    }
}

/// Why an inbound message did not become a [`TradeEvent`].
#[derive(Debug, Error, PartialEq)]
pub enum MessageError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("unknown txType `{0}`")]
    UnknownTxType(String),
    #[error("invalid solAmount `{0}`")]
    InvalidAmount(String),
}

/// One trade of the followed account, as decoded from the data stream.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeEvent {
    pub mint: Option<String>,
    pub side: Side,
    pub sol_amount: Decimal,
    pub signature: Option<String>,
    pub trader: Option<String>,
}

impl TradeEvent {
    /// Decode an already-parsed stream message.
    ///
    /// `solAmount` and `txType` are both required; subscription acks and other
    /// housekeeping messages carry neither and end up as `MissingField`.
    pub fn from_value(v: &Value) -> Result<Self, MessageError> {
        let raw_amount = v.get("solAmount").ok_or(MessageError::MissingField("solAmount"))?;
        let raw_side = v.get("txType").ok_or(MessageError::MissingField("txType"))?;

        let side = match raw_side.as_str() {
            Some(s) => s.parse()?,
            None => return Err(MessageError::UnknownTxType(raw_side.to_string())),
        };
        let sol_amount = parse_amount(raw_amount)?;

        let text = |key: &str| v.get(key).and_then(|x| x.as_str()).map(str::to_string);
        Ok(TradeEvent {
            mint: text("mint"),
            side,
            sol_amount,
            signature: text("signature"),
            trader: text("traderPublicKey"),
        })
    }
}

// the feed sends either a JSON number or a numeric string
fn parse_amount(v: &Value) -> Result<Decimal, MessageError> {
    let s = match v {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        other => return Err(MessageError::InvalidAmount(other.to_string())),
    };
    let amount = Decimal::from_str(&s)
        .or_else(|_| Decimal::from_scientific(&s))
        .map_err(|_| MessageError::InvalidAmount(s.clone()))?;
    if amount.is_sign_negative() {
        return Err(MessageError::InvalidAmount(s));
    }
    Ok(amount)
}

/// Request body for the trade endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeOrder {
    pub action: Side,
    pub mint: String,
    #[serde(serialize_with = "plain_number")]
    pub amount: Decimal,
    pub denominated_in_sol: String,
    #[serde(serialize_with = "plain_number")]
    pub slippage: Decimal,
    #[serde(serialize_with = "plain_number")]
    pub priority_fee: Decimal,
    pub pool: String,
}

// whole values go out as integers (`"slippage": 1`), the rest as floats
fn plain_number<S: serde::Serializer>(d: &Decimal, s: S) -> Result<S::Ok, S::Error> {
    use rust_decimal::prelude::ToPrimitive;
    match d.fract().is_zero().then(|| d.to_i64()).flatten() {
        Some(i) => s.serialize_i64(i),
        None => s.serialize_f64(d.to_f64().unwrap_or_default()),
    }
}

/// What the trade API said about one submission.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Accepted(Value),
    Rejected { status: u16, body: Value },
}

impl SubmitOutcome {
    pub fn is_accepted(&self) -> bool { matches!(self, SubmitOutcome::Accepted(_)) }

    pub fn label(&self) -> &'static str {
        match self {
            SubmitOutcome::Accepted(_) => "accepted",
            SubmitOutcome::Rejected { .. } => "rejected",
        }
    }
}
