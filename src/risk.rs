// ===============================
// src/risk.rs
// ===============================
use rust_decimal::Decimal;
use thiserror::Error;

use crate::config::{Limits, SpendAccounting};
use crate::domain::{SubmitOutcome, TradeEvent};

#[derive(Debug, Error, PartialEq)]
pub enum RiskError {
    #[error("Trade size out of band")]
    SizeBand,
    #[error("Trade has no mint")]
    NoMint,
    /// The prospective total would cross the cap: end of session, not a fault.
    #[error("Spend limit reached")]
    SpendLimit,
}

impl RiskError {
    pub fn label(&self) -> &'static str {
        match self {
            RiskError::SizeBand => "size_band",
            RiskError::NoMint => "no_mint",
            RiskError::SpendLimit => "spend_limit",
        }
    }
}

/// Approved trade, ready for the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct Approved {
    pub mint: String,
    pub amount: Decimal,
    /// Running total if this trade gets counted.
    pub prospective_total: Decimal,
}

/// Session-lifetime spend accumulator.
#[derive(Debug)]
pub struct SpendGuard {
    total_spent: Decimal,
    limit: Decimal,
    min_trade: Decimal,
    max_trade: Decimal,
    accounting: SpendAccounting,
}

impl SpendGuard {
    pub fn new(lim: &Limits) -> Self {
        SpendGuard {
            total_spent: Decimal::ZERO,
            // an unrepresentable cap leaves nothing to spend
            limit: lim.spend_limit_sol().unwrap_or(Decimal::ZERO),
            min_trade: lim.min_trade_sol,
            max_trade: lim.max_trade_sol,
            accounting: lim.accounting,
        }
    }

    pub fn total_spent(&self) -> Decimal { self.total_spent }
    pub fn limit(&self) -> Decimal { self.limit }

    pub fn is_exhausted(&self) -> bool {
        self.total_spent >= self.limit
    }

    /// Pre-trade checks, in order: size band, spend cap, mint present.
    pub fn check(&self, ev: &TradeEvent) -> Result<Approved, RiskError> {
        // 1) Per-trade band, inclusive on both ends
        if ev.sol_amount < self.min_trade || ev.sol_amount > self.max_trade {
            return Err(RiskError::SizeBand);
        }

        // 2) Cumulative cap
        let prospective_total = self
            .total_spent
            .checked_add(ev.sol_amount)
            .ok_or(RiskError::SpendLimit)?;
        if prospective_total > self.limit {
            return Err(RiskError::SpendLimit);
        }

        // 3) Nothing to trade without a mint
        let mint = match ev.mint.as_deref() {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => return Err(RiskError::NoMint),
        };

        Ok(Approved { mint, amount: ev.sol_amount, prospective_total })
    }

    /// Account a submission. Transport failures arrive as `None`.
    /// Returns whether the amount was counted.
    pub fn record(&mut self, trade: &Approved, outcome: Option<&SubmitOutcome>) -> bool {
        let counted = match self.accounting {
            SpendAccounting::Always => true,
            SpendAccounting::ConfirmedOnly => outcome.is_some_and(SubmitOutcome::is_accepted),
        };
        if counted {
            self.total_spent = self.total_spent.checked_add(trade.amount).unwrap_or(Decimal::MAX);
        }
        counted
    }
}
