// ===============================
// src/session.rs
// ===============================
//
// Supervisory loop: connect -> subscribe -> for each message decode, check,
// execute, account. Ends when the spend cap is reached; any connection
// failure is logged and retried after a flat delay, forever.
//
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::{FeedCfg, Limits};
use crate::domain::{MessageError, TradeEvent};
use crate::feed::{self, FeedError};
use crate::gateway::TradeExecutor;
use crate::metrics::{
    LIMIT_SOL, MSGS, SKIPPED, SPENT_SOL, WS_CONNECTED, WS_LAST_EVENT_TS, WS_RECONNECTS,
};
use crate::risk::{RiskError, SpendGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Summary handed back once the cap is reached, or read off an interrupted session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionReport {
    pub total_spent: Decimal,
    /// Successful connect + subscribe rounds.
    pub connections: u32,
    pub messages: u64,
    /// Executor invocations, whatever their outcome.
    pub trades: u64,
}

pub struct Session<E> {
    feed: FeedCfg,
    guard: SpendGuard,
    exec: E,
    report: SessionReport,
}

impl<E: TradeExecutor> Session<E> {
    pub fn new(feed: FeedCfg, limits: &Limits, exec: E) -> Self {
        let guard = SpendGuard::new(limits);
        LIMIT_SOL.set(guard.limit().to_f64().unwrap_or_default());
        Session { feed, guard, exec, report: SessionReport::default() }
    }

    /// Counters so far. Stays valid after `run` is cancelled.
    pub fn report(&self) -> SessionReport {
        SessionReport { total_spent: self.guard.total_spent(), ..self.report.clone() }
    }

    pub async fn run(&mut self) -> SessionReport {
        info!(
            account = %self.feed.target_account,
            limit_sol = %self.guard.limit(),
            "session starting"
        );

        let mut attempt: u64 = 0;
        while !self.guard.is_exhausted() {
            if attempt > 0 {
                WS_RECONNECTS.inc();
            }
            attempt += 1;

            match self.stream().await {
                Ok(()) => break,
                Err(e) => {
                    WS_CONNECTED.set(0);
                    error!(%e, "WebSocket error");
                    if self.guard.is_exhausted() {
                        break;
                    }
                    // flat delay, no backoff
                    sleep(self.feed.reconnect_delay).await;
                }
            }
        }

        let report = self.report();
        info!(
            total_spent = %report.total_spent,
            trades = report.trades,
            messages = report.messages,
            connections = report.connections,
            "session stopped"
        );
        report
    }

    // One connection's lifetime. Ok means the session is over.
    async fn stream(&mut self) -> Result<(), FeedError> {
        let mut feed = feed::connect(&self.feed).await?;
        self.report.connections += 1;
        WS_CONNECTED.set(1);

        loop {
            let msg = feed.next().await?;
            if self.on_message(msg).await == Flow::Stop {
                WS_CONNECTED.set(0);
                feed.close().await;
                return Ok(());
            }
        }
    }

    async fn on_message(&mut self, msg: Value) -> Flow {
        MSGS.inc();
        WS_LAST_EVENT_TS.set(Utc::now().timestamp());
        self.report.messages += 1;
        info!(%msg, "received trade data");

        let ev = match TradeEvent::from_value(&msg) {
            Ok(ev) => ev,
            Err(e) => {
                let reason = match e {
                    MessageError::MissingField(_) => "incomplete",
                    _ => "invalid",
                };
                warn!(%e, "non-trade or incomplete trade data, skipping");
                SKIPPED.with_label_values(&[reason]).inc();
                return Flow::Continue;
            }
        };

        let trade = match self.guard.check(&ev) {
            Ok(t) => t,
            Err(RiskError::SpendLimit) => {
                info!(
                    amount = %ev.sol_amount,
                    total_spent = %self.guard.total_spent(),
                    limit = %self.guard.limit(),
                    "spending limit reached, stopping"
                );
                return Flow::Stop;
            }
            Err(e @ RiskError::SizeBand) => {
                SKIPPED.with_label_values(&[e.label()]).inc();
                return Flow::Continue;
            }
            Err(e) => {
                warn!(%e, signature = ?ev.signature, "skipping trade");
                SKIPPED.with_label_values(&[e.label()]).inc();
                return Flow::Continue;
            }
        };

        info!(
            action = %ev.side,
            trader = ?ev.trader,
            mint = %trade.mint,
            amount = %trade.amount,
            projected_total = %trade.prospective_total,
            "initiating trade"
        );
        let outcome = self.exec.execute(ev.side, &trade.mint, trade.amount).await;
        self.report.trades += 1;

        let counted = self.guard.record(&trade, outcome.as_ref().ok());
        SPENT_SOL.set(self.guard.total_spent().to_f64().unwrap_or_default());
        info!(
            accepted = outcome.as_ref().is_ok_and(|o| o.is_accepted()),
            counted,
            total_spent = %self.guard.total_spent(),
            "trade completed"
        );

        if self.guard.is_exhausted() {
            info!(limit = %self.guard.limit(), "spending limit reached, stopping");
            return Flow::Stop;
        }
        Flow::Continue
    }
}
