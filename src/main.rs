// ===============================
// src/main.rs
// ===============================
/*
=============================================================================
Project : pump_copier — pump.fun account copy-trader in Rust
Summary : Subscribes to one account's trades on the PumpPortal data stream,
          filters them by size, mirrors them through the PumpPortal trade
          API, and stops once the session spend cap in SOL is used up.
          Exposes Prometheus metrics on METRICS_PORT.
=============================================================================
*/
mod config;
mod credential;
mod domain;
mod feed;
mod gateway;
mod metrics;
mod risk;
mod session;

use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::gateway::PumpPortalGateway;
use crate::session::Session;

#[tokio::main]
async fn main() {
    // ---- Logging ----
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // ---- Config (fatal on error) ----
    let args = match config::load() {
        Ok(a) => a,
        Err(e) => {
            error!(%e, "configuration error");
            std::process::exit(1);
        }
    };

    info!(
        wallet = %args.credential.public_key(),
        account = %args.feed.target_account,
        ws_url = %args.feed.ws_url,
        trade_url = %args.gateway.trade_url,
        limit_sol = ?args.limits.spend_limit_sol(),
        min_trade_sol = %args.limits.min_trade_sol,
        max_trade_sol = %args.limits.max_trade_sol,
        accounting = ?args.limits.accounting,
        "startup config"
    );
    if args.feed.insecure_skip_verify {
        warn!("WS_INSECURE_SKIP_VERIFY is set: the data stream will accept any certificate");
    }

    // ---- Metrics ----
    metrics::init();
    if args.metrics_port != 0 {
        tokio::spawn(metrics::serve_metrics(args.metrics_port));
    }

    // ---- Gateway ----
    let gateway = match PumpPortalGateway::new(args.gateway) {
        Ok(g) => g,
        Err(e) => {
            error!(%e, "trade gateway setup failed");
            std::process::exit(1);
        }
    };

    // ---- Session ----
    let mut session = Session::new(args.feed, &args.limits, gateway);
    let interrupted = tokio::select! {
        report = session.run() => {
            info!(
                total_spent = %report.total_spent,
                trades = report.trades,
                "spending limit reached, bot stopped"
            );
            false
        }
        _ = signal::ctrl_c() => true,
    };
    if interrupted {
        let report = session.report();
        info!(
            total_spent = %report.total_spent,
            trades = report.trades,
            "interrupted, shutting down"
        );
    }
}
