// ===============================
// src/metrics.rs
// ===============================
use std::convert::Infallible;
use std::net::SocketAddr;

use hyper::service::{make_service_fn, service_fn};
use hyper::{header, Body, Request, Response, Server};
use once_cell::sync::Lazy;
use prometheus::{Encoder, Gauge, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use tracing::{error, info};

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Feed --------
pub static MSGS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("feed_messages_total", "stream messages received").unwrap());

pub static SKIPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("feed_skipped_total", "messages not traded (label: reason)"),
        &["reason"],
    )
    .unwrap()
});

pub static WS_CONNECTED: Lazy<IntGauge> =
    Lazy::new(|| IntGauge::new("ws_connected", "1 if the data stream is connected").unwrap());

pub static WS_RECONNECTS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("ws_reconnects_total", "data stream reconnects").unwrap());

pub static WS_LAST_EVENT_TS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("ws_last_event_ts", "Unix seconds of the last stream message").unwrap()
});

// -------- Execution --------
pub static EXECS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("trade_submissions_total", "trade API submissions (label: outcome)"),
        &["outcome"],
    )
    .unwrap()
});

// -------- Spend --------
pub static SPENT_SOL: Lazy<Gauge> =
    Lazy::new(|| Gauge::new("spend_total_sol", "SOL counted against the cap").unwrap());

pub static LIMIT_SOL: Lazy<Gauge> =
    Lazy::new(|| Gauge::new("spend_limit_sol", "session spend cap in SOL").unwrap());

pub fn init() {
    for m in [
        REGISTRY.register(Box::new(MSGS.clone())),
        REGISTRY.register(Box::new(SKIPPED.clone())),
        REGISTRY.register(Box::new(WS_CONNECTED.clone())),
        REGISTRY.register(Box::new(WS_RECONNECTS.clone())),
        REGISTRY.register(Box::new(WS_LAST_EVENT_TS.clone())),
        REGISTRY.register(Box::new(EXECS.clone())),
        REGISTRY.register(Box::new(SPENT_SOL.clone())),
        REGISTRY.register(Box::new(LIMIT_SOL.clone())),
    ] {
        if let Err(e) = m {
            error!(?e, "metric registration failed");
        }
    }
}

// Encode all metrics in Prometheus text format
fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

async fn handle(_req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let mut rsp = Response::new(Body::from(encode_metrics()));
    rsp.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
    );
    Ok(rsp)
}

/// Serve every path with the metrics page until the process ends.
pub async fn serve_metrics(port: u16) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let make_svc = make_service_fn(|_conn| async { Ok::<_, Infallible>(service_fn(handle)) });

    let server = match Server::try_bind(&addr) {
        Ok(b) => b.serve(make_svc),
        Err(e) => {
            error!(?e, %addr, "metrics bind failed");
            return;
        }
    };
    info!(%addr, "metrics listening on /metrics");
    if let Err(e) = server.await {
        error!(?e, "metrics server stopped");
    }
}
