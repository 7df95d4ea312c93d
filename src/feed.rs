// ===============================
// src/feed.rs
// ===============================
//
// PumpPortal data stream adapter:
// - connect           : open the websocket, send `subscribeAccountTrade` once
// - AccountFeed::next : next JSON message, or the reason the connection is done
//
// Notes:
// - One subscription per connection; a reconnect has to resubscribe.
// - Certificate checks stay on unless `WS_INSECURE_SKIP_VERIFY` is set.
//
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tracing::{info, warn};
use url::Url;

use crate::config::FeedCfg;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Everything that ends a connection. All of it is recoverable by reconnecting.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("bad ws url: {0}")]
    Url(#[from] url::ParseError),
    #[error("connect failed: {0}")]
    Connect(tungstenite::Error),
    #[error("subscribe failed: {0}")]
    Subscribe(tungstenite::Error),
    #[error("ws read error: {0}")]
    Read(tungstenite::Error),
    #[error("stream closed by server")]
    Closed,
    #[error("no message for {0:?}")]
    Idle(Duration),
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub fn subscribe_message(account: &str) -> String {
    json!({"method": "subscribeAccountTrade", "keys": [account]}).to_string()
}

/// Live subscription to one account's trades.
pub struct AccountFeed {
    ws: WsStream,
    idle: Option<Duration>,
}

pub async fn connect(cfg: &FeedCfg) -> Result<AccountFeed, FeedError> {
    let url = Url::parse(&cfg.ws_url)?;
    let connector = if cfg.insecure_skip_verify {
        warn!(ws_url = %cfg.ws_url, "TLS certificate verification DISABLED for the data stream");
        Some(insecure_connector())
    } else {
        None
    };

    info!(ws_url = %url, "connecting data stream");
    let (mut ws, _resp) = connect_async_tls_with_config(url.as_str(), None, false, connector)
        .await
        .map_err(FeedError::Connect)?;

    ws.send(Message::Text(subscribe_message(&cfg.target_account)))
        .await
        .map_err(FeedError::Subscribe)?;
    info!(account = %cfg.target_account, "subscribed to trades for account");

    Ok(AccountFeed { ws, idle: cfg.idle_timeout })
}

impl AccountFeed {
    /// Next text message as JSON. Ping/pong and binary frames are skipped.
    pub async fn next(&mut self) -> Result<Value, FeedError> {
        loop {
            let frame = match self.idle {
                Some(d) => timeout(d, self.ws.next()).await.map_err(|_| FeedError::Idle(d))?,
                None => self.ws.next().await,
            };
            match frame {
                Some(Ok(Message::Text(txt))) => return Ok(serde_json::from_str(&txt)?),
                Some(Ok(Message::Close(_))) | None => return Err(FeedError::Closed),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(FeedError::Read(e)),
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

fn insecure_connector() -> Connector {
    let cfg = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(danger::NoVerify))
        .with_no_client_auth();
    Connector::Rustls(Arc::new(cfg))
}

mod danger {
    use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
    use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
    use rustls::{DigitallySignedStruct, Error, SignatureScheme};

    /// Accepts any server certificate.
    #[derive(Debug)]
    pub struct NoVerify;

    impl ServerCertVerifier for NoVerify {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn verify_tls13_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            vec![
                SignatureScheme::ECDSA_NISTP256_SHA256,
                SignatureScheme::ECDSA_NISTP384_SHA384,
                SignatureScheme::ED25519,
                SignatureScheme::RSA_PSS_SHA256,
                SignatureScheme::RSA_PSS_SHA384,
                SignatureScheme::RSA_PSS_SHA512,
                SignatureScheme::RSA_PKCS1_SHA256,
                SignatureScheme::RSA_PKCS1_SHA384,
                SignatureScheme::RSA_PKCS1_SHA512,
            ]
        }
    }
}

/// Scripted local websocket server for tests.
#[cfg(test)]
pub(crate) mod test_server {
    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use tokio_tungstenite::tungstenite::Message;

    /// Serves one connection per entry of `script`: reads the client's first
    /// message, sends the scripted frames, then closes. Resolves to the first
    /// message of every connection.
    pub async fn spawn(script: Vec<Vec<Message>>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let mut firsts = Vec::new();
            for frames in script {
                let (tcp, _) = listener.accept().await.unwrap();
                let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
                if let Some(Ok(Message::Text(first))) = ws.next().await {
                    firsts.push(first);
                }
                for f in frames {
                    if ws.send(f).await.is_err() {
                        break;
                    }
                }
                let _ = ws.close(None).await;
            }
            firsts
        });
        (url, handle)
    }

    pub fn text(v: serde_json::Value) -> Message {
        Message::Text(v.to_string())
    }
}
