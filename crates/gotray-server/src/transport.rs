//! Push-server transport.
//!
//! A [`Transport`] opens a [`Session`] to one address; a session yields
//! [`ConnectionEvent`]s that the worker consumes in its own loop. The
//! WebSocket implementation keeps the connection alive with pings and turns a
//! missing pong into a transport error.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{
    Connector, MaybeTlsStream, WebSocketStream, connect_async_tls_with_config,
};
use tracing::{debug, trace};

use crate::backoff::ConnectFailure;

/// A boxed future, so the transport traits stay object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Something that happened on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The connection was established.
    Opened,
    /// One data frame was received.
    Message(Vec<u8>),
    /// The peer closed the connection, or the stream ended.
    Closed { code: Option<u16>, reason: String },
    /// The connection failed.
    Error(ConnectFailure),
}

/// Opens sessions to push servers.
pub trait Transport: Send + Sync {
    /// Connects to `address`. When `ignore_tls_errors` is set, the server
    /// certificate is not validated for this connection.
    fn connect<'a>(
        &'a self,
        address: &'a str,
        ignore_tls_errors: bool,
    ) -> BoxFuture<'a, Result<Box<dyn Session>, ConnectFailure>>;
}

/// One open connection.
pub trait Session: Send {
    /// Waits for the next event. After `Closed` or `Error` the session is
    /// finished and must not be polled again.
    fn next_event(&mut self) -> BoxFuture<'_, ConnectionEvent>;

    /// Closes the connection politely.
    fn close(&mut self) -> BoxFuture<'_, ()>;
}

/// Ping schedule for open connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keepalive {
    /// Time between pings.
    pub interval: Duration,
    /// How long to wait for the pong before giving up.
    pub timeout: Duration,
}

impl Default for Keepalive {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(10),
        }
    }
}

/// WebSocket transport backed by tokio-tungstenite and rustls.
#[derive(Debug, Clone)]
pub struct WsTransport {
    keepalive: Keepalive,
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new(Keepalive::default())
    }
}

impl WsTransport {
    pub fn new(keepalive: Keepalive) -> Self {
        install_crypto_provider();
        Self { keepalive }
    }
}

impl Transport for WsTransport {
    fn connect<'a>(
        &'a self,
        address: &'a str,
        ignore_tls_errors: bool,
    ) -> BoxFuture<'a, Result<Box<dyn Session>, ConnectFailure>> {
        Box::pin(async move {
            let connector = if ignore_tls_errors {
                debug!(address = %address, "TLS certificate validation disabled");
                Some(Connector::Rustls(Arc::new(insecure_tls_config())))
            } else {
                None
            };

            let (stream, response) = connect_async_tls_with_config(address, None, false, connector)
                .await
                .map_err(|e| failure_from_ws(&e))?;
            debug!(address = %address, status = %response.status(), "WebSocket handshake complete");

            Ok(Box::new(WsSession::new(stream, self.keepalive)) as Box<dyn Session>)
        })
    }
}

/// Converts a tungstenite error, keeping the handshake status if there is one.
pub fn failure_from_ws(err: &WsError) -> ConnectFailure {
    match err {
        WsError::Http(response) => {
            ConnectFailure::new(Some(response.status().as_u16()), err.to_string())
        }
        other => ConnectFailure::transport(other.to_string()),
    }
}

struct WsSession {
    stream: WsStream,
    keepalive: Keepalive,
    ping: Interval,
    pong_deadline: Option<Instant>,
}

impl WsSession {
    fn new(stream: WsStream, keepalive: Keepalive) -> Self {
        let mut ping = tokio::time::interval_at(Instant::now() + keepalive.interval, keepalive.interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            stream,
            keepalive,
            ping,
            pong_deadline: None,
        }
    }

    async fn recv(&mut self) -> ConnectionEvent {
        loop {
            let deadline = self.pong_deadline;
            tokio::select! {
                frame = self.stream.next() => match frame {
                    None => {
                        return ConnectionEvent::Closed {
                            code: None,
                            reason: "stream ended".to_string(),
                        };
                    }
                    Some(Err(e)) => return ConnectionEvent::Error(failure_from_ws(&e)),
                    Some(Ok(Message::Text(text))) => {
                        return ConnectionEvent::Message(text.as_bytes().to_vec());
                    }
                    Some(Ok(Message::Binary(data))) => {
                        return ConnectionEvent::Message(data.to_vec());
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = match frame {
                            Some(frame) => (Some(u16::from(frame.code)), frame.reason.to_string()),
                            None => (None, String::new()),
                        };
                        return ConnectionEvent::Closed { code, reason };
                    }
                    Some(Ok(Message::Pong(_))) => {
                        trace!("Pong received");
                        self.pong_deadline = None;
                    }
                    // Pings are answered by tungstenite itself.
                    Some(Ok(Message::Ping(_) | Message::Frame(_))) => {}
                },
                _ = self.ping.tick() => {
                    trace!("Sending ping");
                    if let Err(e) = self.stream.send(Message::Ping(Vec::<u8>::new().into())).await {
                        return ConnectionEvent::Error(failure_from_ws(&e));
                    }
                    if self.pong_deadline.is_none() {
                        self.pong_deadline = Some(Instant::now() + self.keepalive.timeout);
                    }
                }
                _ = pong_timeout(deadline) => {
                    return ConnectionEvent::Error(ConnectFailure::transport(format!(
                        "no pong within {:?}",
                        self.keepalive.timeout
                    )));
                }
            }
        }
    }
}

impl Session for WsSession {
    fn next_event(&mut self) -> BoxFuture<'_, ConnectionEvent> {
        Box::pin(self.recv())
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if let Err(e) = self.stream.close(None).await {
                debug!(error = %e, "Error while closing WebSocket");
            }
        })
    }
}

async fn pong_timeout(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn install_crypto_provider() {
    // Fails only if a provider is already installed, which is fine.
    let _ = rustls::crypto::ring::default_provider().install_default();
}

fn insecure_tls_config() -> rustls::ClientConfig {
    install_crypto_provider();
    rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
        .with_no_client_auth()
}

/// Certificate verifier for endpoints the user explicitly marked as trusted.
#[derive(Debug)]
struct AcceptAnyCertificate;

impl rustls::client::danger::ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::FailureKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn local_listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, format!("ws://127.0.0.1:{}/stream?token=x", port))
    }

    #[test]
    fn keepalive_defaults() {
        let keepalive = Keepalive::default();
        assert_eq!(keepalive.interval, Duration::from_secs(30));
        assert_eq!(keepalive.timeout, Duration::from_secs(10));
    }

    #[test]
    fn io_errors_are_transport_failures() {
        let err = WsError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        let failure = failure_from_ws(&err);
        assert_eq!(failure.status, None);
        assert!(failure.message.contains("connection refused"));
    }

    #[test]
    fn insecure_config_builds() {
        let config = insecure_tls_config();
        assert!(config.alpn_protocols.is_empty());
    }

    #[tokio::test]
    async fn connect_to_unparseable_address_fails() {
        let transport = WsTransport::new(Keepalive::default());
        let result = transport.connect("not a url", false).await;
        let failure = result.err().expect("connect should fail");
        assert_eq!(failure.status, None);
    }

    #[tokio::test]
    async fn connect_refused_is_transport_failure() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport = WsTransport::new(Keepalive::default());
        let address = format!("ws://127.0.0.1:{}/stream?token=x", port);
        let failure = transport.connect(&address, false).await.err().unwrap();
        assert_eq!(failure.kind(), crate::backoff::FailureKind::Transport);
    }

    #[tokio::test]
    async fn rejected_handshake_keeps_http_status() {
        let (listener, address) = local_listener().await;
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(b"HTTP/1.1 401 Unauthorized\r\nContent-Length: 0\r\n\r\n")
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });

        let transport = WsTransport::new(Keepalive::default());
        let failure = transport.connect(&address, false).await.err().unwrap();
        assert_eq!(failure.status, Some(401));
        assert_eq!(failure.kind(), FailureKind::Unauthorized);
    }

    #[tokio::test]
    async fn missing_pong_ends_session_with_error() {
        let (listener, address) = local_listener().await;
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            ws.send(Message::Text("{\"title\":\"T\"}".into()))
                .await
                .unwrap();
            // Never read again, so pings go unanswered.
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(ws);
        });

        let keepalive = Keepalive {
            interval: Duration::from_millis(50),
            timeout: Duration::from_millis(50),
        };
        let transport = WsTransport::new(keepalive);
        let mut session = transport.connect(&address, false).await.unwrap();

        assert_eq!(
            session.next_event().await,
            ConnectionEvent::Message(br#"{"title":"T"}"#.to_vec())
        );

        let event = tokio::time::timeout(Duration::from_secs(2), session.next_event())
            .await
            .expect("keepalive should fail the session");
        match event {
            ConnectionEvent::Error(failure) => {
                assert_eq!(failure.status, None);
                assert_eq!(failure.message, "no pong within 50ms");
            }
            other => panic!("expected an error, got {:?}", other),
        }
    }
}
