//! Transport seam between the feed and the network.
//!
//! [`WsTransport`] is the production implementation over `tokio-tungstenite`.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::fmt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::http::Uri;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Transport failures. None of these reach feed callers.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    /// URL cannot be used as a WebSocket endpoint
    InvalidEndpoint(String),
    /// Open attempt failed (refused, DNS, handshake)
    Connect(String),
    /// Error on an open connection
    Protocol(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::InvalidEndpoint(reason) => write!(f, "invalid endpoint: {}", reason),
            TransportError::Connect(reason) => write!(f, "connect failed: {}", reason),
            TransportError::Protocol(reason) => write!(f, "transport error: {}", reason),
        }
    }
}

impl std::error::Error for TransportError {}

/// A validated `ws://` or `wss://` URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: String,
}

impl Endpoint {
    /// Validate a feed URL.
    ///
    /// Requires a `ws` or `wss` scheme and a host.
    pub fn parse(url: &str) -> Result<Self, TransportError> {
        let url = url.trim();
        let uri: Uri = url
            .parse()
            .map_err(|e| TransportError::InvalidEndpoint(format!("'{}': {}", url, e)))?;

        match uri.scheme_str() {
            Some("ws") | Some("wss") => {}
            Some(other) => {
                return Err(TransportError::InvalidEndpoint(format!(
                    "'{}': unsupported scheme '{}'",
                    url, other
                )))
            }
            None => {
                return Err(TransportError::InvalidEndpoint(format!(
                    "'{}': missing scheme",
                    url
                )))
            }
        }

        if uri.host().map_or(true, str::is_empty) {
            return Err(TransportError::InvalidEndpoint(format!("'{}': missing host", url)));
        }

        Ok(Self {
            url: url.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Inbound unit from a connection
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// Opens connections to an endpoint
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn Connection>, TransportError>;
}

/// One open duplex connection
#[async_trait]
pub trait Connection: Send {
    /// Next inbound frame; `None` once the peer has closed
    async fn recv(&mut self) -> Option<Result<Frame, TransportError>>;

    /// Close from our side
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// WebSocket transport over `tokio-tungstenite`
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn Connection>, TransportError> {
        let (stream, _response) = connect_async(endpoint.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WsStream,
}

#[async_trait]
impl Connection for WsConnection {
    async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        loop {
            let msg = match self.stream.next().await? {
                Ok(msg) => msg,
                Err(e) => return Some(Err(TransportError::Protocol(e.to_string()))),
            };

            match msg {
                Message::Text(text) => return Some(Ok(Frame::Text(text.as_str().to_owned()))),
                Message::Binary(data) => return Some(Ok(Frame::Binary(data.to_vec()))),
                Message::Close(_) => return None,
                // Pongs are queued by tungstenite itself
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        SinkExt::close(&mut self.stream)
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))
    }
}
