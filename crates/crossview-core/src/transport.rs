//! Transport abstraction and the WebSocket implementation.
//!
//! The connection manager talks to the authority through [`Connector`] and
//! [`Connection`], so session behavior can be driven by an in-memory
//! transport in tests. [`WsConnector`] is the production transport, built
//! on `tokio-tungstenite`.
//!
//! A connection reports inbound traffic as [`TransportEvent`]s. Control
//! frames (ping, pong) are handled below this layer. After a
//! [`TransportEvent::Closed`] the connection must not be polled again.

use std::future::Future;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

use crate::error::TransportError;

/// Normal closure.
pub const CLOSE_NORMAL: u16 = 1000;
/// No status code was present in the close frame.
pub const CLOSE_NO_STATUS: u16 = 1005;
/// The session ended without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Inbound traffic on an open connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame, or a binary frame holding UTF-8 text.
    Frame(String),
    /// The session ended.
    Closed {
        /// Close code.
        code: u16,
        /// Close reason, possibly empty.
        reason: String,
    },
    /// The transport reported an error. A `Closed` event follows if the
    /// session did not survive it.
    Error(TransportError),
}

/// An open, bidirectional session.
pub trait Connection {
    /// Write one text frame.
    fn send_text(&mut self, text: String) -> impl Future<Output = Result<(), TransportError>>;

    /// Wait for the next inbound event. Must be cancel-safe.
    fn recv(&mut self) -> impl Future<Output = TransportEvent>;

    /// Close the session with `code` and `reason`.
    fn close(&mut self, code: u16, reason: &str) -> impl Future<Output = Result<(), TransportError>>;
}

/// Opens sessions to an endpoint.
pub trait Connector: 'static {
    /// The session type produced.
    type Conn: Connection + 'static;

    /// Open a session to `url`. The returned future does not borrow the
    /// connector, so an attempt can be held and polled alongside other work.
    fn connect(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Self::Conn, TransportError>> + 'static;
}

/// Opens WebSocket sessions (`ws://` or `wss://`).
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

/// An open WebSocket session.
pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Connector for WsConnector {
    type Conn = WsConnection;

    fn connect(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<WsConnection, TransportError>> + 'static {
        let url = url.to_owned();
        async move {
            match tokio_tungstenite::connect_async(url.as_str()).await {
                Ok((stream, response)) => {
                    debug!(url = %url, status = %response.status(), "websocket handshake complete");
                    Ok(WsConnection { stream })
                }
                Err(e) => Err(TransportError::Connect(format!("{url}: {e}"))),
            }
        }
    }
}

impl Connection for WsConnection {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> TransportEvent {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return TransportEvent::Frame(text.as_str().to_owned());
                }
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return TransportEvent::Frame(text),
                    Err(_) => warn!(len = bytes.len(), "binary frame is not UTF-8, dropped"),
                },
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame.map_or_else(
                        || (CLOSE_NO_STATUS, String::new()),
                        |f| (u16::from(f.code), f.reason.as_str().to_owned()),
                    );
                    return TransportEvent::Closed { code, reason };
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                    trace!("control frame");
                }
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    return TransportEvent::Closed {
                        code: CLOSE_ABNORMAL,
                        reason: String::new(),
                    };
                }
                Some(Err(e)) => return TransportEvent::Error(TransportError::Receive(e.to_string())),
            }
        }
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_owned().into(),
        };
        match self.stream.close(Some(frame)).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(TransportError::Send(e.to_string())),
        }
    }
}
