//! Connection manager: one session to the simulation authority.
//!
//! The manager owns the session lifecycle and both directions of traffic:
//!
//! - **Connect.** A manual connect supersedes any open or connecting
//!   session, closing an open one with a normal-closure code first; an
//!   automatic connect while a session is open or connecting does nothing.
//!   [`ConnectionManager::begin_connect`] hands back the attempt as an owned
//!   [`ConnectAttempt`] so a caller can keep serving other work while it
//!   runs, and [`ConnectionManager::complete_connect`] applies its result.
//!   Every new session starts by queueing a `create` message so the
//!   authority registers this viewer.
//! - **Send.** Outbound messages are queued only while the session is open
//!   and written by [`ConnectionManager::flush`]. Sending never blocks the
//!   caller and never fails loudly.
//! - **Receive.** [`ConnectionManager::next_event`] yields inbound frames;
//!   [`ConnectionManager::handle_frame`] checks the batch envelope, decodes
//!   every command and hands them to the [`Dispatcher`]. Bad frames are
//!   logged and dropped with no event.
//!
//! Session transitions are published on the event bus. Whether to reconnect
//! after a close is the caller's decision.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossview_store::{EntityStore, EventBus};
use crossview_types::{OutboundMessage, SyncEvent, WireMapping};
use tracing::{debug, info, warn};

use crate::codec;
use crate::config::ClientConfig;
use crate::dispatch::{DispatchReport, Dispatcher, PhaseTable};
use crate::error::{SyncError, TransportError};
use crate::transport::{CLOSE_ABNORMAL, CLOSE_NORMAL, Connection, Connector, TransportEvent};

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    /// Never connected.
    #[default]
    Idle,
    /// Opening a session.
    Connecting,
    /// Session open; messages flow both ways.
    Open,
    /// Closing the session locally.
    Closing,
    /// Session ended.
    Closed,
}

/// What [`ConnectionManager::next_event`] observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// An inbound frame, not yet parsed.
    Frame(String),
    /// The authority or the network ended the session.
    Closed {
        /// Close code.
        code: u16,
        /// Close reason, possibly empty.
        reason: String,
    },
    /// A transport error; the session may still be open.
    Error(String),
}

/// A session being opened, bounded by the connect timeout. Dropping it
/// abandons the attempt.
pub type ConnectAttempt<C> =
    Pin<Box<dyn Future<Output = Result<<C as Connector>::Conn, TransportError>>>>;

/// Owns the session to the authority.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    url: String,
    connect_timeout: Duration,
    state: SessionState,
    conn: Option<C::Conn>,
    events: EventBus,
    mapping: WireMapping,
    dispatcher: Dispatcher,
    outbox: VecDeque<String>,
    stalled: bool,
    opened_at: Option<DateTime<Utc>>,
    sessions: u64,
}

impl<C: Connector> ConnectionManager<C> {
    /// A manager for the endpoint, wire mapping and phase groups in
    /// `config`, publishing on `events`.
    pub fn new(connector: C, events: EventBus, config: &ClientConfig) -> Self {
        Self {
            connector,
            url: config.connection.url.clone(),
            connect_timeout: config.connection.connect_timeout(),
            state: SessionState::Idle,
            conn: None,
            events,
            mapping: config.wire.clone(),
            dispatcher: Dispatcher::new(PhaseTable::from(&config.phases)),
            outbox: VecDeque::new(),
            stalled: false,
            opened_at: None,
            sessions: 0,
        }
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Whether a session is open.
    pub const fn is_open(&self) -> bool {
        matches!(self.state, SessionState::Open)
    }

    /// Endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sessions opened so far.
    pub const fn sessions(&self) -> u64 {
        self.sessions
    }

    /// Messages queued for the next flush.
    pub fn pending(&self) -> usize {
        self.outbox.len()
    }

    /// Open a session and wait for the outcome.
    ///
    /// Returns `Ok(true)` if a new session opened and `Ok(false)` if an
    /// automatic connect found one already open or connecting.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Transport`] if the connector fails or the
    /// connect timeout expires. Both are also published, as a session error
    /// followed by an abnormal close.
    pub async fn connect(&mut self, manual: bool) -> Result<bool, SyncError> {
        let Some(attempt) = self.begin_connect(manual).await else {
            return Ok(false);
        };
        let result = attempt.await;
        self.complete_connect(result).map(|()| true)
    }

    /// Start opening a session.
    ///
    /// Returns `None` if `manual` is false and a session is already open or
    /// connecting. A manual start closes an open session with a normal
    /// closure first; an attempt still in flight is the caller's to drop.
    /// The returned attempt must be passed to
    /// [`ConnectionManager::complete_connect`] once it resolves.
    pub async fn begin_connect(&mut self, manual: bool) -> Option<ConnectAttempt<C>> {
        let busy = self.conn.is_some() || self.state == SessionState::Connecting;
        if busy && !manual {
            debug!(url = %self.url, state = ?self.state, "session already open or connecting");
            return None;
        }
        if self.conn.is_some() {
            info!(url = %self.url, "manual reconnect, closing current session");
            self.close(CLOSE_NORMAL, "reconnect").await;
        } else if self.state == SessionState::Connecting {
            info!(url = %self.url, "manual reconnect, superseding connect in flight");
        }

        self.state = SessionState::Connecting;
        info!(url = %self.url, manual, "connecting");

        let limit = self.connect_timeout;
        let pending = self.connector.connect(&self.url);
        Some(Box::pin(async move {
            tokio::time::timeout(limit, pending)
                .await
                .unwrap_or_else(|_elapsed| {
                    Err(TransportError::Timeout(
                        u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    ))
                })
        }))
    }

    /// Apply the outcome of an attempt from
    /// [`ConnectionManager::begin_connect`].
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Transport`] with the attempt's failure after
    /// publishing it as a session error followed by an abnormal close.
    pub fn complete_connect(
        &mut self,
        result: Result<C::Conn, TransportError>,
    ) -> Result<(), SyncError> {
        match result {
            Ok(conn) => {
                self.conn = Some(conn);
                self.state = SessionState::Open;
                self.stalled = false;
                self.sessions = self.sessions.saturating_add(1);
                self.opened_at = Some(Utc::now());
                info!(url = %self.url, session = self.sessions, "session opened");
                self.events.publish(&SyncEvent::SessionOpened {
                    url: self.url.clone(),
                });
                self.send(&OutboundMessage::Create);
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Closed;
                warn!(url = %self.url, error = %e, "connect failed");
                self.events.publish(&SyncEvent::SessionError {
                    detail: e.to_string(),
                });
                self.events.publish(&SyncEvent::SessionClosed {
                    code: CLOSE_ABNORMAL,
                    reason: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Queue a message for the open session.
    ///
    /// Returns `false`, logging why, if no session is open or the message
    /// cannot be encoded.
    pub fn send(&mut self, message: &OutboundMessage) -> bool {
        if !self.is_open() {
            warn!(state = ?self.state, "send while session not open, dropped");
            return false;
        }
        match codec::encode(message) {
            Ok(text) => {
                debug!(len = text.len(), "outbound message queued");
                self.outbox.push_back(text);
                true
            }
            Err(e) => {
                warn!(error = %SyncError::from(e), "outbound message dropped");
                false
            }
        }
    }

    /// Write queued messages. On a write failure the message and everything
    /// after it stay queued and the next flush retries them. The failure is
    /// published as a session error once, not again until a write succeeds;
    /// the transport's close event decides whether the session is over.
    pub async fn flush(&mut self) {
        let Some(conn) = self.conn.as_mut() else {
            self.outbox.clear();
            return;
        };
        while let Some(text) = self.outbox.pop_front() {
            if let Err(e) = conn.send_text(text.clone()).await {
                self.outbox.push_front(text);
                if self.stalled {
                    debug!(error = %e, pending = self.outbox.len(), "outbound write still failing");
                } else {
                    self.stalled = true;
                    warn!(error = %e, pending = self.outbox.len(), "outbound write failed");
                    self.events.publish(&SyncEvent::SessionError {
                        detail: e.to_string(),
                    });
                }
                return;
            }
            self.stalled = false;
        }
    }

    /// Close the session locally. Returns `false` if none was open. A
    /// connect still in flight is marked closed without an event; the
    /// caller drops its attempt.
    pub async fn close(&mut self, code: u16, reason: &str) -> bool {
        let Some(mut conn) = self.conn.take() else {
            if self.state == SessionState::Connecting {
                info!(url = %self.url, "connect abandoned");
                self.state = SessionState::Closed;
            }
            return false;
        };
        self.state = SessionState::Closing;
        if let Err(e) = conn.close(code, reason).await {
            debug!(error = %e, "close handshake failed");
        }
        self.finish(code, reason.to_owned());
        true
    }

    /// Wait for the next inbound event. Pending forever while no session is
    /// open. Cancel-safe if the connection's `recv` is.
    pub async fn next_event(&mut self) -> SessionEvent {
        let Some(conn) = self.conn.as_mut() else {
            return std::future::pending().await;
        };
        match conn.recv().await {
            TransportEvent::Frame(text) => SessionEvent::Frame(text),
            TransportEvent::Error(e) => {
                warn!(error = %e, "transport error");
                let detail = e.to_string();
                self.events.publish(&SyncEvent::SessionError {
                    detail: detail.clone(),
                });
                SessionEvent::Error(detail)
            }
            TransportEvent::Closed { code, reason } => {
                self.conn = None;
                self.finish(code, reason.clone());
                SessionEvent::Closed { code, reason }
            }
        }
    }

    /// Parse, decode and dispatch one inbound frame.
    ///
    /// Returns `None` if the frame was dropped before dispatch.
    pub fn handle_frame(&self, text: &str, store: &mut EntityStore) -> Option<DispatchReport> {
        let batch = match codec::parse_frame(text) {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %e, len = text.len(), "inbound frame dropped");
                return None;
            }
        };
        let count = batch.len();
        let report = self
            .dispatcher
            .apply_batch(batch.decode(&self.mapping), store);
        debug!(
            commands = count,
            applied = report.applied,
            rejected = report.rejected,
            skipped = report.skipped,
            "batch dispatched"
        );
        Some(report)
    }

    fn finish(&mut self, code: u16, reason: String) {
        self.state = SessionState::Closed;
        self.outbox.clear();
        self.stalled = false;
        let lasted_ms = self
            .opened_at
            .take()
            .map(|t| Utc::now().signed_duration_since(t).num_milliseconds());
        info!(code, reason = %reason, lasted_ms, "session closed");
        self.events.publish(&SyncEvent::SessionClosed { code, reason });
    }
}

impl<C: Connector> std::fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.url)
            .field("state", &self.state)
            .field("sessions", &self.sessions)
            .field("pending", &self.outbox.len())
            .finish_non_exhaustive()
    }
}
