//! The cooperative sync loop.
//!
//! [`SyncClient`] drives everything from one task: inbound frames, the
//! connect attempt in flight, render ticks, the reconnect timer, and
//! requests from UI code. Each wakeup is handled to completion before the
//! next, so the store is never shared across threads and never locked. A
//! slow or hanging connect never holds up rendering or requests.
//!
//! UI code talks to the loop through a cloneable [`ClientHandle`].

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crossview_store::EntityStore;
use crossview_types::{ControlIntent, OutboundMessage};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, Sleep};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::connection::{ConnectAttempt, ConnectionManager, SessionEvent};
use crate::error::TransportError;
use crate::reconnect::ReconnectPolicy;
use crate::render::{SceneMirror, SceneRenderer};
use crate::transport::{CLOSE_NORMAL, Connector};

/// A request from UI code to the sync loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientRequest {
    /// Forward a control intent to the authority.
    Control(ControlIntent),
    /// Supersede the current session with a new one now.
    Reconnect,
    /// Close the session and leave the loop.
    Shutdown,
}

/// Cloneable handle for sending requests into the loop.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    tx: mpsc::UnboundedSender<ClientRequest>,
}

impl ClientHandle {
    /// Queue a request. Returns `false` if the loop has exited.
    pub fn request(&self, request: ClientRequest) -> bool {
        self.tx.send(request).is_ok()
    }

    /// Forward a control intent.
    pub fn control(&self, intent: ControlIntent) -> bool {
        self.request(ClientRequest::Control(intent))
    }

    /// Reconnect now, cancelling any pending retry.
    pub fn reconnect(&self) -> bool {
        self.request(ClientRequest::Reconnect)
    }

    /// Stop the loop.
    pub fn shutdown(&self) -> bool {
        self.request(ClientRequest::Shutdown)
    }
}

/// Loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    /// Render tick period.
    pub frame_interval: Duration,
    /// Drop vehicles and rewind the clock when a later session opens.
    pub reset_on_reconnect: bool,
}

impl From<&ClientConfig> for ClientOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            frame_interval: config.render.frame_interval(),
            reset_on_reconnect: config.session.reset_on_reconnect,
        }
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

/// Owns the store, the session and the renderer, and runs the loop.
pub struct SyncClient<C: Connector, R: SceneRenderer> {
    manager: ConnectionManager<C>,
    store: EntityStore,
    renderer: R,
    mirror: SceneMirror,
    policy: Box<dyn ReconnectPolicy>,
    options: ClientOptions,
    requests: mpsc::UnboundedReceiver<ClientRequest>,
    attempt: u32,
    connecting: Option<ConnectAttempt<C>>,
    retry: Option<Pin<Box<Sleep>>>,
}

impl<C: Connector, R: SceneRenderer> SyncClient<C, R> {
    /// Assemble a client and the handle that drives it.
    pub fn new(
        manager: ConnectionManager<C>,
        store: EntityStore,
        renderer: R,
        policy: Box<dyn ReconnectPolicy>,
        options: ClientOptions,
    ) -> (Self, ClientHandle) {
        let (tx, requests) = mpsc::unbounded_channel();
        let client = Self {
            manager,
            store,
            renderer,
            mirror: SceneMirror::new(),
            policy,
            options,
            requests,
            attempt: 0,
            connecting: None,
            retry: None,
        };
        (client, ClientHandle { tx })
    }

    /// The mirrored scene.
    pub const fn store(&self) -> &EntityStore {
        &self.store
    }

    /// The renderer.
    pub const fn renderer(&self) -> &R {
        &self.renderer
    }

    /// The session owner.
    pub const fn manager(&self) -> &ConnectionManager<C> {
        &self.manager
    }

    /// Whether a reconnect timer is pending.
    pub const fn retry_pending(&self) -> bool {
        self.retry.is_some()
    }

    /// Whether a connect attempt is in flight.
    pub const fn connect_pending(&self) -> bool {
        self.connecting.is_some()
    }

    /// Connect and run until shutdown is requested or every handle is
    /// dropped. Closes the session and disposes all visuals on the way out.
    pub async fn run(&mut self) {
        self.open(false).await;
        self.manager.flush().await;

        let mut ticker = tokio::time::interval(self.options.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();

        loop {
            tokio::select! {
                event = self.manager.next_event() => self.on_session_event(event),
                result = wait_connect(&mut self.connecting) => {
                    self.connecting = None;
                    self.on_connect_result(result);
                }
                now = ticker.tick() => {
                    let dt = now.saturating_duration_since(last_tick);
                    last_tick = now;
                    self.store.advance_local(dt.as_secs_f64());
                    self.mirror.sync(&self.store, &mut self.renderer);
                }
                () = wait_retry(&mut self.retry) => {
                    self.retry = None;
                    self.open(false).await;
                }
                request = self.requests.recv() => match request {
                    Some(ClientRequest::Control(intent)) => {
                        debug!(cmd = %intent.cmd, "control intent");
                        self.manager.send(&OutboundMessage::Control(intent));
                    }
                    Some(ClientRequest::Reconnect) => {
                        if self.retry.take().is_some() {
                            debug!("pending reconnect cancelled");
                        }
                        if self.connecting.take().is_some() {
                            debug!("connect in flight dropped");
                        }
                        self.open(true).await;
                    }
                    Some(ClientRequest::Shutdown) | None => break,
                },
            }
            self.manager.flush().await;
        }

        info!("sync loop stopping");
        self.connecting = None;
        self.retry = None;
        self.manager.close(CLOSE_NORMAL, "client shutdown").await;
        self.mirror.clear(&mut self.renderer);
    }

    fn on_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Frame(text) => {
                self.manager.handle_frame(&text, &mut self.store);
            }
            SessionEvent::Closed { .. } => self.schedule_retry(),
            SessionEvent::Error(_) => {}
        }
    }

    async fn open(&mut self, manual: bool) {
        if let Some(attempt) = self.manager.begin_connect(manual).await {
            self.connecting = Some(attempt);
        }
    }

    fn on_connect_result(&mut self, result: Result<C::Conn, TransportError>) {
        match self.manager.complete_connect(result) {
            Ok(()) => {
                self.attempt = 0;
                if self.options.reset_on_reconnect && self.manager.sessions() > 1 {
                    let cleared = self.store.reset_vehicles();
                    self.store.reset_clock();
                    info!(cleared, "new session, scene reset");
                }
            }
            Err(e) => {
                warn!(error = %e, attempt = self.attempt, "session not opened");
                self.schedule_retry();
            }
        }
    }

    fn schedule_retry(&mut self) {
        match self.policy.next_delay(self.attempt) {
            Some(delay) => {
                info!(
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    attempt = self.attempt,
                    "reconnect scheduled"
                );
                self.attempt = self.attempt.saturating_add(1);
                self.retry = Some(Box::pin(tokio::time::sleep(delay)));
            }
            None => info!("automatic reconnect disabled, staying closed"),
        }
    }
}

impl<C: Connector, R: SceneRenderer> std::fmt::Debug for SyncClient<C, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("manager", &self.manager)
            .field("attempt", &self.attempt)
            .field("connect_pending", &self.connecting.is_some())
            .field("retry_pending", &self.retry.is_some())
            .finish_non_exhaustive()
    }
}

async fn wait_connect<T>(attempt: &mut Option<Pin<Box<dyn Future<Output = T>>>>) -> T {
    match attempt.as_mut() {
        Some(pending) => pending.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn wait_retry(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer.as_mut() {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
