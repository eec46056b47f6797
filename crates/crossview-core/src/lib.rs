//! Crossview Core: keeps a local scene in step with a remote intersection
//! simulation.
//!
//! # Architecture
//!
//! ```text
//! authority ──ws──▶ ConnectionManager ──frames──▶ codec ──commands──▶ Dispatcher
//!                         ▲                                              │
//!                         │ control intents                              ▼
//!                   ClientHandle                                    EntityStore ──▶ EventBus
//!                                                                        │
//!                         SyncClient render tick ──▶ SceneMirror ──▶ SceneRenderer
//! ```
//!
//! # Modules
//!
//! - [`config`] -- `crossview.yaml` loading with environment overrides
//! - [`codec`] -- Batch envelope parsing and outbound encoding
//! - [`dispatch`] -- Command routing and the signal phase table
//! - [`transport`] -- Transport traits and the WebSocket transport
//! - [`connection`] -- Session lifecycle and inbound/outbound traffic
//! - [`reconnect`] -- Retry strategies
//! - [`render`] -- Renderer interface and per-frame reconciliation
//! - [`client`] -- The cooperative loop and its handle
//! - [`error`] -- Frame, transport and session errors

pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod reconnect;
pub mod render;
pub mod transport;

pub use client::{ClientHandle, ClientOptions, ClientRequest, SyncClient};
pub use config::{ClientConfig, ConfigError};
pub use connection::{ConnectAttempt, ConnectionManager, SessionEvent, SessionState};
pub use dispatch::{DispatchReport, Dispatcher, PhaseTable};
pub use error::{FrameError, SyncError, TransportError};
pub use reconnect::{ExponentialBackoff, FixedDelay, NoReconnect, ReconnectPolicy};
pub use render::{FrameReport, SceneMirror, SceneRenderer};
pub use transport::{Connection, Connector, TransportEvent, WsConnection, WsConnector};
