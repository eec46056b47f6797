//! Error types for the sync engine.
//!
//! Uses `thiserror` for typed errors at each boundary: inbound frame
//! decoding, the transport, and the session as a whole. None of these are
//! fatal to the loop; they are logged and, where the session is affected,
//! published as session events.

/// Why an inbound frame was discarded before dispatch.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame is not valid JSON.
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Valid JSON, but not a `batch` envelope.
    #[error("unexpected frame type {0:?}")]
    NotBatch(String),

    /// A `batch` envelope without a `commands` array.
    #[error("batch frame has no commands array")]
    MissingCommands,
}

/// Errors reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The session could not be established.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The session was not established within the connect timeout.
    #[error("connect timed out after {0} ms")]
    Timeout(u64),

    /// A frame could not be written.
    #[error("send failed: {0}")]
    Send(String),

    /// The inbound stream reported an error.
    #[error("receive failed: {0}")]
    Receive(String),
}

/// Errors surfaced by the connection manager.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Transport-level failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An outbound message could not be encoded.
    #[error("failed to encode outbound message: {0}")]
    Encode(#[from] serde_json::Error),
}
