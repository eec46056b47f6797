//! Frame codec for the authority protocol.
//!
//! Inbound frames are JSON text of the form
//! `{ "type": "batch", "commands": [ ... ] }`. The envelope is checked here;
//! each element of `commands` is decoded on its own so one bad command does
//! not cost the rest of the batch. Outbound messages are serialized
//! [`OutboundMessage`] values.

use crossview_types::{Command, CommandError, OutboundMessage, WireMapping};
use serde_json::Value;

use crate::error::FrameError;

/// Envelope type of an inbound command batch.
pub const BATCH_TYPE: &str = "batch";

/// The `commands` array of a validated batch envelope, still undecoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    commands: Vec<Value>,
}

impl Batch {
    /// Number of commands in the batch.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the batch carries no commands.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Decode each command in arrival order.
    pub fn decode(
        self,
        mapping: &WireMapping,
    ) -> impl Iterator<Item = Result<Command, CommandError>> + '_ {
        self.commands
            .into_iter()
            .map(move |value| Command::from_value(value, mapping))
    }
}

/// Parse a text frame and check the batch envelope.
pub fn parse_frame(text: &str) -> Result<Batch, FrameError> {
    let value: Value = serde_json::from_str(text)?;
    let kind = value.get("type").and_then(Value::as_str).unwrap_or_default();
    if kind != BATCH_TYPE {
        return Err(FrameError::NotBatch(kind.to_owned()));
    }
    match value {
        Value::Object(mut envelope) => match envelope.remove("commands") {
            Some(Value::Array(commands)) => Ok(Batch { commands }),
            _ => Err(FrameError::MissingCommands),
        },
        _ => Err(FrameError::MissingCommands),
    }
}

/// Serialize an outbound message to frame text.
pub fn encode(message: &OutboundMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}
