//! Wire envelopes.
//!
//! Inbound frames are JSON objects tagged by `type`:
//!
//! ```text
//! {"id": .., "type": "control", "action": "subscribe", "namespace": "message"}
//! {"id": .., "type": "application", "namespace": "message", "body": ..}
//! ```
//!
//! `"nsocket"` and `"emit"` are accepted as legacy spellings of `"control"`
//! and `"application"`. Application envelopes and malformed frames are
//! answered with an [`Ack`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::DecodeError;
use crate::transport::Frame;

/// Subscription management verbs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    /// Join a namespace.
    Subscribe,
    /// Leave a namespace.
    Unsubscribe,
}

/// The typed body of an inbound envelope.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EnvelopeKind {
    /// Registry mutation, never acknowledged.
    #[serde(alias = "nsocket")]
    Control {
        /// What to do.
        action: ControlAction,
        /// Target namespace, root when absent.
        #[serde(default)]
        namespace: Option<String>,
    },
    /// Payload for the handler registered under `namespace`.
    #[serde(alias = "emit")]
    Application {
        /// Target namespace, root when absent.
        #[serde(default)]
        namespace: Option<String>,
        /// Arbitrary payload; `null` when absent.
        #[serde(default)]
        body: Value,
    },
}

/// One decoded inbound message.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Envelope {
    /// Opaque correlation token, echoed in the acknowledgement.
    #[serde(default)]
    pub id: Option<Value>,
    /// Control or application payload.
    #[serde(flatten)]
    pub kind: EnvelopeKind,
}

impl Envelope {
    /// Decode a raw frame.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(raw)?)
    }

    /// Short label for logs and metrics.
    pub fn kind_label(&self) -> &'static str {
        match self.kind {
            EnvelopeKind::Control { .. } => "control",
            EnvelopeKind::Application { .. } => "application",
        }
    }
}

/// Outcome reported in an acknowledgement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    /// The envelope was valid and accepted.
    Received,
    /// The frame could not be decoded.
    Failed,
}

/// Protocol-level acknowledgement sent back to the originating connection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "ack")]
pub struct Ack {
    /// Echo of the request id, or a fresh id when none was available.
    pub id: Value,
    /// Received or failed.
    pub action: AckStatus,
    /// Failure description; only present when failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Ack {
    /// Acknowledge a valid envelope.
    pub fn received(id: Option<Value>) -> Self {
        Self {
            id: id.filter(|v| !v.is_null()).unwrap_or_else(fresh_id),
            action: AckStatus::Received,
            reason: None,
        }
    }

    /// Report a frame that could not be decoded. Always carries a fresh id.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            id: fresh_id(),
            action: AckStatus::Failed,
            reason: Some(reason.into()),
        }
    }

    /// Encode as a text frame.
    pub fn to_frame(&self) -> Result<Frame, serde_json::Error> {
        Ok(Arc::new(serde_json::to_string(self)?))
    }
}

/// Server-pushed application envelope produced by `emit`.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename = "application")]
pub struct OutboundEnvelope<'a, T: ?Sized + Serialize> {
    /// Freshly generated id.
    pub id: String,
    /// Payload.
    pub body: &'a T,
    /// Canonical namespace the payload was emitted to.
    pub namespace: &'a str,
}

impl<'a, T: ?Sized + Serialize> OutboundEnvelope<'a, T> {
    /// Wrap a payload for `namespace` under a new id.
    pub fn new(namespace: &'a str, body: &'a T) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            body,
            namespace,
        }
    }

    /// Encode as a text frame.
    pub fn to_frame(&self) -> Result<Frame, serde_json::Error> {
        Ok(Arc::new(serde_json::to_string(self)?))
    }
}

/// Encode a payload as a bare (non-enveloped) frame.
pub fn encode_bare<T: ?Sized + Serialize>(payload: &T) -> Result<Frame, serde_json::Error> {
    Ok(Arc::new(serde_json::to_string(payload)?))
}

fn fresh_id() -> Value {
    Value::String(Uuid::now_v7().to_string())
}
