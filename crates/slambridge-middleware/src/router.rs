//! Message router: one text frame in, at most one publish out.
//!
//! Every frame is an envelope `{"Type": <kind>, "Data": <object>}`. The
//! router decodes it, picks the field mapper for the kind, and hands the
//! mapped record to a [`Publisher`]. Anything that goes wrong on the way is
//! reported as exactly one [`Diagnostic`] log event and the frame is dropped;
//! nothing propagates back to the connection.

use std::sync::Arc;

use serde_json::Value;
use slambridge_types::{BridgeConfig, MapError, MessageKind};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::bus::Publisher;
use crate::listener::FrameHandler;
use crate::mapper;

/// Envelope key selecting the mapper.
pub const KIND_KEY: &str = "Type";
/// Envelope key holding the payload object.
pub const PAYLOAD_KEY: &str = "Data";

/// Why a frame was dropped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Diagnostic {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("envelope is missing '{0}'")]
    MissingEnvelopeField(&'static str),

    #[error("unknown message type {0}")]
    UnknownKind(String),

    #[error("malformed \"{kind}\" payload: {error}")]
    Mapping { kind: MessageKind, error: MapError },

    #[error("publishing \"{kind}\" failed: {reason}")]
    PublishFailed { kind: MessageKind, reason: String },
}

impl Diagnostic {
    /// Envelope problems are the sender's business and only warrant a
    /// warning; everything else is logged as an error.
    pub fn is_warning(&self) -> bool {
        matches!(self, Diagnostic::MissingEnvelopeField(_) | Diagnostic::UnknownKind(_))
    }

    fn emit(&self) {
        match self {
            Diagnostic::Mapping { kind, error } => {
                error!(%kind, field = error.field(), "{self}");
            }
            Diagnostic::PublishFailed { kind, .. } => error!(%kind, "{self}"),
            d if d.is_warning() => warn!("{self}"),
            _ => error!("{self}"),
        }
    }
}

/// Result of routing a single frame.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Published {
        kind: MessageKind,
        topic: String,
        /// Consumers the publisher handed the record to.
        delivered: usize,
    },
    Dropped(Diagnostic),
}

impl RouteOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, RouteOutcome::Published { .. })
    }

    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            RouteOutcome::Dropped(d) => Some(d),
            RouteOutcome::Published { .. } => None,
        }
    }
}

/// Decodes envelopes and dispatches them to the field mappers.
///
/// Holds no per-frame state; one router is shared by every connection.
#[derive(Clone)]
pub struct Router {
    config: Arc<BridgeConfig>,
    publisher: Arc<dyn Publisher>,
}

impl Router {
    pub fn new(config: Arc<BridgeConfig>, publisher: Arc<dyn Publisher>) -> Self {
        Self { config, publisher }
    }

    /// Route one raw text frame.
    ///
    /// Never fails: a dropped frame is logged once and described by the
    /// returned [`RouteOutcome::Dropped`].
    pub fn route(&self, frame: &str) -> RouteOutcome {
        match self.try_route(frame) {
            Ok(outcome) => outcome,
            Err(diagnostic) => {
                diagnostic.emit();
                RouteOutcome::Dropped(diagnostic)
            }
        }
    }

    fn try_route(&self, frame: &str) -> Result<RouteOutcome, Diagnostic> {
        let value: Value = serde_json::from_str(frame)
            .map_err(|e| Diagnostic::MalformedFrame(e.to_string()))?;
        let envelope = value
            .as_object()
            .ok_or_else(|| Diagnostic::MalformedFrame("frame is not a JSON object".to_string()))?;

        // Both envelope fields are checked before the kind is looked up.
        let kind_value = envelope
            .get(KIND_KEY)
            .filter(|v| !is_empty_value(v))
            .ok_or(Diagnostic::MissingEnvelopeField(KIND_KEY))?;
        let payload = envelope
            .get(PAYLOAD_KEY)
            .filter(|v| !v.is_null())
            .ok_or(Diagnostic::MissingEnvelopeField(PAYLOAD_KEY))?;

        let kind = match kind_value {
            Value::String(s) => {
                MessageKind::from_wire(s).ok_or_else(|| Diagnostic::UnknownKind(format!("\"{s}\"")))?
            }
            other => return Err(Diagnostic::UnknownKind(other.to_string())),
        };

        let message = mapper::map_payload(kind, payload, &self.config.frames)
            .map_err(|error| Diagnostic::Mapping { kind, error })?;

        let topic = self.config.topic_for(kind);
        let delivered = self
            .publisher
            .publish(topic, message)
            .map_err(|e| Diagnostic::PublishFailed { kind, reason: e.to_string() })?;

        debug!(%kind, topic, delivered, "frame published");
        Ok(RouteOutcome::Published {
            kind,
            topic: topic.to_string(),
            delivered,
        })
    }
}

/// `null`, `false`, zero, and empty strings, arrays or objects: values a
/// sender uses to mean "no type".
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

impl FrameHandler for Router {
    fn handle_frame(&self, frame: &str) {
        self.route(frame);
    }
}
