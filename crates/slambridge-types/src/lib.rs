//! `slambridge-types` – shared vocabulary of the bridge.
//!
//! # Modules
//!
//! - [`ros`] – ROS 2 message shapes (`LaserScan`, `Odometry`, `Imu`) and the
//!   [`MessageKind`][ros::MessageKind] selector carried in the wire envelope.
//! - [`config`] – the immutable [`BridgeConfig`][config::BridgeConfig].

pub mod config;
pub mod ros;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use config::{BridgeConfig, FrameIds, TopicNames};
pub use ros::{MessageKind, SensorMessage};

/// A mapped record bound for one topic, as it travels over the internal bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicMessage {
    pub id: Uuid,
    /// e.g. "/scan"
    pub topic: String,
    pub message: SensorMessage,
}

impl TopicMessage {
    pub fn new(topic: impl Into<String>, message: SensorMessage) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            message,
        }
    }
}

/// Why a payload could not be turned into a typed record.
///
/// Every variant names the offending field so the diagnostic can point at it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MapError {
    #[error("missing key '{0}'")]
    MissingField(&'static str),

    #[error("invalid value for '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("payload is not a JSON object")]
    NotAnObject,
}

impl MapError {
    /// The field the error refers to, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            MapError::MissingField(f) => Some(*f),
            MapError::InvalidField { field, .. } => Some(*field),
            MapError::NotAnObject => None,
        }
    }
}

/// Errors from the transport and pub/sub plumbing around the mappers.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum BridgeError {
    #[error("Bind Error: {0}")]
    Bind(String),

    #[error("Transport Error: {0}")]
    Transport(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Config Error: {0}")]
    Config(String),
}
