//! Process-wide bridge configuration.
//!
//! A [`BridgeConfig`] is built once at startup and shared read-only with the
//! router, mappers, listener and forwarder. Topic names and frame ids must
//! match what the downstream SLAM stack subscribes to; nothing is negotiated
//! at runtime.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::BridgeError;
use crate::ros::MessageKind;

/// Destination topic for each message kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicNames {
    #[serde(default = "default_scan_topic")]
    pub scan: String,
    #[serde(default = "default_odom_topic")]
    pub odom: String,
    #[serde(default = "default_imu_topic")]
    pub imu: String,
}

impl Default for TopicNames {
    fn default() -> Self {
        Self {
            scan: default_scan_topic(),
            odom: default_odom_topic(),
            imu: default_imu_topic(),
        }
    }
}

/// Coordinate frame ids stamped on outgoing messages. These must exist in the
/// consumer's TF tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameIds {
    /// Fixed frame odometry is expressed in.
    #[serde(default = "default_odom_frame")]
    pub odom: String,
    /// Robot body frame, the odometry child frame.
    #[serde(default = "default_base_frame")]
    pub base: String,
    #[serde(default = "default_laser_frame")]
    pub laser: String,
    #[serde(default = "default_imu_frame")]
    pub imu: String,
}

impl Default for FrameIds {
    fn default() -> Self {
        Self {
            odom: default_odom_frame(),
            base: default_base_frame(),
            laser: default_laser_frame(),
            imu: default_imu_frame(),
        }
    }
}

/// Complete bridge configuration, usually read from
/// `~/.slambridge/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Interface the sensor WebSocket listens on.
    #[serde(default = "default_listen_host")]
    pub listen_host: String,

    /// Port the sensor WebSocket listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// `ws://host:port` of the `rosbridge_server` to publish through.
    #[serde(default = "default_rosbridge_url")]
    pub rosbridge_url: String,

    /// Buffered messages per bus subscriber before the oldest are dropped.
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,

    #[serde(default)]
    pub topics: TopicNames,

    #[serde(default)]
    pub frames: FrameIds,
}

fn default_listen_host() -> String {
    "0.0.0.0".to_string()
}
fn default_listen_port() -> u16 {
    8765
}
fn default_rosbridge_url() -> String {
    "ws://localhost:9090".to_string()
}
fn default_bus_capacity() -> usize {
    256
}
fn default_scan_topic() -> String {
    "/scan".to_string()
}
fn default_odom_topic() -> String {
    "/odom".to_string()
}
fn default_imu_topic() -> String {
    "/imu".to_string()
}
fn default_odom_frame() -> String {
    "odom".to_string()
}
fn default_base_frame() -> String {
    "base_link".to_string()
}
fn default_laser_frame() -> String {
    "laser_frame".to_string()
}
fn default_imu_frame() -> String {
    "imu_link".to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            listen_host: default_listen_host(),
            listen_port: default_listen_port(),
            rosbridge_url: default_rosbridge_url(),
            bus_capacity: default_bus_capacity(),
            topics: TopicNames::default(),
            frames: FrameIds::default(),
        }
    }
}

impl BridgeConfig {
    /// Socket address the listener binds to.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] when `listen_host` is not an IP
    /// address.
    pub fn listen_addr(&self) -> Result<SocketAddr, BridgeError> {
        let ip = self.listen_host.parse().map_err(|e| {
            BridgeError::Config(format!("invalid listen_host '{}': {e}", self.listen_host))
        })?;
        Ok(SocketAddr::new(ip, self.listen_port))
    }

    /// Topic a message of `kind` is published on.
    pub fn topic_for(&self, kind: MessageKind) -> &str {
        match kind {
            MessageKind::Scan => &self.topics.scan,
            MessageKind::Odometry => &self.topics.odom,
            MessageKind::Imu => &self.topics.imu,
        }
    }
}
