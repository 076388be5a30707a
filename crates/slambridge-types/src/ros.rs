//! ROS 2 message shapes published by the bridge.
//!
//! Field names and nesting mirror the `.msg` definitions from
//! <https://github.com/ros2/common_interfaces> so that a value serialises
//! straight into the JSON `msg` object a `rosbridge_server` expects.
//!
//! Only the messages the bridge produces are modelled: `sensor_msgs/LaserScan`,
//! `nav_msgs/Odometry`, `sensor_msgs/Imu` and the pieces they are built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of entries in a row-major 6x6 pose or twist covariance.
pub const COVARIANCE_6X6: usize = 36;

// ────────────────────────────────────────────────────────────────────────────
// builtin_interfaces / std_msgs
// ────────────────────────────────────────────────────────────────────────────

/// `builtin_interfaces/msg/Time`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Time {
    pub sec: i32,
    pub nanosec: u32,
}

impl Time {
    /// Wall-clock stamp for a freshly built message.
    pub fn now() -> Self {
        Self::from(Utc::now())
    }
}

impl From<DateTime<Utc>> for Time {
    fn from(t: DateTime<Utc>) -> Self {
        Self {
            // Saturates past 2038 rather than wrapping.
            sec: t.timestamp().clamp(i32::MIN.into(), i32::MAX.into()) as i32,
            nanosec: t.timestamp_subsec_nanos(),
        }
    }
}

/// `std_msgs/msg/Header`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub stamp: Time,
    pub frame_id: String,
}

impl Header {
    /// Header stamped with the current time in `frame_id`.
    pub fn stamped(frame_id: impl Into<String>) -> Self {
        Self {
            stamp: Time::now(),
            frame_id: frame_id.into(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// geometry_msgs
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// `geometry_msgs/msg/Quaternion`. The default is the identity rotation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

impl Quaternion {
    /// Rotation of `yaw` radians about the Z axis.
    ///
    /// Equivalent to an Euler conversion with roll = pitch = 0, which is all a
    /// planar robot can report.
    pub fn from_yaw(yaw: f64) -> Self {
        let half = yaw * 0.5;
        Self {
            x: 0.0,
            y: 0.0,
            z: half.sin(),
            w: half.cos(),
        }
    }

    /// Heading angle of a Z-only rotation, in `(-2π, 2π]`.
    pub fn yaw(&self) -> f64 {
        2.0 * self.z.atan2(self.w)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point,
    pub orientation: Quaternion,
}

/// `geometry_msgs/msg/PoseWithCovariance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseWithCovariance {
    pub pose: Pose,
    /// Row-major 6x6 covariance (x, y, z, rot X, rot Y, rot Z).
    pub covariance: Vec<f64>,
}

impl Default for PoseWithCovariance {
    fn default() -> Self {
        Self {
            pose: Pose::default(),
            covariance: vec![0.0; COVARIANCE_6X6],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Twist {
    pub linear: Vector3,
    pub angular: Vector3,
}

/// `geometry_msgs/msg/TwistWithCovariance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwistWithCovariance {
    pub twist: Twist,
    pub covariance: Vec<f64>,
}

impl Default for TwistWithCovariance {
    fn default() -> Self {
        Self {
            twist: Twist::default(),
            covariance: vec![0.0; COVARIANCE_6X6],
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// sensor_msgs / nav_msgs
// ────────────────────────────────────────────────────────────────────────────

/// `sensor_msgs/msg/LaserScan`: a single sweep of a planar range finder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaserScan {
    pub header: Header,

    /// Start angle of the scan (rad).
    pub angle_min: f32,

    /// End angle of the scan (rad).
    pub angle_max: f32,

    /// Angular distance between measurements (rad).
    pub angle_increment: f32,

    /// Time between measurements (s).
    pub time_increment: f32,

    /// Time between scans (s).
    pub scan_time: f32,

    /// Minimum valid range (m).
    pub range_min: f32,

    /// Maximum valid range (m).
    pub range_max: f32,

    /// Range data (m). Values outside `[range_min, range_max]` are discarded
    /// by consumers.
    pub ranges: Vec<f32>,

    pub intensities: Vec<f32>,
}

/// `nav_msgs/msg/Odometry`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Odometry {
    pub header: Header,

    /// Frame id the pose points to.
    pub child_frame_id: String,

    pub pose: PoseWithCovariance,

    /// Velocity relative to `child_frame_id`.
    pub twist: TwistWithCovariance,
}

/// `sensor_msgs/msg/Imu`.
///
/// A covariance whose first element is `-1.0` marks the quantity as not
/// measured; see [`Imu::COVARIANCE_UNAVAILABLE`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Imu {
    pub header: Header,
    pub orientation: Quaternion,
    pub orientation_covariance: [f64; 9],
    pub angular_velocity: Vector3,
    pub angular_velocity_covariance: [f64; 9],
    pub linear_acceleration: Vector3,
    pub linear_acceleration_covariance: [f64; 9],
}

impl Imu {
    pub const COVARIANCE_UNAVAILABLE: f64 = -1.0;

    /// Whether the orientation field carries a real estimate.
    pub fn has_orientation(&self) -> bool {
        self.orientation_covariance[0] != Self::COVARIANCE_UNAVAILABLE
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Message kinds
// ────────────────────────────────────────────────────────────────────────────

/// The message kinds a client may send, keyed by the envelope `Type` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Scan,
    Odometry,
    Imu,
}

impl MessageKind {
    pub const ALL: [MessageKind; 3] = [MessageKind::Scan, MessageKind::Odometry, MessageKind::Imu];

    /// Match an envelope `Type` value. Matching is exact and case-sensitive.
    pub fn from_wire(kind: &str) -> Option<Self> {
        match kind {
            "scan" => Some(Self::Scan),
            "odom" => Some(Self::Odometry),
            "imu" => Some(Self::Imu),
            _ => None,
        }
    }

    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Scan => "scan",
            Self::Odometry => "odom",
            Self::Imu => "imu",
        }
    }

    /// Fully qualified ROS 2 interface name used when advertising a topic.
    pub fn ros_type(&self) -> &'static str {
        match self {
            Self::Scan => "sensor_msgs/msg/LaserScan",
            Self::Odometry => "nav_msgs/msg/Odometry",
            Self::Imu => "sensor_msgs/msg/Imu",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// A fully mapped record ready to be published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorMessage {
    Scan(LaserScan),
    Odometry(Odometry),
    Imu(Imu),
}

impl SensorMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Scan(_) => MessageKind::Scan,
            Self::Odometry(_) => MessageKind::Odometry,
            Self::Imu(_) => MessageKind::Imu,
        }
    }

    pub fn header(&self) -> &Header {
        match self {
            Self::Scan(m) => &m.header,
            Self::Odometry(m) => &m.header,
            Self::Imu(m) => &m.header,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn from_yaw_is_unit_and_z_only() {
        for &theta in &[0.0, 0.3, -1.2, FRAC_PI_2, PI, -PI + 1e-9, 3.0] {
            let q = Quaternion::from_yaw(theta);
            assert_eq!(q.x, 0.0);
            assert_eq!(q.y, 0.0);
            assert!((q.z * q.z + q.w * q.w - 1.0).abs() < 1e-12);
            assert!((q.yaw() - theta).abs() < 1e-9, "theta {theta} came back as {}", q.yaw());
        }
    }

    #[test]
    fn default_quaternion_is_identity() {
        let q = Quaternion::default();
        assert_eq!(q.w, 1.0);
        assert_eq!((q.x, q.y, q.z), (0.0, 0.0, 0.0));
    }

    #[test]
    fn time_from_datetime_splits_seconds() {
        let t = DateTime::from_timestamp(1_700_000_000, 250_000_000).unwrap();
        let stamp = Time::from(t);
        assert_eq!(stamp.sec, 1_700_000_000);
        assert_eq!(stamp.nanosec, 250_000_000);
    }

    #[test]
    fn time_saturates_outside_i32_seconds() {
        let late = DateTime::from_timestamp(i64::from(i32::MAX) + 10, 0).unwrap();
        assert_eq!(Time::from(late).sec, i32::MAX);

        let early = DateTime::from_timestamp(i64::from(i32::MIN) - 10, 0).unwrap();
        assert_eq!(Time::from(early).sec, i32::MIN);
    }

    #[test]
    fn message_kind_wire_names() {
        for kind in MessageKind::ALL {
            assert_eq!(MessageKind::from_wire(kind.wire_name()), Some(kind));
        }
        assert_eq!(MessageKind::from_wire("points"), None);
        assert_eq!(MessageKind::from_wire("Odom"), None);
    }

    #[test]
    fn odometry_serialises_with_ros_field_names() {
        let json = serde_json::to_value(Odometry::default()).unwrap();
        assert!(json["header"]["stamp"]["nanosec"].is_u64());
        assert_eq!(json["pose"]["covariance"].as_array().unwrap().len(), COVARIANCE_6X6);
        assert_eq!(json["pose"]["pose"]["orientation"]["w"], 1.0);
        assert!(json["twist"]["twist"]["angular"]["z"].is_f64());
    }

    #[test]
    fn imu_orientation_sentinel() {
        let mut imu = Imu::default();
        assert!(imu.has_orientation());
        imu.orientation_covariance[0] = Imu::COVARIANCE_UNAVAILABLE;
        assert!(!imu.has_orientation());
    }
}
