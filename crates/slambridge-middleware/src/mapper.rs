//! Field mappers: loosely-typed JSON payloads → typed ROS 2 records.
//!
//! One mapper per [`MessageKind`]. Each takes the `Data` object of an
//! envelope and either returns a complete record or a [`MapError`] naming
//! the first field that stopped it. A record is never returned half-filled.
//!
//! The bridge assumes a planar robot: odometry `z` is always `0.0` and the
//! heading is the only rotation, so roll and pitch are always zero.

use serde_json::{Map, Value};
use slambridge_types::ros::{
    Header, Imu, LaserScan, Odometry, Point, Pose, PoseWithCovariance, Quaternion, Twist,
    TwistWithCovariance, Vector3,
};
use slambridge_types::{FrameIds, MapError, MessageKind, SensorMessage};

/// Diagonal variance of the angular velocity and linear acceleration
/// covariances.
pub const IMU_MEASURED_VARIANCE: f64 = 0.1;

/// Required scalar keys of a scan payload, in the order they are checked.
const SCAN_SCALARS: [&str; 5] = [
    "angle_min",
    "angle_max",
    "angle_increment",
    "range_min",
    "range_max",
];

/// Map `payload` with the mapper for `kind`.
pub fn map_payload(
    kind: MessageKind,
    payload: &Value,
    frames: &FrameIds,
) -> Result<SensorMessage, MapError> {
    match kind {
        MessageKind::Scan => map_scan(payload, frames).map(SensorMessage::Scan),
        MessageKind::Odometry => map_odometry(payload, frames).map(SensorMessage::Odometry),
        MessageKind::Imu => map_imu(payload, frames).map(SensorMessage::Imu),
    }
}

/// Build a `sensor_msgs/LaserScan` from a scan payload.
///
/// All five scalars and `ranges` are required. Each range element is coerced
/// to floating point; numeric strings such as `"inf"` are accepted.
pub fn map_scan(payload: &Value, frames: &FrameIds) -> Result<LaserScan, MapError> {
    let fields = Fields::of(payload)?;

    let mut scalars = [0.0f32; 5];
    for (slot, key) in scalars.iter_mut().zip(SCAN_SCALARS) {
        *slot = fields.required_f64(key)? as f32;
    }
    let [angle_min, angle_max, angle_increment, range_min, range_max] = scalars;
    let ranges = fields.required_ranges("ranges")?;

    Ok(LaserScan {
        header: Header::stamped(&frames.laser),
        angle_min,
        angle_max,
        angle_increment,
        range_min,
        range_max,
        ranges,
        ..LaserScan::default()
    })
}

/// Build a `nav_msgs/Odometry` from an odometry payload.
///
/// `x`, `y` and `theta` are required. `vx`, `vy` and `vtheta` are optional
/// and default to zero.
pub fn map_odometry(payload: &Value, frames: &FrameIds) -> Result<Odometry, MapError> {
    let fields = Fields::of(payload)?;

    let x = fields.required_f64("x")?;
    let y = fields.required_f64("y")?;
    let theta = fields.required_f64("theta")?;

    let vx = fields.optional_f64("vx")?;
    let vy = fields.optional_f64("vy")?;
    let vtheta = fields.optional_f64("vtheta")?;

    Ok(Odometry {
        header: Header::stamped(&frames.odom),
        child_frame_id: frames.base.clone(),
        pose: PoseWithCovariance {
            pose: Pose {
                position: Point { x, y, z: 0.0 },
                orientation: Quaternion::from_yaw(theta),
            },
            ..PoseWithCovariance::default()
        },
        twist: TwistWithCovariance {
            twist: Twist {
                linear: Vector3 { x: vx, y: vy, z: 0.0 },
                angular: Vector3 { x: 0.0, y: 0.0, z: vtheta },
            },
            ..TwistWithCovariance::default()
        },
    })
}

/// Build a `sensor_msgs/Imu` from an inertial payload.
///
/// Every axis is optional and defaults to `0.0`; only a present but
/// non-numeric value is rejected. Orientation is not estimated and is marked
/// unavailable.
pub fn map_imu(payload: &Value, frames: &FrameIds) -> Result<Imu, MapError> {
    let fields = Fields::of(payload)?;

    let angular_velocity = Vector3 {
        x: fields.optional_f64("gyro_x")?,
        y: fields.optional_f64("gyro_y")?,
        z: fields.optional_f64("gyro_z")?,
    };
    let linear_acceleration = Vector3 {
        x: fields.optional_f64("accel_x")?,
        y: fields.optional_f64("accel_y")?,
        z: fields.optional_f64("accel_z")?,
    };

    let mut orientation_covariance = [0.0; 9];
    orientation_covariance[0] = Imu::COVARIANCE_UNAVAILABLE;

    Ok(Imu {
        header: Header::stamped(&frames.imu),
        orientation: Quaternion::default(),
        orientation_covariance,
        angular_velocity,
        angular_velocity_covariance: diagonal(IMU_MEASURED_VARIANCE),
        linear_acceleration,
        linear_acceleration_covariance: diagonal(IMU_MEASURED_VARIANCE),
    })
}

/// Row-major 3x3 covariance with `variance` on the diagonal.
fn diagonal(variance: f64) -> [f64; 9] {
    let mut cov = [0.0; 9];
    cov[0] = variance;
    cov[4] = variance;
    cov[8] = variance;
    cov
}

// ────────────────────────────────────────────────────────────────────────────
// Keyed access into a payload object
// ────────────────────────────────────────────────────────────────────────────

struct Fields<'a>(&'a Map<String, Value>);

impl<'a> Fields<'a> {
    fn of(payload: &'a Value) -> Result<Self, MapError> {
        payload.as_object().map(Fields).ok_or(MapError::NotAnObject)
    }

    fn required_f64(&self, key: &'static str) -> Result<f64, MapError> {
        let value = self.0.get(key).ok_or(MapError::MissingField(key))?;
        number(key, value)
    }

    fn optional_f64(&self, key: &'static str) -> Result<f64, MapError> {
        match self.0.get(key) {
            Some(value) => number(key, value),
            None => Ok(0.0),
        }
    }

    fn required_ranges(&self, key: &'static str) -> Result<Vec<f32>, MapError> {
        let value = self.0.get(key).ok_or(MapError::MissingField(key))?;
        let elements = value.as_array().ok_or_else(|| MapError::InvalidField {
            field: key,
            reason: format!("expected an array, got {}", type_name(value)),
        })?;

        elements
            .iter()
            .enumerate()
            .map(|(i, element)| {
                coerce_f64(element).map(|r| r as f32).ok_or_else(|| MapError::InvalidField {
                    field: key,
                    reason: format!("element {i} is not a number ({})", type_name(element)),
                })
            })
            .collect()
    }
}

fn number(key: &'static str, value: &Value) -> Result<f64, MapError> {
    value.as_f64().ok_or_else(|| MapError::InvalidField {
        field: key,
        reason: format!("expected a number, got {}", type_name(value)),
    })
}

/// Element-wise float coercion for range readings: JSON numbers, or strings
/// that parse as a float (`"inf"`, `"nan"`, `"1.5"`).
fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
