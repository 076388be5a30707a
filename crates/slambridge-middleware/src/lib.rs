//! `slambridge-middleware` – sensor JSON in, ROS 2 messages out.
//!
//! Translates the envelope stream a robot backend pushes over a WebSocket
//! into typed messages on the topics the SLAM stack listens to. It handles
//! format and transport only; no filtering or fusion happens here.
//!
//! # Modules
//!
//! - [`listener`] – WebSocket server handing each text frame to a
//!   [`FrameHandler`], in order, one task per connection.
//! - [`router`] – decodes the `{"Type", "Data"}` envelope, dispatches to a
//!   mapper and publishes the result; turns every failure into one log event.
//! - [`mapper`] – scan, odometry and IMU field mappers.
//! - [`bus`] – the [`Publisher`] hand-off and the in-process [`TopicBus`].
//! - [`rosbridge`] – forwards bus traffic to ROS 2 via `rosbridge_server`.
//! - [`printer`] – debug handler that pretty-prints frames instead.

pub mod bus;
pub mod listener;
pub mod mapper;
pub mod printer;
pub mod rosbridge;
pub mod router;

pub use bus::{Publisher, TopicBus};
pub use listener::{FrameHandler, Listener};
pub use printer::FramePrinter;
pub use rosbridge::{Forwarder, RosSink, RosbridgeSink};
pub use router::{Diagnostic, RouteOutcome, Router};
