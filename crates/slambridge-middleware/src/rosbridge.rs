//! Pub/sub client: forwards bus traffic to ROS 2 through `rosbridge_server`.
//!
//! The bridge does not link against a DDS implementation. It speaks the
//! rosbridge v2 JSON protocol over a WebSocket instead:
//!
//! ```json
//! {"op": "advertise", "id": "...", "topic": "/scan", "type": "sensor_msgs/msg/LaserScan"}
//! {"op": "publish",   "id": "...", "topic": "/scan", "msg": { ... }}
//! ```
//!
//! [`Forwarder`] advertises the three configured topics once, then drains
//! the [`TopicBus`][crate::bus::TopicBus] and publishes every message in the
//! order it was routed. A sink failure, or rosbridge closing its end, stops
//! the forwarder; there is no reconnect.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use slambridge_types::{BridgeConfig, BridgeError, MessageKind, SensorMessage, TopicMessage};
use tokio::net::TcpStream;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type RosbridgeStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outbound side of the pub/sub middleware.
#[async_trait]
pub trait RosSink: Send {
    /// Declare that `topic` will carry messages of ROS type `type_name`.
    async fn advertise(&mut self, topic: &str, type_name: &str) -> Result<(), BridgeError>;

    /// Publish one message already serialised to its ROS JSON shape.
    async fn publish(&mut self, id: &str, topic: &str, msg: Value) -> Result<(), BridgeError>;

    /// Resolve once the far end has gone away, with the reason.
    ///
    /// Must be cancel safe: the forwarder races it against the bus.
    async fn closed(&mut self) -> BridgeError;
}

/// `rosbridge_server` WebSocket client.
pub struct RosbridgeSink {
    tx: SplitSink<RosbridgeStream, Message>,
    rx: SplitStream<RosbridgeStream>,
    url: String,
}

impl RosbridgeSink {
    /// Connect to the rosbridge endpoint at `url` (e.g. `ws://localhost:9090`).
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Transport`] when the connection or handshake
    /// fails.
    pub async fn connect(url: &str) -> Result<Self, BridgeError> {
        let (ws, _response) = connect_async(url)
            .await
            .map_err(|e| BridgeError::Transport(format!("rosbridge connect to {url}: {e}")))?;
        info!(url, "connected to rosbridge");
        let (tx, rx) = ws.split();
        Ok(Self {
            tx,
            rx,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send(&mut self, op: Value) -> Result<(), BridgeError> {
        self.tx
            .send(Message::Text(op.to_string().into()))
            .await
            .map_err(|e| BridgeError::Transport(format!("rosbridge send to {}: {e}", self.url)))
    }
}

#[async_trait]
impl RosSink for RosbridgeSink {
    async fn advertise(&mut self, topic: &str, type_name: &str) -> Result<(), BridgeError> {
        self.send(advertise_op(topic, type_name)).await
    }

    async fn publish(&mut self, id: &str, topic: &str, msg: Value) -> Result<(), BridgeError> {
        self.send(publish_op(id, topic, msg)).await
    }

    async fn closed(&mut self) -> BridgeError {
        loop {
            match self.rx.next().await {
                Some(Ok(Message::Close(frame))) => {
                    return BridgeError::Transport(format!(
                        "rosbridge at {} closed the connection: {frame:?}",
                        self.url
                    ));
                }
                None => {
                    return BridgeError::Transport(format!(
                        "rosbridge at {} closed the connection",
                        self.url
                    ));
                }
                Some(Err(e)) => {
                    return BridgeError::Transport(format!("rosbridge read from {}: {e}", self.url));
                }
                // Status replies and pings; nothing is subscribed.
                Some(Ok(other)) => debug!(len = other.len(), "ignoring rosbridge message"),
            }
        }
    }
}

/// Build a rosbridge `advertise` operation.
pub fn advertise_op(topic: &str, type_name: &str) -> Value {
    json!({
        "op": "advertise",
        "id": format!("advertise:{topic}"),
        "topic": topic,
        "type": type_name,
    })
}

/// Serialise `message` to the `msg` body of a publish operation.
///
/// JSON has no infinity or NaN, so non-finite scan ranges are sent outside
/// `[range_min, range_max]`: `+inf` (no return) as `range_max + 1`, `-inf`
/// and NaN as `range_min - 1`. Consumers discard both as out of range.
pub fn message_body(message: &SensorMessage) -> Result<Value, BridgeError> {
    let to_json = |body: Result<Value, serde_json::Error>| {
        body.map_err(|e| BridgeError::Serialization(e.to_string()))
    };
    match message {
        SensorMessage::Scan(scan) if scan.ranges.iter().any(|r| !r.is_finite()) => {
            let mut scan = scan.clone();
            let beyond = scan.range_max + 1.0;
            let below = scan.range_min - 1.0;
            for r in &mut scan.ranges {
                if *r == f32::INFINITY {
                    *r = beyond;
                } else if !r.is_finite() {
                    *r = below;
                }
            }
            to_json(serde_json::to_value(&scan))
        }
        other => to_json(serde_json::to_value(other)),
    }
}

/// Build a rosbridge `publish` operation.
pub fn publish_op(id: &str, topic: &str, msg: Value) -> Value {
    json!({
        "op": "publish",
        "id": id,
        "topic": topic,
        "msg": msg,
    })
}

// ---------------------------------------------------------------------------
// Forwarder
// ---------------------------------------------------------------------------

/// Drains the topic bus into a [`RosSink`].
pub struct Forwarder<S> {
    sink: S,
    advertisements: Vec<(String, &'static str)>,
}

impl<S: RosSink> Forwarder<S> {
    /// Forwarder for the topics named in `config`.
    pub fn new(sink: S, config: &BridgeConfig) -> Self {
        let advertisements = MessageKind::ALL
            .iter()
            .map(|&kind| (config.topic_for(kind).to_string(), kind.ros_type()))
            .collect();
        Self {
            sink,
            advertisements,
        }
    }

    /// Advertise every topic, then forward messages until the bus closes or
    /// shutdown is requested.
    ///
    /// Messages already buffered when shutdown is requested are still
    /// forwarded so nothing the router accepted is silently lost.
    ///
    /// # Errors
    ///
    /// Returns the sink's error as soon as an advertise or publish fails.
    pub async fn run(
        mut self,
        mut rx: broadcast::Receiver<TopicMessage>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<S, BridgeError> {
        for (topic, type_name) in &self.advertisements {
            self.sink.advertise(topic, type_name).await?;
            debug!(%topic, %type_name, "advertised");
        }

        loop {
            tokio::select! {
                biased;
                result = rx.recv() => match result {
                    Ok(msg) => self.forward(msg).await?,
                    Err(RecvError::Lagged(n)) => {
                        warn!(lagged_by = n, "forwarder lagged; messages dropped");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = async { shutdown.wait_for(|&stop| stop).await.map(|_| ()) } => {
                    self.drain(&mut rx).await?;
                    break;
                }
                reason = self.sink.closed() => return Err(reason),
            }
        }

        info!("forwarder stopped");
        Ok(self.sink)
    }

    /// Forward everything still buffered on the bus.
    async fn drain(&mut self, rx: &mut broadcast::Receiver<TopicMessage>) -> Result<(), BridgeError> {
        loop {
            match rx.try_recv() {
                Ok(msg) => self.forward(msg).await?,
                Err(TryRecvError::Lagged(n)) => {
                    warn!(lagged_by = n, "forwarder lagged while draining; messages dropped");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return Ok(()),
            }
        }
    }

    async fn forward(&mut self, msg: TopicMessage) -> Result<(), BridgeError> {
        let body = message_body(&msg.message)?;
        self.sink
            .publish(&msg.id.to_string(), &msg.topic, body)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{Publisher, TopicBus};
    use slambridge_types::ros::{Imu, LaserScan};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    /// Sink that records every operation as its rosbridge JSON.
    #[derive(Default)]
    struct RecordingSink {
        ops: Vec<Value>,
        fail_publish: bool,
        hung_up: bool,
    }

    #[async_trait]
    impl RosSink for RecordingSink {
        async fn advertise(&mut self, topic: &str, type_name: &str) -> Result<(), BridgeError> {
            self.ops.push(advertise_op(topic, type_name));
            Ok(())
        }

        async fn publish(&mut self, id: &str, topic: &str, msg: Value) -> Result<(), BridgeError> {
            if self.fail_publish {
                return Err(BridgeError::Transport("rosbridge went away".to_string()));
            }
            self.ops.push(publish_op(id, topic, msg));
            Ok(())
        }

        async fn closed(&mut self) -> BridgeError {
            if self.hung_up {
                return BridgeError::Transport("rosbridge hung up".to_string());
            }
            std::future::pending().await
        }
    }

    #[test]
    fn publish_op_shape() {
        let op = publish_op("abc", "/odom", json!({"child_frame_id": "base_link"}));
        assert_eq!(op["op"], "publish");
        assert_eq!(op["id"], "abc");
        assert_eq!(op["topic"], "/odom");
        assert_eq!(op["msg"]["child_frame_id"], "base_link");
    }

    #[tokio::test]
    async fn advertises_all_topics_then_forwards_in_order() {
        let bus = TopicBus::default();
        let rx = bus.subscribe();
        let (_stop_tx, stop_rx) = watch::channel(false);

        bus.publish("/scan", SensorMessage::Scan(LaserScan::default())).unwrap();
        bus.publish("/imu", SensorMessage::Imu(Imu::default())).unwrap();
        drop(bus);

        let forwarder = Forwarder::new(RecordingSink::default(), &BridgeConfig::default());
        let sink = forwarder.run(rx, stop_rx).await.unwrap();

        let ops: Vec<(&str, &str)> = sink
            .ops
            .iter()
            .map(|op| (op["op"].as_str().unwrap(), op["topic"].as_str().unwrap()))
            .collect();
        assert_eq!(
            ops,
            [
                ("advertise", "/scan"),
                ("advertise", "/odom"),
                ("advertise", "/imu"),
                ("publish", "/scan"),
                ("publish", "/imu"),
            ]
        );
        assert_eq!(sink.ops[1]["type"], "nav_msgs/msg/Odometry");
        assert_eq!(sink.ops[4]["msg"]["orientation_covariance"][0], 0.0);
        assert!(sink.ops[3]["msg"]["ranges"].is_array());
    }

    #[tokio::test]
    async fn shutdown_flushes_buffered_messages() {
        let bus = TopicBus::default();
        let rx = bus.subscribe();
        let (stop_tx, stop_rx) = watch::channel(false);

        bus.publish("/imu", SensorMessage::Imu(Imu::default())).unwrap();
        stop_tx.send(true).unwrap();

        let forwarder = Forwarder::new(RecordingSink::default(), &BridgeConfig::default());
        let sink = forwarder.run(rx, stop_rx).await.unwrap();

        let published = sink.ops.iter().filter(|op| op["op"] == "publish").count();
        assert_eq!(published, 1);
        drop(bus);
    }

    #[tokio::test]
    async fn drain_skips_lag_gap() {
        let bus = TopicBus::new(2);
        let mut rx = bus.subscribe();
        for _ in 0..5 {
            bus.publish("/imu", SensorMessage::Imu(Imu::default())).unwrap();
        }

        let mut forwarder = Forwarder::new(RecordingSink::default(), &BridgeConfig::default());
        forwarder.drain(&mut rx).await.unwrap();

        // The two messages still buffered after the gap are forwarded.
        assert_eq!(forwarder.sink.ops.len(), 2);
    }

    #[tokio::test]
    async fn sink_failure_stops_forwarder() {
        let bus = TopicBus::default();
        let rx = bus.subscribe();
        let (_stop_tx, stop_rx) = watch::channel(false);

        bus.publish("/imu", SensorMessage::Imu(Imu::default())).unwrap();

        let sink = RecordingSink {
            fail_publish: true,
            ..RecordingSink::default()
        };
        let result = Forwarder::new(sink, &BridgeConfig::default()).run(rx, stop_rx).await;
        assert!(matches!(result, Err(BridgeError::Transport(_))));
    }

    #[tokio::test]
    async fn idle_forwarder_stops_when_sink_closes() {
        let bus = TopicBus::default();
        let (_stop_tx, stop_rx) = watch::channel(false);
        let sink = RecordingSink {
            hung_up: true,
            ..RecordingSink::default()
        };

        let result = Forwarder::new(sink, &BridgeConfig::default())
            .run(bus.subscribe(), stop_rx)
            .await;
        assert!(matches!(result, Err(BridgeError::Transport(_))));
    }

    #[tokio::test]
    async fn forwarder_notices_rosbridge_closing() {
        let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = server.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
            let _ = ws.close(None).await;
            // Let the close frame reach the client before the socket drops.
            while let Some(Ok(_)) = ws.next().await {}
        });

        let sink = RosbridgeSink::connect(&format!("ws://{addr}")).await.unwrap();
        let bus = TopicBus::default();
        let (_stop_tx, stop_rx) = watch::channel(false);

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            Forwarder::new(sink, &BridgeConfig::default()).run(bus.subscribe(), stop_rx),
        )
        .await
        .expect("forwarder kept running after rosbridge closed");
        assert!(matches!(result, Err(BridgeError::Transport(_))));
    }

    #[test]
    fn non_finite_ranges_stay_out_of_range_on_the_wire() {
        let scan = LaserScan {
            range_min: 0.1,
            range_max: 10.0,
            ranges: vec![1.0, f32::INFINITY, f32::NAN, f32::NEG_INFINITY],
            ..LaserScan::default()
        };
        let body = message_body(&SensorMessage::Scan(scan)).unwrap();

        let ranges: Vec<f64> = body["ranges"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r.as_f64().expect("range serialised as null"))
            .collect();
        assert_eq!(ranges[0], 1.0);
        assert_eq!(ranges[1], 11.0);
        assert!(ranges[2] < 0.1);
        assert!(ranges[3] < 0.1);
    }

    #[tokio::test]
    async fn forwarded_scan_keeps_infinite_ranges_numeric() {
        let bus = TopicBus::default();
        let rx = bus.subscribe();
        let (_stop_tx, stop_rx) = watch::channel(false);

        let scan = LaserScan {
            range_max: 5.0,
            ranges: vec![1.0, f32::INFINITY, f32::NAN],
            ..LaserScan::default()
        };
        bus.publish("/scan", SensorMessage::Scan(scan)).unwrap();
        drop(bus);

        let sink = Forwarder::new(RecordingSink::default(), &BridgeConfig::default())
            .run(rx, stop_rx)
            .await
            .unwrap();
        let ranges = &sink.ops[3]["msg"]["ranges"];
        assert_eq!(ranges[1], 6.0);
        assert!(ranges[2].is_number());
    }

    #[tokio::test]
    async fn connect_to_unreachable_rosbridge_fails() {
        let result = RosbridgeSink::connect("ws://127.0.0.1:1").await;
        assert!(matches!(result, Err(BridgeError::Transport(_))));
    }
}
