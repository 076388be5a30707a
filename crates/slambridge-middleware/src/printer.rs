//! Protocol inspection without a pub/sub consumer.
//!
//! [`FramePrinter`] is a [`FrameHandler`] that pretty-prints every decodable
//! frame instead of routing it. Frames are not validated against the envelope
//! schema; anything that parses as JSON is printed. Undecodable frames are
//! logged and echoed raw so the sender's bug is visible.

use std::io::Write;
use std::sync::Mutex;

use serde_json::Value;
use tracing::{error, info};

use crate::listener::FrameHandler;

pub struct FramePrinter<W> {
    out: Mutex<W>,
}

impl FramePrinter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send + 'static> FramePrinter<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    /// Write one frame. Returns `true` when the frame was valid JSON.
    pub fn print_frame(&self, frame: &str) -> bool {
        let (valid, text) = match serde_json::from_str::<Value>(frame) {
            Ok(value) => {
                info!("received valid JSON");
                let pretty =
                    serde_json::to_string_pretty(&value).unwrap_or_else(|_| frame.to_string());
                (true, pretty)
            }
            Err(e) => {
                error!(error = %e, "received malformed JSON; printing raw message");
                (false, frame.to_string())
            }
        };

        let Ok(mut out) = self.out.lock() else {
            error!("output writer poisoned");
            return valid;
        };
        if let Err(e) = writeln!(out, "{text}\n").and_then(|_| out.flush()) {
            error!(error = %e, "failed to write frame");
        }
        valid
    }

    /// Consume the printer and return the writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send + 'static> FrameHandler for FramePrinter<W> {
    fn handle_frame(&self, frame: &str) {
        self.print_frame(frame);
    }
}
