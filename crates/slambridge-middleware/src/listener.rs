//! WebSocket connection listener.
//!
//! Accepts sensor clients and feeds each text frame they send to a
//! [`FrameHandler`], one frame at a time, in arrival order. Every connection
//! runs on its own task so a slow or broken client never holds up the others.
//! The protocol is one-directional: nothing is written back to clients except
//! the closing handshake at shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use slambridge_types::BridgeError;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Consumer of inbound text frames.
///
/// `handle_frame` is called synchronously from the connection task; it must
/// not block and must swallow its own failures.
pub trait FrameHandler: Send + Sync + 'static {
    fn handle_frame(&self, frame: &str);
}

/// A bound, not yet running, WebSocket listener.
pub struct Listener<H> {
    listener: TcpListener,
    handler: Arc<H>,
}

impl<H: FrameHandler> Listener<H> {
    /// Bind a TCP listener on `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Bind`] if the address cannot be bound.
    pub async fn bind(addr: SocketAddr, handler: Arc<H>) -> Result<Self, BridgeError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| BridgeError::Bind(format!("ws bind error on {addr}: {e}")))?;
        Ok(Self { listener, handler })
    }

    /// Address actually bound; differs from the requested one for port `0`.
    pub fn local_addr(&self) -> Result<SocketAddr, BridgeError> {
        self.listener
            .local_addr()
            .map_err(|e| BridgeError::Transport(e.to_string()))
    }

    /// Accept connections until `shutdown` flips to `true` (or its sender is
    /// dropped).
    ///
    /// On shutdown the listener stops accepting, every connection finishes
    /// the frame it is handling and is closed, and all connection tasks are
    /// joined before this returns.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), BridgeError> {
        if let Ok(addr) = self.local_addr() {
            info!(%addr, "sensor websocket listening");
        }

        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let handler = Arc::clone(&self.handler);
                        let shutdown = shutdown.clone();
                        connections.spawn(
                            handle_connection(stream, handler, shutdown)
                                .instrument(info_span!("connection", %peer)),
                        );
                    }
                    Err(e) => {
                        error!(error = %e, "ws accept error");
                    }
                },
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "connection task failed");
                    }
                }
            }
        }

        info!(open = connections.len(), "listener stopping; draining connections");
        while let Some(joined) = connections.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "connection task failed");
            }
        }
        Ok(())
    }
}

async fn handle_connection<H: FrameHandler>(
    stream: TcpStream,
    handler: Arc<H>,
    mut shutdown: watch::Receiver<bool>,
) {
    let ws_stream = tokio::select! {
        _ = wait_for_shutdown(&mut shutdown) => {
            debug!("shutdown before ws handshake completed");
            return;
        }
        accepted = accept_async(stream) => match accepted {
            Ok(ws) => ws,
            Err(e) => {
                warn!(error = %e, "ws handshake failed");
                return;
            }
        },
    };
    info!("client connected");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    loop {
        tokio::select! {
            _ = wait_for_shutdown(&mut shutdown) => {
                if let Err(e) = ws_tx.close().await {
                    debug!(error = %e, "close handshake failed");
                }
                break;
            }
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => handler.handle_frame(text.as_str()),
                Some(Ok(Message::Binary(data))) => {
                    debug!(len = data.len(), "ignoring binary frame");
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "ws transport error");
                    break;
                }
            }
        }
    }

    info!("client disconnected");
}

/// Resolve once shutdown has been requested or the sender is gone.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|&stop| stop).await;
}
