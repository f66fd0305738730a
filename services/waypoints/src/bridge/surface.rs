//! services/waypoints/src/bridge/surface.rs
//!
//! The host side of the map bridge. The map is a dumb renderer: it draws what it
//! is sent and owns no waypoint data.

use tokio::sync::mpsc;
use tracing::debug;

use crate::bridge::protocol::HostMessage;

/// Anything that can deliver host messages to a map renderer.
pub trait MapSurface: Send + Sync {
    fn send(&self, message: HostMessage);
}

/// A `MapSurface` that forwards every message into an unbounded channel.
///
/// The receiving end decides how messages reach the renderer (a WebView bridge,
/// a socket, stdout).
#[derive(Clone)]
pub struct ChannelSurface {
    tx: mpsc::UnboundedSender<HostMessage>,
}

impl ChannelSurface {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HostMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MapSurface for ChannelSurface {
    fn send(&self, message: HostMessage) {
        if self.tx.send(message).is_err() {
            debug!("Map surface detached; dropping host message.");
        }
    }
}
