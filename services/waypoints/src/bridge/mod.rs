//! services/waypoints/src/bridge/mod.rs
//!
//! The message bridge between the engine and an embedded map renderer.

pub mod dispatch;
pub mod protocol;
pub mod surface;

pub use dispatch::BridgeHost;
pub use surface::{ChannelSurface, MapSurface};
