//! services/waypoints/src/lib.rs
//!
//! The campus waypoint client: HTTP adapters for the waypoint and event APIs, the
//! state engine behind the map view, and the message bridge to the map renderer.

pub mod adapters;
pub mod bridge;
pub mod config;
pub mod engine;
pub mod error;

#[cfg(test)]
mod testing;
