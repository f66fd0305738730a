//! crates/waypoint_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the waypoint engine.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the HTTP backend and of how the viewer signed in.

use async_trait::async_trait;
use crate::domain::{EventRecord, Identity, NewWaypoint, WaypointRecord};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// The error taxonomy shared by every port and by the engine built on top of them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortError {
    /// Transport or connectivity failure; the request may not have reached the server.
    #[error("Network error: {0}")]
    Network(String),
    /// The server answered with a non-2xx status.
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },
    /// A client-side precheck failed before anything was sent.
    #[error("Validation error: {0}")]
    Validation(String),
    /// The action needs a signed-in viewer and none is available.
    #[error("Sign in required")]
    AuthRequired,
    /// The server (or the local ownership check) rejected an owner-only action.
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A toggle for the same waypoint is still running.
    #[error("An action on waypoint {0} is already in progress")]
    InFlight(String),
    /// A destructive action was requested without explicit confirmation.
    #[error("Confirmation required: {0}")]
    ConfirmationRequired(String),
    /// The command does not apply to the current interaction mode.
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// CRUD and interaction calls against the waypoint service.
///
/// Implementations hold no mutable state between calls.
#[async_trait]
pub trait WaypointService: Send + Sync {
    /// All non-expired waypoints within `radius_km` of the campus anchor,
    /// deduplicated by id.
    async fn list_near_campus(&self, radius_km: f64) -> PortResult<Vec<WaypointRecord>>;

    async fn create(&self, waypoint: &NewWaypoint) -> PortResult<WaypointRecord>;

    /// Toggles the viewer's like. Returns the server's resulting state.
    async fn like(&self, waypoint_id: &str) -> PortResult<bool>;

    /// Toggles the viewer's bookmark. Returns the server's resulting state.
    async fn bookmark(&self, waypoint_id: &str) -> PortResult<bool>;

    /// Deletes a waypoint. Fails with `Forbidden` when the viewer is not the owner.
    async fn remove(&self, waypoint_id: &str) -> PortResult<()>;

    /// The viewer's full bookmark set, independent of any radius.
    async fn list_bookmarked(&self) -> PortResult<Vec<WaypointRecord>>;
}

/// Read and RSVP calls against the separate events service.
#[async_trait]
pub trait EventService: Send + Sync {
    /// The viewer's visible event feed.
    async fn feed(&self, limit: u32, include_past: bool) -> PortResult<Vec<EventRecord>>;

    async fn attend_status(&self, event_id: &str) -> PortResult<bool>;

    /// Toggles attendance. Returns whether the viewer is attending afterwards.
    async fn toggle_attend(&self, event_id: &str) -> PortResult<bool>;
}

/// Supplies the bearer token and the identity decoded from it.
///
/// Set at sign-in and cleared at sign-out; every consumer reads the same source.
pub trait IdentityProvider: Send + Sync {
    fn token(&self) -> Option<String>;
    fn identity(&self) -> Option<Identity>;
}

