//! crates/waypoint_core/src/domain.rs
//!
//! Defines the pure, core data structures for the waypoint feature.
//! These structs are independent of any transport or serialization format.

use crate::ports::{PortError, PortResult};

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// True when both axes differ by strictly less than `epsilon` degrees.
    pub fn is_within(&self, other: &Coordinates, epsilon: f64) -> bool {
        (self.latitude - other.latitude).abs() < epsilon
            && (self.longitude - other.longitude).abs() < epsilon
    }

    /// Planar distance in degrees. Only used to rank candidates that are already close.
    pub fn degree_distance(&self, other: &Coordinates) -> f64 {
        (self.latitude - other.latitude).hypot(self.longitude - other.longitude)
    }
}

/// The category of a waypoint. Drives the icon and whether event behaviour applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaypointKind {
    Food,
    Study,
    Group,
    Social,
    Event,
    Other,
}

impl WaypointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaypointKind::Food => "food",
            WaypointKind::Study => "study",
            WaypointKind::Group => "group",
            WaypointKind::Social => "social",
            WaypointKind::Event => "event",
            WaypointKind::Other => "other",
        }
    }

    /// Parses the wire name. Unknown names fall back to `Other` so a new server-side
    /// category never hides a pin.
    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "food" => WaypointKind::Food,
            "study" => WaypointKind::Study,
            "group" => WaypointKind::Group,
            "social" => WaypointKind::Social,
            "event" => WaypointKind::Event,
            _ => WaypointKind::Other,
        }
    }
}

/// Aggregate social counters of a waypoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Interactions {
    pub likes: u32,
    pub bookmarks: u32,
}

/// A waypoint as the server describes it, normalized but not yet personalized.
///
/// The membership lists are kept so that per-viewer flags can be re-derived after
/// every fetch instead of being stored.
#[derive(Debug, Clone, PartialEq)]
pub struct WaypointRecord {
    pub id: String,
    pub coords: Coordinates,
    pub title: String,
    pub description: String,
    pub kind: WaypointKind,
    pub author: String,
    pub created_ago: String,
    pub interactions: Interactions,
    pub liked_users: Vec<String>,
    pub bookmarked_users: Vec<String>,
}

/// Per-viewer flags computed from a `WaypointRecord`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DerivedFlags {
    pub is_liked: bool,
    pub is_bookmarked: bool,
    pub is_owner: bool,
}

/// Live RSVP data for an event-type waypoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Attendance {
    pub is_attending: bool,
    pub attendees_count: u32,
}

/// A waypoint as the engine presents it to the viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    pub record: WaypointRecord,
    pub flags: DerivedFlags,
    /// Only populated for event-type waypoints after cross-referencing.
    pub attendance: Option<Attendance>,
}

impl Waypoint {
    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn is_event(&self) -> bool {
        self.record.kind == WaypointKind::Event
    }
}

/// An entry of the separate events collection.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub id: String,
    pub title: String,
    pub coords: Coordinates,
    pub attendees_count: u32,
}

/// The signed-in viewer, as decoded from the bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
}

/// The creation form filled in while a placement is awaiting submission.
#[derive(Debug, Clone, PartialEq)]
pub struct WaypointDraft {
    pub title: String,
    pub description: String,
    pub kind: WaypointKind,
}

impl WaypointDraft {
    pub fn new(title: impl Into<String>, description: impl Into<String>, kind: WaypointKind) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            kind,
        }
    }

    /// Rejects blank titles or descriptions before anything is sent.
    pub fn validate(&self) -> PortResult<()> {
        if self.title.trim().is_empty() {
            return Err(PortError::Validation("title must not be empty".to_string()));
        }
        if self.description.trim().is_empty() {
            return Err(PortError::Validation(
                "description must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Everything the waypoint service needs to create a pin.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWaypoint {
    pub location: Coordinates,
    pub draft: WaypointDraft,
    pub ttl_hours: u32,
}
