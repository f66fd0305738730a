pub mod derive;
pub mod domain;
pub mod ports;

pub use derive::derive_flags;
pub use domain::{
    Attendance, Coordinates, DerivedFlags, EventRecord, Identity, Interactions, NewWaypoint,
    Waypoint, WaypointDraft, WaypointKind, WaypointRecord,
};
pub use ports::{EventService, IdentityProvider, PortError, PortResult, WaypointService};
