//! services/waypoints/src/bridge/protocol.rs
//!
//! Defines the message protocol between the host and the embedded map renderer,
//! plus the commands and notices exchanged with the host's own UI.
//!
//! The map vocabulary is closed: any renderer that speaks these messages can be
//! swapped in without touching the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use waypoint_core::domain::{Coordinates, Waypoint, WaypointDraft, WaypointKind};

//=========================================================================================
// Messages Sent FROM the Map TO the Host
//=========================================================================================

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MapMessage {
    /// The renderer finished loading and wants the current view.
    MapReady,

    /// The user clicked the map.
    MapClick { lat: f64, lng: f64 },

    Like { waypoint_id: String },

    Bookmark { waypoint_id: String },

    JoinEvent { waypoint_id: String },

    /// The user asked to delete a pin. The host must confirm before acting.
    Delete { waypoint_id: String },
}

//=========================================================================================
// Messages Sent FROM the Host TO the Map
//=========================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HostMessage {
    /// Replaces every marker on the map.
    UpdateWaypoints { waypoints: Vec<MapMarker> },

    /// Switches the crosshair cursor used while picking a location.
    SetPlacementMode { enabled: bool },

    /// Re-centres on a waypoint, optionally opening its popup.
    NavigateToWaypoint {
        waypoint: MapMarker,
        should_open_popup: bool,
    },
}

/// Everything the renderer needs to draw one marker and its popup.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MapMarker {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub author: String,
    pub created_ago: String,
    pub likes: u32,
    pub bookmarks: u32,
    pub is_liked: bool,
    pub is_bookmarked: bool,
    pub is_owner: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_attending: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendees_count: Option<u32>,
    /// True while one of this marker's actions is in flight; buttons should be disabled.
    #[serde(default)]
    pub action_pending: bool,
}

impl MapMarker {
    pub fn from_waypoint(waypoint: &Waypoint, action_pending: bool) -> Self {
        let record = &waypoint.record;
        Self {
            id: record.id.clone(),
            lat: record.coords.latitude,
            lng: record.coords.longitude,
            title: record.title.clone(),
            description: record.description.clone(),
            kind: record.kind.as_str().to_string(),
            author: record.author.clone(),
            created_ago: record.created_ago.clone(),
            likes: record.interactions.likes,
            bookmarks: record.interactions.bookmarks,
            is_liked: waypoint.flags.is_liked,
            is_bookmarked: waypoint.flags.is_bookmarked,
            is_owner: waypoint.flags.is_owner,
            is_attending: waypoint.attendance.map(|a| a.is_attending),
            attendees_count: waypoint.attendance.map(|a| a.attendees_count),
            action_pending,
        }
    }
}

//=========================================================================================
// Host UI Commands and Notices
//=========================================================================================

/// Commands issued by the host UI (buttons, forms, dialogs) rather than the map.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum UiCommand {
    SignIn { token: String },
    SignOut,
    Refresh,
    TogglePlacement,
    SubmitWaypoint {
        title: String,
        description: String,
        #[serde(rename = "type")]
        kind: String,
    },
    CancelPlacement,
    OpenSaved,
    NextSaved,
    PreviousSaved,
    CloseSaved,
    ConfirmDelete { waypoint_id: String },
    ConfirmLeaveEvent { waypoint_id: String },
}

impl UiCommand {
    /// Builds the creation form out of a `SubmitWaypoint` command.
    pub fn draft(title: &str, description: &str, kind: &str) -> WaypointDraft {
        WaypointDraft::new(title, description, WaypointKind::from_wire(kind))
    }
}

/// An action the host must confirm with the user before the engine performs it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ConfirmAction {
    Delete,
    LeaveEvent,
}

/// Which toggle a `Toggled` notice reports.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ToggleKind {
    Like,
    Bookmark,
    Attend,
}

/// Results the host UI displays. The engine never shows UI on its own.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "notice", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum UiNotice {
    SignedIn { username: String },
    SignedOut,
    Refreshed { count: usize },
    /// A location was picked; the creation form should open.
    LocationPicked { lat: f64, lng: f64 },
    PlacementChanged { enabled: bool },
    Created { waypoint_id: String },
    Deleted { waypoint_id: String },
    Toggled {
        waypoint_id: String,
        toggle: ToggleKind,
        active: bool,
    },
    ConfirmationRequired {
        action: ConfirmAction,
        waypoint_id: String,
    },
    /// `taken_at` is when the browsed bookmark list was fetched.
    SavedPosition {
        cursor: usize,
        total: usize,
        taken_at: DateTime<Utc>,
    },
    SavedClosed,
    /// The viewer must sign in before retrying.
    AuthRequired,
    Error { message: String },
}

impl From<Coordinates> for UiNotice {
    fn from(location: Coordinates) -> Self {
        UiNotice::LocationPicked {
            lat: location.latitude,
            lng: location.longitude,
        }
    }
}

/// Any line the host accepts on its inbound channel.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Inbound {
    Map(MapMessage),
    Ui(UiCommand),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::waypoint;
    use serde_json::json;

    #[test]
    fn map_messages_use_the_bridge_vocabulary() {
        let click: MapMessage =
            serde_json::from_value(json!({ "type": "mapClick", "lat": 43.6, "lng": -79.3 })).unwrap();
        assert_eq!(click, MapMessage::MapClick { lat: 43.6, lng: -79.3 });

        let join: MapMessage =
            serde_json::from_value(json!({ "type": "joinEvent", "waypointId": "w9" })).unwrap();
        assert_eq!(join, MapMessage::JoinEvent { waypoint_id: "w9".to_string() });
    }

    #[test]
    fn host_messages_serialize_in_camel_case() {
        let message = HostMessage::SetPlacementMode { enabled: true };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({ "type": "setPlacementMode", "enabled": true })
        );

        let marker = MapMarker::from_waypoint(&waypoint("w1", "alice"), false);
        let message = HostMessage::NavigateToWaypoint {
            waypoint: marker,
            should_open_popup: true,
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "navigateToWaypoint");
        assert_eq!(value["shouldOpenPopup"], true);
        assert_eq!(value["waypoint"]["createdAgo"], "1h ago");
        assert!(value["waypoint"].get("isAttending").is_none());
    }

    #[test]
    fn inbound_lines_are_told_apart() {
        let map: Inbound = serde_json::from_str(r#"{"type":"mapReady"}"#).unwrap();
        assert_eq!(map, Inbound::Map(MapMessage::MapReady));

        let ui: Inbound = serde_json::from_str(
            r#"{"command":"submitWaypoint","title":"Pizza","description":"Free","type":"food"}"#,
        )
        .unwrap();
        assert_eq!(
            ui,
            Inbound::Ui(UiCommand::SubmitWaypoint {
                title: "Pizza".to_string(),
                description: "Free".to_string(),
                kind: "food".to_string(),
            })
        );
    }
}
