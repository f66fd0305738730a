//! services/waypoints/src/adapters/wire.rs
//!
//! "Impure" wire records of the waypoint and event services, and their conversion
//! into the core domain types.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use tracing::warn;
use waypoint_core::domain::{
    Coordinates, EventRecord, Interactions, NewWaypoint, WaypointKind, WaypointRecord,
};

//=========================================================================================
// Identifier Helpers
//=========================================================================================

/// Ids arrive as strings from some endpoints and as integers from others.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(String::from)
}

fn strings_or_numbers<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<RawId>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(String::from)
        .collect())
}

//=========================================================================================
// Waypoint Records
//=========================================================================================

#[derive(Debug, Default, Deserialize)]
pub(crate) struct InteractionCounts {
    #[serde(default)]
    likes: u32,
    #[serde(default)]
    bookmarks: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WaypointDto {
    #[serde(alias = "_id", deserialize_with = "string_or_number")]
    id: String,
    #[serde(alias = "lat")]
    latitude: f64,
    #[serde(alias = "lng")]
    longitude: f64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default, alias = "author_username")]
    author: String,
    #[serde(default, alias = "time", alias = "createdAgo")]
    created_ago: String,
    #[serde(default)]
    interactions: Option<InteractionCounts>,
    #[serde(default)]
    likes: Option<u32>,
    #[serde(default)]
    bookmarks: Option<u32>,
    #[serde(default, deserialize_with = "strings_or_numbers")]
    liked_users: Vec<String>,
    #[serde(default, deserialize_with = "strings_or_numbers")]
    bookmarked_users: Vec<String>,
}

impl WaypointDto {
    pub(crate) fn to_domain(self) -> WaypointRecord {
        // Counters may come nested, flat, or not at all; the lists are the fallback.
        let nested = self.interactions.unwrap_or_default();
        let likes = self
            .likes
            .unwrap_or(nested.likes)
            .max(self.liked_users.len() as u32);
        let bookmarks = self
            .bookmarks
            .unwrap_or(nested.bookmarks)
            .max(self.bookmarked_users.len() as u32);

        WaypointRecord {
            id: self.id,
            coords: Coordinates::new(self.latitude, self.longitude),
            title: self.title,
            description: self.description,
            kind: WaypointKind::from_wire(&self.kind),
            author: self.author,
            created_ago: self.created_ago,
            interactions: Interactions { likes, bookmarks },
            liked_users: self.liked_users,
            bookmarked_users: self.bookmarked_users,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WaypointListDto {
    #[serde(default)]
    waypoints: Vec<serde_json::Value>,
}

impl WaypointListDto {
    /// Converts the list, keeping the first occurrence of every id. A record that
    /// does not decode is dropped on its own instead of failing the list.
    pub(crate) fn to_domain(self) -> Vec<WaypointRecord> {
        let mut seen = HashSet::new();
        self.waypoints
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<WaypointDto>(raw) {
                Ok(dto) => Some(dto),
                Err(e) => {
                    warn!("Skipping a malformed waypoint record: {}", e);
                    None
                }
            })
            .filter(|dto| seen.insert(dto.id.clone()))
            .map(WaypointDto::to_domain)
            .collect()
    }
}

/// The create endpoint answers either with the record or with `{ "waypoint": record }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum CreatedDto {
    Wrapped { waypoint: WaypointDto },
    Bare(WaypointDto),
}

impl CreatedDto {
    pub(crate) fn to_domain(self) -> WaypointRecord {
        match self {
            CreatedDto::Wrapped { waypoint } | CreatedDto::Bare(waypoint) => waypoint.to_domain(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateWaypointBody<'a> {
    title: &'a str,
    description: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    latitude: f64,
    longitude: f64,
    expires_in_hours: u32,
}

impl<'a> From<&'a NewWaypoint> for CreateWaypointBody<'a> {
    fn from(waypoint: &'a NewWaypoint) -> Self {
        Self {
            title: waypoint.draft.title.trim(),
            description: waypoint.draft.description.trim(),
            kind: waypoint.draft.kind.as_str(),
            latitude: waypoint.location.latitude,
            longitude: waypoint.location.longitude,
            expires_in_hours: waypoint.ttl_hours,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LikedDto {
    pub(crate) liked: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BookmarkedDto {
    pub(crate) bookmarked: bool,
}

//=========================================================================================
// Event Records
//=========================================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct EventDto {
    #[serde(alias = "_id", deserialize_with = "string_or_number")]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(alias = "lat")]
    latitude: f64,
    #[serde(alias = "lng")]
    longitude: f64,
    #[serde(default)]
    attendees_count: u32,
}

impl EventDto {
    fn to_domain(self) -> EventRecord {
        EventRecord {
            id: self.id,
            title: self.title,
            coords: Coordinates::new(self.latitude, self.longitude),
            attendees_count: self.attendees_count,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventFeedDto {
    #[serde(default)]
    events: Vec<serde_json::Value>,
}

impl EventFeedDto {
    /// Events without coordinates cannot be matched to a pin, so they are skipped
    /// rather than failing the whole feed.
    pub(crate) fn to_domain(self) -> Vec<EventRecord> {
        self.events
            .into_iter()
            .filter_map(|raw| serde_json::from_value::<EventDto>(raw).ok())
            .map(EventDto::to_domain)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AttendingDto {
    pub(crate) attending: bool,
}

/// Pulls a human-readable message out of an error body.
pub(crate) fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        error: Option<String>,
        detail: Option<String>,
    }

    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.error).or(b.detail))
        .unwrap_or_else(|| body.trim().to_string())
}
