//! services/waypoints/src/engine/state.rs
//!
//! Defines the engine's settings, its interaction mode and the view it publishes.

use crate::engine::cross_ref::DEFAULT_EVENT_MATCH_EPSILON;
use crate::engine::navigator::SavedNavigation;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::time::Duration;
use waypoint_core::domain::{Coordinates, Waypoint};

//=========================================================================================
// Settings
//=========================================================================================

/// Tunables the engine reads on every command.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub campus_radius_km: f64,
    pub waypoint_ttl_hours: u32,
    /// Coordinate tolerance, in degrees, when matching a waypoint to its event.
    pub event_match_epsilon: f64,
    pub event_feed_limit: u32,
    /// How long the map gets to finish panning before a popup is opened.
    pub popup_settle: Duration,
    pub auto_open_popup: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            campus_radius_km: 5.0,
            waypoint_ttl_hours: 168,
            event_match_epsilon: DEFAULT_EVENT_MATCH_EPSILON,
            event_feed_limit: 100,
            popup_settle: Duration::from_millis(600),
            auto_open_popup: true,
        }
    }
}

//=========================================================================================
// Interaction Mode
//=========================================================================================

/// A picked location waiting for the creation form to be submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPlacement {
    pub location: Coordinates,
    /// The last submission failure, kept so the form can show it and retry.
    pub last_error: Option<String>,
}

/// What the next map click or navigation command means.
///
/// Placement and saved browsing are variants of one enum, so the engine can never be
/// in both at once.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InteractionMode {
    #[default]
    Idle,
    Placing,
    AwaitingForm(PendingPlacement),
    BrowsingSaved(SavedNavigation),
}

impl InteractionMode {
    /// True while the placement flow owns map clicks or the creation form is open.
    pub fn is_placing(&self) -> bool {
        matches!(self, InteractionMode::Placing | InteractionMode::AwaitingForm(_))
    }

    pub fn pending_location(&self) -> Option<Coordinates> {
        match self {
            InteractionMode::AwaitingForm(pending) => Some(pending.location),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            InteractionMode::Idle => "idle",
            InteractionMode::Placing => "placing",
            InteractionMode::AwaitingForm(_) => "awaiting_form",
            InteractionMode::BrowsingSaved(_) => "browsing_saved",
        }
    }
}

//=========================================================================================
// Results and Views
//=========================================================================================

/// What happened to a refresh request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The visible set was replaced with this many waypoints.
    Applied { count: usize },
    /// A newer refresh was requested before this one could apply; its result wins.
    Superseded,
    /// The engine was shut down; nothing was applied.
    Abandoned,
}

/// Where the saved-navigation cursor sits after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedCursor {
    pub cursor: usize,
    pub total: usize,
    /// When the bookmark snapshot being browsed was fetched.
    pub taken_at: DateTime<Utc>,
}

impl SavedCursor {
    pub(crate) fn of(navigation: &SavedNavigation) -> Self {
        Self {
            cursor: navigation.cursor(),
            total: navigation.len(),
            taken_at: navigation.taken_at(),
        }
    }
}

/// A point-in-time copy of everything a UI needs to render the waypoint view.
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    pub waypoints: Vec<Waypoint>,
    pub mode: InteractionMode,
    /// Waypoint ids whose like/bookmark/attend call is still running.
    pub pending: HashSet<String>,
}

impl EngineSnapshot {
    pub fn waypoint(&self, id: &str) -> Option<&Waypoint> {
        self.waypoints.iter().find(|w| w.id() == id)
    }

    /// Whether the like/bookmark/join affordances of a waypoint should be enabled.
    pub fn can_interact(&self, id: &str) -> bool {
        !self.pending.contains(id)
    }

    /// The delete affordance is only offered to the author.
    pub fn can_delete(&self, id: &str) -> bool {
        self.waypoint(id).is_some_and(|w| w.flags.is_owner)
    }
}

/// The mutable state guarded by the engine's lock.
#[derive(Debug, Default)]
pub(crate) struct EngineState {
    pub waypoints: Vec<Waypoint>,
    pub mode: InteractionMode,
    /// Bumped whenever the saved-navigation cursor moves or browsing ends, so a
    /// delayed popup can tell whether it is still wanted.
    pub nav_epoch: u64,
    /// Bumped by every local change to the visible set. A refresh that fetched under
    /// an older value must not apply.
    pub local_epoch: u64,
}

impl EngineState {
    pub fn find(&self, id: &str) -> Option<&Waypoint> {
        self.waypoints.iter().find(|w| w.id() == id)
    }

    /// Inserts or replaces by id.
    pub fn merge(&mut self, waypoint: Waypoint) {
        match self.waypoints.iter_mut().find(|w| w.id() == waypoint.id()) {
            Some(existing) => *existing = waypoint,
            None => self.waypoints.push(waypoint),
        }
        self.local_epoch += 1;
    }

    pub fn remove(&mut self, id: &str) {
        self.waypoints.retain(|w| w.id() != id);
        self.local_epoch += 1;
    }
}
