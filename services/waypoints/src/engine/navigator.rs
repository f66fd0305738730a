//! services/waypoints/src/engine/navigator.rs
//!
//! Sequential browsing of the viewer's bookmarks.

use chrono::{DateTime, Utc};
use waypoint_core::domain::Waypoint;

/// A snapshot of the bookmark set and a circular cursor into it.
///
/// The snapshot is never re-fetched while browsing; removing a bookmark mid-browse
/// shows up the next time browsing is opened.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedNavigation {
    items: Vec<Waypoint>,
    cursor: usize,
    taken_at: DateTime<Utc>,
}

impl SavedNavigation {
    pub fn new(items: Vec<Waypoint>) -> Self {
        Self {
            items,
            cursor: 0,
            taken_at: Utc::now(),
        }
    }

    pub fn items(&self) -> &[Waypoint] {
        &self.items
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn current(&self) -> Option<&Waypoint> {
        self.items.get(self.cursor)
    }

    /// Advances with wraparound. Does nothing on an empty snapshot.
    pub fn next(&mut self) -> Option<&Waypoint> {
        if self.items.is_empty() {
            return None;
        }
        self.cursor = (self.cursor + 1) % self.items.len();
        self.current()
    }

    /// Steps back with wraparound. Does nothing on an empty snapshot.
    pub fn previous(&mut self) -> Option<&Waypoint> {
        if self.items.is_empty() {
            return None;
        }
        self.cursor = (self.cursor + self.items.len() - 1) % self.items.len();
        self.current()
    }
}
