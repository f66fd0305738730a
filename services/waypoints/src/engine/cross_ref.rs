//! services/waypoints/src/engine/cross_ref.rs
//!
//! Resolves event-type waypoints to entries of the events collection, which carry
//! the attendance data the waypoint records lack.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};
use waypoint_core::domain::{Attendance, EventRecord, Waypoint, WaypointRecord};
use waypoint_core::ports::{EventService, PortError, PortResult};

/// Default coordinate tolerance in degrees (about 10 m of latitude).
pub const DEFAULT_EVENT_MATCH_EPSILON: f64 = 0.0001;

/// Glyph prepended to the titles of pins that mirror an event.
const EVENT_TITLE_MARKER: char = '\u{1F4C5}';

/// Recovers the event title from a waypoint title by dropping the leading marker.
pub fn event_title(waypoint_title: &str) -> &str {
    let trimmed = waypoint_title.trim_start();
    trimmed
        .strip_prefix(EVENT_TITLE_MARKER)
        .map(|rest| rest.trim_start_matches('\u{FE0F}'))
        .unwrap_or(trimmed)
        .trim()
}

/// Finds the event a waypoint mirrors.
///
/// Requires a case-insensitive title match and both axes within `epsilon`. When
/// several events qualify, the nearest one wins.
pub fn find_matching_event<'a>(
    events: &'a [EventRecord],
    waypoint: &WaypointRecord,
    epsilon: f64,
) -> Option<&'a EventRecord> {
    let wanted = event_title(&waypoint.title).to_lowercase();
    events
        .iter()
        .filter(|event| event.title.trim().to_lowercase() == wanted)
        .filter(|event| event.coords.is_within(&waypoint.coords, epsilon))
        .min_by(|a, b| {
            a.coords
                .degree_distance(&waypoint.coords)
                .total_cmp(&b.coords.degree_distance(&waypoint.coords))
        })
}

/// Looks up live RSVP data for event-type waypoints.
#[derive(Clone)]
pub struct EventCrossReferencer {
    events: Arc<dyn EventService>,
    epsilon: f64,
    feed_limit: u32,
}

impl EventCrossReferencer {
    pub fn new(events: Arc<dyn EventService>, epsilon: f64, feed_limit: u32) -> Self {
        Self {
            events,
            epsilon,
            feed_limit,
        }
    }

    async fn visible_feed(&self) -> PortResult<Vec<EventRecord>> {
        self.events.feed(self.feed_limit, false).await
    }

    /// Resolves one event-type waypoint. Fails with `NotFound` when nothing matches.
    pub async fn resolve(&self, waypoint: &WaypointRecord) -> PortResult<EventRecord> {
        let feed = self.visible_feed().await?;
        find_matching_event(&feed, waypoint, self.epsilon)
            .cloned()
            .ok_or_else(|| {
                PortError::NotFound(format!(
                    "no event matches waypoint '{}'",
                    event_title(&waypoint.title)
                ))
            })
    }

    /// Fills in `attendance` for every event-type waypoint.
    ///
    /// The feed is fetched once per call. Lookup failures never propagate: an
    /// unmatched or failed waypoint gets empty attendance and stays visible.
    pub async fn annotate(&self, waypoints: &mut [Waypoint]) {
        if !waypoints.iter().any(Waypoint::is_event) {
            return;
        }

        let feed = match self.visible_feed().await {
            Ok(feed) => feed,
            Err(e) => {
                warn!("Event feed unavailable, attendance left empty: {}", e);
                Vec::new()
            }
        };

        let mut matched = Vec::new();
        for (index, waypoint) in waypoints.iter_mut().enumerate() {
            if !waypoint.is_event() {
                continue;
            }
            waypoint.attendance = Some(Attendance::default());
            match find_matching_event(&feed, &waypoint.record, self.epsilon) {
                Some(event) => matched.push((index, event.clone())),
                None => debug!("No event matches waypoint {}", waypoint.id()),
            }
        }

        let statuses = join_all(
            matched
                .iter()
                .map(|(_, event)| self.events.attend_status(&event.id)),
        )
        .await;

        for ((index, event), status) in matched.into_iter().zip(statuses) {
            let is_attending = status.unwrap_or_else(|e| {
                warn!("Attend status for event {} unavailable: {}", event.id, e);
                false
            });
            waypoints[index].attendance = Some(Attendance {
                is_attending,
                attendees_count: event.attendees_count,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{event, event_waypoint, waypoint, FakeEvents};
    use assert_matches::assert_matches;
    use waypoint_core::domain::Coordinates;

    #[test]
    fn marker_and_whitespace_are_stripped() {
        assert_eq!(event_title("\u{1F4C5} Hack Night"), "Hack Night");
        assert_eq!(event_title("\u{1F4C5}\u{FE0F}Hack Night "), "Hack Night");
        assert_eq!(event_title("Hack Night"), "Hack Night");
    }

    #[test]
    fn same_title_far_away_is_not_a_match() {
        let pin = event_waypoint("w1", "\u{1F4C5} Hack Night", Coordinates::new(43.6577, -79.3788));
        let far = event("e1", "hack night", Coordinates::new(43.6700, -79.3788), 3);
        assert!(find_matching_event(&[far], &pin.record, DEFAULT_EVENT_MATCH_EPSILON).is_none());
    }

    #[test]
    fn nearer_event_wins_over_first_title_match() {
        let pin = event_waypoint("w1", "\u{1F4C5} Hack Night", Coordinates::new(43.6577, -79.3788));
        let elsewhere = event("e1", "Hack Night", Coordinates::new(43.6610, -79.3950), 40);
        let here = event("e2", "HACK NIGHT", Coordinates::new(43.65771, -79.37881), 12);

        let events = [elsewhere, here];
        let found = find_matching_event(&events, &pin.record, DEFAULT_EVENT_MATCH_EPSILON).unwrap();
        assert_eq!(found.id, "e2");
    }

    #[test]
    fn closest_of_several_within_tolerance_is_chosen() {
        let pin = event_waypoint("w1", "Hack Night", Coordinates::new(0.0, 0.0));
        let a = event("a", "Hack Night", Coordinates::new(0.00008, 0.0), 1);
        let b = event("b", "Hack Night", Coordinates::new(0.00002, 0.0), 2);

        let events = [a, b];
        let found = find_matching_event(&events, &pin.record, DEFAULT_EVENT_MATCH_EPSILON).unwrap();
        assert_eq!(found.id, "b");
    }

    #[tokio::test]
    async fn annotate_fetches_the_feed_once_and_degrades_silently() {
        let here = Coordinates::new(43.6577, -79.3788);
        let events = Arc::new(FakeEvents::new(vec![
            event("e1", "Hack Night", here, 12),
            event("e2", "Board Games", Coordinates::new(43.66, -79.38), 5),
        ]));
        events.set_attending("e1", true);
        events.fail_status_for("e2");

        let cross_ref = EventCrossReferencer::new(events.clone(), DEFAULT_EVENT_MATCH_EPSILON, 100);
        let mut list = vec![
            event_waypoint("w1", "\u{1F4C5} Hack Night", here),
            event_waypoint("w2", "\u{1F4C5} Board Games", Coordinates::new(43.66, -79.38)),
            event_waypoint("w3", "\u{1F4C5} Gone", here),
            waypoint("w4", "alice"),
        ];

        cross_ref.annotate(&mut list).await;

        assert_eq!(events.feed_calls(), 1);
        assert_eq!(
            list[0].attendance,
            Some(Attendance { is_attending: true, attendees_count: 12 })
        );
        assert_eq!(
            list[1].attendance,
            Some(Attendance { is_attending: false, attendees_count: 5 })
        );
        assert_eq!(list[2].attendance, Some(Attendance::default()));
        assert_eq!(list[3].attendance, None);
    }

    #[tokio::test]
    async fn feed_failure_leaves_empty_attendance() {
        let events = Arc::new(FakeEvents::new(vec![]));
        events.fail_feed(true);
        let cross_ref = EventCrossReferencer::new(events, DEFAULT_EVENT_MATCH_EPSILON, 100);

        let mut list = vec![event_waypoint("w1", "Hack Night", Coordinates::new(0.0, 0.0))];
        cross_ref.annotate(&mut list).await;
        assert_eq!(list[0].attendance, Some(Attendance::default()));
    }

    #[tokio::test]
    async fn resolve_reports_missing_events() {
        let events = Arc::new(FakeEvents::new(vec![]));
        let cross_ref = EventCrossReferencer::new(events, DEFAULT_EVENT_MATCH_EPSILON, 100);
        let pin = event_waypoint("w1", "Hack Night", Coordinates::new(0.0, 0.0));

        assert_matches!(cross_ref.resolve(&pin.record).await, Err(PortError::NotFound(_)));
    }
}
