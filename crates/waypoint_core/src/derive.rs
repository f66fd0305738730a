//! crates/waypoint_core/src/derive.rs
//!
//! Per-viewer derivation. Liked/bookmarked/owner flags are recomputed from the
//! server's membership lists after every fetch and never stored on their own.

use crate::domain::{DerivedFlags, Identity, Waypoint, WaypointRecord};

/// Computes the viewer's relationship to a record.
///
/// Without a viewer every flag is false. Ownership compares the author's username,
/// because that is the only identity signal the waypoint records carry.
pub fn derive_flags(record: &WaypointRecord, viewer: Option<&Identity>) -> DerivedFlags {
    let Some(viewer) = viewer else {
        return DerivedFlags::default();
    };

    DerivedFlags {
        is_liked: record.liked_users.iter().any(|u| u == &viewer.user_id),
        is_bookmarked: record.bookmarked_users.iter().any(|u| u == &viewer.user_id),
        is_owner: !viewer.username.is_empty() && record.author == viewer.username,
    }
}

impl Waypoint {
    /// Personalizes a record for the viewer. Attendance is filled in later, and only
    /// for event-type waypoints.
    pub fn from_record(record: WaypointRecord, viewer: Option<&Identity>) -> Self {
        let flags = derive_flags(&record, viewer);
        Self {
            record,
            flags,
            attendance: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Coordinates, Interactions, WaypointKind};

    fn record(author: &str, liked: &[&str], bookmarked: &[&str]) -> WaypointRecord {
        WaypointRecord {
            id: "1".to_string(),
            coords: Coordinates::new(43.6577, -79.3788),
            title: "Free pizza".to_string(),
            description: "Third floor lounge".to_string(),
            kind: WaypointKind::Food,
            author: author.to_string(),
            created_ago: "5m ago".to_string(),
            interactions: Interactions {
                likes: liked.len() as u32,
                bookmarks: bookmarked.len() as u32,
            },
            liked_users: liked.iter().map(|s| s.to_string()).collect(),
            bookmarked_users: bookmarked.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn viewer(id: &str, name: &str) -> Identity {
        Identity {
            user_id: id.to_string(),
            username: name.to_string(),
        }
    }

    #[test]
    fn flags_follow_membership_lists() {
        let bob = viewer("42", "bob");
        let flags = derive_flags(&record("alice", &["42"], &["7"]), Some(&bob));
        assert!(flags.is_liked);
        assert!(!flags.is_bookmarked);
        assert!(!flags.is_owner);
    }

    #[test]
    fn ownership_compares_username() {
        let alice = viewer("7", "alice");
        let flags = derive_flags(&record("alice", &[], &[]), Some(&alice));
        assert!(flags.is_owner);
    }

    #[test]
    fn anonymous_viewer_gets_no_flags() {
        let flags = derive_flags(&record("", &["42"], &["42"]), None);
        assert_eq!(flags, DerivedFlags::default());
    }

    #[test]
    fn empty_username_never_owns_anonymous_records() {
        let ghost = viewer("9", "");
        let flags = derive_flags(&record("", &[], &[]), Some(&ghost));
        assert!(!flags.is_owner);
    }
}
