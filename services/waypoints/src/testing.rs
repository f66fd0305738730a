//! services/waypoints/src/testing.rs
//!
//! In-memory fakes of the ports and small builders shared by the unit tests.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use waypoint_core::domain::{
    Coordinates, EventRecord, Identity, Interactions, NewWaypoint, Waypoint, WaypointKind,
    WaypointRecord,
};
use waypoint_core::ports::{
    EventService, IdentityProvider, PortError, PortResult, WaypointService,
};

use crate::bridge::protocol::HostMessage;
use crate::bridge::surface::ChannelSurface;
use crate::engine::{EngineSettings, WaypointEngine};

//=========================================================================================
// Builders
//=========================================================================================

pub fn viewer(user_id: &str, username: &str) -> Identity {
    Identity {
        user_id: user_id.to_string(),
        username: username.to_string(),
    }
}

pub fn record(id: &str, author: &str, kind: WaypointKind, coords: Coordinates) -> WaypointRecord {
    WaypointRecord {
        id: id.to_string(),
        coords,
        title: format!("Pin {}", id),
        description: "Somewhere on campus".to_string(),
        kind,
        author: author.to_string(),
        created_ago: "1h ago".to_string(),
        interactions: Interactions::default(),
        liked_users: Vec::new(),
        bookmarked_users: Vec::new(),
    }
}

pub fn waypoint(id: &str, author: &str) -> Waypoint {
    Waypoint::from_record(
        record(id, author, WaypointKind::Food, Coordinates::new(43.6577, -79.3788)),
        None,
    )
}

/// Two pins near the quad: w1 belongs to alice and is liked by u-bob, w2 belongs to bob.
pub fn campus_records() -> Vec<WaypointRecord> {
    let mut w1 = record("w1", "alice", WaypointKind::Food, Coordinates::new(43.6577, -79.3788));
    w1.liked_users = vec!["u-bob".to_string()];
    w1.interactions.likes = 1;
    let w2 = record("w2", "bob", WaypointKind::Study, Coordinates::new(43.659, -79.38));
    vec![w1, w2]
}

pub fn event_record(id: &str, title: &str, coords: Coordinates) -> WaypointRecord {
    WaypointRecord {
        title: title.to_string(),
        ..record(id, "alice", WaypointKind::Event, coords)
    }
}

pub fn event_waypoint(id: &str, title: &str, coords: Coordinates) -> Waypoint {
    Waypoint::from_record(event_record(id, title, coords), None)
}

pub fn event(id: &str, title: &str, coords: Coordinates, attendees_count: u32) -> EventRecord {
    EventRecord {
        id: id.to_string(),
        title: title.to_string(),
        coords,
        attendees_count,
    }
}

//=========================================================================================
// Gate
//=========================================================================================

/// Holds a fake call open until the test releases it.
#[derive(Default)]
pub struct Gate {
    entered: Notify,
    release: Notify,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn open(&self) {
        self.release.notify_one();
    }

    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

//=========================================================================================
// Fake Waypoint Service
//=========================================================================================

/// A server-side store that applies toggles to membership lists for one caller.
pub struct FakeWaypoints {
    caller: Identity,
    records: Mutex<Vec<WaypointRecord>>,
    calls: Mutex<Vec<String>>,
    created: AtomicUsize,
    fail_list: AtomicBool,
    fail_create: Mutex<Option<PortError>>,
    list_gate: Mutex<Option<Arc<Gate>>>,
    action_gate: Mutex<Option<Arc<Gate>>>,
}

impl FakeWaypoints {
    pub fn new(caller: Identity, records: Vec<WaypointRecord>) -> Self {
        Self {
            caller,
            records: Mutex::new(records),
            calls: Mutex::new(Vec::new()),
            created: AtomicUsize::new(0),
            fail_list: AtomicBool::new(false),
            fail_create: Mutex::new(None),
            list_gate: Mutex::new(None),
            action_gate: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_next_create(&self, error: PortError) {
        *self.fail_create.lock().unwrap() = Some(error);
    }

    /// The next list call blocks until the gate opens.
    pub fn hold_next_list(&self, gate: Arc<Gate>) {
        *self.list_gate.lock().unwrap() = Some(gate);
    }

    /// The next like/bookmark call blocks until the gate opens.
    pub fn hold_next_action(&self, gate: Arc<Gate>) {
        *self.action_gate.lock().unwrap() = Some(gate);
    }

    pub fn replace_all(&self, records: Vec<WaypointRecord>) {
        *self.records.lock().unwrap() = records;
    }

    pub fn stored(&self, id: &str) -> Option<WaypointRecord> {
        self.records.lock().unwrap().iter().find(|r| r.id == id).cloned()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn toggle_membership(&self, id: &str, bookmark: bool) -> PortResult<bool> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| PortError::NotFound(id.to_string()))?;
        let (members, count) = if bookmark {
            (&mut record.bookmarked_users, &mut record.interactions.bookmarks)
        } else {
            (&mut record.liked_users, &mut record.interactions.likes)
        };
        match members.iter().position(|u| u == &self.caller.user_id) {
            Some(index) => {
                members.remove(index);
                *count -= 1;
                Ok(false)
            }
            None => {
                members.push(self.caller.user_id.clone());
                *count += 1;
                Ok(true)
            }
        }
    }
}

fn take_gate(slot: &Mutex<Option<Arc<Gate>>>) -> Option<Arc<Gate>> {
    slot.lock().unwrap().take()
}

#[async_trait]
impl WaypointService for FakeWaypoints {
    async fn list_near_campus(&self, radius_km: f64) -> PortResult<Vec<WaypointRecord>> {
        self.log(format!("list:{}", radius_km));
        let gate = take_gate(&self.list_gate);
        let snapshot = self.records.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(PortError::Network("campus unreachable".to_string()));
        }
        Ok(snapshot)
    }

    async fn create(&self, waypoint: &NewWaypoint) -> PortResult<WaypointRecord> {
        self.log(format!("create:{}", waypoint.draft.title));
        if let Some(error) = self.fail_create.lock().unwrap().take() {
            return Err(error);
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        let created = WaypointRecord {
            title: waypoint.draft.title.clone(),
            description: waypoint.draft.description.clone(),
            ..record(
                &format!("new-{}", n),
                &self.caller.username,
                waypoint.draft.kind,
                waypoint.location,
            )
        };
        self.records.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn like(&self, waypoint_id: &str) -> PortResult<bool> {
        self.log(format!("like:{}", waypoint_id));
        if let Some(gate) = take_gate(&self.action_gate) {
            gate.pass().await;
        }
        self.toggle_membership(waypoint_id, false)
    }

    async fn bookmark(&self, waypoint_id: &str) -> PortResult<bool> {
        self.log(format!("bookmark:{}", waypoint_id));
        if let Some(gate) = take_gate(&self.action_gate) {
            gate.pass().await;
        }
        self.toggle_membership(waypoint_id, true)
    }

    async fn remove(&self, waypoint_id: &str) -> PortResult<()> {
        self.log(format!("remove:{}", waypoint_id));
        let mut records = self.records.lock().unwrap();
        let index = records
            .iter()
            .position(|r| r.id == waypoint_id)
            .ok_or_else(|| PortError::NotFound(waypoint_id.to_string()))?;
        if records[index].author != self.caller.username {
            return Err(PortError::Forbidden("not the owner".to_string()));
        }
        records.remove(index);
        Ok(())
    }

    async fn list_bookmarked(&self) -> PortResult<Vec<WaypointRecord>> {
        self.log("bookmarks".to_string());
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.bookmarked_users.contains(&self.caller.user_id))
            .cloned()
            .collect())
    }
}

//=========================================================================================
// Fake Event Service
//=========================================================================================

pub struct FakeEvents {
    events: Mutex<Vec<EventRecord>>,
    attending: Mutex<HashSet<String>>,
    failing_status: Mutex<HashSet<String>>,
    fail_feed: AtomicBool,
    feed_calls: AtomicUsize,
    toggles: AtomicUsize,
}

impl FakeEvents {
    pub fn new(events: Vec<EventRecord>) -> Self {
        Self {
            events: Mutex::new(events),
            attending: Mutex::new(HashSet::new()),
            failing_status: Mutex::new(HashSet::new()),
            fail_feed: AtomicBool::new(false),
            feed_calls: AtomicUsize::new(0),
            toggles: AtomicUsize::new(0),
        }
    }

    pub fn set_attending(&self, event_id: &str, attending: bool) {
        let mut set = self.attending.lock().unwrap();
        if attending {
            set.insert(event_id.to_string());
        } else {
            set.remove(event_id);
        }
    }

    pub fn fail_status_for(&self, event_id: &str) {
        self.failing_status
            .lock()
            .unwrap()
            .insert(event_id.to_string());
    }

    pub fn fail_feed(&self, fail: bool) {
        self.fail_feed.store(fail, Ordering::SeqCst);
    }

    pub fn feed_calls(&self) -> usize {
        self.feed_calls.load(Ordering::SeqCst)
    }

    pub fn toggles(&self) -> usize {
        self.toggles.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventService for FakeEvents {
    async fn feed(&self, _limit: u32, _include_past: bool) -> PortResult<Vec<EventRecord>> {
        self.feed_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_feed.load(Ordering::SeqCst) {
            return Err(PortError::Network("events unreachable".to_string()));
        }
        Ok(self.events.lock().unwrap().clone())
    }

    async fn attend_status(&self, event_id: &str) -> PortResult<bool> {
        if self.failing_status.lock().unwrap().contains(event_id) {
            return Err(PortError::NotFound(event_id.to_string()));
        }
        Ok(self.attending.lock().unwrap().contains(event_id))
    }

    async fn toggle_attend(&self, event_id: &str) -> PortResult<bool> {
        self.toggles.fetch_add(1, Ordering::SeqCst);
        let attending = {
            let mut set = self.attending.lock().unwrap();
            if !set.remove(event_id) {
                set.insert(event_id.to_string());
                true
            } else {
                false
            }
        };
        let mut events = self.events.lock().unwrap();
        if let Some(event) = events.iter_mut().find(|e| e.id == event_id) {
            if attending {
                event.attendees_count += 1;
            } else {
                event.attendees_count = event.attendees_count.saturating_sub(1);
            }
        }
        Ok(attending)
    }
}

//=========================================================================================
// Identity and Engine Harness
//=========================================================================================

pub struct StaticIdentity(pub Option<Identity>);

impl IdentityProvider for StaticIdentity {
    fn token(&self) -> Option<String> {
        self.0.as_ref().map(|_| "test-token".to_string())
    }

    fn identity(&self) -> Option<Identity> {
        self.0.clone()
    }
}

pub fn quick_settings() -> EngineSettings {
    EngineSettings {
        popup_settle: Duration::ZERO,
        ..EngineSettings::default()
    }
}

pub struct Harness {
    pub engine: WaypointEngine,
    pub waypoints: Arc<FakeWaypoints>,
    pub events: Arc<FakeEvents>,
    pub map: mpsc::UnboundedReceiver<HostMessage>,
}

impl Harness {
    pub fn new(
        signed_in: Option<Identity>,
        waypoints: FakeWaypoints,
        events: FakeEvents,
        settings: EngineSettings,
    ) -> Self {
        let waypoints = Arc::new(waypoints);
        let events = Arc::new(events);
        let (surface, map) = ChannelSurface::new();
        let engine = WaypointEngine::new(
            waypoints.clone(),
            events.clone(),
            Arc::new(StaticIdentity(signed_in)),
            Arc::new(surface),
            settings,
        );
        Self {
            engine,
            waypoints,
            events,
            map,
        }
    }

    /// Everything sent to the map so far.
    pub fn drain_map(&mut self) -> Vec<HostMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.map.try_recv() {
            messages.push(message);
        }
        messages
    }
}
