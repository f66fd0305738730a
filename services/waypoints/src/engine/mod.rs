//! services/waypoints/src/engine/mod.rs
//!
//! The waypoint state engine. Owns the visible waypoint set, the interaction mode
//! and the saved-navigation cursor, and pushes every change to the map surface.
//!
//! All network calls happen outside the state lock. Refreshes are serialized and
//! stamped with a ticket so an older response can never overwrite a newer one.

pub mod cross_ref;
pub mod navigator;
pub mod state;

pub use cross_ref::EventCrossReferencer;
pub use navigator::SavedNavigation;
pub use state::{
    EngineSettings, EngineSnapshot, InteractionMode, PendingPlacement, RefreshOutcome,
    SavedCursor,
};

use crate::bridge::protocol::{HostMessage, MapMarker};
use crate::bridge::surface::MapSurface;
use state::EngineState;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use waypoint_core::domain::{
    Coordinates, Identity, NewWaypoint, Waypoint, WaypointDraft, WaypointKind, WaypointRecord,
};
use waypoint_core::ports::{
    EventService, IdentityProvider, PortError, PortResult, WaypointService,
};

/// How many fetches a refresh may lose to a local create or delete before giving up.
const STALE_REFETCH_LIMIT: usize = 3;

//=========================================================================================
// Engine Handle
//=========================================================================================

/// A cheap, cloneable handle to one waypoint view.
#[derive(Clone)]
pub struct WaypointEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    waypoints: Arc<dyn WaypointService>,
    events: Arc<dyn EventService>,
    identity: Arc<dyn IdentityProvider>,
    cross_ref: EventCrossReferencer,
    surface: Arc<dyn MapSurface>,
    settings: EngineSettings,
    state: Mutex<EngineState>,
    /// Waypoint ids with a like/bookmark/attend/delete call in flight.
    pending: StdMutex<HashSet<String>>,
    refresh_gate: Mutex<()>,
    refresh_seq: AtomicU64,
    alive: CancellationToken,
}

#[derive(Debug, Clone, Copy)]
enum Interaction {
    Like,
    Bookmark,
}

/// Marks a waypoint as busy until dropped.
struct PendingAction<'a> {
    pending: &'a StdMutex<HashSet<String>>,
    id: String,
}

impl Drop for PendingAction<'_> {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&self.id);
        }
    }
}

impl WaypointEngine {
    pub fn new(
        waypoints: Arc<dyn WaypointService>,
        events: Arc<dyn EventService>,
        identity: Arc<dyn IdentityProvider>,
        surface: Arc<dyn MapSurface>,
        settings: EngineSettings,
    ) -> Self {
        let cross_ref = EventCrossReferencer::new(
            events.clone(),
            settings.event_match_epsilon,
            settings.event_feed_limit,
        );
        Self {
            inner: Arc::new(EngineInner {
                waypoints,
                events,
                identity,
                cross_ref,
                surface,
                settings,
                state: Mutex::new(EngineState::default()),
                pending: StdMutex::new(HashSet::new()),
                refresh_gate: Mutex::new(()),
                refresh_seq: AtomicU64::new(0),
                alive: CancellationToken::new(),
            }),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    //=====================================================================================
    // Lifecycle
    //=====================================================================================

    /// Tears the view down. Requests still in flight complete, but their results
    /// are ignored.
    pub fn shutdown(&self) {
        info!("Waypoint engine shutting down.");
        self.inner.alive.cancel();
    }

    pub fn is_alive(&self) -> bool {
        !self.inner.alive.is_cancelled()
    }

    fn ensure_alive(&self) -> PortResult<()> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(PortError::InvalidState(
                "the waypoint view has been closed".to_string(),
            ))
        }
    }

    fn require_viewer(&self) -> PortResult<Identity> {
        self.inner.identity.identity().ok_or(PortError::AuthRequired)
    }

    //=====================================================================================
    // View Publishing
    //=====================================================================================

    pub async fn snapshot(&self) -> EngineSnapshot {
        let state = self.inner.state.lock().await;
        EngineSnapshot {
            waypoints: state.waypoints.clone(),
            mode: state.mode.clone(),
            pending: self.pending_ids(),
        }
    }

    fn pending_ids(&self) -> HashSet<String> {
        self.inner
            .pending
            .lock()
            .map(|pending| pending.clone())
            .unwrap_or_default()
    }

    fn begin_action(&self, id: &str) -> PortResult<PendingAction<'_>> {
        let mut pending = self
            .inner
            .pending
            .lock()
            .map_err(|_| PortError::Unexpected("pending set lock poisoned".to_string()))?;
        if !pending.insert(id.to_string()) {
            return Err(PortError::InFlight(id.to_string()));
        }
        Ok(PendingAction {
            pending: &self.inner.pending,
            id: id.to_string(),
        })
    }

    fn publish_waypoints(&self, waypoints: &[Waypoint]) {
        let pending = self.pending_ids();
        let markers = waypoints
            .iter()
            .map(|w| MapMarker::from_waypoint(w, pending.contains(w.id())))
            .collect();
        self.inner
            .surface
            .send(HostMessage::UpdateWaypoints { waypoints: markers });
    }

    async fn publish_current(&self) {
        if !self.is_alive() {
            return;
        }
        let state = self.inner.state.lock().await;
        self.publish_waypoints(&state.waypoints);
    }

    fn publish_placement(&self, enabled: bool) {
        self.inner
            .surface
            .send(HostMessage::SetPlacementMode { enabled });
    }

    /// Replays the whole view, for a renderer that has just (re)loaded.
    pub async fn resync(&self) {
        let state = self.inner.state.lock().await;
        self.publish_waypoints(&state.waypoints);
        self.publish_placement(state.mode == InteractionMode::Placing);
    }

    //=====================================================================================
    // Refresh
    //=====================================================================================

    fn is_superseded(&self, ticket: u64) -> bool {
        self.inner.refresh_seq.load(Ordering::SeqCst) != ticket
    }

    /// Re-fetches the campus list and replaces the visible set in one step.
    ///
    /// A failed refresh leaves the previous set untouched and returns the error.
    pub async fn refresh(&self) -> PortResult<RefreshOutcome> {
        let ticket = self.inner.refresh_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let _gate = self.inner.refresh_gate.lock().await;

        if !self.is_alive() {
            return Ok(RefreshOutcome::Abandoned);
        }
        if self.is_superseded(ticket) {
            debug!("Refresh {} coalesced into a newer request.", ticket);
            return Ok(RefreshOutcome::Superseded);
        }

        let mut attempts = 0;
        loop {
            let fetched_at = self.inner.state.lock().await.local_epoch;
            let fresh = self.fetch_view().await?;

            if !self.is_alive() {
                debug!("Engine closed during refresh {}; discarding the result.", ticket);
                return Ok(RefreshOutcome::Abandoned);
            }
            if self.is_superseded(ticket) {
                debug!("Refresh {} superseded before it could apply.", ticket);
                return Ok(RefreshOutcome::Superseded);
            }

            let mut state = self.inner.state.lock().await;
            if state.local_epoch != fetched_at {
                // A create or delete landed while fetching; this list predates it.
                drop(state);
                attempts += 1;
                if attempts >= STALE_REFETCH_LIMIT {
                    warn!("Refresh {} kept racing local changes; giving up.", ticket);
                    return Ok(RefreshOutcome::Superseded);
                }
                debug!("Refresh {} raced a local change; fetching again.", ticket);
                continue;
            }

            let count = fresh.len();
            state.waypoints = fresh;
            self.publish_waypoints(&state.waypoints);
            info!("Refreshed {} waypoints.", count);
            return Ok(RefreshOutcome::Applied { count });
        }
    }

    /// Fetches the campus list and personalizes it for the current viewer.
    async fn fetch_view(&self) -> PortResult<Vec<Waypoint>> {
        let viewer = self.inner.identity.identity();
        let records = self
            .inner
            .waypoints
            .list_near_campus(self.inner.settings.campus_radius_km)
            .await
            .map_err(|e| {
                warn!("Refresh failed; keeping the previous waypoint list: {}", e);
                e
            })?;

        let mut fresh: Vec<Waypoint> = records
            .into_iter()
            .map(|record| Waypoint::from_record(record, viewer.as_ref()))
            .collect();
        if viewer.is_some() {
            self.inner.cross_ref.annotate(&mut fresh).await;
        }
        Ok(fresh)
    }

    /// Brings the view back in line after a successful action.
    async fn sync_after_action(&self) {
        if !self.is_alive() {
            return;
        }
        match self.refresh().await {
            Ok(RefreshOutcome::Applied { .. }) => {}
            Ok(_) => self.publish_current().await,
            Err(e) => {
                warn!("Refresh after action failed: {}", e);
                self.publish_current().await;
            }
        }
    }

    //=====================================================================================
    // Placement
    //=====================================================================================

    /// Enters placement (clearing any open form) or leaves it. Leaves saved browsing
    /// when entering. Returns whether placement is now active.
    pub async fn toggle_placement_mode(&self) -> bool {
        let mut state = self.inner.state.lock().await;
        let enabled = if state.mode.is_placing() {
            state.mode = InteractionMode::Idle;
            false
        } else {
            if matches!(state.mode, InteractionMode::BrowsingSaved(_)) {
                info!("Leaving saved browsing to place a waypoint.");
                state.nav_epoch += 1;
            }
            state.mode = InteractionMode::Placing;
            true
        };
        self.publish_placement(enabled);
        info!("Placement mode {}.", if enabled { "on" } else { "off" });
        enabled
    }

    /// Handles a map click. Only captured while placing; returns whether it was.
    pub async fn map_click(&self, location: Coordinates) -> bool {
        let mut state = self.inner.state.lock().await;
        if state.mode != InteractionMode::Placing {
            debug!("Map click ignored in mode {}.", state.mode.name());
            return false;
        }
        state.mode = InteractionMode::AwaitingForm(PendingPlacement {
            location,
            last_error: None,
        });
        self.publish_placement(false);
        info!(
            "Location picked at ({}, {}); awaiting the form.",
            location.latitude, location.longitude
        );
        true
    }

    /// Abandons placement, discarding any picked location.
    pub async fn cancel_placement(&self) -> bool {
        let mut state = self.inner.state.lock().await;
        if !state.mode.is_placing() {
            return false;
        }
        state.mode = InteractionMode::Idle;
        self.publish_placement(false);
        info!("Placement cancelled.");
        true
    }

    /// Creates a waypoint at the picked location.
    ///
    /// On success the waypoint joins the visible set and the mode returns to idle.
    /// On failure the form stays open with the error recorded for retry.
    pub async fn submit_waypoint(&self, draft: WaypointDraft) -> PortResult<Waypoint> {
        self.ensure_alive()?;
        let viewer = self.require_viewer()?;

        let location = {
            let mut state = self.inner.state.lock().await;
            let location = match &state.mode {
                InteractionMode::AwaitingForm(pending) => pending.location,
                _ => {
                    return Err(PortError::InvalidState(
                        "pick a location before submitting".to_string(),
                    ))
                }
            };
            if let Err(e) = draft.validate() {
                record_form_error(&mut state, &e);
                return Err(e);
            }
            location
        };

        let new_waypoint = NewWaypoint {
            location,
            draft,
            ttl_hours: self.inner.settings.waypoint_ttl_hours,
        };

        match self.inner.waypoints.create(&new_waypoint).await {
            Ok(record) => {
                self.ensure_alive()?;
                let waypoint = Waypoint::from_record(record, Some(&viewer));
                let mut state = self.inner.state.lock().await;
                // A cancel or a fresh placement made while the call was in flight wins.
                if state.mode.pending_location() == Some(location) {
                    state.mode = InteractionMode::Idle;
                }
                state.merge(waypoint.clone());
                self.publish_waypoints(&state.waypoints);
                info!("Created waypoint {}.", waypoint.id());
                Ok(waypoint)
            }
            Err(e) => {
                warn!("Creating a waypoint failed: {}", e);
                let mut state = self.inner.state.lock().await;
                record_form_error(&mut state, &e);
                Err(e)
            }
        }
    }

    //=====================================================================================
    // Interactions
    //=====================================================================================

    /// Toggles the viewer's like, then refreshes so the counts come from the server.
    pub async fn toggle_like(&self, id: &str) -> PortResult<bool> {
        self.toggle(id, Interaction::Like).await
    }

    /// Toggles the viewer's bookmark, then refreshes.
    pub async fn toggle_bookmark(&self, id: &str) -> PortResult<bool> {
        self.toggle(id, Interaction::Bookmark).await
    }

    async fn toggle(&self, id: &str, interaction: Interaction) -> PortResult<bool> {
        self.ensure_alive()?;
        self.require_viewer()?;

        let result = {
            let _pending = self.begin_action(id)?;
            self.publish_current().await;
            match interaction {
                Interaction::Like => self.inner.waypoints.like(id).await,
                Interaction::Bookmark => self.inner.waypoints.bookmark(id).await,
            }
        };

        match result {
            Ok(active) => {
                info!("{:?} on waypoint {} is now {}.", interaction, id, active);
                self.sync_after_action().await;
                Ok(active)
            }
            Err(e) => {
                warn!("{:?} on waypoint {} failed: {}", interaction, id, e);
                self.publish_current().await;
                Err(e)
            }
        }
    }

    /// Deletes one of the viewer's own waypoints.
    ///
    /// Non-owners are refused locally; the server enforces the same rule on its own.
    pub async fn delete_waypoint(&self, id: &str, confirmed: bool) -> PortResult<()> {
        self.ensure_alive()?;
        self.require_viewer()?;

        {
            let state = self.inner.state.lock().await;
            if let Some(waypoint) = state.find(id) {
                if !waypoint.flags.is_owner {
                    return Err(PortError::Forbidden(
                        "only the author can delete this waypoint".to_string(),
                    ));
                }
            }
        }
        if !confirmed {
            return Err(PortError::ConfirmationRequired(format!(
                "delete waypoint {}",
                id
            )));
        }

        {
            let _pending = self.begin_action(id)?;
            self.inner.waypoints.remove(id).await.map_err(|e| {
                warn!("Deleting waypoint {} failed: {}", id, e);
                e
            })?;
        }

        if !self.is_alive() {
            return Ok(());
        }
        let mut state = self.inner.state.lock().await;
        state.remove(id);
        self.publish_waypoints(&state.waypoints);
        info!("Deleted waypoint {}.", id);
        Ok(())
    }

    /// Joins or leaves the event an event-type waypoint mirrors.
    ///
    /// Leaving needs `confirm_leave`. Returns whether the viewer attends afterwards.
    pub async fn join_event(&self, id: &str, confirm_leave: bool) -> PortResult<bool> {
        self.ensure_alive()?;
        self.require_viewer()?;

        let found = self
            .inner
            .state
            .lock()
            .await
            .find(id)
            .map(|w| w.record.clone());
        let record = found
            .ok_or_else(|| PortError::NotFound(format!("waypoint {} is not on the map", id)))?;
        if record.kind != WaypointKind::Event {
            return Err(PortError::NotFound(format!(
                "waypoint {} is not an event",
                id
            )));
        }

        let result = {
            let _pending = self.begin_action(id)?;
            self.publish_current().await;
            self.toggle_attendance(&record, confirm_leave).await
        };

        match result {
            Ok(attending) => {
                info!("Attendance for waypoint {} is now {}.", id, attending);
                self.sync_after_action().await;
                Ok(attending)
            }
            Err(e) => {
                debug!("Join/leave for waypoint {} did not go through: {}", id, e);
                self.publish_current().await;
                Err(e)
            }
        }
    }

    async fn toggle_attendance(
        &self,
        record: &WaypointRecord,
        confirm_leave: bool,
    ) -> PortResult<bool> {
        let event = self.inner.cross_ref.resolve(record).await?;
        let attending = self.inner.events.attend_status(&event.id).await?;
        if attending && !confirm_leave {
            return Err(PortError::ConfirmationRequired(format!(
                "leave event '{}'",
                event.title
            )));
        }
        self.inner.events.toggle_attend(&event.id).await
    }

    //=====================================================================================
    // Saved Navigation
    //=====================================================================================

    /// Snapshots the viewer's bookmarks and centres the map on the first one.
    /// Leaves placement if it was active.
    pub async fn open_saved(&self) -> PortResult<SavedCursor> {
        self.ensure_alive()?;
        let viewer = self.require_viewer()?;

        let records = self.inner.waypoints.list_bookmarked().await?;
        self.ensure_alive()?;
        let items: Vec<Waypoint> = records
            .into_iter()
            .map(|record| Waypoint::from_record(record, Some(&viewer)))
            .collect();
        let (target, position, epoch) = {
            let mut state = self.inner.state.lock().await;
            if state.mode.is_placing() {
                self.publish_placement(false);
            }
            let navigation = SavedNavigation::new(items);
            let target = navigation.current().cloned();
            let position = SavedCursor::of(&navigation);
            state.mode = InteractionMode::BrowsingSaved(navigation);
            state.nav_epoch += 1;
            (target, position, state.nav_epoch)
        };

        if let Some(waypoint) = target {
            self.navigate_to(waypoint, epoch);
        }
        info!("Browsing {} saved waypoints.", position.total);
        Ok(position)
    }

    pub async fn next_saved(&self) -> Option<SavedCursor> {
        self.step_saved(true).await
    }

    pub async fn previous_saved(&self) -> Option<SavedCursor> {
        self.step_saved(false).await
    }

    async fn step_saved(&self, forward: bool) -> Option<SavedCursor> {
        let (target, position, epoch) = {
            let mut state = self.inner.state.lock().await;
            let InteractionMode::BrowsingSaved(navigation) = &mut state.mode else {
                debug!("Saved navigation step ignored outside saved browsing.");
                return None;
            };
            let target = if forward {
                navigation.next()
            } else {
                navigation.previous()
            }
            .cloned()?;
            let position = SavedCursor::of(navigation);
            state.nav_epoch += 1;
            (target, position, state.nav_epoch)
        };

        self.navigate_to(target, epoch);
        Some(position)
    }

    /// Ends saved browsing and hands the map back to free panning.
    pub async fn close_saved(&self) -> bool {
        let mut state = self.inner.state.lock().await;
        if !matches!(state.mode, InteractionMode::BrowsingSaved(_)) {
            return false;
        }
        state.mode = InteractionMode::Idle;
        state.nav_epoch += 1;
        info!("Saved browsing closed.");
        true
    }

    /// Centres the map on a waypoint. The popup, when wanted, opens after the settle
    /// delay and only if the viewer has not moved on in the meantime.
    fn navigate_to(&self, waypoint: Waypoint, epoch: u64) {
        let pending = self.pending_ids().contains(waypoint.id());
        let marker = MapMarker::from_waypoint(&waypoint, pending);
        let settings = &self.inner.settings;

        if !settings.auto_open_popup || settings.popup_settle.is_zero() {
            self.inner.surface.send(HostMessage::NavigateToWaypoint {
                waypoint: marker,
                should_open_popup: settings.auto_open_popup,
            });
            return;
        }

        self.inner.surface.send(HostMessage::NavigateToWaypoint {
            waypoint: marker.clone(),
            should_open_popup: false,
        });

        let engine = self.clone();
        let settle = settings.popup_settle;
        tokio::spawn(async move {
            tokio::select! {
                _ = engine.inner.alive.cancelled() => {}
                _ = tokio::time::sleep(settle) => {
                    let state = engine.inner.state.lock().await;
                    let still_there = state.nav_epoch == epoch
                        && matches!(state.mode, InteractionMode::BrowsingSaved(_));
                    if still_there {
                        engine.inner.surface.send(HostMessage::NavigateToWaypoint {
                            waypoint: marker,
                            should_open_popup: true,
                        });
                    }
                }
            }
        });
    }
}

fn record_form_error(state: &mut EngineState, error: &PortError) {
    if let InteractionMode::AwaitingForm(pending) = &mut state.mode {
        pending.last_error = Some(error.to_string());
    }
}
