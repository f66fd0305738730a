//! services/waypoints/src/bridge/dispatch.rs
//!
//! Routes inbound bridge lines to the engine and turns the results into notices
//! for the host UI. Map messages carry no confirmation, so destructive requests
//! coming from the map always bounce back as a confirmation prompt first.

use std::sync::Arc;
use tracing::{debug, info, warn};
use waypoint_core::domain::Coordinates;
use waypoint_core::ports::PortError;

use crate::adapters::SessionIdentity;
use crate::bridge::protocol::{
    ConfirmAction, Inbound, MapMessage, ToggleKind, UiCommand, UiNotice,
};
use crate::engine::{RefreshOutcome, SavedCursor, WaypointEngine};
use crate::error::ClientError;

/// Glues the bridge vocabulary to one engine and the session it runs under.
#[derive(Clone)]
pub struct BridgeHost {
    engine: WaypointEngine,
    identity: Arc<SessionIdentity>,
}

impl BridgeHost {
    pub fn new(engine: WaypointEngine, identity: Arc<SessionIdentity>) -> Self {
        Self { engine, identity }
    }

    pub fn engine(&self) -> &WaypointEngine {
        &self.engine
    }

    /// Parses and handles one JSON line.
    pub async fn handle_line(&self, line: &str) -> Result<Option<UiNotice>, ClientError> {
        let inbound: Inbound = serde_json::from_str(line.trim())?;
        Ok(match inbound {
            Inbound::Map(message) => self.handle_map_message(message).await,
            Inbound::Ui(command) => self.handle_command(command).await,
        })
    }

    pub async fn handle_map_message(&self, message: MapMessage) -> Option<UiNotice> {
        match message {
            MapMessage::MapReady => {
                info!("Map renderer ready; replaying the view.");
                self.engine.resync().await;
                None
            }
            MapMessage::MapClick { lat, lng } => {
                let location = Coordinates::new(lat, lng);
                self.engine
                    .map_click(location)
                    .await
                    .then(|| UiNotice::from(location))
            }
            MapMessage::Like { waypoint_id } => Some(toggled(
                self.engine.toggle_like(&waypoint_id).await,
                waypoint_id,
                ToggleKind::Like,
            )),
            MapMessage::Bookmark { waypoint_id } => Some(toggled(
                self.engine.toggle_bookmark(&waypoint_id).await,
                waypoint_id,
                ToggleKind::Bookmark,
            )),
            MapMessage::JoinEvent { waypoint_id } => Some(toggled(
                self.engine.join_event(&waypoint_id, false).await,
                waypoint_id,
                ToggleKind::Attend,
            )),
            MapMessage::Delete { waypoint_id } => Some(deleted(
                self.engine.delete_waypoint(&waypoint_id, false).await,
                waypoint_id,
            )),
        }
    }

    pub async fn handle_command(&self, command: UiCommand) -> Option<UiNotice> {
        match command {
            UiCommand::SignIn { token } => match self.identity.sign_in(&token) {
                Ok(viewer) => {
                    self.refresh_quietly().await;
                    Some(UiNotice::SignedIn {
                        username: viewer.username,
                    })
                }
                Err(e) => Some(failure(e)),
            },
            UiCommand::SignOut => {
                self.identity.sign_out();
                self.engine.close_saved().await;
                self.engine.cancel_placement().await;
                self.refresh_quietly().await;
                Some(UiNotice::SignedOut)
            }
            UiCommand::Refresh => match self.engine.refresh().await {
                Ok(RefreshOutcome::Applied { count }) => Some(UiNotice::Refreshed { count }),
                Ok(outcome) => {
                    debug!("Refresh finished without applying: {:?}", outcome);
                    None
                }
                Err(e) => Some(failure(e)),
            },
            UiCommand::TogglePlacement => {
                let enabled = self.engine.toggle_placement_mode().await;
                Some(UiNotice::PlacementChanged { enabled })
            }
            UiCommand::SubmitWaypoint {
                title,
                description,
                kind,
            } => {
                let draft = UiCommand::draft(&title, &description, &kind);
                match self.engine.submit_waypoint(draft).await {
                    Ok(waypoint) => Some(UiNotice::Created {
                        waypoint_id: waypoint.id().to_string(),
                    }),
                    Err(e) => Some(failure(e)),
                }
            }
            UiCommand::CancelPlacement => self
                .engine
                .cancel_placement()
                .await
                .then_some(UiNotice::PlacementChanged { enabled: false }),
            UiCommand::OpenSaved => match self.engine.open_saved().await {
                Ok(position) => Some(saved_position(position)),
                Err(e) => Some(failure(e)),
            },
            UiCommand::NextSaved => self.engine.next_saved().await.map(saved_position),
            UiCommand::PreviousSaved => self.engine.previous_saved().await.map(saved_position),
            UiCommand::CloseSaved => self
                .engine
                .close_saved()
                .await
                .then_some(UiNotice::SavedClosed),
            UiCommand::ConfirmDelete { waypoint_id } => Some(deleted(
                self.engine.delete_waypoint(&waypoint_id, true).await,
                waypoint_id,
            )),
            UiCommand::ConfirmLeaveEvent { waypoint_id } => Some(toggled(
                self.engine.join_event(&waypoint_id, true).await,
                waypoint_id,
                ToggleKind::Attend,
            )),
        }
    }

    /// Re-derives the view after the viewer changed. A failure keeps the old list.
    async fn refresh_quietly(&self) {
        if let Err(e) = self.engine.refresh().await {
            warn!("Refresh after a session change failed: {}", e);
        }
    }
}

fn toggled(result: Result<bool, PortError>, waypoint_id: String, toggle: ToggleKind) -> UiNotice {
    match result {
        Ok(active) => UiNotice::Toggled {
            waypoint_id,
            toggle,
            active,
        },
        Err(PortError::ConfirmationRequired(_)) if toggle == ToggleKind::Attend => {
            UiNotice::ConfirmationRequired {
                action: ConfirmAction::LeaveEvent,
                waypoint_id,
            }
        }
        Err(e) => failure(e),
    }
}

fn deleted(result: Result<(), PortError>, waypoint_id: String) -> UiNotice {
    match result {
        Ok(()) => UiNotice::Deleted { waypoint_id },
        Err(PortError::ConfirmationRequired(_)) => UiNotice::ConfirmationRequired {
            action: ConfirmAction::Delete,
            waypoint_id,
        },
        Err(e) => failure(e),
    }
}

fn saved_position(position: SavedCursor) -> UiNotice {
    UiNotice::SavedPosition {
        cursor: position.cursor,
        total: position.total,
        taken_at: position.taken_at,
    }
}

fn failure(error: PortError) -> UiNotice {
    match error {
        PortError::AuthRequired => UiNotice::AuthRequired,
        other => UiNotice::Error {
            message: other.to_string(),
        },
    }
}
