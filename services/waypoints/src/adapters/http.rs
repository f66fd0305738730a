//! services/waypoints/src/adapters/http.rs
//!
//! This module contains the HTTP adapter for the waypoint and event services.
//! It implements the `WaypointService` and `EventService` ports from the `core`
//! crate using [`reqwest`].

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use waypoint_core::domain::{EventRecord, NewWaypoint, WaypointRecord};
use waypoint_core::ports::{
    EventService, IdentityProvider, PortError, PortResult, WaypointService,
};

use super::wire::{
    error_message, AttendingDto, BookmarkedDto, CreateWaypointBody, CreatedDto, EventFeedDto,
    LikedDto, WaypointListDto,
};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that talks to the backend's waypoint and event endpoints.
///
/// Holds no mutable state; the bearer token is read from the identity provider on
/// every request so sign-in and sign-out take effect immediately.
#[derive(Clone)]
pub struct HttpWaypointAdapter {
    client: reqwest::Client,
    base_url: String,
    campus_slug: String,
    identity: Arc<dyn IdentityProvider>,
}

impl HttpWaypointAdapter {
    /// Creates a new `HttpWaypointAdapter` with its own connection pool.
    pub fn new(
        base_url: String,
        campus_slug: String,
        timeout: Duration,
        identity: Arc<dyn IdentityProvider>,
    ) -> PortResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PortError::Unexpected(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, base_url, campus_slug, identity))
    }

    /// Creates an adapter reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        base_url: String,
        campus_slug: String,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            campus_slug,
            identity,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Builds a request, attaching the bearer token when one is available.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match self.identity.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Builds a request that must carry a token.
    fn authed(&self, method: Method, path: &str) -> PortResult<RequestBuilder> {
        if self.identity.token().is_none() {
            return Err(PortError::AuthRequired);
        }
        Ok(self.request(method, path))
    }

    // ---- private helpers ----

    async fn send(builder: RequestBuilder) -> PortResult<reqwest::Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        let error = classify_status(status, &body);
        warn!("Request failed with {}: {}", status, error);
        Err(error)
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> PortResult<T> {
        let response = Self::send(builder).await?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;
        decode_body(status, &body)
    }
}

/// Decodes a successful response. A body that does not match the contract is the
/// server's fault, so it surfaces as a server error carrying the status.
pub(crate) fn decode_body<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> PortResult<T> {
    serde_json::from_slice(body).map_err(|e| {
        warn!("Response with {} did not decode: {}", status, e);
        PortError::Server {
            status: status.as_u16(),
            message: format!("malformed response body: {}", e),
        }
    })
}

/// Maps a non-2xx status into the error taxonomy.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> PortError {
    let message = error_message(body);
    match status {
        StatusCode::UNAUTHORIZED => PortError::AuthRequired,
        StatusCode::FORBIDDEN => PortError::Forbidden(message),
        StatusCode::NOT_FOUND => PortError::NotFound(message),
        _ => PortError::Server {
            status: status.as_u16(),
            message,
        },
    }
}

fn campus_path(slug: &str, radius_km: f64) -> String {
    format!("/waypoint/campus/{}?radius={}", slug, radius_km)
}

fn feed_path(limit: u32, include_past: bool) -> String {
    format!("/events/feed?limit={}&include_past={}", limit, include_past)
}

//=========================================================================================
// `WaypointService` Trait Implementation
//=========================================================================================

#[async_trait]
impl WaypointService for HttpWaypointAdapter {
    async fn list_near_campus(&self, radius_km: f64) -> PortResult<Vec<WaypointRecord>> {
        let path = campus_path(&self.campus_slug, radius_km);
        let list: WaypointListDto = Self::send_json(self.request(Method::GET, &path)).await?;
        let records = list.to_domain();
        debug!("Fetched {} waypoints within {} km", records.len(), radius_km);
        Ok(records)
    }

    async fn create(&self, waypoint: &NewWaypoint) -> PortResult<WaypointRecord> {
        waypoint.draft.validate()?;
        let builder = self
            .authed(Method::POST, "/waypoint/create")?
            .json(&CreateWaypointBody::from(waypoint));
        let created: CreatedDto = Self::send_json(builder).await?;
        Ok(created.to_domain())
    }

    async fn like(&self, waypoint_id: &str) -> PortResult<bool> {
        let path = format!("/waypoint/{}/like", waypoint_id);
        let result: LikedDto = Self::send_json(self.authed(Method::POST, &path)?).await?;
        Ok(result.liked)
    }

    async fn bookmark(&self, waypoint_id: &str) -> PortResult<bool> {
        let path = format!("/waypoint/{}/bookmark", waypoint_id);
        let result: BookmarkedDto = Self::send_json(self.authed(Method::POST, &path)?).await?;
        Ok(result.bookmarked)
    }

    async fn remove(&self, waypoint_id: &str) -> PortResult<()> {
        let path = format!("/waypoint/{}", waypoint_id);
        Self::send(self.authed(Method::DELETE, &path)?).await?;
        Ok(())
    }

    async fn list_bookmarked(&self) -> PortResult<Vec<WaypointRecord>> {
        let builder = self.authed(Method::GET, "/waypoint/my-bookmarks")?;
        let list: WaypointListDto = Self::send_json(builder).await?;
        Ok(list.to_domain())
    }
}

//=========================================================================================
// `EventService` Trait Implementation
//=========================================================================================

#[async_trait]
impl EventService for HttpWaypointAdapter {
    async fn feed(&self, limit: u32, include_past: bool) -> PortResult<Vec<EventRecord>> {
        let path = feed_path(limit, include_past);
        let feed: EventFeedDto = Self::send_json(self.request(Method::GET, &path)).await?;
        Ok(feed.to_domain())
    }

    async fn attend_status(&self, event_id: &str) -> PortResult<bool> {
        let path = format!("/events/{}/attend-status", event_id);
        let status: AttendingDto = Self::send_json(self.authed(Method::GET, &path)?).await?;
        Ok(status.attending)
    }

    async fn toggle_attend(&self, event_id: &str) -> PortResult<bool> {
        let path = format!("/events/{}/attend", event_id);
        let status: AttendingDto = Self::send_json(self.authed(Method::POST, &path)?).await?;
        Ok(status.attending)
    }
}
