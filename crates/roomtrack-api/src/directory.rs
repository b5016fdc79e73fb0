// Directory API HTTP client
//
// Wraps `reqwest::Client` with URL construction for the room directory,
// status/body error mapping, and lenient parsing of mutation responses.

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::models::{ErrorBody, RoomDto, RoomPayload};
use crate::transport::TransportConfig;

const BODY_PREVIEW_CHARS: usize = 200;

/// Raw HTTP client for the room directory authority.
///
/// Endpoints:
/// - `GET {base}/rooms`
/// - `POST {base}/addRoom`
/// - `PUT {base}/rooms/{id}`
/// - `DELETE {base}/rooms/{id}`
#[derive(Debug, Clone)]
pub struct DirectoryClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl DirectoryClient {
    /// Create a directory client from a `TransportConfig`.
    ///
    /// `base_url` is the API root, e.g. `https://tracker.example.com/api`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            timeout: transport.timeout,
        })
    }

    /// Create a directory client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            timeout: TransportConfig::default().timeout,
        }
    }

    /// The API root URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// List all registered rooms, in the authority's order.
    ///
    /// `GET /rooms`
    pub async fn list_rooms(&self) -> Result<Vec<RoomDto>, Error> {
        let url = self.endpoint(&["rooms"])?;
        debug!("GET {url}");
        let resp = self.http.get(url).send().await.map_err(|e| self.transport_error(e))?;
        let resp = check_status(resp).await?;
        self.parse_json(resp).await
    }

    /// Register a new room.
    ///
    /// `POST /addRoom` with `{"name": ..., "deviceID": ...}`. Returns the
    /// created record when the authority echoes one back.
    pub async fn add_room(&self, name: &str, device_id: &str) -> Result<Option<RoomDto>, Error> {
        let url = self.endpoint(&["addRoom"])?;
        debug!(name, device_id, "POST {url}");
        let resp = self
            .http
            .post(url)
            .json(&RoomPayload { name, device_id })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let resp = check_status(resp).await?;
        self.parse_record(resp).await
    }

    /// Update an existing room.
    ///
    /// `PUT /rooms/{id}` with `{"name": ..., "deviceID": ...}`.
    pub async fn update_room(
        &self,
        id: &str,
        name: &str,
        device_id: &str,
    ) -> Result<Option<RoomDto>, Error> {
        let url = self.endpoint(&["rooms", id])?;
        debug!(id, name, device_id, "PUT {url}");
        let resp = self
            .http
            .put(url)
            .json(&RoomPayload { name, device_id })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let resp = check_status(resp).await?;
        self.parse_record(resp).await
    }

    /// Delete a room. Success is signalled by status alone.
    ///
    /// `DELETE /rooms/{id}`
    pub async fn delete_room(&self, id: &str) -> Result<(), Error> {
        let url = self.endpoint(&["rooms", id])?;
        debug!(id, "DELETE {url}");
        let resp = self
            .http
            .delete(url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        check_status(resp).await?;
        Ok(())
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Append percent-encoded path segments to the API root.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // ── Response helpers ─────────────────────────────────────────────

    fn transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            Error::Transport(err)
        }
    }

    async fn parse_json<T: DeserializeOwned>(&self, resp: reqwest::Response) -> Result<T, Error> {
        let body = resp.text().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body,
        })
    }

    /// Parse a mutation response into a room record, if it contains one.
    ///
    /// Accepts the record itself or a `{ "room": {...} }` / `{ "data": {...} }`
    /// wrapper. Anything else (empty body, bare status message) yields `None`.
    async fn parse_record(&self, resp: reqwest::Response) -> Result<Option<RoomDto>, Error> {
        let body = resp.text().await.map_err(|e| self.transport_error(e))?;
        if body.trim().is_empty() {
            return Ok(None);
        }

        let Ok(value) = serde_json::from_str::<serde_json::Value>(&body) else {
            trace!(body = %preview(&body), "mutation response is not JSON");
            return Ok(None);
        };

        let record = [Some(&value), value.get("room"), value.get("data")]
            .into_iter()
            .flatten()
            .find_map(|candidate| serde_json::from_value::<RoomDto>(candidate.clone()).ok());

        if record.is_none() {
            trace!(body = %preview(&body), "mutation response carries no room record");
        }
        Ok(record)
    }
}

/// Turn a non-2xx response into `Error::Api`, pulling the authority's
/// `message` out of the body when present.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(ErrorBody::into_message);
    debug!(status = status.as_u16(), ?message, "directory request failed");

    Err(Error::Api {
        status: status.as_u16(),
        message,
    })
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}
