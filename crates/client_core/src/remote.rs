use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::{future, StreamExt};
use occupancy::SeatCollection;
use reqwest::{Client, Response};
use shared::{
    domain::{Seat, SeatLabel},
    error::ApiError,
    protocol::{SeatRow, SeatUpdateRequest, ServerEvent},
};
use storage::{SeatChange, SeatChangeStream, SeatStore, StoreError};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, warn};
use url::Url;

/// Seat store backed by the seat server: HTTP for reads and writes, a
/// WebSocket for the row change feed.
pub struct RemoteSeatStore {
    http: Client,
    server_url: Url,
}

impl RemoteSeatStore {
    pub fn new(server_url: &str) -> Result<Self> {
        let server_url = Url::parse(server_url.trim_end_matches('/'))
            .with_context(|| format!("invalid server url '{server_url}'"))?;
        if !matches!(server_url.scheme(), "http" | "https") {
            return Err(anyhow!("server_url must start with http:// or https://"));
        }
        Ok(Self {
            http: Client::new(),
            server_url,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.server_url.as_str().trim_end_matches('/'))
    }

    fn ws_url(&self) -> Result<Url> {
        let mut ws_url = Url::parse(&self.endpoint("/ws"))?;
        let scheme = if self.server_url.scheme() == "https" { "wss" } else { "ws" };
        ws_url
            .set_scheme(scheme)
            .map_err(|()| anyhow!("cannot derive websocket url from {}", self.server_url))?;
        Ok(ws_url)
    }

    async fn fetch_rows(&self) -> Result<Vec<SeatRow>> {
        let response = self.http.get(self.endpoint("/seats")).send().await?;
        let rows = check_status(response).await?.json().await?;
        Ok(rows)
    }

    async fn patch_seat(&self, label: &SeatLabel, seat: &Seat) -> Result<SeatRow> {
        let response = self
            .http
            .patch(self.endpoint(&format!("/seats/{label}")))
            .json(&SeatUpdateRequest::from(*seat))
            .send()
            .await?;
        let row = check_status(response).await?.json().await?;
        Ok(row)
    }

    async fn put_seats(&self, rows: &[SeatRow]) -> Result<()> {
        let response = self
            .http
            .put(self.endpoint("/seats"))
            .json(rows)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    match response.json::<ApiError>().await {
        Ok(error) => Err(error.into()),
        Err(_) => Err(anyhow!("seat server returned {status}")),
    }
}

#[async_trait]
impl SeatStore for RemoteSeatStore {
    fn backend_name(&self) -> &'static str {
        "remote"
    }

    async fn load_all(&self) -> Result<SeatCollection, StoreError> {
        let rows = self
            .fetch_rows()
            .await
            .map_err(|err| StoreError::read(self.backend_name(), err))?;
        Ok(rows.into_iter().map(|row| (row.id, row.seat())).collect())
    }

    async fn save_one(&self, label: &SeatLabel, seat: &Seat) -> Result<(), StoreError> {
        self.patch_seat(label, seat)
            .await
            .map(|_| ())
            .map_err(|err| StoreError::write(self.backend_name(), label, err))
    }

    async fn save_all(&self, seats: &SeatCollection) -> Result<(), StoreError> {
        let rows: Vec<SeatRow> = seats
            .iter()
            .map(|(label, seat)| SeatRow::new(*label, *seat, None))
            .collect();
        self.put_seats(&rows)
            .await
            .map_err(|err| StoreError::write(self.backend_name(), "all seats", err))
    }

    async fn subscribe_changes(&self) -> Result<Option<SeatChangeStream>, StoreError> {
        let backend = self.backend_name();
        let ws_url = self
            .ws_url()
            .map_err(|err| StoreError::subscribe(backend, err))?;
        let (ws_stream, _) = connect_async(ws_url.as_str())
            .await
            .map_err(|err| StoreError::subscribe(backend, format!("{ws_url}: {err}")))?;
        info!(%ws_url, "subscribed to seat change feed");

        let rows = ws_stream
            .take_while(|msg| {
                future::ready(match msg {
                    Ok(Message::Close(_)) => false,
                    Ok(_) => true,
                    Err(error) => {
                        warn!(%error, "seat change feed receive failed");
                        false
                    }
                })
            })
            .filter_map(|msg| async move {
                let Ok(Message::Text(text)) = msg else {
                    return None;
                };
                match serde_json::from_str::<ServerEvent>(&text) {
                    Ok(ServerEvent::SeatChanged { row }) => Some(SeatChange::Row(row)),
                    Ok(ServerEvent::Resync { skipped }) => {
                        warn!(skipped, "seat server dropped changes; asking for a resync");
                        Some(SeatChange::Resync)
                    }
                    Ok(ServerEvent::Error(error)) => {
                        warn!(%error, "seat server reported an error");
                        None
                    }
                    Err(error) => {
                        warn!(%error, "invalid seat change event");
                        None
                    }
                }
            });
        Ok(Some(rows.boxed()))
    }
}

#[cfg(test)]
#[path = "tests/remote_tests.rs"]
mod tests;
