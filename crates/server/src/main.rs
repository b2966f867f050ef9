use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{SeatRow, SeatUpdateRequest, ServerEvent},
};
use storage::Storage;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod config;

use api::{list_seats, replace_seats, update_seat, ApiContext};
use app_state::AppState;
use config::{load_settings, prepare_database_url};

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    info!(seats = storage.seat_count().await?, "seat table ready");

    let state = AppState {
        api: ApiContext { storage },
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "seat server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/seats", get(http_list_seats).put(http_replace_seats))
        .route("/seats/:label", patch(http_update_seat))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> ApiResult<&'static str> {
    state.api.storage.health_check().await.map_err(|e| {
        error_response(ApiError::internal(format!("{e:#}")))
    })?;
    Ok("ok")
}

async fn http_list_seats(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<SeatRow>>> {
    let rows = list_seats(&state.api).await.map_err(error_response)?;
    Ok(Json(rows))
}

async fn http_update_seat(
    State(state): State<Arc<AppState>>,
    Path(label): Path<String>,
    Json(req): Json<SeatUpdateRequest>,
) -> ApiResult<Json<SeatRow>> {
    let row = update_seat(&state.api, &label, req)
        .await
        .map_err(error_response)?;
    Ok(Json(row))
}

async fn http_replace_seats(
    State(state): State<Arc<AppState>>,
    Json(rows): Json<Vec<SeatRow>>,
) -> ApiResult<Json<Vec<SeatRow>>> {
    let rows = replace_seats(&state.api, rows)
        .await
        .map_err(error_response)?;
    Ok(Json(rows))
}

fn error_response(error: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match error.code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(code = %error.code, reason = %error.message, "request failed");
    }
    (status, Json(error))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let changes = state.api.storage.subscribe();
    ws.on_upgrade(move |socket| ws_connection(socket, changes))
}

async fn ws_connection(socket: WebSocket, mut changes: broadcast::Receiver<SeatRow>) {
    let (mut sender, mut receiver) = socket.split();
    debug!("seat feed client connected");

    let send_task = tokio::spawn(async move {
        loop {
            let event = match changes.recv().await {
                Ok(row) => ServerEvent::SeatChanged { row },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "seat feed client lagged");
                    ServerEvent::Resync { skipped }
                }
                Err(RecvError::Closed) => break,
            };
            let text = match serde_json::to_string(&event) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sender.send(Message::Close(None)).await;
    });

    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
    debug!("seat feed client disconnected");
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
