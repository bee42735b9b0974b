//! read-only http view of the record store, for dashboards.
//!
//! every request reloads the store file; nothing here ever writes it.

use crate::domain::{zone_label, ZONE_ID};
use crate::store::RecordStore;

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde_json::Value;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub fn router(store_path: PathBuf) -> Router {
    Router::new()
        .route("/api/zones", get(zones_handler))
        .route("/api/zones/:zone_id", get(zone_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(store_path))
}

pub async fn run_server(bind: SocketAddr, store_path: PathBuf) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %bind, "[API] store view live");
    axum::serve(listener, router(store_path)).await?;
    Ok(())
}

async fn load(path: Arc<PathBuf>) -> RecordStore {
    tokio::task::spawn_blocking(move || RecordStore::load(&path))
        .await
        .unwrap_or_default()
}

/// full store as a json array
async fn zones_handler(State(path): State<Arc<PathBuf>>) -> Json<Value> {
    let store = load(path).await;
    Json(Value::Array(store.rows().to_vec()))
}

/// one zone, matched against its id as written (string or number)
async fn zone_handler(
    State(path): State<Arc<PathBuf>>,
    Path(zone_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    let store = load(path).await;
    let found = store.rows().iter().find(|row| {
        row.get(ZONE_ID)
            .is_some_and(|zone| zone_label(zone) == zone_id)
    });

    match found {
        Some(row) => (StatusCode::OK, Json(row.clone())),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"status": "error", "message": "unknown zone"})),
        ),
    }
}
