use axum::{routing::get, Extension, Json, Router};

use crate::{
    error::AppResult,
    pipeline::{LogEntry, ResultLog},
};

pub fn router() -> Router {
    Router::new().route("/gallery_manifest", get(manifest))
}

async fn manifest(Extension(log): Extension<ResultLog>) -> AppResult<Json<Vec<LogEntry>>> {
    Ok(Json(log.read_all().await?))
}
