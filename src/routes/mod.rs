use std::path::Path;

use axum::Router;
use tower_http::services::{ServeDir, ServeFile};

pub mod gallery;
pub mod ws;

pub fn router(frontend: &Path) -> Router {
    Router::new()
        .merge(ws::router())
        .merge(gallery::router())
        .route_service("/",             ServeFile::new(frontend.join("index.html")))
        .route_service("/gallery.html", ServeFile::new(frontend.join("gallery.html")))
        .nest_service("/static",        ServeDir::new(frontend))
}
