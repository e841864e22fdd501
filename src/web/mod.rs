//! HTTP surface of the archive.

mod handlers;
pub mod views;

use anyhow::Result;
use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use std::time::Instant;

use crate::archive::Archive;
use crate::error::ArchiveResult;

#[derive(Clone)]
pub struct AppState {
    archive: Arc<Archive>,
}

impl AppState {
    /// Run an archive operation on the blocking pool.
    async fn run<T, F>(&self, operation: F) -> ArchiveResult<T>
    where
        F: FnOnce(&Archive) -> ArchiveResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let archive = self.archive.clone();
        tokio::task::spawn_blocking(move || operation(&archive)).await?
    }
}

pub fn router(archive: Arc<Archive>) -> Router {
    let max_upload_bytes = archive.config().server.max_upload_bytes;

    Router::new()
        .route("/", get(handlers::home).post(handlers::upload))
        .route("/uploads/:filename", get(handlers::serve_upload))
        .route("/faces/:filename", get(handlers::serve_face))
        .route("/identify/:img_id", axum::routing::post(handlers::identify))
        .route("/result/:img_id", get(handlers::result))
        .route("/gallery", get(handlers::gallery))
        .route("/search", get(handlers::search_get).post(handlers::search_post))
        .route("/reset-db", get(handlers::reset))
        .route("/api/gallery", get(handlers::api_gallery))
        .route("/api/result/:img_id", get(handlers::api_result))
        .route("/api/search", get(handlers::api_search))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(middleware::from_fn(log_requests))
        .with_state(AppState { archive })
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Handled request"
    );
    response
}

pub async fn serve(archive: Arc<Archive>, listen_address: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(listen_address).await?;
    tracing::info!(address = %listen_address, "Listening");

    axum::serve(listener, router(archive)).await?;
    Ok(())
}
