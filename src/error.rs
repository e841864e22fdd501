use std::io;

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;

pub type ArchiveResult<T> = Result<T, ArchiveError>;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Invalid upload: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Storage failure: {0}")]
    Storage(String),
    #[error("Error in database, {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Error accessing file, {0}")]
    Io(#[from] io::Error),
    #[error("Error processing image, {0}")]
    Image(#[from] image::ImageError),
    #[error("Face detection failed, {0}")]
    Detection(#[source] anyhow::Error),
    #[error("Background task failed, {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ArchiveError {
    pub fn status(&self) -> StatusCode {
        match self {
            ArchiveError::Validation(_) => StatusCode::BAD_REQUEST,
            ArchiveError::NotFound(_) => StatusCode::NOT_FOUND,
            ArchiveError::Storage(_)
            | ArchiveError::Database(_)
            | ArchiveError::Io(_)
            | ArchiveError::Image(_)
            | ArchiveError::Detection(_)
            | ArchiveError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ArchiveError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let body = crate::web::views::render_error(status, &self.to_string());
        (status, Html(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ArchiveError::Validation("no file".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ArchiveError::NotFound("image abc".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ArchiveError::Detection(anyhow::anyhow!("model crashed")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_not_found_response() {
        let response = ArchiveError::NotFound("image abc".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
