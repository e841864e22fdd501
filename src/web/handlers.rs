use axum::body::Body;
use axum::extract::{Multipart, Path, Query, Request, State};
use axum::response::{Html, Redirect, Response};
use axum::{Form, Json};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Deserialize;
use std::collections::HashMap;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use super::{views, AppState};
use crate::archive::{ImageDetail, ImageSummary, SearchOutcome, UploadRequest, UploadedFile};
use crate::db::SearchFilter;
use crate::error::{ArchiveError, ArchiveResult};
use crate::storage::AssetKind;

#[derive(Debug, Default, Deserialize)]
pub struct SearchForm {
    pub person_name: Option<String>,
    pub date_taken: Option<String>,
    pub place_taken: Option<String>,
}

impl SearchForm {
    fn into_filter(self) -> SearchFilter {
        SearchFilter::from_form(
            self.person_name.as_deref(),
            self.date_taken.as_deref(),
            self.place_taken.as_deref(),
        )
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ResultQuery {
    pub highlight_person_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GalleryQuery {
    pub notice: Option<String>,
}

fn bad_form(e: axum::extract::multipart::MultipartError) -> ArchiveError {
    ArchiveError::Validation(format!("malformed upload form: {}", e))
}

/// Collect the upload form fields. Unknown fields are skipped.
pub(crate) async fn read_upload_form(mut multipart: Multipart) -> ArchiveResult<UploadRequest> {
    let mut request = UploadRequest::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(bad_form)?;
                request.file = Some(UploadedFile {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            "date_taken" => request.date_taken = Some(field.text().await.map_err(bad_form)?),
            "place_taken" => request.place_taken = Some(field.text().await.map_err(bad_form)?),
            "description" => request.description = Some(field.text().await.map_err(bad_form)?),
            other => tracing::debug!(field = %other, "Ignoring unknown upload field"),
        }
    }

    Ok(request)
}

pub async fn home() -> Html<String> {
    Html(views::render_home())
}

pub async fn upload(State(state): State<AppState>, multipart: Multipart) -> ArchiveResult<Html<String>> {
    let request = read_upload_form(multipart).await?;
    let outcome = state.run(move |archive| archive.upload(request)).await?;
    Ok(Html(views::render_upload_result(&outcome)))
}

/// Serve a stored asset, with HEAD, range and conditional request support.
async fn serve_asset(
    state: &AppState,
    kind: AssetKind,
    filename: &str,
    request: Request,
) -> ArchiveResult<Response> {
    let path = state.archive.store().resolve(kind, filename)?;
    let mime = mime_guess::from_path(&path).first_or_octet_stream();

    let response = match ServeFile::new_with_mime(&path, &mime).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    Ok(response.map(Body::new))
}

pub async fn serve_upload(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    request: Request,
) -> ArchiveResult<Response> {
    serve_asset(&state, AssetKind::Original, &filename, request).await
}

pub async fn serve_face(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    request: Request,
) -> ArchiveResult<Response> {
    serve_asset(&state, AssetKind::Face, &filename, request).await
}

pub async fn identify(
    State(state): State<AppState>,
    Path(img_id): Path<String>,
    Form(fields): Form<HashMap<String, String>>,
) -> ArchiveResult<Redirect> {
    let image_id = img_id.clone();
    state
        .run(move |archive| archive.tag_faces(&image_id, &fields))
        .await?;
    Ok(Redirect::to(&format!("/result/{}", img_id)))
}

async fn load_detail(state: &AppState, img_id: String, query: ResultQuery) -> ArchiveResult<ImageDetail> {
    // A blank or garbled highlight id just means no highlight
    let highlight = query
        .highlight_person_id
        .as_deref()
        .and_then(|raw| raw.trim().parse::<i64>().ok());
    state
        .run(move |archive| archive.image_detail(&img_id, highlight))
        .await
}

pub async fn result(
    State(state): State<AppState>,
    Path(img_id): Path<String>,
    Query(query): Query<ResultQuery>,
) -> ArchiveResult<Html<String>> {
    let detail = load_detail(&state, img_id, query).await?;
    Ok(Html(views::render_result(&detail)))
}

pub async fn gallery(
    State(state): State<AppState>,
    Query(query): Query<GalleryQuery>,
) -> ArchiveResult<Html<String>> {
    let summaries = state.run(|archive| archive.gallery()).await?;
    let notice = query.notice.filter(|n| !n.trim().is_empty());
    Ok(Html(views::render_gallery(&summaries, notice.as_deref())))
}

async fn run_search(state: &AppState, form: SearchForm) -> ArchiveResult<SearchOutcome> {
    let filter = form.into_filter();
    state.run(move |archive| archive.search(filter)).await
}

pub async fn search_get(
    State(state): State<AppState>,
    Query(form): Query<SearchForm>,
) -> ArchiveResult<Html<String>> {
    let outcome = run_search(&state, form).await?;
    Ok(Html(views::render_search(&outcome)))
}

pub async fn search_post(
    State(state): State<AppState>,
    Form(form): Form<SearchForm>,
) -> ArchiveResult<Html<String>> {
    let outcome = run_search(&state, form).await?;
    Ok(Html(views::render_search(&outcome)))
}

pub(crate) fn gallery_notice_url(notice: &str) -> String {
    format!(
        "/gallery?notice={}",
        utf8_percent_encode(notice, NON_ALPHANUMERIC)
    )
}

pub async fn reset(State(state): State<AppState>) -> Redirect {
    let notice = match state.run(|archive| archive.reset()).await {
        Ok(outcome) => outcome.notice(),
        Err(e) => {
            tracing::error!(error = %e, "Reset failed");
            format!("Reset failed: {}", e)
        }
    };
    Redirect::to(&gallery_notice_url(&notice))
}

pub async fn api_gallery(State(state): State<AppState>) -> ArchiveResult<Json<Vec<ImageSummary>>> {
    let summaries = state.run(|archive| archive.gallery()).await?;
    Ok(Json(summaries))
}

pub async fn api_result(
    State(state): State<AppState>,
    Path(img_id): Path<String>,
    Query(query): Query<ResultQuery>,
) -> ArchiveResult<Json<ImageDetail>> {
    Ok(Json(load_detail(&state, img_id, query).await?))
}

pub async fn api_search(
    State(state): State<AppState>,
    Query(form): Query<SearchForm>,
) -> ArchiveResult<Json<SearchOutcome>> {
    Ok(Json(run_search(&state, form).await?))
}
