//! File upload, state and management endpoints

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{FileId, FileRecord, PageText, ParsingState, UploadOutcome};

/// Response for file list
#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub files: Vec<FileRecord>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub file_id: FileId,
    pub parsing_state: ParsingState,
}

#[derive(Debug, Serialize)]
pub struct PagesResponse {
    pub file_id: FileId,
    pub total: usize,
    pub pages: Vec<PageText>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub file_id: FileId,
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct ReindexResponse {
    pub file_id: FileId,
    pub pages_indexed: usize,
}

#[derive(Debug, Serialize)]
pub struct VectorCountResponse {
    pub file_id: FileId,
    pub vector_count: usize,
}

/// POST /api/files - Upload one file (multipart field `file`)
///
/// Returns 202 when extraction was scheduled, 200 when the file was stored
/// but the dispatcher refused the job.
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadOutcome>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::validation(format!("Failed to read multipart field: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .ok_or_else(|| Error::validation("Multipart field 'file' has no filename"))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| Error::validation(format!("Failed to read '{}': {}", filename, e)))?;

        let outcome = state
            .service()
            .upload_and_schedule(&filename, data.to_vec())
            .await?;

        let status = if outcome.scheduled {
            StatusCode::ACCEPTED
        } else {
            StatusCode::OK
        };
        return Ok((status, Json(outcome)));
    }

    Err(Error::validation("Missing multipart field 'file'"))
}

/// GET /api/files
pub async fn list_files(State(state): State<AppState>) -> Result<Json<FileListResponse>> {
    let files = state.service().list_files().await?;
    Ok(Json(FileListResponse {
        total: files.len(),
        files,
    }))
}

/// GET /api/files/:id
pub async fn get_file(State(state): State<AppState>, Path(id): Path<FileId>) -> Result<Json<FileRecord>> {
    Ok(Json(state.service().get_file(id).await?))
}

/// GET /api/files/:id/state
pub async fn get_state(
    State(state): State<AppState>,
    Path(id): Path<FileId>,
) -> Result<Json<StateResponse>> {
    let parsing_state = state.service().get_parsing_state(id).await?;
    Ok(Json(StateResponse {
        file_id: id,
        parsing_state,
    }))
}

/// GET /api/files/:id/pages
pub async fn get_pages(
    State(state): State<AppState>,
    Path(id): Path<FileId>,
) -> Result<Json<PagesResponse>> {
    let pages = state.service().get_pages(id).await?;
    Ok(Json(PagesResponse {
        file_id: id,
        total: pages.len(),
        pages,
    }))
}

/// GET /api/files/:id/blob - Original upload bytes
pub async fn get_blob(State(state): State<AppState>, Path(id): Path<FileId>) -> Result<Response> {
    let record = state.service().get_file(id).await?;
    let bytes = state.service().get_blob(id).await?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        record.filename.replace('"', "")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// DELETE /api/files/:id
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<FileId>,
) -> Result<Json<DeleteResponse>> {
    if !state.service().delete_file(id).await? {
        return Err(Error::NotFound(id));
    }
    Ok(Json(DeleteResponse {
        file_id: id,
        deleted: true,
    }))
}

/// POST /api/files/:id/schedule - Retry admission for a pending file
pub async fn schedule_file(
    State(state): State<AppState>,
    Path(id): Path<FileId>,
) -> Result<(StatusCode, Json<UploadOutcome>)> {
    let outcome = state.service().schedule_file(id).await?;
    let status = if outcome.scheduled {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)))
}

/// POST /api/files/:id/reindex
pub async fn reindex_file(
    State(state): State<AppState>,
    Path(id): Path<FileId>,
) -> Result<Json<ReindexResponse>> {
    let pages_indexed = state.service().reindex_file(id).await?;
    Ok(Json(ReindexResponse {
        file_id: id,
        pages_indexed,
    }))
}

/// GET /api/files/:id/vector-count
pub async fn vector_count(
    State(state): State<AppState>,
    Path(id): Path<FileId>,
) -> Result<Json<VectorCountResponse>> {
    let vector_count = state.service().vector_count(id).await?;
    Ok(Json(VectorCountResponse {
        file_id: id,
        vector_count,
    }))
}
