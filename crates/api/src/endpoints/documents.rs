//! Document endpoints.

use admissions_common::{AppError, AppResult};
use admissions_core::{DocumentMetadata, UploadedFile};
use axum::{
    Router,
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};

use super::applications::DocumentResponse;
use crate::{
    extractors::{AuthUser, ClientMeta},
    middleware::AppState,
    response::ApiResponse,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(list_documents).post(upload_document))
        .route("/{id}/{document_id}", get(get_document).delete(delete_document))
        .route("/{id}/{document_id}/download", get(download_document))
}

fn multipart_error(e: impl std::fmt::Display) -> AppError {
    AppError::Validation(e.to_string())
}

/// Upload a document via multipart form.
///
/// Fields: `file`, `name`, `type` (or `documentType`), optional `institution`.
async fn upload_document(
    AuthUser(principal): AuthUser,
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> AppResult<ApiResponse<DocumentResponse>> {
    let mut file: Option<UploadedFile> = None;
    let mut metadata = DocumentMetadata::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                let original_name = field.file_name().unwrap_or("").to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(multipart_error)?.to_vec();
                file = Some(UploadedFile {
                    original_name,
                    mime_type,
                    data,
                });
            }
            "name" => metadata.name = Some(field.text().await.map_err(multipart_error)?),
            "type" | "documentType" => {
                metadata.document_type = Some(field.text().await.map_err(multipart_error)?);
            }
            "institution" => {
                metadata.institution = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| AppError::Validation("Please upload a file".to_string()))?;
    let document = state
        .documents
        .upload(&id, &principal.user_id, file, metadata, &meta)
        .await?;
    Ok(ApiResponse::created(document.into()))
}

async fn list_documents(
    AuthUser(principal): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Vec<DocumentResponse>>> {
    let documents = state.documents.list(&id, &principal).await?;
    Ok(ApiResponse::list(
        documents.into_iter().map(Into::into).collect(),
    ))
}

async fn get_document(
    AuthUser(principal): AuthUser,
    State(state): State<AppState>,
    Path((id, document_id)): Path<(String, String)>,
) -> AppResult<ApiResponse<DocumentResponse>> {
    let document = state.documents.get(&id, &document_id, &principal).await?;
    Ok(ApiResponse::ok(document.into()))
}

/// Stream the stored file back to the client.
async fn download_document(
    AuthUser(principal): AuthUser,
    State(state): State<AppState>,
    Path((id, document_id)): Path<(String, String)>,
) -> AppResult<Response> {
    let download = state
        .documents
        .download(&id, &document_id, &principal)
        .await?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        attachment_name(&download.file_name)
    );
    Ok((
        [
            (header::CONTENT_TYPE, download.mime_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        download.data,
    )
        .into_response())
}

async fn delete_document(
    AuthUser(principal): AuthUser,
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
    Path((id, document_id)): Path<(String, String)>,
) -> AppResult<ApiResponse<()>> {
    state
        .documents
        .delete(&id, &document_id, &principal.user_id, &meta)
        .await?;
    Ok(ApiResponse::message("Document deleted successfully"))
}

/// File name safe to place in a quoted `Content-Disposition` parameter.
pub(crate) fn attachment_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim().is_empty() {
        "download".to_string()
    } else {
        cleaned
    }
}
