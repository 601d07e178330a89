//! Uploaded documents of an application.
//!
//! Blobs live in a [`StorageBackend`] under opaque keys; rows in the
//! `document` table point at them. Uploads validate before anything touches
//! storage and remove the blob again when the database side fails.

use std::sync::Arc;

use admissions_common::{AppError, AppResult, IdGenerator, StorageBackend, generate_document_key};
use admissions_db::{
    entities::document::{self, DocumentType},
    repositories::{ApplicationRepository, DocumentRepository},
};
use chrono::Utc;
use sea_orm::{DatabaseConnection, Set, TransactionTrait};

use super::{
    access::Principal,
    application::{ApplicationService, ensure_owner_and_draft},
    audit::{AuditEntry, AuditService, RequestMeta, actions},
};

const ALLOWED_EXTENSIONS: [&str; 7] = ["jpeg", "jpg", "png", "gif", "pdf", "doc", "docx"];

const ALLOWED_MIME_TYPES: [&str; 6] = [
    "image/jpeg",
    "image/png",
    "image/gif",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// A file received from a client.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Form fields sent alongside an upload.
#[derive(Debug, Clone, Default)]
pub struct DocumentMetadata {
    pub name: Option<String>,
    pub document_type: Option<String>,
    pub institution: Option<String>,
}

/// Contents of a stored document.
#[derive(Debug, Clone)]
pub struct DocumentDownload {
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Check an upload and its metadata.
///
/// Returns the trimmed display name and the parsed document type.
pub fn validate_upload(
    file: &UploadedFile,
    metadata: &DocumentMetadata,
    max_bytes: u64,
) -> AppResult<(String, DocumentType)> {
    let extension = file
        .original_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let mime = file.mime_type.to_ascii_lowercase();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str())
        || !ALLOWED_MIME_TYPES.contains(&mime.as_str())
    {
        return Err(AppError::Validation(
            "Only .jpeg, .jpg, .png, .gif, .pdf, .doc, .docx files are allowed!".to_string(),
        ));
    }

    if file.data.is_empty() {
        return Err(AppError::Validation("Please upload a file".to_string()));
    }
    if file.data.len() as u64 > max_bytes {
        return Err(AppError::Validation(format!(
            "File too large; the limit is {} MB",
            max_bytes / (1024 * 1024)
        )));
    }

    let name = metadata
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::Validation("Document name is required".to_string()))?;
    let document_type = metadata
        .document_type
        .as_deref()
        .ok_or_else(|| AppError::Validation("Document type is required".to_string()))?
        .parse::<DocumentType>()
        .map_err(AppError::Validation)?;

    Ok((name.to_string(), document_type))
}

/// Document service.
#[derive(Clone)]
pub struct DocumentService {
    db: Arc<DatabaseConnection>,
    application_repo: ApplicationRepository,
    document_repo: DocumentRepository,
    applications: ApplicationService,
    audit: AuditService,
    storage: Arc<dyn StorageBackend>,
    id_gen: IdGenerator,
    max_upload_bytes: u64,
}

impl DocumentService {
    /// Create a new document service.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub const fn new(
        db: Arc<DatabaseConnection>,
        application_repo: ApplicationRepository,
        document_repo: DocumentRepository,
        applications: ApplicationService,
        audit: AuditService,
        storage: Arc<dyn StorageBackend>,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            db,
            application_repo,
            document_repo,
            applications,
            audit,
            storage,
            id_gen: IdGenerator::new(),
            max_upload_bytes,
        }
    }

    /// Store a file and attach it to a draft application.
    pub async fn upload(
        &self,
        application_id: &str,
        caller_id: &str,
        file: UploadedFile,
        metadata: DocumentMetadata,
        meta: &RequestMeta,
    ) -> AppResult<document::Model> {
        let (name, document_type) = validate_upload(&file, &metadata, self.max_upload_bytes)?;

        let app = self
            .application_repo
            .find_by_id(application_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;
        ensure_owner_and_draft(&app, caller_id, "update")?;

        let key = generate_document_key(&app.id, &file.original_name);
        let stored = self.storage.write(&key, &file.data).await?;

        let now = Utc::now();
        let model = document::ActiveModel {
            id: Set(self.id_gen.generate()),
            application_id: Set(app.id.clone()),
            name: Set(name),
            document_type: Set(document_type),
            institution: Set(metadata
                .institution
                .map(|i| i.trim().to_string())
                .filter(|i| !i.is_empty())),
            storage_key: Set(stored.key.clone()),
            original_file_name: Set(file.original_name),
            file_size: Set(i64::try_from(stored.size).unwrap_or(i64::MAX)),
            mime_type: Set(file.mime_type),
            verified: Set(false),
            verified_by: Set(None),
            verified_at: Set(None),
            comments: Set(None),
            uploaded_at: Set(now.into()),
            created_at: Set(now.into()),
            updated_at: Set(None),
        };

        match self.persist_upload(&app.id, caller_id, model, meta).await {
            Ok(document) => {
                tracing::info!(
                    application_id = %app.id,
                    document_id = %document.id,
                    size = stored.size,
                    "Document uploaded"
                );
                Ok(document)
            }
            Err(e) => {
                if let Err(cleanup) = self.storage.delete(&stored.key).await {
                    tracing::warn!(key = %stored.key, error = %cleanup, "Failed to remove orphaned blob");
                }
                Err(e)
            }
        }
    }

    async fn persist_upload(
        &self,
        application_id: &str,
        caller_id: &str,
        model: document::ActiveModel,
        meta: &RequestMeta,
    ) -> AppResult<document::Model> {
        let txn = self.db.begin().await?;
        let document = self
            .applications
            .attach_document(&txn, application_id, caller_id, model)
            .await?;
        self.audit
            .record(
                &txn,
                AuditEntry::new(
                    Some(caller_id),
                    actions::UPLOAD_DOCUMENT,
                    "Document",
                    Some(&document.id),
                    format!("Uploaded document: {}", document.name),
                ),
                meta,
            )
            .await;
        txn.commit().await?;
        Ok(document)
    }

    /// Load an application the principal may read.
    async fn check_readable(&self, application_id: &str, principal: &Principal) -> AppResult<()> {
        let app = self
            .application_repo
            .find_by_id(application_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;
        if app.user_id != principal.user_id && !principal.is_staff() {
            return Err(AppError::Forbidden(
                "Not authorized to access this application".to_string(),
            ));
        }
        Ok(())
    }

    /// Documents of an application.
    pub async fn list(
        &self,
        application_id: &str,
        principal: &Principal,
    ) -> AppResult<Vec<document::Model>> {
        self.check_readable(application_id, principal).await?;
        self.document_repo.find_by_application(application_id).await
    }

    /// One document of an application.
    pub async fn get(
        &self,
        application_id: &str,
        document_id: &str,
        principal: &Principal,
    ) -> AppResult<document::Model> {
        self.check_readable(application_id, principal).await?;
        self.document_repo
            .find_in_application(application_id, document_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Document not found".to_string()))
    }

    /// Stored bytes of a document.
    pub async fn download(
        &self,
        application_id: &str,
        document_id: &str,
        principal: &Principal,
    ) -> AppResult<DocumentDownload> {
        let document = self.get(application_id, document_id, principal).await?;
        let data = self.storage.read(&document.storage_key).await?;

        Ok(DocumentDownload {
            file_name: document.original_file_name,
            mime_type: document.mime_type,
            data,
        })
    }

    /// Remove a document from a draft application.
    pub async fn delete(
        &self,
        application_id: &str,
        document_id: &str,
        caller_id: &str,
        meta: &RequestMeta,
    ) -> AppResult<()> {
        let txn = self.db.begin().await?;
        let app = self
            .application_repo
            .find_by_id_in(&txn, application_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;
        ensure_owner_and_draft(&app, caller_id, "update")?;

        let document = self
            .document_repo
            .find_in_application_in(&txn, application_id, document_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Document not found".to_string()))?;
        self.document_repo.delete_in(&txn, &document.id).await?;
        self.audit
            .record(
                &txn,
                AuditEntry::new(
                    Some(caller_id),
                    actions::DELETE_DOCUMENT,
                    "Document",
                    Some(&document.id),
                    format!("Deleted document: {}", document.name),
                ),
                meta,
            )
            .await;
        txn.commit().await?;

        if let Err(e) = self.storage.delete(&document.storage_key).await {
            tracing::warn!(key = %document.storage_key, error = %e, "Failed to remove document blob");
        }
        Ok(())
    }
}
