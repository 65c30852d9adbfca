//! Axum route handlers for the Screening API.

use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::ScreeningOverrides;
use crate::errors::AppError;
use crate::extraction::ResumeDocument;
use crate::models::candidate::{CandidateProfile, DocumentStatus};
use crate::models::requirements::JobRequirements;
use crate::models::warnings::CandidateWarning;
use crate::profile::{self, ProfileOptions};
use crate::screening::jd_parser::parse_requirements;
use crate::screening::pipeline::{run_batch, ScreeningReport};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ParseRequirementsRequest {
    pub job_description: String,
}

#[derive(Debug, Serialize)]
pub struct ParseRequirementsResponse {
    pub requirements: JobRequirements,
}

#[derive(Debug, Serialize)]
pub struct ParseResumeResponse {
    pub status: DocumentStatus,
    pub profile: CandidateProfile,
    pub warnings: Vec<CandidateWarning>,
}

/// One uploaded file, before format detection.
struct UploadedFile {
    filename: String,
    content_type: Option<String>,
    data: Bytes,
}

impl UploadedFile {
    fn into_document(self) -> ResumeDocument {
        ResumeDocument::new(self.filename, self.content_type.as_deref(), self.data)
    }
}

async fn read_file(field: axum::extract::multipart::Field<'_>) -> Result<UploadedFile, AppError> {
    let filename = field.file_name().unwrap_or("resume").to_string();
    let content_type = field.content_type().map(str::to_string);
    let data = field
        .bytes()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read file {filename}: {e}")))?;
    Ok(UploadedFile {
        filename,
        content_type,
        data,
    })
}

async fn read_text(field: axum::extract::multipart::Field<'_>, name: &str) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read {name}: {e}")))
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/requirements/parse
///
/// Parses a job description into structured requirements.
/// Useful for previewing what a screening will score against.
pub async fn handle_parse_requirements(
    State(state): State<AppState>,
    Json(request): Json<ParseRequirementsRequest>,
) -> Result<Json<ParseRequirementsResponse>, AppError> {
    let requirements = parse_requirements(&request.job_description, &state.vocabulary)?;
    Ok(Json(ParseRequirementsResponse { requirements }))
}

/// POST /api/v1/resumes/parse
///
/// Multipart: `resume` (file), optional `candidate_id` (text).
/// Returns the extracted profile for one resume without scoring it.
pub async fn handle_parse_resume(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ParseResumeResponse>, AppError> {
    let mut file: Option<UploadedFile> = None;
    let mut candidate_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read form field: {e}")))?
    {
        match field.name().unwrap_or("") {
            "resume" => file = Some(read_file(field).await?),
            "candidate_id" => {
                let value = read_text(field, "candidate_id").await?;
                if !value.trim().is_empty() {
                    candidate_id = Some(value.trim().to_string());
                }
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| AppError::Validation("resume file is required".to_string()))?;
    let mut doc = file.into_document();
    if let Some(id) = candidate_id {
        doc = doc.with_candidate_id(id);
    }

    let screening = &state.config.screening;
    let options = ProfileOptions {
        fuzzy_match_threshold: screening.fuzzy_match_threshold,
        as_of: screening
            .as_of
            .unwrap_or_else(|| chrono::Utc::now().date_naive()),
        deadline: std::time::Instant::now().checked_add(screening.per_document_timeout()),
    };

    let vocabulary = state.vocabulary.clone();
    let analyzed = tokio::task::spawn_blocking(move || profile::analyze(&doc, &vocabulary, &options))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("resume worker failed: {e}")))?;

    Ok(Json(ParseResumeResponse {
        status: analyzed.status,
        profile: analyzed.profile,
        warnings: analyzed.warnings,
    }))
}

/// POST /api/v1/screenings
///
/// Multipart: `job_description` (text), optional `config` (JSON overrides), one or more
/// `resumes` (files). Returns every candidate ranked against the parsed requirements.
/// Dropping the request (client disconnect) cancels the batch.
pub async fn handle_create_screening(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ScreeningReport>, AppError> {
    let mut job_description: Option<String> = None;
    let mut overrides = ScreeningOverrides::default();
    let mut files: Vec<UploadedFile> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read form field: {e}")))?
    {
        match field.name().unwrap_or("") {
            "job_description" => job_description = Some(read_text(field, "job_description").await?),
            "config" => {
                let raw = read_text(field, "config").await?;
                if !raw.trim().is_empty() {
                    overrides = serde_json::from_str(&raw)
                        .map_err(|e| AppError::Validation(format!("Invalid config: {e}")))?;
                }
            }
            "resumes" => files.push(read_file(field).await?),
            _ => {}
        }
    }

    let job_description = job_description
        .ok_or_else(|| AppError::Validation("job_description is required".to_string()))?;
    if files.is_empty() {
        return Err(AppError::Validation(
            "at least one resumes file is required".to_string(),
        ));
    }

    let config = state.config.screening.with_overrides(overrides);
    let docs = files.into_iter().map(UploadedFile::into_document).collect();

    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let report = run_batch(
        docs,
        &job_description,
        &config,
        state.vocabulary.clone(),
        state.similarity.clone(),
        cancel,
    )
    .await?;

    Ok(Json(report))
}
