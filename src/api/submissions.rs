//! Submission, history and lifecycle endpoints

use super::envelope::{message, ok, ApiResult};
use super::AppState;
use crate::model::{Installation, SubmitRequest, TemplateStructure};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct InstallationChecklist {
    installation: Installation,
    checklist: TemplateStructure,
}

#[derive(Debug, Serialize)]
struct CodeAnswer {
    question_code: String,
    answer: Option<String>,
}

/// Active template alongside the installation it will be filled for
pub async fn structure(
    State(state): State<AppState>,
    Path(installation_id): Path<String>,
) -> ApiResult {
    let installation = state.db.require_installation(&installation_id).await?;
    let checklist = state.db.get_active_template_with_structure().await?;
    Ok(ok(
        "Checklist structure retrieved successfully.",
        InstallationChecklist {
            installation,
            checklist,
        },
    ))
}

/// Commit a completed checklist; the response carries no payload
pub async fn submit(
    State(state): State<AppState>,
    Path(installation_id): Path<String>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> ApiResult {
    let Json(body) = payload?;
    state.db.submit(&installation_id, &body).await?;
    Ok(message("Checklist submitted successfully."))
}

pub async fn index(State(state): State<AppState>, Path(installation_id): Path<String>) -> ApiResult {
    let submissions = state
        .db
        .list_installation_submissions(&installation_id)
        .await?;
    Ok(ok("Checklists retrieved successfully.", submissions))
}

pub async fn show(State(state): State<AppState>, Path(submission_id): Path<String>) -> ApiResult {
    let submission = state.db.get_submission(&submission_id).await?;
    Ok(ok("Submission retrieved successfully.", submission))
}

pub async fn destroy(State(state): State<AppState>, Path(submission_id): Path<String>) -> ApiResult {
    state.db.delete_submission(&submission_id).await?;
    Ok(message("Submission deleted successfully."))
}

pub async fn verify(State(state): State<AppState>, Path(submission_id): Path<String>) -> ApiResult {
    let submission = state.db.verify_submission(&submission_id).await?;
    Ok(ok("Submission verified successfully.", submission))
}

pub async fn answer(
    State(state): State<AppState>,
    Path((submission_id, question_code)): Path<(String, String)>,
) -> ApiResult {
    let answer = state
        .db
        .answer_for_code(&submission_id, &question_code)
        .await?;
    Ok(ok(
        "Answer retrieved successfully.",
        CodeAnswer {
            question_code,
            answer,
        },
    ))
}
