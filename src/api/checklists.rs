//! Template administration and active-template endpoints

use super::envelope::{created, message, ok, ApiResult};
use super::AppState;
use crate::model::{
    form_data_from_json, NewQuestion, NewSection, NewTemplate, QuestionPatch, ReorderEntry,
    SectionPatch, TemplatePatch,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    #[serde(default)]
    form_data: Option<Value>,
}

#[derive(Debug, Serialize)]
struct ValidationReport {
    valid: bool,
    errors: crate::error::ValidationErrors,
}

#[derive(Debug, Deserialize)]
pub struct SectionOrder {
    #[serde(default)]
    sections: Vec<ReorderEntry>,
}

#[derive(Debug, Deserialize)]
pub struct QuestionOrder {
    #[serde(default)]
    questions: Vec<ReorderEntry>,
}

// ===== Templates =====

pub async fn index(State(state): State<AppState>) -> ApiResult {
    let templates = state.db.list_active_templates().await?;
    Ok(ok("Checklists retrieved successfully.", templates))
}

pub async fn active(State(state): State<AppState>) -> ApiResult {
    let structure = state.db.get_active_template_with_structure().await?;
    Ok(ok("Active checklist retrieved successfully.", structure))
}

/// Dry-run the per-question rules of the active template
pub async fn validate_active(
    State(state): State<AppState>,
    payload: Result<Json<ValidateRequest>, JsonRejection>,
) -> ApiResult {
    let Json(body) = payload?;
    let form = form_data_from_json(body.form_data.as_ref())?;
    let errors = state.db.validate_active_form(&form).await?;

    let report = ValidationReport {
        valid: errors.is_empty(),
        errors,
    };
    let text = if report.valid {
        "Form is valid."
    } else {
        "Form has validation errors."
    };
    Ok(ok(text, report))
}

pub async fn show(State(state): State<AppState>, Path(checklist_id): Path<String>) -> ApiResult {
    let structure = state.db.get_template_with_structure(&checklist_id).await?;
    Ok(ok("Checklist retrieved successfully.", structure))
}

pub async fn store(
    State(state): State<AppState>,
    payload: Result<Json<NewTemplate>, JsonRejection>,
) -> ApiResult {
    let Json(new) = payload?;
    let template = state.db.create_template(new).await?;
    Ok(created("Checklist created successfully.", template))
}

pub async fn update(
    State(state): State<AppState>,
    Path(checklist_id): Path<String>,
    payload: Result<Json<TemplatePatch>, JsonRejection>,
) -> ApiResult {
    let Json(patch) = payload?;
    let template = state.db.update_template(&checklist_id, patch).await?;
    Ok(ok("Checklist updated successfully.", template))
}

pub async fn destroy(State(state): State<AppState>, Path(checklist_id): Path<String>) -> ApiResult {
    state.db.delete_template(&checklist_id).await?;
    Ok(message("Checklist deleted successfully."))
}

// ===== Sections =====

pub async fn section_index(
    State(state): State<AppState>,
    Path(checklist_id): Path<String>,
) -> ApiResult {
    let sections = state.db.list_sections(&checklist_id).await?;
    Ok(ok("Sections retrieved successfully.", sections))
}

pub async fn section_store(
    State(state): State<AppState>,
    Path(checklist_id): Path<String>,
    payload: Result<Json<NewSection>, JsonRejection>,
) -> ApiResult {
    let Json(new) = payload?;
    let section = state.db.create_section(&checklist_id, new).await?;
    Ok(created("Section created successfully.", section))
}

pub async fn section_show(
    State(state): State<AppState>,
    Path((checklist_id, section_id)): Path<(String, String)>,
) -> ApiResult {
    let section = state.db.get_section(&checklist_id, &section_id).await?;
    Ok(ok("Section retrieved successfully.", section))
}

pub async fn section_update(
    State(state): State<AppState>,
    Path((checklist_id, section_id)): Path<(String, String)>,
    payload: Result<Json<SectionPatch>, JsonRejection>,
) -> ApiResult {
    let Json(patch) = payload?;
    let section = state
        .db
        .update_section(&checklist_id, &section_id, patch)
        .await?;
    Ok(ok("Section updated successfully.", section))
}

pub async fn section_destroy(
    State(state): State<AppState>,
    Path((checklist_id, section_id)): Path<(String, String)>,
) -> ApiResult {
    state.db.delete_section(&checklist_id, &section_id).await?;
    Ok(message("Section deleted successfully."))
}

pub async fn section_reorder(
    State(state): State<AppState>,
    Path(checklist_id): Path<String>,
    payload: Result<Json<SectionOrder>, JsonRejection>,
) -> ApiResult {
    let Json(body) = payload?;
    let sections = state
        .db
        .reorder_sections(&checklist_id, &body.sections)
        .await?;
    Ok(ok("Sections reordered successfully.", sections))
}

// ===== Questions =====

pub async fn question_index(
    State(state): State<AppState>,
    Path((checklist_id, section_id)): Path<(String, String)>,
) -> ApiResult {
    let questions = state.db.list_questions(&checklist_id, &section_id).await?;
    Ok(ok("Questions retrieved successfully.", questions))
}

pub async fn question_store(
    State(state): State<AppState>,
    Path((checklist_id, section_id)): Path<(String, String)>,
    payload: Result<Json<NewQuestion>, JsonRejection>,
) -> ApiResult {
    let Json(new) = payload?;
    let question = state
        .db
        .create_question(&checklist_id, &section_id, new)
        .await?;
    Ok(created("Question created successfully.", question))
}

pub async fn question_show(
    State(state): State<AppState>,
    Path((checklist_id, section_id, question_id)): Path<(String, String, String)>,
) -> ApiResult {
    let question = state
        .db
        .get_question(&checklist_id, &section_id, &question_id)
        .await?;
    Ok(ok("Question retrieved successfully.", question))
}

pub async fn question_update(
    State(state): State<AppState>,
    Path((checklist_id, section_id, question_id)): Path<(String, String, String)>,
    payload: Result<Json<QuestionPatch>, JsonRejection>,
) -> ApiResult {
    let Json(patch) = payload?;
    let question = state
        .db
        .update_question(&checklist_id, &section_id, &question_id, patch)
        .await?;
    Ok(ok("Question updated successfully.", question))
}

pub async fn question_destroy(
    State(state): State<AppState>,
    Path((checklist_id, section_id, question_id)): Path<(String, String, String)>,
) -> ApiResult {
    state
        .db
        .delete_question(&checklist_id, &section_id, &question_id)
        .await?;
    Ok(message("Question deleted successfully."))
}

pub async fn question_reorder(
    State(state): State<AppState>,
    Path((checklist_id, section_id)): Path<(String, String)>,
    payload: Result<Json<QuestionOrder>, JsonRejection>,
) -> ApiResult {
    let Json(body) = payload?;
    let questions = state
        .db
        .reorder_questions(&checklist_id, &section_id, &body.questions)
        .await?;
    Ok(ok("Questions reordered successfully.", questions))
}

pub async fn question_rules(
    State(state): State<AppState>,
    Path((checklist_id, section_id, question_id)): Path<(String, String, String)>,
) -> ApiResult {
    let rules = state
        .db
        .question_rules(&checklist_id, &section_id, &question_id)
        .await?;
    Ok(ok("Validation rules retrieved successfully.", rules))
}
