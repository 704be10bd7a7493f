//! Draft endpoints

use super::envelope::{message, ok, ApiResult};
use super::AppState;
use crate::model::SaveDraftRequest;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;

/// Current draft against the active template, or null
pub async fn show(State(state): State<AppState>, Path(installation_id): Path<String>) -> ApiResult {
    let template = state
        .db
        .get_active_template()
        .await?
        .ok_or(crate::Error::NoActiveTemplate)?;
    state.db.require_installation(&installation_id).await?;

    let draft = state.db.get_draft(&installation_id, &template.id).await?;
    let text = if draft.is_some() {
        "Draft loaded successfully."
    } else {
        "No draft found."
    };
    Ok(ok(text, draft))
}

pub async fn save(
    State(state): State<AppState>,
    Path(installation_id): Path<String>,
    payload: Result<Json<SaveDraftRequest>, JsonRejection>,
) -> ApiResult {
    let Json(body) = payload?;
    let input = body.validate()?;
    let template = state
        .db
        .get_active_template()
        .await?
        .ok_or(crate::Error::NoActiveTemplate)?;

    let draft = state
        .db
        .save_draft(
            &installation_id,
            &template.id,
            &input.form_data,
            input.progress_percentage,
            input.section.as_deref(),
        )
        .await?;
    Ok(ok("Draft saved successfully.", draft))
}

/// Delete the draft against the active template; absent drafts are not an error
pub async fn destroy(State(state): State<AppState>, Path(installation_id): Path<String>) -> ApiResult {
    let template = state
        .db
        .get_active_template()
        .await?
        .ok_or(crate::Error::NoActiveTemplate)?;
    state.db.delete_draft(&installation_id, &template.id).await?;
    Ok(message("Draft deleted successfully."))
}

pub async fn index(State(state): State<AppState>, Path(installation_id): Path<String>) -> ApiResult {
    let drafts = state.db.list_drafts(&installation_id).await?;
    Ok(ok("Drafts retrieved successfully.", drafts))
}

pub async fn show_by_id(
    State(state): State<AppState>,
    Path((installation_id, draft_id)): Path<(String, String)>,
) -> ApiResult {
    let draft = state.db.get_draft_by_id(&installation_id, &draft_id).await?;
    Ok(ok("Draft retrieved successfully.", draft))
}

pub async fn destroy_by_id(
    State(state): State<AppState>,
    Path((installation_id, draft_id)): Path<(String, String)>,
) -> ApiResult {
    state
        .db
        .delete_draft_by_id(&installation_id, &draft_id)
        .await?;
    Ok(message("Draft deleted successfully."))
}

pub async fn stats(State(state): State<AppState>) -> ApiResult {
    let stats = state.db.draft_stats().await?;
    Ok(ok("Draft statistics retrieved successfully.", stats))
}

pub async fn stale(State(state): State<AppState>) -> ApiResult {
    let drafts = state.db.list_stale_drafts().await?;
    Ok(ok("Stale drafts retrieved successfully.", drafts))
}

pub async fn cleanup(State(state): State<AppState>) -> ApiResult {
    let report = state.db.purge_stale_drafts().await?;
    let text = format!("Cleaned up {} stale drafts.", report.deleted_count);
    Ok(ok(text, report))
}
