use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireUser;
use crate::error::Error;
use crate::history::{DEFAULT_EDIT_HISTORY_LIMIT, DEFAULT_HISTORY_LIMIT};
use crate::server::AppState;
use crate::server::dto::{
    AddMemberRequest, ContentRequest, ContentResponse, CreateProjectRequest, HistoryParams,
};
use crate::server::response::{ApiError, ApiResponse};
use crate::workspace::{EditOutcome, NewProject};

pub async fn list_projects(
    RequireUser(user): RequireUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let projects = state.workspace.list_projects(&user.id).await?;
    Ok::<_, ApiError>(Json(ApiResponse::success(projects)))
}

pub async fn create_project(
    RequireUser(user): RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateProjectRequest>,
) -> impl IntoResponse {
    let project = state
        .workspace
        .create_project(
            &user.id,
            NewProject {
                id: req.id,
                name: req.name,
                description: req.description,
                content: req.content,
            },
        )
        .await?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(project))))
}

pub async fn get_project(
    RequireUser(user): RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let project = state.workspace.get_project(&id, &user.id).await?;
    Ok::<_, ApiError>(Json(ApiResponse::success(project)))
}

pub async fn add_member(
    RequireUser(user): RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AddMemberRequest>,
) -> impl IntoResponse {
    let project = state
        .workspace
        .add_member(&id, &user.id, req.user_id.trim())
        .await?;
    Ok::<_, ApiError>(Json(ApiResponse::success(project)))
}

/// Owners and admins commit; everyone else stages a change for review.
pub async fn update_content(
    RequireUser(user): RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ContentRequest>,
) -> impl IntoResponse {
    let content = req
        .content
        .ok_or_else(|| ApiError::from(Error::InvalidInput("content is required".into())))?;

    let outcome = state.workspace.propose_edit(&id, &user.id, &content).await?;
    let message = outcome.message();

    let response = match outcome {
        EditOutcome::Committed { operation, .. } => ContentResponse {
            committed: true,
            staged: false,
            change_id: None,
            message,
            version: Some(operation.version),
        },
        EditOutcome::Staged { change } => ContentResponse {
            committed: false,
            staged: true,
            change_id: Some(change.id),
            message,
            version: None,
        },
    };

    Ok::<_, ApiError>(Json(ApiResponse::success(response)))
}

pub async fn list_staged_changes(
    RequireUser(user): RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let changes = state.workspace.staged_changes(&id, &user.id).await?;
    Ok::<_, ApiError>(Json(ApiResponse::success(changes)))
}

pub async fn history(
    RequireUser(user): RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let entries = state.workspace.history(&id, &user.id, Some(limit)).await?;
    Ok::<_, ApiError>(Json(ApiResponse::success(entries)))
}

pub async fn edit_history(
    RequireUser(user): RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(DEFAULT_EDIT_HISTORY_LIMIT);
    let entries = state.workspace.edit_history(&id, &user.id, Some(limit)).await?;
    Ok::<_, ApiError>(Json(ApiResponse::success(entries)))
}
