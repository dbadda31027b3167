use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{ReviewRequest, ReviewResponse};
use crate::server::response::{ApiError, ApiResponse};

pub async fn get_change(
    RequireUser(user): RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let change = state.workspace.get_change(&id, &user.id).await?;
    Ok::<_, ApiError>(Json(ApiResponse::success(change)))
}

pub async fn review_change(
    RequireUser(user): RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ReviewRequest>,
) -> impl IntoResponse {
    let feedback = req
        .feedback
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty());

    let outcome = state
        .workspace
        .review_change(&id, &user.id, req.approve, feedback)
        .await?;

    let message = outcome.message();
    Ok::<_, ApiError>(Json(ApiResponse::success(ReviewResponse {
        change: outcome.change,
        message,
        operation: outcome.operation,
    })))
}
