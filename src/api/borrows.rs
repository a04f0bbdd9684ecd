//! Borrow management endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::borrow::{ActiveBorrow, BorrowHistoryEntry, MyBorrow, ReturnReceipt},
};

use super::{AppJson, AuthenticatedUser};

/// Borrow request
#[derive(Deserialize, ToSchema)]
pub struct BorrowRequest {
    pub book_id: i32,
}

/// Borrow response with the due date
#[derive(Serialize, ToSchema)]
pub struct BorrowResponse {
    /// Borrow ID
    pub id: i32,
    pub book_id: i32,
    /// Due date (ISO 8601 format)
    pub due_date: DateTime<Utc>,
    /// Status message
    pub message: String,
}

/// Borrow a book (member)
#[utoipa::path(
    post,
    path = "/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Book borrowed", body = BorrowResponse),
        (status = 403, description = "Member account required"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "No copy available or borrow limit reached")
    )
)]
pub async fn borrow_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppJson(request): AppJson<BorrowRequest>,
) -> AppResult<(StatusCode, Json<BorrowResponse>)> {
    claims.require_member()?;

    let borrow = state
        .services
        .borrows
        .borrow_book(claims.user_id, request.book_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(BorrowResponse {
            id: borrow.id,
            book_id: borrow.book_id,
            due_date: borrow.due_date,
            message: "Book borrowed successfully".to_string(),
        }),
    ))
}

/// Return a borrowed book (admin)
#[utoipa::path(
    post,
    path = "/borrows/{id}/return",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow ID")
    ),
    responses(
        (status = 200, description = "Book returned, with the fine charged", body = ReturnReceipt),
        (status = 404, description = "Borrow not found"),
        (status = 409, description = "Already returned")
    )
)]
pub async fn return_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(borrow_id): Path<i32>,
) -> AppResult<Json<ReturnReceipt>> {
    claims.require_admin()?;

    let receipt = state.services.borrows.return_book(borrow_id).await?;
    Ok(Json(receipt))
}

/// The caller's own borrows (member)
#[utoipa::path(
    get,
    path = "/borrows/mine",
    tag = "borrows",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Borrows, newest first", body = Vec<MyBorrow>),
        (status = 403, description = "Member account required")
    )
)]
pub async fn my_borrows(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<MyBorrow>>> {
    claims.require_member()?;

    let borrows = state.services.borrows.get_member_borrows(claims.user_id).await?;
    Ok(Json(borrows))
}

/// Books currently out (admin)
#[utoipa::path(
    get,
    path = "/borrows/active",
    tag = "borrows",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Open borrows", body = Vec<ActiveBorrow>),
        (status = 403, description = "Admin privileges required")
    )
)]
pub async fn active_borrows(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<ActiveBorrow>>> {
    claims.require_admin()?;

    let borrows = state.services.borrows.get_active_borrows().await?;
    Ok(Json(borrows))
}

/// Returned borrows (admin)
#[utoipa::path(
    get,
    path = "/borrows/history",
    tag = "borrows",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Returned borrows, latest first", body = Vec<BorrowHistoryEntry>),
        (status = 403, description = "Admin privileges required")
    )
)]
pub async fn borrow_history(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BorrowHistoryEntry>>> {
    claims.require_admin()?;

    let history = state.services.borrows.get_history().await?;
    Ok(Json(history))
}
