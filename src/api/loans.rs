//! Loan management endpoints

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::loan::{ActiveLoan, ActiveLoansQuery, LoanHistoryEntry, LoanRequest},
};

use super::{ApiJson, ApiQuery};

/// Borrow response
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowResponse {
    /// Loan ID
    pub loan_id: i64,
    pub user_id: i64,
    pub book_id: i64,
    /// When the loan started
    pub loan_date: DateTime<Utc>,
    /// Status message
    pub message: String,
}

/// Return response
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReturnResponse {
    pub loan_id: i64,
    pub user_id: i64,
    pub book_id: i64,
    /// When the book was returned
    pub return_date: DateTime<Utc>,
    /// Status message
    pub message: String,
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    request_body = LoanRequest,
    responses(
        (status = 200, description = "Book borrowed", body = BorrowResponse),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 404, description = "User or book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book already on loan", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow(
    State(state): State<crate::AppState>,
    ApiJson(request): ApiJson<LoanRequest>,
) -> AppResult<Json<BorrowResponse>> {
    let loan = state
        .services
        .loans
        .borrow(request.user_id, request.book_id)
        .await?;

    Ok(Json(BorrowResponse {
        loan_id: loan.id,
        user_id: loan.user_id,
        book_id: loan.book_id,
        loan_date: loan.loan_date,
        message: "Book borrowed successfully".to_string(),
    }))
}

/// Get active loans for a user
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    params(ActiveLoansQuery),
    responses(
        (status = 200, description = "User's active loans", body = Vec<ActiveLoan>),
        (status = 400, description = "Missing or invalid userId", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_user_loans(
    State(state): State<crate::AppState>,
    ApiQuery(query): ApiQuery<ActiveLoansQuery>,
) -> AppResult<Json<Vec<ActiveLoan>>> {
    let loans = state.services.loans.get_user_loans(query.user_id).await?;
    Ok(Json(loans))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/returns",
    tag = "loans",
    request_body = LoanRequest,
    responses(
        (status = 200, description = "Book returned", body = ReturnResponse),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 404, description = "No active loan of this book for this user", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<crate::AppState>,
    ApiJson(request): ApiJson<LoanRequest>,
) -> AppResult<Json<ReturnResponse>> {
    let loan = state
        .services
        .loans
        .return_book(request.user_id, request.book_id)
        .await?;

    Ok(Json(ReturnResponse {
        loan_id: loan.id,
        user_id: loan.user_id,
        book_id: loan.book_id,
        return_date: loan.return_date.unwrap_or_else(Utc::now),
        message: "Book returned successfully".to_string(),
    }))
}

/// Full loan history
#[utoipa::path(
    get,
    path = "/admin/loans",
    tag = "admin",
    responses(
        (status = 200, description = "Every loan, most recent first", body = Vec<LoanHistoryEntry>)
    )
)]
pub async fn loan_history(
    State(state): State<crate::AppState>,
) -> AppResult<Json<Vec<LoanHistoryEntry>>> {
    let history = state.services.loans.history().await?;
    Ok(Json(history))
}
