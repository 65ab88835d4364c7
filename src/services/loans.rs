//! Loan management service

use crate::{
    error::{AppError, AppResult},
    models::loan::{ActiveLoan, Loan, LoanHistoryEntry},
    repository::Repository,
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
}

impl LoansService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Get active loans for a user
    pub async fn get_user_loans(&self, user_id: i64) -> AppResult<Vec<ActiveLoan>> {
        validate_id("userId", user_id)?;
        // Verify user exists
        self.repository.users.get_by_id(user_id).await?;
        self.repository.loans.get_active_for_user(user_id).await
    }

    /// Lend a book to a user
    pub async fn borrow(&self, user_id: i64, book_id: i64) -> AppResult<Loan> {
        validate_id("userId", user_id)?;
        validate_id("bookId", book_id)?;

        match self.repository.loans.borrow(user_id, book_id).await {
            Ok(loan) => {
                tracing::info!(loan_id = loan.id, user_id, book_id, "Book borrowed");
                Ok(loan)
            }
            Err(e) => {
                tracing::debug!(user_id, book_id, "Borrow refused: {}", e);
                Err(e)
            }
        }
    }

    /// Return a book held by a user
    pub async fn return_book(&self, user_id: i64, book_id: i64) -> AppResult<Loan> {
        validate_id("userId", user_id)?;
        validate_id("bookId", book_id)?;

        match self.repository.loans.return_book(user_id, book_id).await {
            Ok(loan) => {
                tracing::info!(loan_id = loan.id, user_id, book_id, "Book returned");
                Ok(loan)
            }
            Err(e) => {
                tracing::debug!(user_id, book_id, "Return refused: {}", e);
                Err(e)
            }
        }
    }

    /// Full loan history for the admin view
    pub async fn history(&self) -> AppResult<Vec<LoanHistoryEntry>> {
        self.repository.loans.history().await
    }
}

fn validate_id(field: &str, id: i64) -> AppResult<()> {
    if id > 0 {
        Ok(())
    } else {
        Err(AppError::Validation(format!("{} must be a positive integer", field)))
    }
}
