//! Loans repository: the loan ledger.
//!
//! A book has at most one active loan (a row with a null `return_date`). Every
//! state change runs in a single transaction whose first statement is the write
//! that claims the row, so SQLite takes the write lock before anything is read
//! and two borrowers of the same book are serialized by the store.

use chrono::Utc;
use sqlx::{FromRow, Pool, Row, Sqlite};

use crate::{
    error::{is_unique_violation, AppError, AppResult},
    models::{
        book::Book,
        loan::{ActiveLoan, Loan, LoanHistoryEntry},
    },
};

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Sqlite>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Get loan by ID
    #[cfg(test)]
    pub async fn get_by_id(&self, id: i64) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    /// Active loan of a book, if it is lent out
    #[cfg(test)]
    pub async fn find_active_by_book(&self, book_id: i64) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE book_id = ? AND return_date IS NULL",
        )
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(loan)
    }

    /// Lend a book to a user.
    ///
    /// Fails with `NotFound` for an unknown book or user and with
    /// `BookUnavailable` when the book is already on loan. On any failure the
    /// transaction is rolled back and the book keeps its availability.
    pub async fn borrow(&self, user_id: i64, book_id: i64) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        // Check-and-set in one statement
        let claimed = sqlx::query("UPDATE books SET is_available = 0 WHERE id = ? AND is_available = 1")
            .bind(book_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if claimed == 0 {
            let book_exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = ?)")
                    .bind(book_id)
                    .fetch_one(&mut *tx)
                    .await?;

            return Err(if book_exists {
                AppError::BookUnavailable(format!("Book {} is already on loan", book_id))
            } else {
                AppError::NotFound(format!("Book with id {} not found", book_id))
            });
        }

        let user_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

        if !user_exists {
            return Err(AppError::NotFound(format!("User with id {} not found", user_id)));
        }

        let loan = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (user_id, book_id, loan_date, return_date)
            VALUES (?, ?, ?, NULL)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            // Availability flag was stale; the partial unique index still holds the line
            if is_unique_violation(&e) {
                AppError::BookUnavailable(format!("Book {} is already on loan", book_id))
            } else {
                AppError::Database(e)
            }
        })?;

        tx.commit().await?;

        Ok(loan)
    }

    /// Close the active loan of `book_id` held by `user_id`.
    ///
    /// Only the borrower can return a book: a loan held by someone else is
    /// reported as `NotFound`, exactly like a book that is not lent at all.
    pub async fn return_book(&self, user_id: i64, book_id: i64) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let loan = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans SET return_date = ?
            WHERE book_id = ? AND user_id = ? AND return_date IS NULL
            RETURNING *
            "#,
        )
        .bind(Utc::now())
        .bind(book_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "No active loan of book {} for user {}",
                book_id, user_id
            ))
        })?;

        sqlx::query("UPDATE books SET is_available = 1 WHERE id = ?")
            .bind(book_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(loan)
    }

    /// Books currently held by a user, oldest loan first
    pub async fn get_active_for_user(&self, user_id: i64) -> AppResult<Vec<ActiveLoan>> {
        let rows = sqlx::query(
            r#"
            SELECT l.id as loan_id, l.loan_date,
                   b.id, b.title, b.author, b.category, b.cover_url, b.is_available
            FROM loans l
            JOIN books b ON b.id = l.book_id
            WHERE l.user_id = ? AND l.return_date IS NULL
            ORDER BY l.loan_date, l.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            result.push(ActiveLoan {
                loan_id: row.get("loan_id"),
                loan_date: row.get("loan_date"),
                book: Book::from_row(&row)?,
            });
        }

        Ok(result)
    }

    /// Every loan ever made, most recent first
    pub async fn history(&self) -> AppResult<Vec<LoanHistoryEntry>> {
        let entries = sqlx::query_as::<_, LoanHistoryEntry>(
            r#"
            SELECT l.id, l.book_id, b.title, l.user_id, u.name as user_name,
                   l.loan_date, l.return_date
            FROM loans l
            JOIN books b ON b.id = l.book_id
            JOIN users u ON u.id = l.user_id
            ORDER BY l.loan_date DESC, l.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Count active loans
    #[cfg(test)]
    pub async fn count_active(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE return_date IS NULL")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use crate::{models::book::BookQuery, repository::testing};

    use super::*;

    #[tokio::test]
    async fn borrow_marks_book_unavailable() {
        let (repository, _dir) = testing::repository().await;
        let user = testing::insert_user(&repository, "Ada", "ada@example.com").await;
        let book = testing::insert_book(&repository, "The Hobbit", "Adventure").await;

        let loan = repository.loans.borrow(user, book).await.unwrap();

        assert_eq!(loan.user_id, user);
        assert_eq!(loan.book_id, book);
        assert!(loan.is_active());
        assert!(!repository.books.get_by_id(book).await.unwrap().is_available);
        assert_eq!(
            repository.loans.find_active_by_book(book).await.unwrap().unwrap().id,
            loan.id
        );
    }

    #[tokio::test]
    async fn borrowing_a_lent_book_is_a_conflict() {
        let (repository, _dir) = testing::repository().await;
        let ada = testing::insert_user(&repository, "Ada", "ada@example.com").await;
        let bob = testing::insert_user(&repository, "Bob", "bob@example.com").await;
        let book = testing::insert_book(&repository, "1984", "Fiction").await;

        repository.loans.borrow(ada, book).await.unwrap();

        for borrower in [ada, bob] {
            let err = repository.loans.borrow(borrower, book).await.unwrap_err();
            assert!(matches!(err, AppError::BookUnavailable(_)), "{err}");
        }
        assert_eq!(repository.loans.count_active().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn borrowing_an_unknown_book_is_not_found() {
        let (repository, _dir) = testing::repository().await;
        let user = testing::insert_user(&repository, "Ada", "ada@example.com").await;

        let err = repository.loans.borrow(user, 999).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn unknown_borrower_rolls_back_availability() {
        let (repository, _dir) = testing::repository().await;
        let book = testing::insert_book(&repository, "Dune", "Science Fiction").await;

        let err = repository.loans.borrow(999, book).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        assert!(repository.books.get_by_id(book).await.unwrap().is_available);
        assert!(repository.loans.find_active_by_book(book).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn borrow_then_return_restores_availability() {
        let (repository, _dir) = testing::repository().await;
        let user = testing::insert_user(&repository, "Ada", "ada@example.com").await;
        let book = testing::insert_book(&repository, "The Hobbit", "Adventure").await;
        assert!(repository.books.get_by_id(book).await.unwrap().is_available);

        let loan = repository.loans.borrow(user, book).await.unwrap();
        let returned = repository.loans.return_book(user, book).await.unwrap();

        assert_eq!(returned.id, loan.id);
        assert!(returned.return_date.is_some());
        assert!(repository.books.get_by_id(book).await.unwrap().is_available);

        // The closed loan stays in the ledger and the book can be lent again
        assert!(!repository.loans.get_by_id(loan.id).await.unwrap().is_active());
        let again = repository.loans.borrow(user, book).await.unwrap();
        assert_ne!(again.id, loan.id);
    }

    #[tokio::test]
    async fn only_the_borrower_can_return() {
        let (repository, _dir) = testing::repository().await;
        let ada = testing::insert_user(&repository, "Ada", "ada@example.com").await;
        let bob = testing::insert_user(&repository, "Bob", "bob@example.com").await;
        let book = testing::insert_book(&repository, "1984", "Fiction").await;

        let loan = repository.loans.borrow(ada, book).await.unwrap();

        let err = repository.loans.return_book(bob, book).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        assert!(repository.loans.get_by_id(loan.id).await.unwrap().is_active());
        assert!(!repository.books.get_by_id(book).await.unwrap().is_available);
    }

    #[tokio::test]
    async fn returning_twice_fails() {
        let (repository, _dir) = testing::repository().await;
        let user = testing::insert_user(&repository, "Ada", "ada@example.com").await;
        let book = testing::insert_book(&repository, "1984", "Fiction").await;

        let err = repository.loans.return_book(user, book).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        repository.loans.borrow(user, book).await.unwrap();
        repository.loans.return_book(user, book).await.unwrap();

        let err = repository.loans.return_book(user, book).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(repository.books.get_by_id(book).await.unwrap().is_available);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_borrows_lend_the_book_once() {
        let (repository, _dir) = testing::repository().await;
        let book = testing::insert_book(&repository, "The Hobbit", "Adventure").await;

        let mut users = Vec::new();
        for i in 0..8 {
            let email = format!("reader{}@example.com", i);
            users.push(testing::insert_user(&repository, "Reader", &email).await);
        }

        let handles: Vec<_> = users
            .into_iter()
            .map(|user| {
                let loans = repository.loans.clone();
                tokio::spawn(async move { loans.borrow(user, book).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(AppError::BookUnavailable(_)) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(repository.loans.count_active().await.unwrap(), 1);
        assert!(!repository.books.get_by_id(book).await.unwrap().is_available);
    }

    #[tokio::test]
    async fn stale_availability_flag_cannot_double_lend() {
        let (repository, _dir) = testing::repository().await;
        let ada = testing::insert_user(&repository, "Ada", "ada@example.com").await;
        let bob = testing::insert_user(&repository, "Bob", "bob@example.com").await;
        let book = testing::insert_book(&repository, "Dune", "Science Fiction").await;

        repository.loans.borrow(ada, book).await.unwrap();
        sqlx::query("UPDATE books SET is_available = 1 WHERE id = ?")
            .bind(book)
            .execute(&repository.pool)
            .await
            .unwrap();

        let err = repository.loans.borrow(bob, book).await.unwrap_err();
        assert!(matches!(err, AppError::BookUnavailable(_)));
        assert_eq!(repository.loans.count_active().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn active_loans_are_listed_per_user() {
        let (repository, _dir) = testing::repository().await;
        let ada = testing::insert_user(&repository, "Ada", "ada@example.com").await;
        let bob = testing::insert_user(&repository, "Bob", "bob@example.com").await;
        let hobbit = testing::insert_book(&repository, "The Hobbit", "Adventure").await;
        let dune = testing::insert_book(&repository, "Dune", "Science Fiction").await;
        let orwell = testing::insert_book(&repository, "1984", "Fiction").await;

        repository.loans.borrow(ada, hobbit).await.unwrap();
        repository.loans.borrow(ada, dune).await.unwrap();
        repository.loans.borrow(bob, orwell).await.unwrap();
        repository.loans.return_book(ada, dune).await.unwrap();

        let active = repository.loans.get_active_for_user(ada).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].book.id, hobbit);
        assert_eq!(active[0].book.title, "The Hobbit");
        assert!(!active[0].book.is_available);

        assert!(repository.loans.get_active_for_user(999).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn catalog_shows_current_borrower() {
        let (repository, _dir) = testing::repository().await;
        let ada = testing::insert_user(&repository, "Ada", "ada@example.com").await;
        let hobbit = testing::insert_book(&repository, "The Hobbit", "Adventure").await;
        testing::insert_book(&repository, "Dune", "Science Fiction").await;

        repository.loans.borrow(ada, hobbit).await.unwrap();

        let listed = repository.books.list(&BookQuery::default()).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].borrower_name.as_deref(), Some("Ada"));
        assert!(!listed[0].is_available);
        assert!(listed[1].borrower_name.is_none());

        repository.loans.return_book(ada, hobbit).await.unwrap();
        let listed = repository.books.list(&BookQuery::default()).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].borrower_name.is_none());
    }

    #[tokio::test]
    async fn history_keeps_returned_loans_newest_first() {
        let (repository, _dir) = testing::repository().await;
        let ada = testing::insert_user(&repository, "Ada", "ada@example.com").await;
        let hobbit = testing::insert_book(&repository, "The Hobbit", "Adventure").await;
        let dune = testing::insert_book(&repository, "Dune", "Science Fiction").await;

        let first = repository.loans.borrow(ada, hobbit).await.unwrap();
        repository.loans.return_book(ada, hobbit).await.unwrap();
        let second = repository.loans.borrow(ada, dune).await.unwrap();

        let history = repository.loans.history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, second.id);
        assert_eq!(history[0].title, "Dune");
        assert_eq!(history[0].user_name, "Ada");
        assert!(history[0].return_date.is_none());
        assert_eq!(history[1].id, first.id);
        assert!(history[1].return_date.is_some());
    }
}
