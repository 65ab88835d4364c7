//! Books repository for database operations

use sqlx::{Pool, Sqlite};

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookListing, BookQuery},
};

/// Fields of a book to be inserted: title, author, category, cover URL
pub type NewBook<'a> = (&'a str, &'a str, &'a str, &'a str);

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Sqlite>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i64) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// List the catalog with the current borrower of each book
    pub async fn list(&self, query: &BookQuery) -> AppResult<Vec<BookListing>> {
        let mut conditions = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(category) = non_blank(&query.category) {
            params.push(contains_pattern(category));
            conditions.push(r"b.category LIKE ? ESCAPE '\'".to_string());
        }

        if let Some(q) = non_blank(&query.q) {
            params.push(contains_pattern(q));
            params.push(contains_pattern(q));
            conditions.push(
                r"(b.title LIKE ? ESCAPE '\' OR b.author LIKE ? ESCAPE '\')".to_string(),
            );
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let select_query = format!(
            r#"
            SELECT b.id, b.title, b.author, b.category, b.cover_url, b.is_available,
                   u.name as borrower_name
            FROM books b
            LEFT JOIN loans l ON l.book_id = b.id AND l.return_date IS NULL
            LEFT JOIN users u ON u.id = l.user_id
            {}
            ORDER BY b.id
            "#,
            where_clause
        );

        let mut builder = sqlx::query_as::<_, BookListing>(&select_query);
        for param in &params {
            builder = builder.bind(param);
        }

        Ok(builder.fetch_all(&self.pool).await?)
    }

    /// Create a new, available book
    pub async fn create(
        &self,
        title: &str,
        author: &str,
        category: &str,
        cover_url: &str,
    ) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let book = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, category, cover_url, is_available)
            VALUES (?, ?, ?, ?, 1)
            RETURNING *
            "#,
        )
        .bind(title)
        .bind(author)
        .bind(category)
        .bind(cover_url)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(book)
    }

    /// Insert several books in one transaction, all or none
    pub async fn create_many(&self, books: &[NewBook<'_>]) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for (title, author, category, cover_url) in books {
            inserted += sqlx::query(
                r#"
                INSERT INTO books (title, author, category, cover_url, is_available)
                VALUES (?, ?, ?, ?, 1)
                "#,
            )
            .bind(*title)
            .bind(*author)
            .bind(*category)
            .bind(*cover_url)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Count books in the catalog
    pub async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// `LIKE` pattern matching `value` literally anywhere in the column
fn contains_pattern(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len() + 2);
    pattern.push('%');
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
