//! Catalog management service

use validator::Validate;

use crate::{
    config::CatalogConfig,
    error::AppResult,
    models::book::{Book, BookListing, BookQuery, CreateBook},
    repository::{books::NewBook, Repository},
};

/// Sample catalog inserted into an empty database
const SAMPLE_BOOKS: &[NewBook<'static>] = &[
    (
        "Clean Code",
        "Robert C. Martin",
        "Technology",
        "https://m.media-amazon.com/images/I/71T7aD3EOTL._AC_UF1000,1000_QL80_.jpg",
    ),
    (
        "Rich Dad Poor Dad",
        "Robert Kiyosaki",
        "Business",
        "https://m.media-amazon.com/images/I/81ALgAW3gHL._AC_UF1000,1000_QL80_.jpg",
    ),
    (
        "The Hobbit",
        "J.R.R. Tolkien",
        "Adventure",
        "https://m.media-amazon.com/images/I/91M9xPIf10L._AC_UF1000,1000_QL80_.jpg",
    ),
    (
        "1984",
        "George Orwell",
        "Fiction",
        "https://m.media-amazon.com/images/I/819js3EQwbL._AC_UF1000,1000_QL80_.jpg",
    ),
    (
        "Harry Potter and the Philosopher's Stone",
        "J.K. Rowling",
        "Adventure",
        "https://m.media-amazon.com/images/I/81ibfYk4qmL._AC_UF1000,1000_QL80_.jpg",
    ),
    (
        "The Little Prince",
        "Antoine de Saint-Exupery",
        "Children",
        "https://m.media-amazon.com/images/I/71aFt4+OTOL._AC_UF1000,1000_QL80_.jpg",
    ),
];

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    config: CatalogConfig,
}

impl CatalogService {
    pub fn new(repository: Repository, config: CatalogConfig) -> Self {
        Self { repository, config }
    }

    /// List books with their current borrower
    pub async fn list_books(&self, query: &BookQuery) -> AppResult<Vec<BookListing>> {
        self.repository.books.list(query).await
    }

    /// Get book by ID
    pub async fn get_book(&self, id: i64) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    /// Add a book to the catalog
    pub async fn add_book(&self, book: CreateBook) -> AppResult<Book> {
        let book = book.normalized();
        book.validate()?;

        let cover_url = book
            .cover_url
            .as_deref()
            .unwrap_or(&self.config.default_cover_url);

        let created = self
            .repository
            .books
            .create(&book.title, &book.author, &book.category, cover_url)
            .await?;

        tracing::info!(book_id = created.id, "Book added to catalog");

        Ok(created)
    }

    /// Insert the sample catalog when seeding is enabled and no book exists yet.
    /// Returns the number of books inserted.
    pub async fn seed_if_empty(&self) -> AppResult<u64> {
        if !self.config.seed_on_empty || self.repository.books.count().await? > 0 {
            return Ok(0);
        }

        let inserted = self.repository.books.create_many(SAMPLE_BOOKS).await?;
        tracing::info!("Seeded catalog with {} sample books", inserted);
        Ok(inserted)
    }
}
