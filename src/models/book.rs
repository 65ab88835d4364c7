//! Book (catalog entry) model and related types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Full book model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: Option<String>,
    pub category: Option<String>,
    pub cover_url: Option<String>,
    /// False while the book is on an active loan
    pub is_available: bool,
}

/// Catalog entry with the name of the current borrower, if any
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookListing {
    pub id: i64,
    pub title: String,
    pub author: Option<String>,
    pub category: Option<String>,
    pub cover_url: Option<String>,
    pub is_available: bool,
    pub borrower_name: Option<String>,
}

/// Catalog query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    /// Case-insensitive substring match on the category
    pub category: Option<String>,
    /// Case-insensitive substring match on title or author
    pub q: Option<String>,
}

/// Add-book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Author is required"))]
    pub author: String,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    /// Placeholder cover is used when absent
    pub cover_url: Option<String>,
}

impl CreateBook {
    /// Trim every field, dropping a blank cover URL
    pub fn normalized(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            author: self.author.trim().to_string(),
            category: self.category.trim().to_string(),
            cover_url: self
                .cover_url
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
        }
    }
}
