//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, health, loans, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Arquix API",
        version = "1.0.0",
        description = "Book lending REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Accounts
        users::register,
        users::login,
        // Catalog
        books::list_books,
        books::get_book,
        books::add_book,
        // Loans
        loans::borrow,
        loans::list_user_loans,
        loans::return_book,
        loans::loan_history,
    ),
    components(
        schemas(
            // Accounts
            crate::models::user::RegisterUser,
            crate::models::user::LoginRequest,
            crate::models::user::UserSummary,
            users::LoginResponse,
            // Catalog
            crate::models::book::Book,
            crate::models::book::BookListing,
            crate::models::book::CreateBook,
            books::BookListResponse,
            // Loans
            crate::models::loan::LoanRequest,
            crate::models::loan::ActiveLoan,
            crate::models::loan::LoanHistoryEntry,
            loans::BorrowResponse,
            loans::ReturnResponse,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "users", description = "Registration and login"),
        (name = "books", description = "Catalog"),
        (name = "loans", description = "Borrowing and returning books"),
        (name = "admin", description = "Catalog administration and loan history")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
