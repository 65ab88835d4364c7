//! Data models for Arquix

pub mod book;
pub mod loan;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookListing};
pub use loan::{ActiveLoan, Loan, LoanHistoryEntry};
pub use user::{User, UserSummary};
