//! Arquix Book Lending Server
//!
//! A REST JSON API for a small lending library: user accounts, a book catalog,
//! and a loan ledger guaranteeing that a book is never lent to two people at once.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
