//! Account registration and authentication service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use validator::Validate;

use crate::{
    config::UsersConfig,
    error::{AppError, AppResult},
    models::user::{normalize_email, LoginRequest, RegisterUser, User, UserSummary},
    repository::Repository,
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: UsersConfig,
}

impl UsersService {
    pub fn new(repository: Repository, config: UsersConfig) -> Self {
        Self { repository, config }
    }

    /// Register a new account
    pub async fn register(&self, request: RegisterUser) -> AppResult<UserSummary> {
        let request = request.normalized();
        request.validate()?;

        if request.password.chars().count() < self.config.min_password_length {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters",
                self.config.min_password_length
            )));
        }

        let password_hash = self.hash_password(&request.password)?;
        let user = self
            .repository
            .users
            .create(&request.name, &request.email, &password_hash)
            .await?;

        tracing::info!(user_id = user.id, "User registered");

        Ok(self.summary(&user))
    }

    /// Authenticate user by email and password
    pub async fn authenticate(&self, request: LoginRequest) -> AppResult<UserSummary> {
        request.validate()?;

        let user = self
            .repository
            .users
            .get_by_email(&normalize_email(&request.email))
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid email or password".to_string()))?;

        if !self.verify_password(&user, &request.password)? {
            tracing::debug!(user_id = user.id, "Login refused: wrong password");
            return Err(AppError::Authentication("Invalid email or password".to_string()));
        }

        Ok(self.summary(&user))
    }

    /// Whether the account is configured as an administrator
    pub fn is_admin(&self, email: &str) -> bool {
        self.config
            .admin_emails
            .iter()
            .any(|admin| normalize_email(admin) == email)
    }

    fn summary(&self, user: &User) -> UserSummary {
        UserSummary::new(user, self.is_admin(&user.email))
    }

    /// Verify user password
    fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&user.password_hash)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash a password using Argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }
}
