//! Registration, credential checks and token issuance.

use std::sync::Arc;

use libris_authz::{Argon2Scheme, PasswordError, PasswordScheme, Role, TokenError, TokenService};
use libris_db::StoreError;
use thiserror::Error;

use super::models::{LoginResponse, NewUser, RegisterRequest, User, UserView};
use super::repository::UserRepository;
use crate::validation::{self, FieldError, Violations};

const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=50;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid registration: {}", validation::summary(.0))]
    Validation(Vec<FieldError>),

    #[error("user already exists")]
    UserExists,

    /// Unknown username and wrong password are deliberately the same error.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user {0} not found")]
    NotFound(i64),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Token(#[from] TokenError),
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    tokens: TokenService,
    passwords: Arc<dyn PasswordScheme>,
    min_password_len: usize,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, tokens: TokenService, min_password_len: usize) -> Self {
        Self {
            users,
            tokens,
            passwords: Arc::new(Argon2Scheme),
            min_password_len,
        }
    }

    /// Replace the default Argon2id scheme.
    pub fn with_password_scheme(mut self, passwords: Arc<dyn PasswordScheme>) -> Self {
        self.passwords = passwords;
        self
    }

    fn validate(&self, request: &RegisterRequest) -> Result<(), AuthError> {
        let mut violations = Violations::new();
        violations.check(
            USERNAME_LEN.contains(&request.username.chars().count()),
            "username",
            format!(
                "must be between {} and {} characters",
                USERNAME_LEN.start(),
                USERNAME_LEN.end()
            ),
        );
        violations.check(
            request.password.chars().count() >= self.min_password_len,
            "password",
            format!("must be at least {} characters", self.min_password_len),
        );
        violations.check(is_email(&request.email), "email", "must be a valid email address");
        violations.finish().map_err(AuthError::Validation)
    }

    /// Create a `user`-role account.
    pub async fn register(&self, request: RegisterRequest) -> Result<User, AuthError> {
        let request = RegisterRequest {
            username: request.username.trim().to_string(),
            email: request.email.trim().to_string(),
            password: request.password,
        };
        self.validate(&request)?;

        let result = self
            .create_account(request.username, request.email, request.password, Role::User)
            .await;
        libris_telemetry::metrics::record_auth_attempt("register", result.is_ok());

        let user = result?;
        tracing::info!(user_id = user.id, username = %user.username, "user registered");
        Ok(user)
    }

    async fn create_account(
        &self,
        username: String,
        email: String,
        password: String,
        role: Role,
    ) -> Result<User, AuthError> {
        if self.users.exists(&username, &email).await? {
            return Err(AuthError::UserExists);
        }

        let password_hash = self.passwords.hash(password).await?;
        let new_user = NewUser {
            username,
            email,
            password_hash,
            role,
        };

        match self.users.insert(&new_user).await {
            Ok(user) => Ok(user),
            // Lost a race against a concurrent registration.
            Err(err) if err.is_unique_violation() => Err(AuthError::UserExists),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let result = self.check_credentials(username.trim(), password).await;
        libris_telemetry::metrics::record_auth_attempt("login", result.is_ok());
        match &result {
            Ok(user) => tracing::info!(user_id = user.id, "login succeeded"),
            Err(AuthError::InvalidCredentials) => tracing::info!("login rejected"),
            Err(err) => tracing::error!(error = %err, "login failed"),
        }
        result
    }

    /// Exactly one hash verification runs whether or not the username exists.
    async fn check_credentials(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let user = self.users.find_by_username(username).await?;
        let stored_hash = match &user {
            Some(user) => user.password_hash.clone(),
            None => self.passwords.decoy().await?,
        };

        let matches = self.passwords.verify(password.to_string(), stored_hash).await?;
        match user {
            Some(user) if matches => Ok(user),
            _ => Err(AuthError::InvalidCredentials),
        }
    }

    pub fn issue_token(&self, user: &User) -> Result<String, AuthError> {
        Ok(self.tokens.issue(user.id, &user.username, user.role)?)
    }

    /// Authenticate and wrap the token with the public user view.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let user = self.authenticate(username, password).await?;
        let token = self.issue_token(&user)?;
        Ok(LoginResponse {
            token,
            token_type: "Bearer",
            expires_in: self.tokens.ttl().as_secs(),
            user: UserView::from(&user),
        })
    }

    pub async fn profile(&self, user_id: i64) -> Result<User, AuthError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::NotFound(user_id))
    }

    pub async fn count(&self) -> Result<i64, AuthError> {
        let count = self.users.count().await?;
        libris_telemetry::metrics::set_users_total(count);
        Ok(count)
    }

    /// Create the `admin` and `user` accounts when no user exists yet.
    /// Returns `false` when the store already had users.
    pub async fn seed_defaults(&self, admin_password: &str, user_password: &str) -> Result<bool, AuthError> {
        if self.users.count().await? > 0 {
            tracing::info!("users already present; skipping account seeding");
            return Ok(false);
        }

        let accounts = [
            ("admin", "admin@booklibrary.com", admin_password, Role::Admin),
            ("user", "user@booklibrary.com", user_password, Role::User),
        ];
        for (username, email, password, role) in accounts {
            let user = self
                .create_account(username.to_string(), email.to_string(), password.to_string(), role)
                .await?;
            tracing::info!(user_id = user.id, username, role = %role, "seeded account");
        }
        Ok(true)
    }
}

/// `local@domain.tld` with a non-empty local part and a dotted domain.
fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.rsplit_once('@') else {
        return false;
    };
    !local.is_empty()
        && !value.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, rest)| !host.is_empty() && !rest.is_empty() && !rest.ends_with('.'))
}
