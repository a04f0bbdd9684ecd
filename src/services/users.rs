//! Authentication and user management service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    config::{AdminConfig, AuthConfig},
    error::{AppError, AppResult},
    models::user::{CreateUser, Role, SignupRequest, UpdateUser, User, UserClaims, UserShort},
    repository::Repository,
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: AuthConfig,
}

impl UsersService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Lifetime of issued tokens, in seconds
    pub fn token_lifetime_secs(&self) -> i64 {
        self.config.jwt_expiration_hours as i64 * 3600
    }

    /// Authenticate user by email and return a JWT token.
    /// Unknown email and wrong password produce the same error.
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<(String, User)> {
        let user = self
            .repository
            .users
            .get_by_email(email)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid email or password".to_string()))?;

        if !verify_password(&user, password)? {
            return Err(AppError::Authentication("Invalid email or password".to_string()));
        }

        let token = self.create_token_for_user(&user)?;
        Ok((token, user))
    }

    /// Create JWT token for a user
    fn create_token_for_user(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();

        let claims = UserClaims {
            sub: user.email.clone(),
            user_id: user.id,
            role: user.role,
            exp: now + self.token_lifetime_secs(),
            iat: now,
        };

        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Self-service registration; the account waits for approval
    pub async fn signup(&self, mut request: SignupRequest) -> AppResult<User> {
        request.normalize();
        request.validate()?;

        if self.repository.users.email_exists(&request.email, None).await? {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }

        let password = hash_password(&request.password)?;
        let user = self
            .repository
            .users
            .create(&request.name, &request.email, &password, Role::Pending)
            .await?;

        tracing::info!(user_id = user.id, "New signup pending approval");
        Ok(user)
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    /// List all users
    pub async fn list_users(&self) -> AppResult<Vec<UserShort>> {
        self.repository.users.list().await
    }

    /// Create a new user (admin)
    pub async fn create_user(&self, mut user: CreateUser) -> AppResult<User> {
        user.normalize();
        user.validate()?;

        if self.repository.users.email_exists(&user.email, None).await? {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }

        let password = hash_password(&user.password)?;
        self.repository
            .users
            .create(&user.name, &user.email, &password, user.role.unwrap_or(Role::Member))
            .await
    }

    /// Update an existing user (admin)
    pub async fn update_user(&self, id: i32, mut user: UpdateUser) -> AppResult<User> {
        user.normalize();
        user.validate()?;

        if let Some(ref email) = user.email {
            if self.repository.users.email_exists(email, Some(id)).await? {
                return Err(AppError::Conflict("Email already exists".to_string()));
            }
        }

        self.repository.users.update(id, &user).await
    }

    /// Delete a user (admin)
    pub async fn delete_user(&self, id: i32) -> AppResult<()> {
        self.repository.users.delete(id).await?;
        tracing::info!(user_id = id, "User deleted");
        Ok(())
    }

    /// Approve a pending account so it can borrow
    pub async fn approve_user(&self, id: i32) -> AppResult<User> {
        let user = self.repository.users.approve(id).await?;
        tracing::info!(user_id = id, "User approved as member");
        Ok(user)
    }

    /// Current wallet balance of a user
    pub async fn wallet(&self, id: i32) -> AppResult<i64> {
        self.repository.users.wallet(id).await
    }

    /// Create the configured administrator if no account uses that email yet
    pub async fn ensure_admin(&self, admin: &AdminConfig) -> AppResult<()> {
        let (Some(email), Some(password)) = (admin.email.as_deref(), admin.password.as_deref()) else {
            return Ok(());
        };

        if self.repository.users.email_exists(email, None).await? {
            return Ok(());
        }

        let name = admin.name.as_deref().unwrap_or("Administrator");
        let hash = hash_password(password)?;
        let user = self.repository.users.create(name, email, &hash, Role::Admin).await?;

        tracing::info!(user_id = user.id, "Bootstrap administrator created");
        Ok(())
    }
}

/// Verify user password
fn verify_password(user: &User, password: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Hash a password using Argon2
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}
