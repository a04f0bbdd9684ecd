//! Users repository for database operations

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::user::{Role, UpdateUser, User, UserShort},
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

/// Turn a unique-index violation on `users.email` into a conflict
fn map_email_conflict(error: sqlx::Error) -> AppError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("Email already exists".to_string())
        }
        _ => AppError::Database(error),
    }
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Get user by email (login identifier, case-insensitive)
    pub async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Check if email already exists
    pub async fn email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = if let Some(id) = exclude_id {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1) AND id != $2)")
                .bind(email)
                .bind(id)
                .fetch_one(&self.pool)
                .await?
        } else {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))")
                .bind(email)
                .fetch_one(&self.pool)
                .await?
        };
        Ok(exists)
    }

    /// All users with their open borrow count, newest first
    pub async fn list(&self) -> AppResult<Vec<UserShort>> {
        let users = sqlx::query_as::<_, UserShort>(
            r#"
            SELECT u.id, u.name, u.email, u.role, u.wallet,
                   (SELECT COUNT(*) FROM borrows b
                    WHERE b.member_id = u.id AND b.status = 'borrowed') AS nb_borrows
            FROM users u
            ORDER BY u.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Create a new user with an already hashed password
    pub async fn create(&self, name: &str, email: &str, password_hash: &str, role: Role) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password, role)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .map_err(map_email_conflict)
    }

    /// Update name, email or role; absent fields are left unchanged
    pub async fn update(&self, id: i32, user: &UpdateUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                name = COALESCE($1, name),
                email = COALESCE($2, email),
                role = COALESCE($3, role)
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_email_conflict)?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Promote a pending account to member
    pub async fn approve(&self, id: i32) -> AppResult<User> {
        let approved = sqlx::query_as::<_, User>(
            "UPDATE users SET role = $1 WHERE id = $2 AND role = $3 RETURNING *",
        )
        .bind(Role::Member)
        .bind(id)
        .bind(Role::Pending)
        .fetch_optional(&self.pool)
        .await?;

        match approved {
            Some(user) => Ok(user),
            None => {
                let user = self.get_by_id(id).await?;
                Err(AppError::Conflict(format!(
                    "User {} is not pending approval (role: {})",
                    id, user.role
                )))
            }
        }
    }

    /// Delete a user and their closed borrow history.
    /// Refused while the user still holds borrowed books.
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))?;

        let open_borrows: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrows WHERE member_id = $1 AND status = 'borrowed'",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if open_borrows > 0 {
            return Err(AppError::Conflict(format!(
                "User still has {} borrowed books",
                open_borrows
            )));
        }

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Current wallet balance
    pub async fn wallet(&self, id: i32) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT wallet FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Count users with the given role
    pub async fn count_by_role(&self, role: Role) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = $1")
            .bind(role)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
