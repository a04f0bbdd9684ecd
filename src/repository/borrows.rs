//! Borrows repository for database operations
//!
//! Borrowing and returning each run in a single transaction. Rows are locked
//! in a fixed order (user, then borrow, then book) so that concurrent
//! requests on the same member or book serialize instead of deadlocking.

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::Book,
        borrow::{ActiveBorrow, Borrow, BorrowHistoryEntry, BorrowPolicy, BorrowStatus, MyBorrow, ReturnReceipt},
        user::Role,
    },
};

/// Open borrow whose due date (UTC calendar day) is before the given day
const OVERDUE_PREDICATE: &str =
    "(b.due_date AT TIME ZONE 'UTC')::date < ($1::timestamptz AT TIME ZONE 'UTC')::date";

#[derive(Clone)]
pub struct BorrowsRepository {
    pool: Pool<Postgres>,
}

impl BorrowsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Lend one copy of a book to a member.
    ///
    /// Checks, in order: the account is still a member, the book exists, a
    /// copy is on the shelf, and the member is under the borrow cap. Any
    /// failure rolls the transaction back untouched.
    pub async fn borrow(
        &self,
        member_id: i32,
        book_id: i32,
        policy: &BorrowPolicy,
        now: DateTime<Utc>,
    ) -> AppResult<Borrow> {
        let mut tx = self.pool.begin().await?;

        let role = sqlx::query_scalar::<_, Role>("SELECT role FROM users WHERE id = $1 FOR UPDATE")
            .bind(member_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", member_id)))?;

        // The token may predate a role change
        if role != Role::Member {
            return Err(AppError::Authorization("Member account required".to_string()));
        }

        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(book_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;

        if book.available_copies <= 0 {
            return Err(AppError::CapacityExceeded(format!(
                "No copies of \"{}\" are available",
                book.title
            )));
        }

        let open_borrows: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrows WHERE member_id = $1 AND status = 'borrowed'",
        )
        .bind(member_id)
        .fetch_one(&mut *tx)
        .await?;

        if !policy.can_borrow_more(open_borrows) {
            return Err(AppError::LimitExceeded(format!(
                "Maximum borrows reached ({}/{})",
                open_borrows, policy.max_active_borrows
            )));
        }

        sqlx::query("UPDATE books SET available_copies = available_copies - 1 WHERE id = $1")
            .bind(book_id)
            .execute(&mut *tx)
            .await?;

        let borrow = sqlx::query_as::<_, Borrow>(
            r#"
            INSERT INTO borrows (book_id, member_id, borrow_date, due_date, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(member_id)
        .bind(now)
        .bind(policy.due_date(now))
        .bind(BorrowStatus::Borrowed)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(borrow)
    }

    /// Close a borrow: mark it returned, put the copy back on the shelf and
    /// debit any late fine from the member's wallet.
    pub async fn return_borrow(
        &self,
        borrow_id: i32,
        policy: &BorrowPolicy,
        now: DateTime<Utc>,
    ) -> AppResult<ReturnReceipt> {
        let mut tx = self.pool.begin().await?;

        // member_id never changes, so it is safe to read before locking
        let member_id = sqlx::query_scalar::<_, i32>("SELECT member_id FROM borrows WHERE id = $1")
            .bind(borrow_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow with id {} not found", borrow_id)))?;

        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(member_id)
            .execute(&mut *tx)
            .await?;

        let borrow = sqlx::query_as::<_, Borrow>("SELECT * FROM borrows WHERE id = $1 FOR UPDATE")
            .bind(borrow_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow with id {} not found", borrow_id)))?;

        if borrow.status == BorrowStatus::Returned {
            return Err(AppError::Conflict(format!(
                "Borrow {} was already returned",
                borrow_id
            )));
        }

        let late_days = policy.late_days(borrow.due_date, now);
        let fine = policy.fine(borrow.due_date, now);

        sqlx::query("UPDATE borrows SET status = $1, return_date = $2, fine = $3 WHERE id = $4")
            .bind(BorrowStatus::Returned)
            .bind(now)
            .bind(fine)
            .bind(borrow_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE books SET available_copies = available_copies + 1 WHERE id = $1")
            .bind(borrow.book_id)
            .execute(&mut *tx)
            .await?;

        if fine > 0 {
            sqlx::query("UPDATE users SET wallet = wallet - $1 WHERE id = $2")
                .bind(fine)
                .bind(member_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(ReturnReceipt {
            borrow_id,
            book_id: borrow.book_id,
            member_id,
            return_date: now,
            late_days,
            fine,
        })
    }

    /// Every borrow of a member, newest first
    pub async fn get_member_borrows(&self, member_id: i32) -> AppResult<Vec<MyBorrow>> {
        let borrows = sqlx::query_as::<_, MyBorrow>(
            r#"
            SELECT b.id, b.book_id, bk.title, b.borrow_date, b.due_date,
                   b.return_date, b.status, b.fine
            FROM borrows b
            JOIN books bk ON bk.id = b.book_id
            WHERE b.member_id = $1
            ORDER BY b.borrow_date DESC, b.id DESC
            "#,
        )
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(borrows)
    }

    /// Open borrows with member and book identity, oldest due date first
    pub async fn get_active(&self, now: DateTime<Utc>) -> AppResult<Vec<ActiveBorrow>> {
        let query = format!(
            r#"
            SELECT b.id, b.member_id, u.name AS member_name, b.book_id, bk.title,
                   b.borrow_date, b.due_date, {} AS is_overdue
            FROM borrows b
            JOIN users u ON u.id = b.member_id
            JOIN books bk ON bk.id = b.book_id
            WHERE b.status = 'borrowed'
            ORDER BY b.due_date, b.id
            "#,
            OVERDUE_PREDICATE
        );

        let borrows = sqlx::query_as::<_, ActiveBorrow>(&query)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;

        Ok(borrows)
    }

    /// Returned borrows, most recent return first
    pub async fn get_history(&self) -> AppResult<Vec<BorrowHistoryEntry>> {
        let history = sqlx::query_as::<_, BorrowHistoryEntry>(
            r#"
            SELECT b.id, b.member_id, u.name AS member_name, b.book_id, bk.title,
                   b.borrow_date, b.due_date, b.return_date, b.fine
            FROM borrows b
            JOIN users u ON u.id = b.member_id
            JOIN books bk ON bk.id = b.book_id
            WHERE b.status = 'returned'
            ORDER BY b.return_date DESC, b.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(history)
    }

    /// Count open borrows
    pub async fn count_active(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM borrows WHERE status = 'borrowed'")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Count open borrows past their due date
    pub async fn count_overdue(&self, now: DateTime<Utc>) -> AppResult<i64> {
        let query = format!(
            "SELECT COUNT(*) FROM borrows b WHERE b.status = 'borrowed' AND {}",
            OVERDUE_PREDICATE
        );

        let count: i64 = sqlx::query_scalar(&query)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
