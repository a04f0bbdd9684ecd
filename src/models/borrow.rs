//! Borrow model, lending policy and related types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;

use crate::config::BorrowsConfig;

/// Borrow lifecycle: `borrowed -> returned`, and `returned` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BorrowStatus {
    Borrowed,
    Returned,
}

impl BorrowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BorrowStatus::Borrowed => "borrowed",
            BorrowStatus::Returned => "returned",
        }
    }
}

impl std::str::FromStr for BorrowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "borrowed" => Ok(BorrowStatus::Borrowed),
            "returned" => Ok(BorrowStatus::Returned),
            _ => Err(format!("Unknown borrow status: {}", s)),
        }
    }
}

impl sqlx::Type<Postgres> for BorrowStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for BorrowStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for BorrowStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

/// Borrow model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Borrow {
    pub id: i32,
    pub book_id: i32,
    pub member_id: i32,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: BorrowStatus,
    /// Fine charged at return; 0 while the book is out
    pub fine: i64,
}

/// Outcome of returning a book
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReturnReceipt {
    pub borrow_id: i32,
    pub book_id: i32,
    pub member_id: i32,
    pub return_date: DateTime<Utc>,
    pub late_days: i64,
    /// Amount debited from the member's wallet
    pub fine: i64,
}

/// A member's own borrow, as listed on their dashboard
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct MyBorrow {
    pub id: i32,
    pub book_id: i32,
    pub title: String,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: BorrowStatus,
    pub fine: i64,
}

/// An open borrow with member and book identity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ActiveBorrow {
    pub id: i32,
    pub member_id: i32,
    pub member_name: String,
    pub book_id: i32,
    pub title: String,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub is_overdue: bool,
}

/// A returned borrow with member and book identity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BorrowHistoryEntry {
    pub id: i32,
    pub member_id: i32,
    pub member_name: String,
    pub book_id: i32,
    pub title: String,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: DateTime<Utc>,
    pub fine: i64,
}

/// Lending rules: loan window, per-member cap and the daily late fine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorrowPolicy {
    pub loan_duration_days: i64,
    pub max_active_borrows: i64,
    pub fine_per_day: i64,
}

impl Default for BorrowPolicy {
    fn default() -> Self {
        Self::from(&BorrowsConfig::default())
    }
}

impl From<&BorrowsConfig> for BorrowPolicy {
    fn from(config: &BorrowsConfig) -> Self {
        Self {
            loan_duration_days: config.loan_duration_days,
            max_active_borrows: config.max_active_borrows,
            fine_per_day: config.fine_per_day,
        }
    }
}

impl BorrowPolicy {
    pub fn due_date(&self, borrowed_at: DateTime<Utc>) -> DateTime<Utc> {
        borrowed_at + Duration::days(self.loan_duration_days)
    }

    /// Whole calendar days (UTC) strictly after the due date.
    ///
    /// The time of day is ignored on both sides, so a return any time on the
    /// due date counts as on time.
    pub fn late_days(&self, due_date: DateTime<Utc>, returned_at: DateTime<Utc>) -> i64 {
        (returned_at.date_naive() - due_date.date_naive())
            .num_days()
            .max(0)
    }

    pub fn fine(&self, due_date: DateTime<Utc>, returned_at: DateTime<Utc>) -> i64 {
        self.late_days(due_date, returned_at) * self.fine_per_day
    }

    pub fn can_borrow_more(&self, open_borrows: i64) -> bool {
        open_borrows < self.max_active_borrows
    }
}
