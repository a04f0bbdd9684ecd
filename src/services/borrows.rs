//! Borrow lifecycle service

use chrono::Utc;

use crate::{
    error::AppResult,
    models::borrow::{ActiveBorrow, Borrow, BorrowHistoryEntry, BorrowPolicy, MyBorrow, ReturnReceipt},
    repository::Repository,
};

#[derive(Clone)]
pub struct BorrowsService {
    repository: Repository,
    policy: BorrowPolicy,
}

impl BorrowsService {
    pub fn new(repository: Repository, policy: BorrowPolicy) -> Self {
        Self { repository, policy }
    }

    /// Lend a book to a member for the configured loan window
    pub async fn borrow_book(&self, member_id: i32, book_id: i32) -> AppResult<Borrow> {
        let borrow = self
            .repository
            .borrows
            .borrow(member_id, book_id, &self.policy, Utc::now())
            .await?;

        tracing::info!(
            borrow_id = borrow.id,
            member_id,
            book_id,
            due_date = %borrow.due_date,
            "Book borrowed"
        );

        Ok(borrow)
    }

    /// Take a book back, charging the late fine to the member's wallet
    pub async fn return_book(&self, borrow_id: i32) -> AppResult<ReturnReceipt> {
        let receipt = self
            .repository
            .borrows
            .return_borrow(borrow_id, &self.policy, Utc::now())
            .await?;

        tracing::info!(
            borrow_id,
            member_id = receipt.member_id,
            book_id = receipt.book_id,
            late_days = receipt.late_days,
            fine = receipt.fine,
            "Book returned"
        );

        Ok(receipt)
    }

    /// A member's own borrows, open and returned
    pub async fn get_member_borrows(&self, member_id: i32) -> AppResult<Vec<MyBorrow>> {
        self.repository.borrows.get_member_borrows(member_id).await
    }

    /// All open borrows
    pub async fn get_active_borrows(&self) -> AppResult<Vec<ActiveBorrow>> {
        self.repository.borrows.get_active(Utc::now()).await
    }

    /// All returned borrows
    pub async fn get_history(&self) -> AppResult<Vec<BorrowHistoryEntry>> {
        self.repository.borrows.get_history().await
    }
}
