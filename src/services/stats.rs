//! Statistics service

use chrono::Utc;

use crate::{
    api::stats::StatsResponse,
    error::AppResult,
    models::user::Role,
    repository::Repository,
};

#[derive(Clone)]
pub struct StatsService {
    repository: Repository,
}

impl StatsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Dashboard counters
    pub async fn get_stats(&self) -> AppResult<StatsResponse> {
        let now = Utc::now();

        let (books, members, active_borrows, overdue_borrows) = tokio::try_join!(
            self.repository.books.count(),
            self.repository.users.count_by_role(Role::Member),
            self.repository.borrows.count_active(),
            self.repository.borrows.count_overdue(now),
        )?;

        Ok(StatsResponse {
            books,
            members,
            active_borrows,
            overdue_borrows,
        })
    }
}
