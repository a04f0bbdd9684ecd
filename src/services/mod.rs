//! Business logic services

pub mod borrows;
pub mod catalog;
pub mod stats;
pub mod users;

use crate::{
    config::{AuthConfig, BorrowsConfig},
    models::borrow::BorrowPolicy,
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub repository: Repository,
    pub catalog: catalog::CatalogService,
    pub users: users::UsersService,
    pub borrows: borrows::BorrowsService,
    pub stats: stats::StatsService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, auth_config: AuthConfig, borrows_config: &BorrowsConfig) -> Self {
        Self {
            catalog: catalog::CatalogService::new(repository.clone()),
            users: users::UsersService::new(repository.clone(), auth_config),
            borrows: borrows::BorrowsService::new(repository.clone(), BorrowPolicy::from(borrows_config)),
            stats: stats::StatsService::new(repository.clone()),
            repository,
        }
    }
}
