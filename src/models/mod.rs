//! Data models for Libris

pub mod book;
pub mod borrow;
pub mod user;

// Re-export commonly used types
pub use book::Book;
pub use borrow::{Borrow, BorrowPolicy, BorrowStatus};
pub use user::{Role, User, UserShort};
