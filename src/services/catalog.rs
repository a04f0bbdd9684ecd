//! Catalog service for managing books

use validator::Validate;

use crate::{
    error::AppResult,
    models::book::{search_pattern, Book, CreateBook, UpdateBook},
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// List every book, newest first
    pub async fn list_books(&self) -> AppResult<Vec<Book>> {
        self.repository.books.list().await
    }

    /// Get book by ID
    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    /// Search by title, author or ISBN. Queries shorter than two characters
    /// return nothing.
    pub async fn search_books(&self, query: &str) -> AppResult<Vec<Book>> {
        match search_pattern(query) {
            Some(pattern) => self.repository.books.search(&pattern).await,
            None => Ok(Vec::new()),
        }
    }

    /// Create a new book
    pub async fn create_book(&self, mut book: CreateBook) -> AppResult<Book> {
        book.normalize();
        book.validate()?;

        let created = self.repository.books.create(&book).await?;
        tracing::info!(book_id = created.id, copies = created.total_copies, "Book created");
        Ok(created)
    }

    /// Update an existing book
    pub async fn update_book(&self, id: i32, mut book: UpdateBook) -> AppResult<Book> {
        book.normalize();
        book.validate()?;
        self.repository.books.update(id, &book).await
    }

    /// Delete a book
    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.repository.books.delete(id).await?;
        tracing::info!(book_id = id, "Book deleted");
        Ok(())
    }
}
