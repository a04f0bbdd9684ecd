//! Books repository for database operations

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::book::{recompute_available, Book, CreateBook, UpdateBook, SEARCH_MAX_RESULTS},
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// All books, newest first
    pub async fn list(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>("SELECT * FROM books ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    /// Case-insensitive substring search over title, author and ISBN.
    /// `pattern` must already be an escaped `LIKE` pattern.
    pub async fn search(&self, pattern: &str) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT * FROM books
            WHERE title ILIKE $1 OR author ILIKE $1 OR COALESCE(isbn, '') ILIKE $1
            ORDER BY id
            LIMIT $2
            "#,
        )
        .bind(pattern)
        .bind(SEARCH_MAX_RESULTS)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    /// Create a new book with every copy on the shelf
    pub async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (
                title, author, category, isbn, publication_year,
                total_copies, available_copies, shelf_number, image
            ) VALUES ($1, $2, $3, $4, $5, $6, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.category)
        .bind(&book.isbn)
        .bind(book.publication_year)
        .bind(book.total_copies)
        .bind(&book.shelf_number)
        .bind(&book.image)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Update a book. A new total keeps the lent-out count fixed and is
    /// rejected if it would leave fewer copies than are currently out.
    pub async fn update(&self, id: i32, update: &UpdateBook) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        let total_copies = update.total_copies.unwrap_or(current.total_copies);
        let available_copies =
            recompute_available(current.total_copies, current.available_copies, total_copies)
                .ok_or_else(|| {
                    AppError::Conflict(format!(
                        "Cannot reduce total copies to {}: {} copies are currently borrowed",
                        total_copies,
                        current.lent_copies()
                    ))
                })?;

        let updated = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                title = COALESCE($1, title),
                author = COALESCE($2, author),
                category = COALESCE($3, category),
                isbn = COALESCE($4, isbn),
                publication_year = COALESCE($5, publication_year),
                total_copies = $6,
                available_copies = $7,
                shelf_number = COALESCE($8, shelf_number),
                image = COALESCE($9, image)
            WHERE id = $10
            RETURNING *
            "#,
        )
        .bind(&update.title)
        .bind(&update.author)
        .bind(&update.category)
        .bind(&update.isbn)
        .bind(update.publication_year)
        .bind(total_copies)
        .bind(available_copies)
        .bind(&update.shelf_number)
        .bind(&update.image)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(updated)
    }

    /// Delete a book and its closed borrow history.
    /// Refused while any copy is still out.
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, i32>("SELECT id FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        let open_borrows: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrows WHERE book_id = $1 AND status = 'borrowed'",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if open_borrows > 0 {
            return Err(AppError::Conflict(format!(
                "Book has {} copies currently borrowed",
                open_borrows
            )));
        }

        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Count books in the catalog
    pub async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
