//! Book persistence. Every query filters out soft-deleted rows.

use async_trait::async_trait;
use libris_db::{observe, StoreError};
use sqlx::PgPool;

use super::models::{Book, BookDraft};

const COLUMNS: &str = "id, title, author, year, genre, isbn, created_at, updated_at";

#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Live books ordered by id; `search` is a case-insensitive substring
    /// match over title, author, genre and isbn.
    async fn list(&self, search: Option<&str>) -> Result<Vec<Book>, StoreError>;

    async fn find(&self, id: i64) -> Result<Option<Book>, StoreError>;

    async fn insert(&self, draft: &BookDraft) -> Result<Book, StoreError>;

    /// Overwrite the mutable fields of a live book; `None` if it is gone.
    async fn update(&self, book: &Book) -> Result<Option<Book>, StoreError>;

    /// Mark a live book deleted; `false` if there was none.
    async fn soft_delete(&self, id: i64) -> Result<bool, StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;
}

pub struct PgBookRepository {
    pool: PgPool,
}

impl PgBookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Escape LIKE metacharacters and wrap in `%` for a substring match.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl BookRepository for PgBookRepository {
    async fn list(&self, search: Option<&str>) -> Result<Vec<Book>, StoreError> {
        match search {
            None => {
                let sql = format!(
                    "SELECT {COLUMNS} FROM books WHERE deleted_at IS NULL ORDER BY id"
                );
                observe("select", "books", sqlx::query_as::<_, Book>(&sql).fetch_all(&self.pool))
                    .await
            }
            Some(term) => {
                let sql = format!(
                    "SELECT {COLUMNS} FROM books \
                     WHERE deleted_at IS NULL \
                       AND (title ILIKE $1 OR author ILIKE $1 OR genre ILIKE $1 OR isbn ILIKE $1) \
                     ORDER BY id"
                );
                observe(
                    "search",
                    "books",
                    sqlx::query_as::<_, Book>(&sql)
                        .bind(like_pattern(term))
                        .fetch_all(&self.pool),
                )
                .await
            }
        }
    }

    async fn find(&self, id: i64) -> Result<Option<Book>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM books WHERE id = $1 AND deleted_at IS NULL");
        observe(
            "select",
            "books",
            sqlx::query_as::<_, Book>(&sql)
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn insert(&self, draft: &BookDraft) -> Result<Book, StoreError> {
        let sql = format!(
            "INSERT INTO books (title, author, year, genre, isbn) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {COLUMNS}"
        );
        observe(
            "insert",
            "books",
            sqlx::query_as::<_, Book>(&sql)
                .bind(&draft.title)
                .bind(&draft.author)
                .bind(draft.year)
                .bind(&draft.genre)
                .bind(&draft.isbn)
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn update(&self, book: &Book) -> Result<Option<Book>, StoreError> {
        let sql = format!(
            "UPDATE books SET title = $2, author = $3, year = $4, genre = $5, isbn = $6, \
             updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {COLUMNS}"
        );
        observe(
            "update",
            "books",
            sqlx::query_as::<_, Book>(&sql)
                .bind(book.id)
                .bind(&book.title)
                .bind(&book.author)
                .bind(book.year)
                .bind(&book.genre)
                .bind(&book.isbn)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn soft_delete(&self, id: i64) -> Result<bool, StoreError> {
        let result = observe(
            "delete",
            "books",
            sqlx::query(
                "UPDATE books SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL",
            )
            .bind(id)
            .execute(&self.pool),
        )
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        observe(
            "count",
            "books",
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM books WHERE deleted_at IS NULL")
                .fetch_one(&self.pool),
        )
        .await
    }
}
