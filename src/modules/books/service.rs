//! Cache-aside reads and cache-invalidating writes for books.
//!
//! Key layout:
//! - `books:all` for the unfiltered list
//! - `books:search:<term>` for a trimmed search term
//! - `book:<id>` for a single book
//!
//! Every write drops `books:all`, every `books:search:*` key and, for updates
//! and deletes, the item key. Invalidation runs after the store write has
//! succeeded; if it fails the stale window is bounded by the TTL.

use std::sync::Arc;
use std::time::Duration;

use libris_cache::Cache;
use libris_db::StoreError;
use thiserror::Error;

use super::models::{Book, BookDraft, BookPatch};
use super::repository::BookRepository;
use crate::validation::{self, FieldError};

pub const LIST_KEY: &str = "books:all";
pub const SEARCH_PREFIX: &str = "books:search:";

pub fn item_key(id: i64) -> String {
    format!("book:{id}")
}

pub fn search_key(term: &str) -> String {
    format!("{SEARCH_PREFIX}{term}")
}

#[derive(Debug, Error)]
pub enum BookError {
    #[error("invalid book: {}", validation::summary(.0))]
    Validation(Vec<FieldError>),

    #[error("book {0} not found")]
    NotFound(i64),

    #[error("a book with isbn '{0}' already exists")]
    DuplicateIsbn(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct BookService {
    repo: Arc<dyn BookRepository>,
    cache: Cache,
    item_ttl: Duration,
    list_ttl: Duration,
}

impl BookService {
    pub fn new(
        repo: Arc<dyn BookRepository>,
        cache: Cache,
        item_ttl: Duration,
        list_ttl: Duration,
    ) -> Self {
        Self {
            repo,
            cache,
            item_ttl,
            list_ttl,
        }
    }

    pub async fn list(&self, search: Option<&str>) -> Result<Vec<Book>, BookError> {
        let term = search.map(str::trim).filter(|term| !term.is_empty());
        let key = term.map_or_else(|| LIST_KEY.to_string(), search_key);

        if let Some(books) = self.cache.lookup::<Vec<Book>>(&key).await {
            return Ok(books);
        }

        let books = self.repo.list(term).await?;
        self.cache.store(&key, &books, self.list_ttl).await;
        tracing::debug!(key = %key, count = books.len(), "book list loaded from store");
        Ok(books)
    }

    pub async fn get(&self, id: i64) -> Result<Book, BookError> {
        let key = item_key(id);
        if let Some(book) = self.cache.lookup::<Book>(&key).await {
            return Ok(book);
        }

        match self.repo.find(id).await? {
            Some(book) => {
                self.cache.store(&key, &book, self.item_ttl).await;
                Ok(book)
            }
            None => {
                tracing::debug!(id, "book not found");
                Err(BookError::NotFound(id))
            }
        }
    }

    pub async fn create(&self, draft: BookDraft) -> Result<Book, BookError> {
        let draft = draft.normalized().map_err(BookError::Validation)?;

        let result = self.repo.insert(&draft).await;
        libris_telemetry::metrics::record_book_operation("create", result.is_ok());
        let book = result.map_err(|err| duplicate_isbn(err, draft.isbn.as_deref()))?;

        self.invalidate_lists().await;
        tracing::info!(id = book.id, title = %book.title, "book created");
        Ok(book)
    }

    pub async fn update(&self, id: i64, patch: BookPatch) -> Result<Book, BookError> {
        let patch = patch.normalized().map_err(BookError::Validation)?;

        let Some(mut book) = self.repo.find(id).await? else {
            return Err(BookError::NotFound(id));
        };
        patch.apply_to(&mut book);

        let result = self.repo.update(&book).await;
        libris_telemetry::metrics::record_book_operation("update", matches!(result, Ok(Some(_))));
        let updated = result
            .map_err(|err| duplicate_isbn(err, book.isbn.as_deref()))?
            .ok_or(BookError::NotFound(id))?;

        self.cache.invalidate(&[item_key(id)]).await;
        self.invalidate_lists().await;
        tracing::info!(id, "book updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), BookError> {
        let deleted = self.repo.soft_delete(id).await?;
        libris_telemetry::metrics::record_book_operation("delete", deleted);
        if !deleted {
            return Err(BookError::NotFound(id));
        }

        self.cache.invalidate(&[item_key(id)]).await;
        self.invalidate_lists().await;
        tracing::info!(id, "book deleted");
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, BookError> {
        let count = self.repo.count().await?;
        libris_telemetry::metrics::set_books_total(count);
        Ok(count)
    }

    async fn invalidate_lists(&self) {
        self.cache.invalidate(&[LIST_KEY.to_string()]).await;
        self.cache.invalidate_prefix(SEARCH_PREFIX).await;
    }
}

fn duplicate_isbn(err: StoreError, isbn: Option<&str>) -> BookError {
    match isbn {
        Some(isbn) if err.violates("isbn") => BookError::DuplicateIsbn(isbn.to_string()),
        _ => BookError::Store(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{failing_cache, InMemoryBooks};

    fn service_with(repo: Arc<InMemoryBooks>, cache: Cache) -> BookService {
        BookService::new(repo, cache, Duration::from_secs(600), Duration::from_secs(300))
    }

    fn service() -> (BookService, Arc<InMemoryBooks>, Cache) {
        let repo = Arc::new(InMemoryBooks::default());
        let cache = Cache::in_memory();
        (service_with(repo.clone(), cache.clone()), repo, cache)
    }

    fn orwell() -> BookDraft {
        BookDraft {
            title: "1984".to_string(),
            author: "Orwell".to_string(),
            year: 1949,
            genre: None,
            isbn: None,
        }
    }

    #[tokio::test]
    async fn created_book_reads_back_with_supplied_fields() {
        let (books, _, _) = service();
        let created = books.create(orwell()).await.unwrap();
        assert!(created.id > 0);

        let fetched = books.get(created.id).await.unwrap();
        assert_eq!(fetched.title, "1984");
        assert_eq!(fetched.author, "Orwell");
        assert_eq!(fetched.year, 1949);
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn second_get_is_served_from_cache() {
        let (books, repo, cache) = service();
        let created = books.create(orwell()).await.unwrap();

        books.get(created.id).await.unwrap();
        books.get(created.id).await.unwrap();

        assert_eq!(repo.find_calls(), 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn create_invalidates_cached_list() {
        let (books, _, _) = service();
        books.create(orwell()).await.unwrap();
        assert_eq!(books.list(None).await.unwrap().len(), 1);

        books
            .create(BookDraft {
                title: "Brave New World".to_string(),
                author: "Huxley".to_string(),
                year: 1932,
                genre: None,
                isbn: None,
            })
            .await
            .unwrap();

        assert_eq!(books.list(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn writes_invalidate_cached_searches() {
        let (books, _, _) = service();
        let created = books.create(orwell()).await.unwrap();
        assert_eq!(books.list(Some("orwell")).await.unwrap().len(), 1);

        books.delete(created.id).await.unwrap();

        assert!(books.list(Some(" orwell ")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_search_uses_the_full_list() {
        let (books, repo, _) = service();
        books.create(orwell()).await.unwrap();

        books.list(None).await.unwrap();
        books.list(Some("   ")).await.unwrap();

        assert_eq!(repo.list_calls(), 1);
    }

    #[tokio::test]
    async fn update_leaves_absent_fields_and_refreshes_cache() {
        let (books, _, _) = service();
        let created = books.create(orwell()).await.unwrap();
        books.get(created.id).await.unwrap();

        let patch = BookPatch {
            year: Some(1950),
            ..BookPatch::default()
        };
        books.update(created.id, patch).await.unwrap();

        let fetched = books.get(created.id).await.unwrap();
        assert_eq!(fetched.year, 1950);
        assert_eq!(fetched.title, "1984");
        assert_eq!(fetched.author, "Orwell");
    }

    #[tokio::test]
    async fn update_of_missing_book_is_not_found() {
        let (books, _, _) = service();
        let err = books.update(99, BookPatch::default()).await.unwrap_err();
        assert!(matches!(err, BookError::NotFound(99)));
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let (books, _, _) = service();
        let created = books.create(orwell()).await.unwrap();
        books.get(created.id).await.unwrap();

        books.delete(created.id).await.unwrap();

        assert!(matches!(books.get(created.id).await, Err(BookError::NotFound(_))));
        assert!(matches!(books.delete(created.id).await, Err(BookError::NotFound(_))));
    }

    #[tokio::test]
    async fn invalid_draft_never_reaches_the_store() {
        let (books, repo, _) = service();
        let err = books
            .create(BookDraft {
                title: String::new(),
                ..orwell()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, BookError::Validation(_)));
        assert_eq!(books.count().await.unwrap(), 0);
        assert_eq!(repo.list_calls(), 0);
    }

    #[tokio::test]
    async fn duplicate_isbn_is_a_conflict() {
        let (books, _, _) = service();
        let with_isbn = BookDraft {
            isbn: Some("978-0-452-28423-4".to_string()),
            ..orwell()
        };
        books.create(with_isbn.clone()).await.unwrap();

        let err = books.create(with_isbn).await.unwrap_err();
        assert!(matches!(err, BookError::DuplicateIsbn(_)));
    }

    #[tokio::test]
    async fn updating_to_a_taken_isbn_is_a_conflict() {
        let (books, _, _) = service();
        books
            .create(BookDraft {
                isbn: Some("978-0-452-28423-4".to_string()),
                ..orwell()
            })
            .await
            .unwrap();
        let other = books
            .create(BookDraft {
                title: "Animal Farm".to_string(),
                isbn: Some("978-0-452-28424-1".to_string()),
                ..orwell()
            })
            .await
            .unwrap();
        books.get(other.id).await.unwrap();

        let patch = BookPatch {
            isbn: Some(Some("978-0-452-28423-4".to_string())),
            ..BookPatch::default()
        };
        let err = books.update(other.id, patch).await.unwrap_err();

        assert!(matches!(&err, BookError::DuplicateIsbn(isbn) if isbn == "978-0-452-28423-4"));
        let unchanged = books.get(other.id).await.unwrap();
        assert_eq!(unchanged.isbn.as_deref(), Some("978-0-452-28424-1"));
    }

    #[tokio::test]
    async fn unreachable_cache_falls_through_to_store() {
        let repo = Arc::new(InMemoryBooks::default());
        let books = service_with(repo, failing_cache());

        let created = books.create(orwell()).await.unwrap();
        assert_eq!(books.get(created.id).await.unwrap(), created);
        assert_eq!(books.list(None).await.unwrap(), vec![created.clone()]);
        books.delete(created.id).await.unwrap();
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_store_error() {
        let repo = Arc::new(InMemoryBooks::default());
        repo.fail_next();
        let books = service_with(repo, Cache::in_memory());

        assert!(matches!(books.list(None).await, Err(BookError::Store(_))));
    }
}
