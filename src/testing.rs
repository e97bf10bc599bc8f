//! In-memory doubles for service and router tests.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use libris_authz::TokenService;
use libris_cache::{Cache, CacheError, CacheStore};
use libris_db::StoreError;
use time::OffsetDateTime;

use crate::modules::auth::models::{NewUser, User};
use crate::modules::auth::UserRepository;
use crate::modules::books::{Book, BookDraft, BookRepository};

pub fn tokens() -> TokenService {
    TokenService::new("test-secret", Duration::from_secs(24 * 60 * 60))
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn unique_violation(constraint: &str) -> StoreError {
    StoreError::UniqueViolation {
        constraint: constraint.to_string(),
    }
}

#[derive(Default)]
pub struct InMemoryBooks {
    rows: Mutex<Vec<(Book, bool)>>,
    next_id: AtomicI64,
    find_calls: AtomicUsize,
    list_calls: AtomicUsize,
    fail_next: AtomicBool,
}

impl InMemoryBooks {
    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Make the next call fail as if the database were down.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StoreError::from(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    fn isbn_taken(rows: &[(Book, bool)], isbn: Option<&str>, except: i64) -> bool {
        isbn.is_some_and(|isbn| {
            rows.iter()
                .any(|(book, deleted)| !deleted && book.id != except && book.isbn.as_deref() == Some(isbn))
        })
    }
}

fn matches_term(book: &Book, term: &str) -> bool {
    let term = term.to_lowercase();
    [Some(&book.title), Some(&book.author), book.genre.as_ref(), book.isbn.as_ref()]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&term))
}

#[async_trait]
impl BookRepository for InMemoryBooks {
    async fn list(&self, search: Option<&str>) -> Result<Vec<Book>, StoreError> {
        self.check_available()?;
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|(book, deleted)| !deleted && search.map_or(true, |term| matches_term(book, term)))
            .map(|(book, _)| book.clone())
            .collect())
    }

    async fn find(&self, id: i64) -> Result<Option<Book>, StoreError> {
        self.check_available()?;
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|(book, deleted)| !deleted && book.id == id)
            .map(|(book, _)| book.clone()))
    }

    async fn insert(&self, draft: &BookDraft) -> Result<Book, StoreError> {
        self.check_available()?;
        let mut rows = self.rows.lock().unwrap();
        if Self::isbn_taken(&rows, draft.isbn.as_deref(), 0) {
            return Err(unique_violation("books_isbn_key"));
        }

        let now = OffsetDateTime::now_utc();
        let book = Book {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            title: draft.title.clone(),
            author: draft.author.clone(),
            year: draft.year,
            genre: draft.genre.clone(),
            isbn: draft.isbn.clone(),
            created_at: now,
            updated_at: now,
        };
        rows.push((book.clone(), false));
        Ok(book)
    }

    async fn update(&self, book: &Book) -> Result<Option<Book>, StoreError> {
        self.check_available()?;
        let mut rows = self.rows.lock().unwrap();
        if Self::isbn_taken(&rows, book.isbn.as_deref(), book.id) {
            return Err(unique_violation("books_isbn_key"));
        }

        let Some((stored, _)) = rows
            .iter_mut()
            .find(|(stored, deleted)| !deleted && stored.id == book.id)
        else {
            return Ok(None);
        };
        *stored = Book {
            updated_at: OffsetDateTime::now_utc(),
            ..book.clone()
        };
        Ok(Some(stored.clone()))
    }

    async fn soft_delete(&self, id: i64) -> Result<bool, StoreError> {
        self.check_available()?;
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|(book, deleted)| !*deleted && book.id == id) {
            Some((_, deleted)) => {
                *deleted = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count(&self) -> Result<i64, StoreError> {
        self.check_available()?;
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().filter(|(_, deleted)| !deleted).count() as i64)
    }
}

#[derive(Default)]
pub struct InMemoryUsers {
    rows: Mutex<Vec<User>>,
    next_id: AtomicI64,
    blind_exists: AtomicBool,
}

impl InMemoryUsers {
    /// Make `exists` always answer `false`, so duplicates are only caught by
    /// the unique check on insert.
    pub fn hide_from_exists_check(&self) {
        self.blind_exists.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|user| user.username == username).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|user| user.id == id).cloned())
    }

    async fn exists(&self, username: &str, email: &str) -> Result<bool, StoreError> {
        if self.blind_exists.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .any(|user| user.username == username || user.email == email))
    }

    async fn insert(&self, new_user: &NewUser) -> Result<User, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|user| user.username == new_user.username) {
            return Err(unique_violation("users_username_key"));
        }
        if rows.iter().any(|user| user.email == new_user.email) {
            return Err(unique_violation("users_email_key"));
        }

        let now = OffsetDateTime::now_utc();
        let user = User {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            username: new_user.username.clone(),
            email: new_user.email.clone(),
            password_hash: new_user.password_hash.clone(),
            role: new_user.role,
            created_at: now,
            updated_at: now,
        };
        rows.push(user.clone());
        Ok(user)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.rows.lock().unwrap().len() as i64)
    }
}

/// Cache store whose every operation fails.
struct BrokenStore;

fn broken() -> CacheError {
    CacheError::Codec(serde_json::from_str::<u8>("unreachable").unwrap_err())
}

#[async_trait]
impl CacheStore for BrokenStore {
    fn backend(&self) -> &'static str {
        "broken"
    }

    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Err(broken())
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), CacheError> {
        Err(broken())
    }

    async fn delete(&self, _keys: &[String]) -> Result<(), CacheError> {
        Err(broken())
    }

    async fn delete_prefix(&self, _prefix: &str) -> Result<u64, CacheError> {
        Err(broken())
    }

    async fn flush(&self) -> Result<(), CacheError> {
        Err(broken())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Err(broken())
    }

    async fn len(&self) -> Result<u64, CacheError> {
        Err(broken())
    }
}

pub fn failing_cache() -> Cache {
    Cache::new(Arc::new(BrokenStore))
}
