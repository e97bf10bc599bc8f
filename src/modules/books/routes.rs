use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use libris_authz::{AuthUser, TokenService};
use libris_http::{ApiJson, ApiPath, ApiQuery, AppError};
use serde::Deserialize;

use super::models::{BookDraft, BookPatch};
use super::service::{BookError, BookService};
use crate::validation;

#[derive(Clone)]
pub struct BooksState {
    pub books: BookService,
    pub tokens: TokenService,
}

impl FromRef<BooksState> for TokenService {
    fn from_ref(state: &BooksState) -> Self {
        state.tokens.clone()
    }
}

impl From<BookError> for AppError {
    fn from(err: BookError) -> Self {
        match err {
            BookError::Validation(errors) => {
                AppError::validation(validation::details(&errors), "invalid book")
            }
            BookError::NotFound(id) => AppError::not_found(format!("book {id} not found")),
            BookError::DuplicateIsbn(isbn) => AppError::conflict(
                vec![serde_json::json!({ "field": "isbn", "value": isbn })],
                "a book with this isbn already exists",
            ),
            BookError::Store(err) => {
                AppError::Internal(anyhow::Error::new(err).context("book store failed"))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
}

pub fn router(state: BooksState) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route("/{id}", get(get_book).put(update_book).delete(delete_book))
        .with_state(state)
}

async fn list_books(
    State(state): State<BooksState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let books = state.books.list(query.search.as_deref()).await?;
    Ok(Json(books))
}

async fn get_book(
    State(state): State<BooksState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.books.get(id).await?))
}

async fn create_book(
    State(state): State<BooksState>,
    user: AuthUser,
    ApiJson(draft): ApiJson<BookDraft>,
) -> Result<impl IntoResponse, AppError> {
    tracing::debug!(user = %user.username, "create book requested");
    let book = state.books.create(draft).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

async fn update_book(
    State(state): State<BooksState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(patch): ApiJson<BookPatch>,
) -> Result<impl IntoResponse, AppError> {
    tracing::debug!(user = %user.username, id, "update book requested");
    Ok(Json(state.books.update(id, patch).await?))
}

async fn delete_book(
    State(state): State<BooksState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, AppError> {
    tracing::debug!(user = %user.username, id, "delete book requested");
    state.books.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
