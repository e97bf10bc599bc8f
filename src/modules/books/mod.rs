pub mod models;
pub mod repository;
pub mod routes;
pub mod service;

use async_trait::async_trait;
use axum::Router;
use libris_kernel::{InitCtx, Migration, Module};
use serde_json::json;

pub use models::{Book, BookDraft, BookPatch};
pub use repository::{BookRepository, PgBookRepository};
pub use routes::BooksState;
pub use service::{BookError, BookService};

/// Book catalogue: CRUD with search, cache-aside reads.
pub struct BooksModule {
    state: BooksState,
}

impl BooksModule {
    pub fn new(state: BooksState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    fn routes(&self) -> Option<Router> {
        Some(routes::router(self.state.clone()))
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = json!({
            "description": "Error",
            "content": {"application/json": {"schema": {"$ref": "#/components/schemas/ErrorResponse"}}}
        });
        let book = json!({"application/json": {"schema": {"$ref": "#/components/schemas/Book"}}});
        let id_param = json!({
            "name": "id", "in": "path", "required": true, "schema": {"type": "integer", "format": "int64"}
        });

        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List books, optionally filtered by a search term",
                        "tags": ["Books"],
                        "parameters": [{"name": "search", "in": "query", "required": false, "schema": {"type": "string"}}],
                        "responses": {
                            "200": {
                                "description": "Books ordered by id",
                                "content": {"application/json": {"schema": {
                                    "type": "array", "items": {"$ref": "#/components/schemas/Book"}
                                }}}
                            },
                            "500": error
                        }
                    },
                    "post": {
                        "summary": "Create a book",
                        "tags": ["Books"],
                        "security": [{"bearerAuth": []}],
                        "requestBody": {"required": true, "content": {"application/json": {"schema": {"$ref": "#/components/schemas/BookDraft"}}}},
                        "responses": {
                            "201": {"description": "Created", "content": book},
                            "400": error, "401": error, "409": error
                        }
                    }
                },
                "/{id}": {
                    "get": {
                        "summary": "Fetch a book",
                        "tags": ["Books"],
                        "parameters": [id_param],
                        "responses": {"200": {"description": "The book", "content": book}, "400": error, "404": error}
                    },
                    "put": {
                        "summary": "Update the fields present in the body",
                        "tags": ["Books"],
                        "security": [{"bearerAuth": []}],
                        "parameters": [id_param],
                        "requestBody": {"required": true, "content": {"application/json": {"schema": {"$ref": "#/components/schemas/BookPatch"}}}},
                        "responses": {"200": {"description": "Updated", "content": book}, "400": error, "401": error, "404": error, "409": error}
                    },
                    "delete": {
                        "summary": "Delete a book",
                        "tags": ["Books"],
                        "security": [{"bearerAuth": []}],
                        "parameters": [id_param],
                        "responses": {"204": {"description": "Deleted"}, "401": error, "404": error}
                    }
                }
            },
            "components": {
                "schemas": {
                    "Book": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "integer", "format": "int64"},
                            "title": {"type": "string"},
                            "author": {"type": "string"},
                            "year": {"type": "integer"},
                            "genre": {"type": "string", "nullable": true},
                            "isbn": {"type": "string", "nullable": true},
                            "created_at": {"type": "string", "format": "date-time"},
                            "updated_at": {"type": "string", "format": "date-time"}
                        },
                        "required": ["id", "title", "author", "year", "created_at", "updated_at"]
                    },
                    "BookDraft": {
                        "type": "object",
                        "properties": {
                            "title": {"type": "string"},
                            "author": {"type": "string"},
                            "year": {"type": "integer"},
                            "genre": {"type": "string", "nullable": true},
                            "isbn": {"type": "string", "nullable": true}
                        },
                        "required": ["title", "author", "year"]
                    },
                    "BookPatch": {
                        "type": "object",
                        "description": "Absent fields are left unchanged; null clears genre or isbn",
                        "properties": {
                            "title": {"type": "string"},
                            "author": {"type": "string"},
                            "year": {"type": "integer"},
                            "genre": {"type": "string", "nullable": true},
                            "isbn": {"type": "string", "nullable": true}
                        }
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_create_books",
            up: r#"
                CREATE TABLE IF NOT EXISTS books (
                    id          BIGSERIAL PRIMARY KEY,
                    title       TEXT NOT NULL CHECK (btrim(title) <> ''),
                    author      TEXT NOT NULL CHECK (btrim(author) <> ''),
                    year        INTEGER NOT NULL,
                    genre       TEXT,
                    isbn        TEXT,
                    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
                    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
                    deleted_at  TIMESTAMPTZ
                );
                CREATE UNIQUE INDEX IF NOT EXISTS books_isbn_key
                    ON books (isbn) WHERE deleted_at IS NULL AND isbn IS NOT NULL;
                CREATE INDEX IF NOT EXISTS books_deleted_at_idx ON books (deleted_at);
                "#,
        }]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        match self.state.books.count().await {
            Ok(count) => tracing::info!(module = self.name(), books = count, "books module started"),
            Err(err) => tracing::warn!(module = self.name(), error = %err, "could not count books"),
        }
        Ok(())
    }
}
