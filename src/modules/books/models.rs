use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

use crate::validation::{FieldError, Violations};

/// A catalogue entry. Soft-deleted rows are never loaded into this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub year: i32,
    pub genre: Option<String>,
    pub isbn: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Payload for creating a book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookDraft {
    pub title: String,
    pub author: String,
    pub year: i32,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub isbn: Option<String>,
}

impl BookDraft {
    /// Trim text fields, turning blank optional fields into `None`, then
    /// check title, author and year.
    pub fn normalized(self) -> Result<Self, Vec<FieldError>> {
        let draft = Self {
            title: self.title.trim().to_string(),
            author: self.author.trim().to_string(),
            year: self.year,
            genre: blank_to_none(self.genre),
            isbn: blank_to_none(self.isbn),
        };

        let mut violations = Violations::new();
        violations.check(!draft.title.is_empty(), "title", "must not be empty");
        violations.check(!draft.author.is_empty(), "author", "must not be empty");
        violations.check(draft.year != 0, "year", "must not be zero");
        violations.finish()?;

        Ok(draft)
    }
}

/// Partial update. `None` leaves a field unchanged; for `genre` and `isbn`,
/// `Some(None)` (an explicit JSON `null`) clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default, deserialize_with = "present")]
    pub genre: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub isbn: Option<Option<String>>,
}

impl BookPatch {
    pub fn normalized(self) -> Result<Self, Vec<FieldError>> {
        let patch = Self {
            title: self.title.map(|title| title.trim().to_string()),
            author: self.author.map(|author| author.trim().to_string()),
            year: self.year,
            genre: self.genre.map(blank_to_none),
            isbn: self.isbn.map(blank_to_none),
        };

        let mut violations = Violations::new();
        violations.check(
            patch.title.as_deref().map_or(true, |title| !title.is_empty()),
            "title",
            "must not be empty",
        );
        violations.check(
            patch.author.as_deref().map_or(true, |author| !author.is_empty()),
            "author",
            "must not be empty",
        );
        violations.check(patch.year != Some(0), "year", "must not be zero");
        violations.finish()?;

        Ok(patch)
    }

    /// Copy every present field onto `book`.
    pub fn apply_to(self, book: &mut Book) {
        if let Some(title) = self.title {
            book.title = title;
        }
        if let Some(author) = self.author {
            book.author = author;
        }
        if let Some(year) = self.year {
            book.year = year;
        }
        if let Some(genre) = self.genre {
            book.genre = genre;
        }
        if let Some(isbn) = self.isbn {
            book.isbn = isbn;
        }
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Distinguishes an explicit `null` from an absent field when paired with
/// `#[serde(default)]`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
