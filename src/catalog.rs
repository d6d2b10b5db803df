//! Read-only queries over the `comics`, `chapters` and `pages` tables.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::formats::{Record, Value, format_response, format_single_response};
use crate::libsql::{DbError, Executor, Statement};

const ALL_COMICS_SQL: &str = "SELECT * FROM comics";
const COMIC_BY_ID_SQL: &str = "SELECT * FROM comics WHERE id = ?";
const CHAPTERS_BY_COMIC_SQL: &str = "SELECT * FROM chapters WHERE comic_id = ? ORDER BY number ASC";
const CHAPTER_BY_ID_SQL: &str = "SELECT id, comic_id, number, title FROM chapters WHERE id = ?";
const PAGES_BY_CHAPTER_SQL: &str =
    "SELECT id, image, number FROM pages WHERE chapter_id = ? ORDER BY number ASC";
const CHAPTER_BY_NUMBER_SQL: &str =
    "SELECT id, number FROM chapters WHERE comic_id = ? AND number = ?";
const SEARCH_COMICS_SQL: &str = "SELECT * FROM comics WHERE LOWER(title) LIKE ?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Comic,
    Chapter,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Comic => "comic",
            Self::Chapter => "chapter",
        })
    }
}

/// The query that failed; its `Display` is the message shown to readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListComics,
    LoadComic,
    ListChapters,
    LoadChapter,
    ListPages,
    SearchComics,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ListComics => "failed to load comics, please try again later",
            Self::LoadComic => "failed to load comic details, please try again later",
            Self::ListChapters => "failed to load chapter list, please try again later",
            Self::LoadChapter => "failed to load chapter, please try again later",
            Self::ListPages => "failed to load comic pages, please try again later",
            Self::SearchComics => "search failed, please try again later",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("{resource} {id} not found")]
    NotFound { resource: Resource, id: String },

    /// The database could not answer. The cause is logged where it happens;
    /// the message only names the operation.
    #[error("{0}")]
    Unavailable(Operation),
}

/// Previous and next chapter around a chapter number, each `id` + `number`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AdjacentChapters {
    pub prev: Option<Record>,
    pub next: Option<Record>,
}

#[derive(Clone)]
pub struct Catalog {
    db: Arc<dyn Executor>,
}

impl Catalog {
    pub fn new(db: Arc<dyn Executor>) -> Self {
        Self { db }
    }

    pub async fn list_comics(&self) -> Result<Vec<Record>, CatalogError> {
        self.fetch_all_comics()
            .await
            .map_err(|err| unavailable(Operation::ListComics, err))
    }

    pub async fn comic(&self, comic_id: &str) -> Result<Record, CatalogError> {
        let stmt = Statement::new(COMIC_BY_ID_SQL).bind(Value::from_id(comic_id));
        let response = self
            .db
            .execute(stmt)
            .await
            .map_err(|err| unavailable(Operation::LoadComic, err))?;

        format_single_response(response).ok_or_else(|| CatalogError::NotFound {
            resource: Resource::Comic,
            id: comic_id.to_owned(),
        })
    }

    /// Chapters of a comic, lowest number first. An unknown comic simply has
    /// no chapters.
    pub async fn chapters(&self, comic_id: &str) -> Result<Vec<Record>, CatalogError> {
        let stmt = Statement::new(CHAPTERS_BY_COMIC_SQL).bind(Value::from_id(comic_id));
        let response = self
            .db
            .execute(stmt)
            .await
            .map_err(|err| unavailable(Operation::ListChapters, err))?;
        Ok(format_response(response))
    }

    pub async fn chapter(&self, chapter_id: &str) -> Result<Record, CatalogError> {
        let stmt = Statement::new(CHAPTER_BY_ID_SQL).bind(Value::from_id(chapter_id));
        let response = self
            .db
            .execute(stmt)
            .await
            .map_err(|err| unavailable(Operation::LoadChapter, err))?;

        format_single_response(response).ok_or_else(|| CatalogError::NotFound {
            resource: Resource::Chapter,
            id: chapter_id.to_owned(),
        })
    }

    /// Pages of a chapter in order, keeping only those with a usable image URL.
    pub async fn pages(&self, chapter_id: &str) -> Result<Vec<Record>, CatalogError> {
        let stmt = Statement::new(PAGES_BY_CHAPTER_SQL).bind(Value::from_id(chapter_id));
        let response = self
            .db
            .execute(stmt)
            .await
            .map_err(|err| unavailable(Operation::ListPages, err))?;

        let mut pages = format_response(response);
        pages.retain(|page| page.get("image").is_some_and(is_displayable_image));
        Ok(pages)
    }

    /// Looks up `number - 1` and `number + 1` concurrently.
    ///
    /// Never fails: this only decorates the reader view, so any lookup error
    /// leaves both slots empty.
    pub async fn adjacent_chapters(&self, comic_id: &str, number: i64) -> AdjacentChapters {
        let (prev, next) = tokio::join!(
            self.chapter_by_number(comic_id, number.checked_sub(1)),
            self.chapter_by_number(comic_id, number.checked_add(1)),
        );

        match (prev, next) {
            (Ok(prev), Ok(next)) => AdjacentChapters { prev, next },
            (Err(err), _) | (_, Err(err)) => {
                tracing::warn!(comic_id, number, error = %err, "load adjacent chapters failed");
                AdjacentChapters::default()
            }
        }
    }

    /// Case-insensitive title substring search. A blank keyword lists
    /// every comic.
    pub async fn search_comics(&self, keyword: &str) -> Result<Vec<Record>, CatalogError> {
        let keyword = keyword.trim().to_lowercase();
        let result = if keyword.is_empty() {
            self.fetch_all_comics().await
        } else {
            let stmt = Statement::new(SEARCH_COMICS_SQL).bind(format!("%{keyword}%"));
            self.db.execute(stmt).await.map(format_response)
        };
        result.map_err(|err| unavailable(Operation::SearchComics, err))
    }

    async fn fetch_all_comics(&self) -> Result<Vec<Record>, DbError> {
        let response = self.db.execute(Statement::new(ALL_COMICS_SQL)).await?;
        Ok(format_response(response))
    }

    async fn chapter_by_number(
        &self,
        comic_id: &str,
        number: Option<i64>,
    ) -> Result<Option<Record>, DbError> {
        let Some(number) = number else {
            return Ok(None);
        };
        let stmt = Statement::new(CHAPTER_BY_NUMBER_SQL)
            .bind(Value::from_id(comic_id))
            .bind(number);
        let response = self.db.execute(stmt).await?;
        Ok(format_single_response(response))
    }
}

/// An image cell is shown only when it is a non-blank http(s) URL.
pub fn is_displayable_image(image: &Value) -> bool {
    image.as_str().is_some_and(|url| {
        !url.trim().is_empty() && (url.starts_with("http://") || url.starts_with("https://"))
    })
}

fn unavailable(operation: Operation, err: DbError) -> CatalogError {
    tracing::error!(?operation, error = %err, "query failed");
    CatalogError::Unavailable(operation)
}
