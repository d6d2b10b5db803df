//! The app's three paths and the data each view needs.

use serde::Serialize;

use crate::catalog::{AdjacentChapters, Catalog, CatalogError};
use crate::formats::Record;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `/`
    Home,
    /// `/comic/{comic_id}`
    Comic { comic_id: String },
    /// `/comic/{comic_id}/chapter/{chapter_id}`
    Chapter {
        comic_id: String,
        chapter_id: String,
    },
}

impl Route {
    /// Matches an app path. A trailing slash and a query string are ignored;
    /// anything else that does not fit one of the three patterns is `None`.
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = path.strip_prefix('/')?;
        let path = path.strip_suffix('/').unwrap_or(path);

        if path.is_empty() {
            return Some(Self::Home);
        }

        let segments: Vec<&str> = path.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }

        match segments.as_slice() {
            ["comic", comic_id] => Some(Self::Comic {
                comic_id: (*comic_id).to_owned(),
            }),
            ["comic", comic_id, "chapter", chapter_id] => Some(Self::Chapter {
                comic_id: (*comic_id).to_owned(),
                chapter_id: (*chapter_id).to_owned(),
            }),
            _ => None,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Self::Home => "/".to_owned(),
            Self::Comic { comic_id } => format!("/comic/{comic_id}"),
            Self::Chapter {
                comic_id,
                chapter_id,
            } => format!("/comic/{comic_id}/chapter/{chapter_id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum View {
    Home(HomeView),
    Comic(ComicView),
    Chapter(ChapterView),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HomeView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    pub comics: Vec<Record>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComicView {
    pub comic: Record,
    pub chapters: Vec<Record>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterView {
    pub chapter: Record,
    pub pages: Vec<Record>,
    #[serde(flatten)]
    pub adjacent: AdjacentChapters,
}

/// Loads everything the view behind `route` shows.
///
/// `keyword` only applies to the home view, where a non-blank keyword turns
/// the comic list into a title search.
pub async fn load(
    catalog: &Catalog,
    route: &Route,
    keyword: Option<&str>,
) -> Result<View, CatalogError> {
    match route {
        Route::Home => load_home(catalog, keyword).await.map(View::Home),
        Route::Comic { comic_id } => load_comic(catalog, comic_id).await.map(View::Comic),
        Route::Chapter {
            comic_id,
            chapter_id,
        } => load_chapter(catalog, comic_id, chapter_id)
            .await
            .map(View::Chapter),
    }
}

pub async fn load_home(catalog: &Catalog, keyword: Option<&str>) -> Result<HomeView, CatalogError> {
    let keyword = keyword.map(str::trim).filter(|k| !k.is_empty());
    let comics = match keyword {
        Some(keyword) => catalog.search_comics(keyword).await?,
        None => catalog.list_comics().await?,
    };
    Ok(HomeView {
        keyword: keyword.map(str::to_owned),
        comics,
    })
}

pub async fn load_comic(catalog: &Catalog, comic_id: &str) -> Result<ComicView, CatalogError> {
    let (comic, chapters) = tokio::try_join!(catalog.comic(comic_id), catalog.chapters(comic_id))?;
    Ok(ComicView { comic, chapters })
}

/// The chapter comes first since its number locates the neighbours; pages
/// and neighbours are then fetched together.
pub async fn load_chapter(
    catalog: &Catalog,
    comic_id: &str,
    chapter_id: &str,
) -> Result<ChapterView, CatalogError> {
    let chapter = catalog.chapter(chapter_id).await?;
    let number = chapter.get("number").and_then(|n| n.as_i64());

    let (pages, adjacent) = tokio::join!(catalog.pages(chapter_id), async {
        match number {
            Some(number) => catalog.adjacent_chapters(comic_id, number).await,
            None => {
                tracing::warn!(chapter_id, "chapter has no usable number; skipping neighbours");
                AdjacentChapters::default()
            }
        }
    });

    Ok(ChapterView {
        chapter,
        pages: pages?,
        adjacent,
    })
}
