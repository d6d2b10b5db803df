use std::fmt;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(flatten)]
    pub database: DatabaseArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Default, Args)]
pub struct DatabaseArgs {
    /// Database URL (libsql://, https://, http://). Falls back to
    /// `COMICSHELF_DATABASE_URL`.
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Bearer token for the database. Falls back to `COMICSHELF_AUTH_TOKEN`.
    #[arg(long, global = true)]
    pub auth_token: Option<String>,
}

impl fmt::Debug for DatabaseArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseArgs")
            .field("database_url", &self.database_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List all comics, or those whose title contains a keyword.
    Comics(ComicsArgs),
    /// Show one comic.
    Comic {
        comic_id: String,
    },
    /// List the chapters of a comic in reading order.
    Chapters {
        comic_id: String,
    },
    /// Show one chapter.
    Chapter {
        chapter_id: String,
    },
    /// List the displayable pages of a chapter.
    Pages {
        chapter_id: String,
    },
    /// Show the chapters right before and after a chapter number.
    Adjacent(AdjacentArgs),
    /// Resolve an app path (`/`, `/comic/{id}`, `/comic/{id}/chapter/{id}`)
    /// and print its view.
    View(ViewArgs),
}

#[derive(Debug, Args)]
pub struct ComicsArgs {
    /// Case-insensitive title keyword.
    #[arg(long)]
    pub search: Option<String>,
}

#[derive(Debug, Args)]
pub struct AdjacentArgs {
    pub comic_id: String,

    /// Current chapter number.
    #[arg(allow_negative_numbers = true)]
    pub number: i64,
}

#[derive(Debug, Args)]
pub struct ViewArgs {
    /// App path, e.g. `/comic/1/chapter/3`.
    pub path: String,

    /// Title keyword for the home view.
    #[arg(long)]
    pub search: Option<String>,
}
