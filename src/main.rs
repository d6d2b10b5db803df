use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser as _;
use serde::Serialize;

use comicshelf::catalog::Catalog;
use comicshelf::cli::{Cli, Command};
use comicshelf::config::DatabaseConfig;
use comicshelf::libsql::Client;
use comicshelf::routes::{self, Route};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    comicshelf::logging::init(comicshelf::logging::CLI_DIRECTIVES).context("init logging")?;

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    let config = DatabaseConfig::from_args(&cli.database).context("load database config")?;
    let client = Client::new(&config).context("create database client")?;
    tracing::debug!(endpoint = client.endpoint(), "database client ready");
    let catalog = Catalog::new(Arc::new(client));

    match cli.command {
        Command::Comics(args) => match args.search.as_deref() {
            Some(keyword) => print_json(&catalog.search_comics(keyword).await.context("search")?),
            None => print_json(&catalog.list_comics().await.context("comics")?),
        },
        Command::Comic { comic_id } => {
            print_json(&catalog.comic(&comic_id).await.context("comic")?)
        }
        Command::Chapters { comic_id } => {
            print_json(&catalog.chapters(&comic_id).await.context("chapters")?)
        }
        Command::Chapter { chapter_id } => {
            print_json(&catalog.chapter(&chapter_id).await.context("chapter")?)
        }
        Command::Pages { chapter_id } => {
            print_json(&catalog.pages(&chapter_id).await.context("pages")?)
        }
        Command::Adjacent(args) => {
            print_json(&catalog.adjacent_chapters(&args.comic_id, args.number).await)
        }
        Command::View(args) => {
            let route = Route::parse(&args.path)
                .ok_or_else(|| anyhow::anyhow!("no view matches path: {}", args.path))?;
            let view = routes::load(&catalog, &route, args.search.as_deref())
                .await
                .with_context(|| format!("view {}", route.path()))?;
            print_json(&view)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{json}");
    Ok(())
}
