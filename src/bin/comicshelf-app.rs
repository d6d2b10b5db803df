use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;

use comicshelf::catalog::Catalog;
use comicshelf::cli::DatabaseArgs;
use comicshelf::config::DatabaseConfig;
use comicshelf::libsql::Client;
use comicshelf::server::{AppState, router, shutdown_signal};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct AppArgs {
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    #[command(flatten)]
    database: DatabaseArgs,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    comicshelf::logging::init(comicshelf::logging::SERVER_DIRECTIVES)?;

    let args = AppArgs::parse();
    let config = DatabaseConfig::from_args(&args.database).context("load database config")?;
    tracing::info!(addr = %args.addr, database = ?config, "starting comicshelf-app");

    let client = Client::new(&config).context("create database client")?;
    let state = AppState {
        catalog: Arc::new(Catalog::new(Arc::new(client))),
    };

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {}: {err}", args.addr))?;
    tracing::info!(addr = %args.addr, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}
