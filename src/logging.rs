use anyhow::Context as _;

/// `comicshelf` prints JSON on stdout; stderr stays quiet unless something
/// degrades or fails.
pub const CLI_DIRECTIVES: &str = "warn";

/// `comicshelf-app` logs startup and view failures, plus one span per request.
pub const SERVER_DIRECTIVES: &str = "info,tower_http=debug";

/// Installs the stderr subscriber. `RUST_LOG` wins over `default_directives`.
pub fn init(default_directives: &str) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_directives))
        .with_context(|| format!("build log filter: {default_directives}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}
