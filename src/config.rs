use std::fmt;

use crate::cli::DatabaseArgs;

pub const DATABASE_URL_ENV: &str = "COMICSHELF_DATABASE_URL";
pub const AUTH_TOKEN_ENV: &str = "COMICSHELF_AUTH_TOKEN";

/// Where the comic database lives and how to authenticate against it.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub auth_token: Option<String>,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl DatabaseConfig {
    pub fn from_args(args: &DatabaseArgs) -> anyhow::Result<Self> {
        Self::resolve(
            args.database_url.clone(),
            args.auth_token.clone(),
            |key| std::env::var(key).ok(),
        )
    }

    /// Flags win over the environment; blank values count as unset.
    pub fn resolve(
        url: Option<String>,
        auth_token: Option<String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let url = non_blank(url)
            .or_else(|| non_blank(env(DATABASE_URL_ENV)))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "database url is not configured (pass --database-url or set {DATABASE_URL_ENV})"
                )
            })?;
        let auth_token = non_blank(auth_token).or_else(|| non_blank(env(AUTH_TOKEN_ENV)));

        Ok(Self { url, auth_token })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}
