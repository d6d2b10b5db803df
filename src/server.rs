use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::catalog::{Catalog, CatalogError};
use crate::routes::{self, Route, View};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
}

#[derive(Debug, Deserialize)]
struct HomeQuery {
    q: Option<String>,
}

/// JSON body for a failed view; every message is safe to show to readers.
enum ViewError {
    MethodNotAllowed(Method),
    NoRoute(String),
    Catalog(CatalogError),
}

impl IntoResponse for ViewError {
    fn into_response(self) -> Response {
        match self {
            Self::MethodNotAllowed(method) => (
                StatusCode::METHOD_NOT_ALLOWED,
                [(header::ALLOW, "GET, HEAD")],
                error_body(format!("method {method} not allowed")),
            )
                .into_response(),
            Self::NoRoute(path) => (
                StatusCode::NOT_FOUND,
                error_body(format!("no view matches path: {path}")),
            )
                .into_response(),
            Self::Catalog(err) => {
                let status = match &err {
                    CatalogError::NotFound { .. } => StatusCode::NOT_FOUND,
                    CatalogError::Unavailable(_) => StatusCode::BAD_GATEWAY,
                };
                (status, error_body(err.to_string())).into_response()
            }
        }
    }
}

fn error_body(message: String) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "error": message }))
}

/// `/healthz` plus every path of the routing table. View paths are matched by
/// [`Route::parse`], so the server and the CLI `view` command agree on them.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok\n" }))
        .fallback(view)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn view(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    Query(query): Query<HomeQuery>,
) -> Result<Json<View>, ViewError> {
    if method != Method::GET && method != Method::HEAD {
        return Err(ViewError::MethodNotAllowed(method));
    }
    let route =
        Route::parse(uri.path()).ok_or_else(|| ViewError::NoRoute(uri.path().to_owned()))?;

    routes::load(&state.catalog, &route, query.q.as_deref())
        .await
        .map(Json)
        .map_err(|err| {
            tracing::info!(path = %route.path(), error = %err, "view failed");
            ViewError::Catalog(err)
        })
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
