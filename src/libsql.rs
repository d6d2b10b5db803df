//! Minimal client for libSQL's Hrana-over-HTTP pipeline protocol.
//!
//! Each call sends one pipeline holding an `execute` request followed by a
//! `close`, so the server keeps no stream state between calls.

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::config::DatabaseConfig;
use crate::formats::{TabularResponse, Value};

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("invalid database url `{url}`: {reason}")]
    Endpoint { url: String, reason: String },

    #[error("POST {endpoint}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("database returned HTTP {status}: {message}")]
    Http {
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("statement failed: {message}")]
    Statement {
        message: String,
        code: Option<String>,
    },

    #[error("malformed pipeline response: {0}")]
    Protocol(String),
}

/// A parameterized statement with positional `?` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
        }
    }

    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }
}

/// Something that can run a statement and hand back its result set.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, stmt: Statement) -> Result<TabularResponse, DbError>;
}

#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl Client {
    pub fn new(config: &DatabaseConfig) -> Result<Self, DbError> {
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint: pipeline_endpoint(&config.url)?,
            auth_token: config.auth_token.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Executor for Client {
    async fn execute(&self, stmt: Statement) -> Result<TabularResponse, DbError> {
        tracing::debug!(sql = %stmt.sql, args = stmt.args.len(), "execute");

        let body = PipelineRequest {
            baton: None,
            requests: vec![
                StreamRequest::Execute {
                    stmt: WireStatement {
                        sql: stmt.sql,
                        args: stmt.args.iter().map(WireValue::from).collect(),
                        want_rows: true,
                    },
                },
                StreamRequest::Close,
            ],
        };

        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(token) = self.auth_token.as_deref() {
            request = request.bearer_auth(token);
        }

        let transport = |source: reqwest::Error| DbError::Transport {
            endpoint: self.endpoint.clone(),
            source,
        };
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let raw = response.text().await.map_err(transport)?;
        if !status.is_success() {
            let message = parse_error_message(&raw).unwrap_or(raw);
            return Err(DbError::Http { status, message });
        }

        let pipeline: PipelineResponse = serde_json::from_str(&raw)
            .map_err(|err| DbError::Protocol(format!("parse pipeline response: {err}")))?;
        first_result(pipeline)
    }
}

/// Maps a database URL onto its HTTP pipeline endpoint.
///
/// `libsql://` and `wss://` speak HTTPS, `ws://` speaks plain HTTP.
pub fn pipeline_endpoint(url: &str) -> Result<String, DbError> {
    let invalid = |reason: &str| DbError::Endpoint {
        url: url.to_owned(),
        reason: reason.to_owned(),
    };

    let trimmed = url.trim();
    let (scheme, rest) = trimmed
        .split_once("://")
        .ok_or_else(|| invalid("missing scheme"))?;
    let http_scheme = match scheme.to_ascii_lowercase().as_str() {
        "libsql" | "https" | "wss" => "https",
        "http" | "ws" => "http",
        _ => return Err(invalid("unsupported scheme")),
    };

    let parsed = url::Url::parse(&format!("{http_scheme}://{rest}"))
        .map_err(|err| invalid(&err.to_string()))?;
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }

    let base = parsed.as_str().trim_end_matches('/');
    Ok(format!("{base}/v2/pipeline"))
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let message = value
        .get("error")
        .or_else(|| value.get("message"))?
        .as_str()?
        .to_owned();
    Some(message)
}

fn first_result(pipeline: PipelineResponse) -> Result<TabularResponse, DbError> {
    let result = pipeline
        .results
        .into_iter()
        .next()
        .ok_or_else(|| DbError::Protocol("pipeline returned no results".to_owned()))?;

    match result {
        StreamResult::Ok {
            response: StreamResponse::Execute { result },
        } => result.into_tabular(),
        StreamResult::Ok { .. } => Err(DbError::Protocol(
            "expected an execute response".to_owned(),
        )),
        StreamResult::Error { error } => Err(DbError::Statement {
            message: error.message,
            code: error.code,
        }),
    }
}

#[derive(Debug, Serialize)]
struct PipelineRequest {
    baton: Option<String>,
    requests: Vec<StreamRequest>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamRequest {
    Execute { stmt: WireStatement },
    Close,
}

#[derive(Debug, Serialize)]
struct WireStatement {
    sql: String,
    args: Vec<WireValue>,
    want_rows: bool,
}

#[derive(Debug, Deserialize)]
struct PipelineResponse {
    #[serde(default)]
    results: Vec<StreamResult>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamResult {
    Ok { response: StreamResponse },
    Error { error: WireError },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamResponse {
    Execute {
        result: StmtResult,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StmtResult {
    #[serde(default)]
    cols: Option<Vec<WireColumn>>,
    #[serde(default)]
    rows: Option<Vec<Vec<WireValue>>>,
}

impl StmtResult {
    fn into_tabular(self) -> Result<TabularResponse, DbError> {
        let columns = self.cols.map(|cols| {
            cols.into_iter()
                .map(|col| col.name.unwrap_or_default())
                .collect::<Vec<String>>()
        });
        let rows = self
            .rows
            .map(|rows| {
                rows.into_iter()
                    .map(|row| {
                        row.into_iter()
                            .map(Value::try_from)
                            .collect::<Result<Vec<Value>, DbError>>()
                    })
                    .collect::<Result<Vec<Vec<Value>>, DbError>>()
            })
            .transpose()?;
        Ok(TabularResponse { columns, rows })
    }
}

#[derive(Debug, Deserialize)]
struct WireColumn {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireValue {
    Null,
    Integer { value: String },
    Float { value: f64 },
    Text { value: String },
    Blob { base64: String },
}

impl From<&Value> for WireValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Integer(n) => Self::Integer {
                value: n.to_string(),
            },
            Value::Float(f) => Self::Float { value: *f },
            Value::Text(s) => Self::Text { value: s.clone() },
            Value::Blob(bytes) => Self::Blob {
                base64: base64::engine::general_purpose::STANDARD_NO_PAD.encode(bytes),
            },
        }
    }
}

impl TryFrom<WireValue> for Value {
    type Error = DbError;

    fn try_from(value: WireValue) -> Result<Self, Self::Error> {
        Ok(match value {
            WireValue::Null => Value::Null,
            WireValue::Integer { value } => Value::Integer(value.parse().map_err(|_| {
                DbError::Protocol(format!("integer value out of range: {value}"))
            })?),
            WireValue::Float { value } => Value::Float(value),
            WireValue::Text { value } => Value::Text(value),
            WireValue::Blob { base64 } => Value::Blob(
                base64::engine::general_purpose::STANDARD_NO_PAD
                    .decode(base64.trim_end_matches('='))
                    .map_err(|err| DbError::Protocol(format!("decode blob: {err}")))?,
            ),
        })
    }
}
