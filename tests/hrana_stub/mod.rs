use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use serde_json::{Value, json};

#[derive(Debug, Clone, Default)]
pub struct HranaStubConfig {
    /// Reject pipelines without `Authorization: Bearer <token>`.
    pub expected_token: Option<String>,
    /// Answer any statement whose SQL contains this text with an error result.
    pub fail_when_sql_contains: Option<String>,
}

/// A libSQL pipeline endpoint over a fixed comics/chapters/pages dataset.
///
/// Only the statements the app issues are understood; anything else comes
/// back as a statement error.
pub struct HranaStub {
    pub url: String,
    requests: Arc<Mutex<Vec<Value>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

#[allow(dead_code)]
impl HranaStub {
    pub fn spawn(config: HranaStubConfig) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start hrana stub server");
        let addr = server.server_addr();
        let url = format!("http://{addr}");

        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                if request.method() != &tiny_http::Method::Post || request.url() != "/v2/pipeline"
                {
                    let _ = request.respond(json_response(404, json!({"error": "not found"})));
                    continue;
                }

                if let Some(token) = config.expected_token.as_deref() {
                    let expected = format!("Bearer {token}");
                    let authorized = request
                        .headers()
                        .iter()
                        .any(|h| h.field.equiv("Authorization") && h.value.as_str() == expected);
                    if !authorized {
                        let _ =
                            request.respond(json_response(401, json!({"error": "Unauthorized"})));
                        continue;
                    }
                }

                let mut body = String::new();
                if request.as_reader().read_to_string(&mut body).is_err() {
                    let _ = request.respond(json_response(400, json!({"error": "bad body"})));
                    continue;
                }
                let parsed: Value = match serde_json::from_str(&body) {
                    Ok(value) => value,
                    Err(_) => {
                        let _ =
                            request.respond(json_response(400, json!({"error": "invalid json"})));
                        continue;
                    }
                };
                seen.lock().expect("stub request log").push(parsed.clone());

                let results: Vec<Value> = parsed
                    .get("requests")
                    .and_then(Value::as_array)
                    .map(|reqs| reqs.iter().map(|r| stream_result(r, &config)).collect())
                    .unwrap_or_default();

                let response = json!({"baton": null, "base_url": null, "results": results});
                let _ = request.respond(json_response(200, response));
            }
        });

        Self {
            url,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Every pipeline body received so far.
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().expect("stub request log").clone()
    }

    /// SQL of every executed statement so far, in arrival order.
    pub fn executed_sql(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter_map(|body| body.get("requests")?.as_array().cloned())
            .flatten()
            .filter_map(|req| Some(req.pointer("/stmt/sql")?.as_str()?.to_owned()))
            .collect()
    }
}

impl Drop for HranaStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn json_response(status: u16, body: Value) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .expect("build header");
    tiny_http::Response::from_string(body.to_string())
        .with_status_code(status)
        .with_header(header)
}

fn stream_result(request: &Value, config: &HranaStubConfig) -> Value {
    match request.get("type").and_then(Value::as_str) {
        Some("close") => json!({"type": "ok", "response": {"type": "close"}}),
        Some("execute") => {
            let sql = request
                .pointer("/stmt/sql")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let args = request
                .pointer("/stmt/args")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            let failing = config
                .fail_when_sql_contains
                .as_deref()
                .is_some_and(|needle| sql.contains(needle));
            let outcome = if failing {
                Err("SQLITE_BUSY: database is locked".to_owned())
            } else {
                run_statement(sql, &args)
            };

            match outcome {
                Ok((names, rows)) => {
                    let cols: Vec<Value> = names
                        .iter()
                        .map(|name| json!({"name": name, "decltype": null}))
                        .collect();
                    json!({
                        "type": "ok",
                        "response": {"type": "execute", "result": {
                            "cols": cols,
                            "rows": rows,
                            "affected_row_count": 0,
                            "last_insert_rowid": null,
                        }},
                    })
                }
                Err(message) => json!({
                    "type": "error",
                    "error": {"message": message, "code": "SQLITE_ERROR"},
                }),
            }
        }
        _ => json!({"type": "error", "error": {"message": "unsupported request"}}),
    }
}

struct Comic {
    id: i64,
    title: &'static str,
    author: &'static str,
}

struct Chapter {
    id: i64,
    comic_id: i64,
    number: i64,
    title: &'static str,
}

struct Page {
    id: i64,
    chapter_id: i64,
    number: i64,
    image: &'static str,
}

const COMICS: &[Comic] = &[
    Comic {
        id: 1,
        title: "dragon ball",
        author: "Akira Toriyama",
    },
    Comic {
        id: 2,
        title: "One Piece",
        author: "Eiichiro Oda",
    },
    Comic {
        id: 3,
        title: "Dragon Quest: The Adventure of Dai",
        author: "Riku Sanjo",
    },
];

// Stored out of number order so ORDER BY is observable.
const CHAPTERS: &[Chapter] = &[
    Chapter {
        id: 12,
        comic_id: 1,
        number: 3,
        title: "The Sleeping Beauty",
    },
    Chapter {
        id: 10,
        comic_id: 1,
        number: 1,
        title: "Bulma and Son Goku",
    },
    Chapter {
        id: 11,
        comic_id: 1,
        number: 2,
        title: "Oolong the Terrible",
    },
    Chapter {
        id: 20,
        comic_id: 2,
        number: 1,
        title: "Romance Dawn",
    },
];

const PAGES: &[Page] = &[
    Page {
        id: 103,
        chapter_id: 11,
        number: 4,
        image: "http://cdn.example.com/db/2/4.jpg",
    },
    Page {
        id: 100,
        chapter_id: 11,
        number: 1,
        image: "https://cdn.example.com/db/2/1.jpg",
    },
    Page {
        id: 101,
        chapter_id: 11,
        number: 2,
        image: "ftp://mirror.example.com/db/2/2.jpg",
    },
    Page {
        id: 102,
        chapter_id: 11,
        number: 3,
        image: "",
    },
    Page {
        id: 200,
        chapter_id: 20,
        number: 1,
        image: "https://cdn.example.com/op/1/1.jpg",
    },
];

type Rows = (Vec<&'static str>, Vec<Vec<Value>>);

fn run_statement(sql: &str, args: &[Value]) -> Result<Rows, String> {
    let comic_row = |c: &Comic| vec![int(c.id), text(c.title), text(c.author)];
    let comic_cols = vec!["id", "title", "author"];

    match sql {
        "SELECT * FROM comics" => Ok((comic_cols, COMICS.iter().map(comic_row).collect())),
        "SELECT * FROM comics WHERE id = ?" => Ok((
            comic_cols,
            COMICS
                .iter()
                .filter(|c| arg_int(args, 0) == Some(c.id))
                .map(comic_row)
                .collect(),
        )),
        "SELECT * FROM comics WHERE LOWER(title) LIKE ?" => {
            let pattern = arg_text(args, 0).unwrap_or_default();
            let needle = pattern.trim_matches('%').to_owned();
            Ok((
                comic_cols,
                COMICS
                    .iter()
                    .filter(|c| c.title.to_lowercase().contains(&needle))
                    .map(comic_row)
                    .collect(),
            ))
        }
        "SELECT * FROM chapters WHERE comic_id = ? ORDER BY number ASC" => {
            let mut chapters: Vec<&Chapter> = CHAPTERS
                .iter()
                .filter(|c| arg_int(args, 0) == Some(c.comic_id))
                .collect();
            chapters.sort_by_key(|c| c.number);
            Ok((
                vec!["id", "comic_id", "number", "title"],
                chapters
                    .into_iter()
                    .map(|c| vec![int(c.id), int(c.comic_id), int(c.number), text(c.title)])
                    .collect(),
            ))
        }
        "SELECT id, comic_id, number, title FROM chapters WHERE id = ?" => Ok((
            vec!["id", "comic_id", "number", "title"],
            CHAPTERS
                .iter()
                .filter(|c| arg_int(args, 0) == Some(c.id))
                .map(|c| vec![int(c.id), int(c.comic_id), int(c.number), text(c.title)])
                .collect(),
        )),
        "SELECT id, image, number FROM pages WHERE chapter_id = ? ORDER BY number ASC" => {
            let mut pages: Vec<&Page> = PAGES
                .iter()
                .filter(|p| arg_int(args, 0) == Some(p.chapter_id))
                .collect();
            pages.sort_by_key(|p| p.number);
            Ok((
                vec!["id", "image", "number"],
                pages
                    .into_iter()
                    .map(|p| vec![int(p.id), text(p.image), int(p.number)])
                    .collect(),
            ))
        }
        "SELECT id, number FROM chapters WHERE comic_id = ? AND number = ?" => Ok((
            vec!["id", "number"],
            CHAPTERS
                .iter()
                .filter(|c| {
                    arg_int(args, 0) == Some(c.comic_id) && arg_int(args, 1) == Some(c.number)
                })
                .map(|c| vec![int(c.id), int(c.number)])
                .collect(),
        )),
        _ => Err(format!("SQLITE_ERROR: unsupported statement: {sql}")),
    }
}

fn int(n: i64) -> Value {
    json!({"type": "integer", "value": n.to_string()})
}

fn text(s: &str) -> Value {
    json!({"type": "text", "value": s})
}

/// Integer and text arguments both compare numerically, as SQLite's column
/// affinity would.
fn arg_int(args: &[Value], index: usize) -> Option<i64> {
    args.get(index)?.get("value")?.as_str()?.parse().ok()
}

fn arg_text(args: &[Value], index: usize) -> Option<String> {
    let arg = args.get(index)?;
    if arg.get("type")?.as_str()? != "text" {
        return None;
    }
    Some(arg.get("value")?.as_str()?.to_owned())
}
