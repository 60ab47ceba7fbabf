#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use catalog_gateway::signer::{AssetSigner, SigningError};
use catalog_gateway::sigv4::Credentials;
use catalog_gateway::store::{DynamoStore, DynamoStoreConfig};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub async fn spawn_server(
    app: Router,
) -> (SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind should succeed");
    let addr = listener.local_addr().expect("local_addr should succeed");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;
    });

    (addr, shutdown_tx, handle)
}

pub fn test_credentials() -> Credentials {
    Credentials {
        access_key_id: "AKIDTEST".to_string(),
        secret_access_key: "secret".to_string(),
        session_token: None,
    }
}

pub fn store_for(addr: SocketAddr, timeout: Duration) -> DynamoStore {
    DynamoStore::new(DynamoStoreConfig {
        endpoint: format!("http://{}", addr),
        region: "us-west-1".to_string(),
        table_name: "books".to_string(),
        credentials: test_credentials(),
        timeout,
        page_limit: Some(2),
    })
    .expect("store should build")
}

#[derive(Debug, Clone)]
pub struct RecordedScan {
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

/// How the mock answers a scan.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Serve `pages` in order, linking them with `page-<n>` cursors.
    Pages(Vec<Vec<serde_json::Value>>),
    Reject {
        status: StatusCode,
        body: serde_json::Value,
    },
    Stall(Duration),
}

#[derive(Clone)]
pub struct MockStore {
    pub scans: Arc<Mutex<Vec<RecordedScan>>>,
    pub calls: Arc<AtomicUsize>,
    behavior: Arc<MockBehavior>,
}

impl MockStore {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            scans: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            behavior: Arc::new(behavior),
        }
    }

    pub fn recorded(&self) -> Vec<RecordedScan> {
        self.scans.lock().expect("lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", post(scan))
            .with_state(self.clone())
    }
}

async fn scan(
    State(mock): State<MockStore>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // The store protocol uses `application/x-amz-json-1.0`, which the `Json`
    // extractor refuses.
    let body = serde_json::from_slice::<serde_json::Value>(&body).unwrap_or_default();
    mock.calls.fetch_add(1, Ordering::SeqCst);
    mock.scans.lock().expect("lock").push(RecordedScan {
        headers,
        body: body.clone(),
    });

    match mock.behavior.as_ref() {
        MockBehavior::Pages(pages) => {
            let index = body
                .pointer("/ExclusiveStartKey/id/S")
                .and_then(|v| v.as_str())
                .and_then(|cursor| cursor.strip_prefix("page-"))
                .and_then(|n| n.parse::<usize>().ok())
                .unwrap_or(0);
            let items = pages.get(index).cloned().unwrap_or_default();

            let mut response = serde_json::json!({
                "Items": items,
                "Count": items.len(),
            });
            if index + 1 < pages.len() {
                response["LastEvaluatedKey"] =
                    serde_json::json!({ "id": { "S": format!("page-{}", index + 1) } });
            }
            Json(response).into_response()
        }
        MockBehavior::Reject { status, body } => (*status, Json(body.clone())).into_response(),
        MockBehavior::Stall(delay) => {
            tokio::time::sleep(*delay).await;
            Json(serde_json::json!({ "Items": [] })).into_response()
        }
    }
}

pub fn book_item(id: &str, genres: &[&str], image_key: Option<&str>) -> serde_json::Value {
    let mut item = serde_json::json!({
        "id": { "S": id },
        "isbn": { "S": format!("isbn-{}", id) },
        "title": { "S": format!("Title {}", id) },
        "publisher": { "S": "Acme" },
        "authors": { "L": [{ "S": "Ursula K. Le Guin" }] },
        "genres": { "SS": genres },
    });
    if let Some(key) = image_key {
        item["imageKey"] = serde_json::json!({ "S": key });
    }
    item
}

#[derive(Default)]
pub struct CountingSigner {
    pub calls: AtomicUsize,
}

impl AssetSigner for CountingSigner {
    fn presign_get(&self, object_key: &str) -> Result<String, SigningError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("https://signed.test/{}?X-Amz-Expires=600", object_key))
    }
}
