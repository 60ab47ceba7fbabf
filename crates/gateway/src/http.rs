use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use catalog_contracts::ResponseRecord;
use serde::Serialize;
use tracing::Instrument;
use ulid::Ulid;

use crate::catalog::{self, CatalogError};
use crate::config::{CatalogConfig, StartupError};
use crate::filter::FilterError;
use crate::signer::{AssetSigner, S3Presigner};
use crate::store::{DynamoStore, RecordStore, StoreError};

const REQUEST_ID_HEADER: &str = "x-catalog-request-id";

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn RecordStore>,
    signer: Arc<dyn AssetSigner>,
    request_timeout: Duration,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RecordStore>,
        signer: Arc<dyn AssetSigner>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            store,
            signer,
            request_timeout,
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn router(config: CatalogConfig) -> Result<Router, StartupError> {
    let store = DynamoStore::new(config.store_config()).map_err(|err| StartupError {
        code: "ERR_INVALID_CONFIG",
        message: format!("failed to initialize record store client: {}", err),
    })?;
    let signer = S3Presigner::new(config.presigner_config()).map_err(|err| StartupError {
        code: "ERR_INVALID_CONFIG",
        message: format!("failed to initialize asset signer: {}", err),
    })?;

    Ok(router_with_state(AppState::new(
        Arc::new(store),
        Arc::new(signer),
        config.request_timeout(),
    )))
}

pub fn router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/books", get(list_books))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn metrics() -> impl IntoResponse {
    match crate::metrics::render() {
        Ok((body, content_type)) => {
            let mut headers = HeaderMap::new();
            if let Ok(value) = HeaderValue::from_str(content_type.as_str()) {
                headers.insert(header::CONTENT_TYPE, value);
            }
            (headers, body).into_response()
        }
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn list_books(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Response {
    let request_id = extract_request_id(&headers);
    let span = tracing::info_span!(
        "books.list",
        request_id = %request_id,
        params = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );
    let started = Instant::now();

    let result: Result<Json<Vec<ResponseRecord>>, ApiError> = async {
        let Query(pairs) = query.map_err(|_| {
            json_error(
                StatusCode::BAD_REQUEST,
                "ERR_INVALID_PARAMS",
                "invalid query string",
                false,
            )
        })?;
        tracing::Span::current().record("params", pairs.len() as u64);

        // `?publisher` decodes to an empty value, not a missing one.
        let params = pairs
            .into_iter()
            .map(|(field, value)| (field, Some(value)))
            .collect::<Vec<_>>();

        let books = catalog::list_books(
            state.store.as_ref(),
            state.signer.as_ref(),
            &params,
            state.request_timeout,
        )
        .await
        .map_err(|err| catalog_error_response(&err))?;

        Ok(Json(books))
    }
    .instrument(span.clone())
    .await;

    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err((status, _)) => *status,
    };
    span.record("outcome", if status.is_success() { "ok" } else { "error" });
    crate::metrics::observe_http_request("/books", "GET", status.as_u16(), started.elapsed());

    let mut response = result.into_response();
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

fn catalog_error_response(err: &CatalogError) -> ApiError {
    match err {
        CatalogError::Filter(filter_err) => {
            let code = match filter_err {
                FilterError::UnknownField { .. } => "ERR_UNKNOWN_FIELD",
                FilterError::DuplicateField { .. } => "ERR_DUPLICATE_FIELD",
                FilterError::MissingValue { .. } => "ERR_MISSING_VALUE",
                FilterError::Empty => "ERR_INVALID_PARAMS",
            };
            json_error(StatusCode::BAD_REQUEST, code, filter_err.to_string(), false)
        }
        CatalogError::Store(StoreError::Rejected {
            error_type,
            message,
            ..
        }) => json_error(
            StatusCode::BAD_GATEWAY,
            "ERR_STORE_REJECTED",
            format!("record store rejected the scan ({}): {}", error_type, message),
            false,
        ),
        CatalogError::Store(StoreError::Timeout) => json_error(
            StatusCode::GATEWAY_TIMEOUT,
            "ERR_STORE_TIMEOUT",
            "record store timeout",
            true,
        ),
        CatalogError::Store(_) => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "ERR_STORE_UNAVAILABLE",
            "record store unavailable",
            true,
        ),
        CatalogError::Signing(_) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "ERR_SIGNING_FAILED",
            "failed to sign asset url",
            false,
        ),
        CatalogError::Timeout(_) => json_error(
            StatusCode::GATEWAY_TIMEOUT,
            "ERR_REQUEST_TIMEOUT",
            "book lookup timed out",
            true,
        ),
    }
}

fn extract_request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .and_then(sanitize_request_id)
        .unwrap_or_else(|| Ulid::new().to_string())
}

fn sanitize_request_id(raw: &str) -> Option<String> {
    const MAX_LEN: usize = 64;
    let out = raw
        .chars()
        .filter(|&ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
        .take(MAX_LEN)
        .collect::<String>();

    (!out.is_empty()).then_some(out)
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: String,
    message: String,
    retryable: bool,
}

fn json_error(
    status: StatusCode,
    code: impl Into<String>,
    message: impl Into<String>,
    retryable: bool,
) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            code: code.into(),
            message: message.into(),
            retryable,
        }),
    )
}
