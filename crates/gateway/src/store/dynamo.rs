use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use catalog_contracts::RawRecord;
use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::{RecordStore, RecordStream, StoreError};
use crate::filter::CompiledFilter;
use crate::sigv4::{self, CanonicalRequest, Credentials, SigningScope};

const SERVICE: &str = "dynamodb";
const SCAN_TARGET: &str = "DynamoDB_20120810.Scan";
const CONTENT_TYPE: &str = "application/x-amz-json-1.0";

/// A DynamoDB attribute value in the service's JSON wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    S(String),
    N(String),
    /// Base64-encoded binary.
    B(String),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null(bool),
    #[serde(rename = "SS")]
    Ss(Vec<String>),
    #[serde(rename = "NS")]
    Ns(Vec<String>),
    #[serde(rename = "BS")]
    Bs(Vec<String>),
    L(Vec<AttributeValue>),
    M(BTreeMap<String, AttributeValue>),
}

pub type Item = BTreeMap<String, AttributeValue>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ScanRequest<'a> {
    table_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter_expression: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expression_attribute_values: Option<BTreeMap<&'a str, AttributeValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exclusive_start_key: Option<Item>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ScanResponse {
    #[serde(default)]
    items: Vec<Item>,
    #[serde(default)]
    last_evaluated_key: Option<Item>,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceErrorBody {
    #[serde(rename = "__type", default)]
    error_type: Option<String>,
    #[serde(alias = "Message", default)]
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DynamoStoreConfig {
    pub endpoint: String,
    pub region: String,
    pub table_name: String,
    pub credentials: Credentials,
    pub timeout: Duration,
    pub page_limit: Option<u32>,
}

#[derive(Clone)]
pub struct DynamoStore {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    endpoint: Url,
    host: String,
    region: String,
    table_name: String,
    credentials: Credentials,
    page_limit: Option<u32>,
}

enum ScanCursor {
    Start,
    After(Item),
    Done,
}

struct ScanPage {
    records: Vec<RawRecord>,
    last_evaluated_key: Option<Item>,
}

impl DynamoStore {
    pub fn new(config: DynamoStoreConfig) -> Result<Self, StoreError> {
        let endpoint = Url::parse(&config.endpoint).map_err(|err| {
            StoreError::InvalidRequest(format!("store endpoint {}: {}", config.endpoint, err))
        })?;
        let host = endpoint
            .host_str()
            .map(|host| match endpoint.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            })
            .ok_or_else(|| {
                StoreError::InvalidRequest(format!("store endpoint {}: missing host", config.endpoint))
            })?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(StoreError::Http)?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                endpoint,
                host,
                region: config.region,
                table_name: config.table_name,
                credentials: config.credentials,
                page_limit: config.page_limit,
            }),
        })
    }

    fn scan(&self, filter: Option<CompiledFilter>) -> RecordStream {
        let inner = self.inner.clone();
        let filter = filter.map(Arc::new);

        stream::try_unfold(ScanCursor::Start, move |cursor| {
            let inner = inner.clone();
            let filter = filter.clone();
            async move {
                let start_key = match cursor {
                    ScanCursor::Start => None,
                    ScanCursor::After(key) => Some(key),
                    ScanCursor::Done => return Ok::<_, StoreError>(None),
                };

                let page = inner.scan_page(filter.as_deref(), start_key).await?;
                let next = match page.last_evaluated_key {
                    Some(key) if !key.is_empty() => ScanCursor::After(key),
                    _ => ScanCursor::Done,
                };
                Ok(Some((page.records, next)))
            }
        })
        .map_ok(|records| stream::iter(records.into_iter().map(Ok::<_, StoreError>)))
        .try_flatten()
        .boxed()
    }
}

impl RecordStore for DynamoStore {
    fn fetch_all(&self) -> RecordStream {
        self.scan(None)
    }

    fn fetch_filtered(&self, filter: CompiledFilter) -> RecordStream {
        self.scan(Some(filter))
    }
}

impl Inner {
    async fn scan_page(
        &self,
        filter: Option<&CompiledFilter>,
        start_key: Option<Item>,
    ) -> Result<ScanPage, StoreError> {
        let request = ScanRequest {
            table_name: &self.table_name,
            filter_expression: filter.map(|f| f.expression.as_str()),
            expression_attribute_values: filter.map(|f| {
                f.bindings
                    .iter()
                    .map(|(placeholder, value)| {
                        (placeholder.as_str(), AttributeValue::S(value.clone()))
                    })
                    .collect()
            }),
            limit: self.page_limit,
            exclusive_start_key: start_key,
        };
        let payload = serde_json::to_vec(&request)
            .map_err(|err| StoreError::InvalidRequest(err.to_string()))?;

        let scope = SigningScope::new(&self.region, SERVICE, Utc::now());
        let mut headers = BTreeMap::from([
            ("content-type".to_string(), CONTENT_TYPE.to_string()),
            ("host".to_string(), self.host.clone()),
            ("x-amz-date".to_string(), scope.amz_date()),
            ("x-amz-target".to_string(), SCAN_TARGET.to_string()),
        ]);
        if let Some(token) = &self.credentials.session_token {
            headers.insert("x-amz-security-token".to_string(), token.clone());
        }

        let payload_hash = sigv4::sha256_hex(&payload);
        let authorization = sigv4::authorization_header(
            &self.credentials,
            &scope,
            &CanonicalRequest {
                method: "POST",
                path: self.endpoint.path(),
                query: "",
                headers: &headers,
                payload_hash: &payload_hash,
            },
        );

        let mut builder = self.http.post(self.endpoint.clone());
        for (name, value) in &headers {
            if name != "host" {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        let resp = builder
            .header("authorization", authorization)
            .body(payload)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.bytes().await?;

        if !status.is_success() {
            let decoded = serde_json::from_slice::<ServiceErrorBody>(&body).unwrap_or_default();
            let error_type = decoded
                .error_type
                .as_deref()
                .map(|t| t.rsplit('#').next().unwrap_or(t).to_string())
                .unwrap_or_else(|| "UnknownError".to_string());
            let message = decoded
                .message
                .unwrap_or_else(|| format!("store returned status {}", status));
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                error_type,
                message,
            });
        }

        let page = serde_json::from_slice::<ScanResponse>(&body)
            .map_err(|err| StoreError::InvalidResponse(err.to_string()))?;
        let records = page
            .items
            .iter()
            .map(decode_item)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            table = %self.table_name,
            items = records.len(),
            has_more = page.last_evaluated_key.is_some(),
            "catalog.store_page_fetched"
        );

        Ok(ScanPage {
            records,
            last_evaluated_key: page.last_evaluated_key,
        })
    }
}

fn decode_item(item: &Item) -> Result<RawRecord, StoreError> {
    let id = match item.get("id") {
        Some(AttributeValue::S(value)) | Some(AttributeValue::N(value)) => value.clone(),
        _ => {
            return Err(StoreError::InvalidResponse(
                "item is missing the `id` attribute".to_string(),
            ));
        }
    };

    Ok(RawRecord {
        id,
        isbn: decode_string(item, "isbn")?.unwrap_or_default(),
        title: decode_string(item, "title")?.unwrap_or_default(),
        publisher: decode_string(item, "publisher")?.unwrap_or_default(),
        authors: decode_string_list(item, "authors")?,
        genres: decode_string_list(item, "genres")?,
        image_key: decode_string(item, "imageKey")?,
    })
}

fn decode_string(item: &Item, name: &str) -> Result<Option<String>, StoreError> {
    match item.get(name) {
        None | Some(AttributeValue::Null(_)) => Ok(None),
        Some(AttributeValue::S(value)) => Ok(Some(value.clone())),
        Some(_) => Err(StoreError::InvalidResponse(format!(
            "attribute `{}` is not a string",
            name
        ))),
    }
}

fn decode_string_list(item: &Item, name: &str) -> Result<Vec<String>, StoreError> {
    match item.get(name) {
        None | Some(AttributeValue::Null(_)) => Ok(Vec::new()),
        Some(AttributeValue::Ss(values)) => Ok(values.clone()),
        Some(AttributeValue::L(values)) => values
            .iter()
            .map(|value| match value {
                AttributeValue::S(s) => Ok(s.clone()),
                _ => Err(StoreError::InvalidResponse(format!(
                    "attribute `{}` contains a non-string element",
                    name
                ))),
            })
            .collect(),
        Some(_) => Err(StoreError::InvalidResponse(format!(
            "attribute `{}` is not a string list",
            name
        ))),
    }
}
