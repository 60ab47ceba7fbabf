use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::signer::S3PresignerConfig;
use crate::sigv4::Credentials;
use crate::store::DynamoStoreConfig;

const DEFAULT_REGION: &str = "us-west-1";
const DEFAULT_TABLE_NAME: &str = "books";
const DEFAULT_ASSET_BUCKET: &str = "bookstore-images-bucket";

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub bind_addr: SocketAddr,
    pub region: String,
    pub table_name: String,
    pub asset_bucket: String,
    pub store_endpoint: String,
    pub asset_endpoint: String,
    pub asset_path_style: bool,
    pub store_timeout_ms: u64,
    pub store_page_limit: Option<u32>,
    pub request_timeout_ms: u64,
    pub credentials: Credentials,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for StartupError {}

impl CatalogConfig {
    pub fn load() -> Result<Self, StartupError> {
        let mut merged = HashMap::new();

        if let Ok(config_path) = std::env::var("CATALOG_CONFIG_PATH") {
            let config_path = config_path.trim();
            if !config_path.is_empty() {
                merged.extend(parse_env_file(config_path)?);
            }
        }

        merged.extend(std::env::vars());

        Self::from_kv(&merged)
    }

    pub fn from_kv(kv: &HashMap<String, String>) -> Result<Self, StartupError> {
        let bind_addr = parse_socket_addr(
            kv.get("CATALOG_BIND_ADDR"),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080),
            "CATALOG_BIND_ADDR",
        )?;

        let region = optional_nonempty(kv, "CATALOG_AWS_REGION")
            .or_else(|| optional_nonempty(kv, "AWS_REGION"))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let table_name = optional_nonempty(kv, "CATALOG_TABLE_NAME")
            .unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string());
        let asset_bucket = optional_nonempty(kv, "CATALOG_ASSET_BUCKET")
            .unwrap_or_else(|| DEFAULT_ASSET_BUCKET.to_string());

        let store_endpoint = optional_nonempty(kv, "CATALOG_STORE_ENDPOINT")
            .unwrap_or_else(|| format!("https://dynamodb.{}.amazonaws.com", region));
        require_http_url(&store_endpoint, "CATALOG_STORE_ENDPOINT")?;

        let asset_endpoint = optional_nonempty(kv, "CATALOG_ASSET_ENDPOINT")
            .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", region));
        require_http_url(&asset_endpoint, "CATALOG_ASSET_ENDPOINT")?;

        let asset_path_style = match kv.get("CATALOG_ASSET_PATH_STYLE") {
            None => false,
            Some(v) if v.trim().is_empty() => false,
            Some(v) => parse_bool(v).ok_or_else(|| StartupError {
                code: "ERR_INVALID_CONFIG",
                message: "CATALOG_ASSET_PATH_STYLE must be true or false".to_string(),
            })?,
        };

        let store_timeout_ms = parse_timeout_ms(
            kv.get("CATALOG_STORE_TIMEOUT_MS"),
            2000,
            "CATALOG_STORE_TIMEOUT_MS",
        )?;
        let request_timeout_ms = parse_timeout_ms(
            kv.get("CATALOG_REQUEST_TIMEOUT_MS"),
            10_000,
            "CATALOG_REQUEST_TIMEOUT_MS",
        )?;

        let store_page_limit = match kv.get("CATALOG_STORE_PAGE_LIMIT") {
            None => None,
            Some(v) if v.trim().is_empty() => None,
            Some(v) => match v.trim().parse::<u32>() {
                Ok(limit) if limit >= 1 => Some(limit),
                _ => {
                    return Err(StartupError {
                        code: "ERR_INVALID_CONFIG",
                        message: "CATALOG_STORE_PAGE_LIMIT must be a positive integer".to_string(),
                    });
                }
            },
        };

        let credentials = Credentials {
            access_key_id: require_nonempty(kv, "AWS_ACCESS_KEY_ID")?,
            secret_access_key: require_nonempty(kv, "AWS_SECRET_ACCESS_KEY")?,
            session_token: optional_nonempty(kv, "AWS_SESSION_TOKEN"),
        };

        Ok(Self {
            bind_addr,
            region,
            table_name,
            asset_bucket,
            store_endpoint,
            asset_endpoint,
            asset_path_style,
            store_timeout_ms,
            store_page_limit,
            request_timeout_ms,
            credentials,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn store_config(&self) -> DynamoStoreConfig {
        DynamoStoreConfig {
            endpoint: self.store_endpoint.clone(),
            region: self.region.clone(),
            table_name: self.table_name.clone(),
            credentials: self.credentials.clone(),
            timeout: Duration::from_millis(self.store_timeout_ms),
            page_limit: self.store_page_limit,
        }
    }

    pub fn presigner_config(&self) -> S3PresignerConfig {
        S3PresignerConfig {
            bucket: self.asset_bucket.clone(),
            region: self.region.clone(),
            endpoint: self.asset_endpoint.clone(),
            path_style: self.asset_path_style,
            credentials: self.credentials.clone(),
        }
    }
}

fn parse_env_file(path: &str) -> Result<HashMap<String, String>, StartupError> {
    let contents = std::fs::read_to_string(path).map_err(|_| StartupError {
        code: "ERR_CONFIG_FILE_READ",
        message: format!("failed to read config file at {}", path),
    })?;

    parse_env_lines(&contents)
}

fn parse_env_lines(contents: &str) -> Result<HashMap<String, String>, StartupError> {
    let mut kv = HashMap::new();

    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = line.split_once('=').ok_or_else(|| StartupError {
            code: "ERR_CONFIG_FILE_PARSE",
            message: format!("invalid config line {} (expected KEY=VALUE)", idx + 1),
        })?;

        let key = key.trim();
        if key.is_empty() {
            return Err(StartupError {
                code: "ERR_CONFIG_FILE_PARSE",
                message: format!("invalid config line {} (empty key)", idx + 1),
            });
        }

        kv.insert(key.to_string(), strip_quotes(value.trim()).to_string());
    }

    Ok(kv)
}

fn strip_quotes(s: &str) -> &str {
    for quote in ['"', '\''] {
        if s.len() >= 2
            && let Some(inner) = s.strip_prefix(quote).and_then(|s| s.strip_suffix(quote))
        {
            return inner;
        }
    }
    s
}

fn optional_nonempty(kv: &HashMap<String, String>, key: &str) -> Option<String> {
    kv.get(key)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn require_nonempty(
    kv: &HashMap<String, String>,
    key: &'static str,
) -> Result<String, StartupError> {
    optional_nonempty(kv, key).ok_or_else(|| StartupError {
        code: "ERR_MISSING_CONFIG",
        message: format!("missing required config key {}", key),
    })
}

fn require_http_url(value: &str, key: &'static str) -> Result<(), StartupError> {
    match reqwest::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => Ok(()),
        _ => Err(StartupError {
            code: "ERR_INVALID_CONFIG",
            message: format!("{} must be an http(s) URL", key),
        }),
    }
}

fn parse_socket_addr(
    value: Option<&String>,
    default: SocketAddr,
    key: &'static str,
) -> Result<SocketAddr, StartupError> {
    match value {
        None => Ok(default),
        Some(v) if v.trim().is_empty() => Ok(default),
        Some(v) => v.trim().parse::<SocketAddr>().map_err(|_| StartupError {
            code: "ERR_INVALID_CONFIG",
            message: format!("{} must be a valid host:port socket address", key),
        }),
    }
}

fn parse_timeout_ms(
    value: Option<&String>,
    default: u64,
    key: &'static str,
) -> Result<u64, StartupError> {
    let parsed = match value {
        None => default,
        Some(v) if v.trim().is_empty() => default,
        Some(v) => v.trim().parse::<u64>().map_err(|_| StartupError {
            code: "ERR_INVALID_CONFIG",
            message: format!("{} must be an integer", key),
        })?,
    };

    if parsed == 0 {
        return Err(StartupError {
            code: "ERR_INVALID_CONFIG",
            message: format!("{} must be >= 1", key),
        });
    }

    Ok(parsed)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    }
}
