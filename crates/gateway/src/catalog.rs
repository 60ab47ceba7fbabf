//! Book lookup: compile the parameters, scan the store, project the results.

use std::time::Duration;

use catalog_contracts::ResponseRecord;
use futures::TryStreamExt;

use crate::filter::{self, FilterError};
use crate::metrics;
use crate::projector;
use crate::signer::{AssetSigner, SigningError};
use crate::store::{RecordStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error("book lookup exceeded {0:?}")]
    Timeout(Duration),
}

/// List the books matching `params`, or every book when `params` is empty.
///
/// Parameter errors are reported before the store is contacted. The whole
/// lookup, paging and signing included, is bounded by `timeout`.
pub async fn list_books(
    store: &dyn RecordStore,
    signer: &dyn AssetSigner,
    params: &[(String, Option<String>)],
    timeout: Duration,
) -> Result<Vec<ResponseRecord>, CatalogError> {
    let (mode, stream) = if params.is_empty() {
        ("all", store.fetch_all())
    } else {
        let compiled = match filter::compile(
            params
                .iter()
                .map(|(field, value)| (field.as_str(), value.as_deref())),
        ) {
            Ok(compiled) => compiled,
            Err(err) => {
                metrics::inc_filter_rejection(err.reason());
                tracing::info!(reason = err.reason(), error = %err, "catalog.filter_rejected");
                return Err(err.into());
            }
        };

        tracing::info!(
            expression = %compiled.expression,
            bindings = compiled.bindings.len(),
            "catalog.filter_compiled"
        );
        tracing::debug!(bindings = ?compiled.bindings, "catalog.filter_bindings");

        ("filtered", store.fetch_filtered(compiled))
    };

    let lookup = async move {
        let records = stream.try_collect::<Vec<_>>().await?;
        Ok::<_, CatalogError>(projector::project(records, signer)?)
    };

    let result = match tokio::time::timeout(timeout, lookup).await {
        Ok(result) => result,
        Err(_) => Err(CatalogError::Timeout(timeout)),
    };

    match &result {
        Ok(books) => {
            metrics::observe_store_scan(mode, "ok");
            tracing::info!(mode, count = books.len(), "catalog.books_listed");
        }
        Err(CatalogError::Store(err)) => {
            metrics::observe_store_scan(mode, "error");
            tracing::warn!(mode, error = %err, "catalog.scan_failed");
        }
        Err(CatalogError::Timeout(limit)) => {
            metrics::observe_store_scan(mode, "timeout");
            tracing::warn!(mode, timeout = ?limit, "catalog.scan_failed");
        }
        Err(_) => metrics::observe_store_scan(mode, "aborted"),
    }

    result
}
