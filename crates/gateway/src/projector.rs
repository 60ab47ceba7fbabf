//! Stored record to response record projection.

use catalog_contracts::{RawRecord, ResponseRecord};

use crate::metrics;
use crate::signer::{AssetSigner, SigningError};

/// Project one record. The signer is called only when the record carries a
/// non-empty asset key.
pub fn project_record(
    record: RawRecord,
    signer: &dyn AssetSigner,
) -> Result<ResponseRecord, SigningError> {
    let image_url = match record.asset_key() {
        Some(key) => match signer.presign_get(key) {
            Ok(url) => {
                metrics::observe_signed_url("ok");
                url
            }
            Err(err) => {
                metrics::observe_signed_url("error");
                tracing::warn!(
                    record_id = %record.id,
                    error = %err,
                    "catalog.signing_failed"
                );
                return Err(err);
            }
        },
        None => String::new(),
    };

    Ok(ResponseRecord {
        id: record.id,
        isbn: record.isbn,
        title: record.title,
        publisher: record.publisher,
        authors: record.authors,
        genres: record.genres,
        image_url,
    })
}

/// Project records in order; the first signing failure aborts the batch.
pub fn project<I>(records: I, signer: &dyn AssetSigner) -> Result<Vec<ResponseRecord>, SigningError>
where
    I: IntoIterator<Item = RawRecord>,
{
    records
        .into_iter()
        .map(|record| project_record(record, signer))
        .collect()
}
