use serde::Serialize;

use crate::{
    config::{LoadConfig, StorageConfig},
    domain::record::RawRecord,
    pipeline::request::ObjectEvent,
    storage::{
        error::StorageError,
        objects::ObjectStore,
        tracks::{TrackRow, Warehouse},
    },
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadReport {
    pub status: &'static str,
    pub inserted: usize,
    pub bucket: String,
    pub key: String,
}

/// Streams a canonical csv object into the `tracks` table.
pub fn run_load(
    store: &ObjectStore,
    storage: &StorageConfig,
    config: &LoadConfig,
    warehouse: &mut Warehouse,
    event: ObjectEvent,
) -> Result<LoadReport, StorageError> {
    let location = event.resolve(storage.transformed_bucket())?;
    log::info!("Reading canonical rows from {}/{}", location.bucket, location.key);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(store.open(&location.bucket, &location.key)?);
    let headers = reader.headers()?.clone();

    let rows = reader.into_records().map(|record| -> Result<TrackRow, StorageError> {
        let record = record?;
        Ok(TrackRow::from_canonical(&RawRecord::from_csv(
            &headers, &record,
        )))
    });

    log::info!("Starting inserts with batch size {}", config.batch_size);
    let inserted = warehouse.insert_tracks(rows, config.batch_size, &location.bucket, &location.key)?;

    Ok(LoadReport {
        status: "ok",
        inserted,
        bucket: location.bucket,
        key: location.key,
    })
}
