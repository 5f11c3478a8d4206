use std::time::SystemTime;

use rusqlite::{OptionalExtension, params};
use serde::Serialize;

use crate::{
    config,
    domain::record::RawRecord,
    normalize::duration::parse_number,
    storage::{
        db::{self, SecondsSinceUnix, system_time_to_i64},
        error::StorageError,
        schema::{columns::*, tables::*},
    },
};

/// One row of the `tracks` table, as read from a canonical csv row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackRow {
    pub track_name: String,
    pub artists: String,
    pub album_name: Option<String>,
    pub track_genre: Option<String>,
    pub duration_minutes: Option<f64>,
    pub popularity: Option<f64>,
    pub popularity_tier: Option<String>,
    pub danceability: Option<f64>,
    pub danceability_label: Option<String>,
    pub energy: Option<f64>,
    pub energy_label: Option<String>,
    pub explicit_label: Option<String>,
}

impl TrackRow {
    /// Maps canonical field names onto table columns.
    ///
    /// Numeric cells that are empty or unparseable become NULL. Text columns
    /// missing from the file are NULL, except the two NOT NULL ones which default to "".
    pub fn from_canonical(row: &RawRecord) -> Self {
        let text = |name: &str| row.get(name).map(str::to_string);
        let number = |name: &str| row.get(name).and_then(parse_number);

        Self {
            track_name: text("track_name_clean").unwrap_or_default(),
            artists: text("artists_clean").unwrap_or_default(),
            album_name: text("Album"),
            track_genre: text("Genre"),
            duration_minutes: number("duration_minutes"),
            popularity: number("Popularity"),
            popularity_tier: text("popularity_tier"),
            danceability: number("Danceability"),
            danceability_label: text("danceability_label"),
            energy: number("Energy"),
            energy_label: text("energy_label"),
            explicit_label: text("explicit_label"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadEntry {
    pub bucket: String,
    pub key: String,
    pub rows: i64,
    pub loaded_at: SecondsSinceUnix,
}

/// The relational side of the pipeline: owns the connection holding `tracks`.
pub struct Warehouse {
    pub(crate) db: rusqlite::Connection,
}

impl Warehouse {
    /// when called, opens a data base connection
    pub fn new(db_config: &config::Database) -> Result<Self, StorageError> {
        let db = db::open(db_config)?;
        Ok(Self::from_existing_conn(db))
    }

    pub fn from_existing_conn(db: rusqlite::Connection) -> Self {
        Self { db }
    }

    /// Inserts every row inside one transaction, logging progress per batch.
    ///
    /// Nothing is committed if any row fails to read or insert. On success the
    /// load is recorded in the `loads` table against `bucket`/`key`.
    pub fn insert_tracks<I>(
        &mut self,
        rows: I,
        batch_size: usize,
        bucket: &str,
        key: &str,
    ) -> Result<usize, StorageError>
    where
        I: IntoIterator<Item = Result<TrackRow, StorageError>>,
    {
        let batch_size = batch_size.max(1);
        let loaded_at = system_time_to_i64(SystemTime::now())?;
        let tx = self.db.transaction()?;

        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {TRACKS} ({TRACK_NAME}, {ARTISTS}, {ALBUM_NAME}, {TRACK_GENRE}, \
                 {DURATION_MINUTES}, {POPULARITY}, {POPULARITY_TIER}, {DANCEABILITY}, \
                 {DANCEABILITY_LABEL}, {ENERGY}, {ENERGY_LABEL}, {EXPLICIT_LABEL}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ))?;

            let mut batch = Vec::with_capacity(batch_size);
            let mut flush = |batch: &mut Vec<TrackRow>| -> Result<usize, StorageError> {
                for row in batch.iter() {
                    stmt.execute(params![
                        row.track_name,
                        row.artists,
                        row.album_name,
                        row.track_genre,
                        row.duration_minutes,
                        row.popularity,
                        row.popularity_tier,
                        row.danceability,
                        row.danceability_label,
                        row.energy,
                        row.energy_label,
                        row.explicit_label,
                    ])?;
                }
                let n = batch.len();
                batch.clear();
                Ok(n)
            };

            for row in rows {
                batch.push(row?);
                if batch.len() >= batch_size {
                    let n = flush(&mut batch)?;
                    inserted += n;
                    log::info!("Inserted batch of {n} rows (total so far: {inserted})");
                }
            }
            if !batch.is_empty() {
                let n = flush(&mut batch)?;
                inserted += n;
                log::info!("Inserted final batch of {n} rows (grand total: {inserted})");
            }
        }

        tx.execute(
            &format!(
                "INSERT INTO {LOADS} ({BUCKET}, {OBJECT_KEY}, {ROWS}, {LOADED_AT}) \
                 VALUES (?1, ?2, ?3, ?4)"
            ),
            params![bucket, key, inserted as i64, loaded_at],
        )?;
        tx.commit()?;

        log::info!("Committed {inserted} rows from {bucket}/{key}");
        Ok(inserted)
    }

    pub fn count_tracks(&self) -> Result<i64, StorageError> {
        Ok(self
            .db
            .query_row(&format!("SELECT COUNT(*) FROM {TRACKS}"), [], |row| {
                row.get(0)
            })?)
    }

    /// most recent load, if any
    pub fn last_load(&self) -> Result<Option<LoadEntry>, StorageError> {
        Ok(self
            .db
            .query_row(
                &format!(
                    "SELECT {BUCKET}, {OBJECT_KEY}, {ROWS}, {LOADED_AT} FROM {LOADS} \
                     ORDER BY id DESC LIMIT 1"
                ),
                [],
                |row| {
                    Ok(LoadEntry {
                        bucket: row.get(0)?,
                        key: row.get(1)?,
                        rows: row.get(2)?,
                        loaded_at: row.get(3)?,
                    })
                },
            )
            .optional()?)
    }
}
