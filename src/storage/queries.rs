//! Fixed analytical queries over the `tracks` table.
//!
//! Column names that vary per request are picked from closed enums, never
//! spliced in from user input. Values are always bound as parameters.

use rusqlite::{
    Params,
    types::{Value as SqlValue, ValueRef},
};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::storage::{
    error::StorageError,
    schema::{columns::*, tables::TRACKS},
    tracks::Warehouse,
};

pub type ResultRow = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    Popularity,
    Danceability,
    Energy,
    DurationMinutes,
}

impl Metric {
    pub fn column(&self) -> &'static str {
        match self {
            Self::Popularity => POPULARITY,
            Self::Danceability => DANCEABILITY,
            Self::Energy => ENERGY,
            Self::DurationMinutes => DURATION_MINUTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    #[default]
    Artists,
    AlbumName,
    TrackGenre,
}

impl GroupBy {
    pub fn column(&self) -> &'static str {
        match self {
            Self::Artists => ARTISTS,
            Self::AlbumName => ALBUM_NAME,
            Self::TrackGenre => TRACK_GENRE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryColumn {
    #[default]
    PopularityTier,
    DanceabilityLabel,
    EnergyLabel,
    ExplicitLabel,
    TrackGenre,
}

impl CategoryColumn {
    pub fn column(&self) -> &'static str {
        match self {
            Self::PopularityTier => POPULARITY_TIER,
            Self::DanceabilityLabel => DANCEABILITY_LABEL,
            Self::EnergyLabel => ENERGY_LABEL,
            Self::ExplicitLabel => EXPLICIT_LABEL,
            Self::TrackGenre => TRACK_GENRE,
        }
    }
}

/// Minimum thresholds for [`Warehouse::songs_filtered`]. A `None` threshold is not applied.
#[derive(Debug, Clone, PartialEq)]
pub struct SongFilter {
    pub min_popularity: Option<f64>,
    pub min_danceability: Option<f64>,
    pub min_energy: Option<f64>,
    pub limit: u32,
}

impl Default for SongFilter {
    fn default() -> Self {
        Self {
            min_popularity: Some(0.0),
            min_danceability: Some(0.0),
            min_energy: Some(0.0),
            limit: 50,
        }
    }
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) => Value::from(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::from(b.to_vec()),
    }
}

impl Warehouse {
    /// Runs `sql` and returns each row as a column-name to value map.
    fn query_rows<P: Params>(&self, sql: &str, params: P) -> Result<Vec<ResultRow>, StorageError> {
        let mut stmt = self.db.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let rows = stmt.query_map(params, |row| {
            let mut out = Map::new();
            for (i, name) in names.iter().enumerate() {
                out.insert(name.clone(), json_value(row.get_ref(i)?));
            }
            Ok(out)
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Groups tracks and ranks the groups by the average of `metric`.
    pub fn top_artists(
        &self,
        metric: Metric,
        group_by: GroupBy,
        limit: u32,
    ) -> Result<Vec<ResultRow>, StorageError> {
        let metric = metric.column();
        let group = group_by.column();
        let sql = format!(
            "SELECT {group} AS group_key, \
                    COUNT(*) AS track_count, \
                    AVG({metric}) AS avg_{metric} \
             FROM {TRACKS} \
             GROUP BY {group} \
             ORDER BY avg_{metric} DESC \
             LIMIT ?1"
        );
        self.query_rows(&sql, [limit])
    }

    /// Average duration, danceability and energy per value of a category column.
    pub fn avg_metrics_by_category(
        &self,
        category: CategoryColumn,
    ) -> Result<Vec<ResultRow>, StorageError> {
        let category = category.column();
        let sql = format!(
            "SELECT {category} AS category, \
                    COUNT(*) AS track_count, \
                    AVG({DURATION_MINUTES}) AS avg_duration_minutes, \
                    AVG({DANCEABILITY}) AS avg_danceability, \
                    AVG({ENERGY}) AS avg_energy \
             FROM {TRACKS} \
             GROUP BY {category} \
             ORDER BY track_count DESC"
        );
        self.query_rows(&sql, [])
    }

    pub fn songs_filtered(&self, filter: &SongFilter) -> Result<Vec<ResultRow>, StorageError> {
        let thresholds = [
            (POPULARITY, filter.min_popularity),
            (DANCEABILITY, filter.min_danceability),
            (ENERGY, filter.min_energy),
        ];

        let mut clauses = vec![];
        let mut values = vec![];
        for (column, min) in thresholds {
            if let Some(min) = min {
                values.push(SqlValue::Real(min));
                clauses.push(format!("{column} >= ?{}", values.len()));
            }
        }
        values.push(SqlValue::Integer(filter.limit.into()));

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT {TRACK_NAME}, {ARTISTS}, {POPULARITY}, {DANCEABILITY}, {ENERGY}, {EXPLICIT_LABEL} \
             FROM {TRACKS} \
             {where_sql} \
             ORDER BY {POPULARITY} DESC \
             LIMIT ?{}",
            values.len()
        );
        self.query_rows(&sql, rusqlite::params_from_iter(values))
    }

    /// Count, mean and max popularity for explicit versus clean tracks.
    pub fn explicit_vs_clean_stats(&self) -> Result<Vec<ResultRow>, StorageError> {
        let sql = format!(
            "SELECT {EXPLICIT_LABEL}, \
                    COUNT(*) AS track_count, \
                    AVG({POPULARITY}) AS avg_popularity, \
                    MAX({POPULARITY}) AS max_popularity \
             FROM {TRACKS} \
             GROUP BY {EXPLICIT_LABEL}"
        );
        self.query_rows(&sql, [])
    }
}
