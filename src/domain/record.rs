use serde::Serialize;

use crate::normalize::categorize::{DanceabilityLabel, EnergyLabel, ExplicitLabel, PopularityTier};

/// Output header of the transform stage, in column order.
///
/// The load stage maps rows by these exact names, so renaming any of them
/// breaks every transformed object already sitting in storage.
pub const CANONICAL_FIELDS: [&str; 12] = [
    "track_name_clean",
    "artists_clean",
    "Album",
    "Genre",
    "duration_minutes",
    "Popularity",
    "popularity_tier",
    "Danceability",
    "danceability_label",
    "Energy",
    "energy_label",
    "explicit_label",
];

/// One input row, keyed by whatever header names the source file happens to use.
///
/// Fields keep their input order. A field missing from a short row is simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    fields: Vec<(String, String)>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a record from a csv row, pairing values with headers by position.
    pub fn from_csv(headers: &csv::StringRecord, row: &csv::StringRecord) -> Self {
        headers.iter().zip(row.iter()).collect()
    }

    /// Sets `name` to `value`, replacing an existing field of the same name in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut record = RawRecord::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}

/// A normalized track row.
///
/// Every field is always present. Numeric fields are `None` when the input was
/// missing or unparseable, which serializes as an empty csv cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRecord {
    #[serde(rename = "track_name_clean")]
    pub track_name: String,
    #[serde(rename = "artists_clean")]
    pub artists: String,
    #[serde(rename = "Album")]
    pub album: String,
    #[serde(rename = "Genre")]
    pub genre: String,
    pub duration_minutes: Option<f64>,
    #[serde(rename = "Popularity")]
    pub popularity: Option<f64>,
    pub popularity_tier: PopularityTier,
    #[serde(rename = "Danceability")]
    pub danceability: Option<f64>,
    pub danceability_label: DanceabilityLabel,
    #[serde(rename = "Energy")]
    pub energy: Option<f64>,
    pub energy_label: EnergyLabel,
    pub explicit_label: ExplicitLabel,
}
