use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::{Value, json};

use crate::storage::{
    error::StorageError,
    queries::{CategoryColumn, GroupBy, Metric, SongFilter},
    tracks::Warehouse,
};

const RESPONSE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TopArtistsParams {
    #[serde(default)]
    pub metric: Metric,
    #[serde(default)]
    pub group_by: GroupBy,
    #[serde(default = "default_top_limit", deserialize_with = "lenient_limit")]
    pub limit: u32,
}

/// Limits arrive as numbers or numeric strings (`10` or `"10"`).
fn lenient_limit<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Limit {
        Number(u32),
        Text(String),
    }

    match Limit::deserialize(deserializer)? {
        Limit::Number(n) => Ok(n),
        Limit::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid limit: {text:?}"))),
    }
}

fn default_top_limit() -> u32 {
    10
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CategoryParams {
    #[serde(default)]
    pub category_col: CategoryColumn,
}

/// Thresholds default to zero; an explicit `null` drops that condition.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SongFilterParams {
    #[serde(default = "zero")]
    pub min_popularity: Option<f64>,
    #[serde(default = "zero")]
    pub min_danceability: Option<f64>,
    #[serde(default = "zero")]
    pub min_energy: Option<f64>,
    #[serde(default = "default_songs_limit", deserialize_with = "lenient_limit")]
    pub limit: u32,
}

fn zero() -> Option<f64> {
    Some(0.0)
}

fn default_songs_limit() -> u32 {
    50
}

impl From<SongFilterParams> for SongFilter {
    fn from(p: SongFilterParams) -> Self {
        SongFilter {
            min_popularity: p.min_popularity,
            min_danceability: p.min_danceability,
            min_energy: p.min_energy,
            limit: p.limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryAction {
    TopArtists(TopArtistsParams),
    AvgMetricsByCategory(CategoryParams),
    SongsFiltered(SongFilterParams),
    ExplicitVsCleanStats,
}

impl QueryAction {
    /// Reads the action named by `spec["action"]` together with its parameters.
    ///
    /// An unknown or missing action is [`StorageError::UnknownAction`]; a known
    /// action with bad parameters is [`StorageError::Json`].
    pub fn from_spec(spec: &Value) -> Result<Self, StorageError> {
        let action = spec.get("action").and_then(Value::as_str);
        let params = || spec.clone();

        Ok(match action {
            Some("top_artists") => Self::TopArtists(serde_json::from_value(params())?),
            Some("avg_metrics_by_category") => {
                Self::AvgMetricsByCategory(serde_json::from_value(params())?)
            }
            Some("songs_filtered") => Self::SongsFiltered(serde_json::from_value(params())?),
            Some("explicit_vs_clean_stats") => Self::ExplicitVsCleanStats,
            other => return Err(StorageError::UnknownAction(other.unwrap_or("None").to_string())),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::TopArtists(_) => "top_artists",
            Self::AvgMetricsByCategory(_) => "avg_metrics_by_category",
            Self::SongsFiltered(_) => "songs_filtered",
            Self::ExplicitVsCleanStats => "explicit_vs_clean_stats",
        }
    }

    pub fn run(self, warehouse: &Warehouse) -> Result<Value, StorageError> {
        let rows = match self {
            Self::TopArtists(p) => warehouse.top_artists(p.metric, p.group_by, p.limit)?,
            Self::AvgMetricsByCategory(p) => warehouse.avg_metrics_by_category(p.category_col)?,
            Self::SongsFiltered(p) => warehouse.songs_filtered(&p.into())?,
            Self::ExplicitVsCleanStats => warehouse.explicit_vs_clean_stats()?,
        };
        Ok(Value::Array(rows.into_iter().map(Value::Object).collect()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub version: u32,
    pub action: Option<String>,
    pub query_result: Value,
}

impl QueryResponse {
    /// Response for a spec whose action is not recognised, echoing the spec back.
    pub fn unknown_action(spec: &Value) -> Self {
        let action = spec.get("action").and_then(Value::as_str).map(str::to_string);
        Self {
            version: RESPONSE_VERSION,
            query_result: json!({
                "error": format!(
                    "Unknown or missing action: {}",
                    action.as_deref().unwrap_or("None")
                ),
                "received_spec": spec,
            }),
            action,
        }
    }
}

/// Runs the query described by `spec` (already unwrapped from any `body` envelope).
pub fn run_query(warehouse: &Warehouse, spec: &Value) -> Result<QueryResponse, StorageError> {
    let action = QueryAction::from_spec(spec)?;
    let name = action.name();
    log::info!("Running query {name}");

    Ok(QueryResponse {
        version: RESPONSE_VERSION,
        action: Some(name.to_string()),
        query_result: action.run(warehouse)?,
    })
}
