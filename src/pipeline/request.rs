//! Payloads that trigger a pipeline stage.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::error::StorageError;

/// Event naming the object a stage should work on.
///
/// Accepts either `{"bucket": .., "key": ..}` or a storage notification of the
/// form `{"Records": [{"s3": {"bucket": {"name": ..}, "object": {"key": ..}}}]}`.
/// Only the first notification record is used.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectEvent {
    pub bucket: Option<String>,
    pub key: Option<String>,
    #[serde(rename = "Records", default)]
    pub records: Vec<NotificationRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationRecord {
    pub s3: NotificationEntity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationEntity {
    pub bucket: BucketRef,
    pub object: ObjectRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectRef {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectEvent {
    pub fn for_key(bucket: Option<String>, key: impl Into<String>) -> Self {
        Self {
            bucket,
            key: Some(key.into()),
            records: vec![],
        }
    }

    /// Picks the object to work on, using `default_bucket` when the event names none.
    pub fn resolve(self, default_bucket: Option<&str>) -> Result<ObjectLocation, StorageError> {
        if let Some(record) = self.records.into_iter().next() {
            return Ok(ObjectLocation {
                bucket: record.s3.bucket.name,
                key: record.s3.object.key,
            });
        }

        let bucket = self
            .bucket
            .filter(|b| !b.is_empty())
            .or_else(|| default_bucket.map(str::to_string))
            .ok_or_else(|| {
                StorageError::InvalidRequest(
                    "no bucket in the event and no default bucket configured".to_string(),
                )
            })?;
        let key = self
            .key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| StorageError::InvalidRequest("event must contain 'key'".to_string()))?;

        Ok(ObjectLocation { bucket, key })
    }
}

/// Unwraps a query payload that arrived as `{"body": "<json>"}`.
///
/// A body that is not valid json becomes an empty spec, so it is reported as a
/// missing action rather than a transport error.
pub fn unwrap_body(event: Value) -> Value {
    if let Some(body) = event.get("body").and_then(Value::as_str) {
        return serde_json::from_str(body).unwrap_or_else(|_| Value::Object(Default::default()));
    }
    if event.is_object() {
        event
    } else {
        Value::Object(Default::default())
    }
}
