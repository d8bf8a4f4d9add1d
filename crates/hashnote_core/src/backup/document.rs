//! Backup document shape.
//!
//! Records stay as raw JSON until import so migrations can rewrite fields
//! that the current model no longer knows about.

use super::BackupError;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub notes: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_timestamp: Option<String>,
}

impl BackupDocument {
    /// Parses backup text.
    ///
    /// # Errors
    /// `InvalidBackupFormat` unless the text is a JSON object with a `notes` array.
    pub fn from_json(text: &str) -> Result<Self, BackupError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|err| BackupError::InvalidBackupFormat(err.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(mut value: Value) -> Result<Self, BackupError> {
        let Some(object) = value.as_object_mut() else {
            return Err(BackupError::InvalidBackupFormat(
                "backup must be a JSON object".to_string(),
            ));
        };
        if !object.get("notes").is_some_and(Value::is_array) {
            return Err(BackupError::InvalidBackupFormat(
                "backup has no `notes` array".to_string(),
            ));
        }
        if object.get("tags").is_some_and(|tags| !tags.is_array()) {
            warn!("event=backup_parse module=backup status=skip reason=tags_not_array");
            object.remove("tags");
        }
        for key in ["exportDate", "appVersion", "versionTimestamp"] {
            if object.get(key).is_some_and(|v| !v.is_string()) {
                object.remove(key);
            }
        }
        if object
            .get("dbVersion")
            .is_some_and(|v| v.as_u64().and_then(|n| u32::try_from(n).ok()).is_none())
        {
            object.remove("dbVersion");
        }
        serde_json::from_value(value)
            .map_err(|err| BackupError::InvalidBackupFormat(err.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String, BackupError> {
        serde_json::to_string_pretty(self).map_err(BackupError::Json)
    }
}
