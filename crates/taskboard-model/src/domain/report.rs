use std::{collections::HashMap, fmt, time::SystemTime};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ReportId;

/// Category of a stored report, used for filtered listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReportType {
    DerivedDiff,
    WhyView,
    TimeToGreen,
    Metrics,
    Performance,
    Custom(String),
}

impl ReportType {
    pub fn as_str(&self) -> &str {
        match self {
            ReportType::DerivedDiff => "derived_diff",
            ReportType::WhyView => "why_view",
            ReportType::TimeToGreen => "time_to_green",
            ReportType::Metrics => "metrics",
            ReportType::Performance => "performance",
            ReportType::Custom(s) => s,
        }
    }
}

impl From<String> for ReportType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "derived_diff" => ReportType::DerivedDiff,
            "why_view" => ReportType::WhyView,
            "time_to_green" => ReportType::TimeToGreen,
            "metrics" => ReportType::Metrics,
            "performance" => ReportType::Performance,
            _ => ReportType::Custom(s),
        }
    }
}

impl From<&str> for ReportType {
    fn from(s: &str) -> Self {
        ReportType::from(s.to_string())
    }
}

impl From<ReportType> for String {
    fn from(kind: ReportType) -> Self {
        match kind {
            ReportType::Custom(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document-style report produced for the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Unique report identifier.
    pub id: ReportId,
    /// Report category.
    #[serde(rename = "type")]
    pub kind: ReportType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Free-form report body.
    #[serde(default)]
    pub content: Value,
    /// When the report was produced.
    #[serde(with = "time_serde")]
    pub created_at: SystemTime,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl Report {
    /// Create an empty report with a fresh random id.
    pub fn new(kind: ReportType, title: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            title: title.into(),
            description: String::new(),
            content: Value::Null,
            created_at: SystemTime::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<ReportId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_content(mut self, content: Value) -> Self {
        self.content = content;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

mod time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .map_err(serde::ser::Error::custom)?;
        since_epoch.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + std::time::Duration::from_secs(secs))
    }
}
