//! Candidate rows submitted for import.

use crate::import::normalize::{normalize_email, normalize_optional_text, source_set};
use crate::models::{LeadStatus, Sentiment};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// One untrusted input row, e.g. a spreadsheet line.
///
/// Lives for a single import call. `email` is the case-insensitive natural key.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: LeadStatus,
    #[serde(default, deserialize_with = "lenient_sentiment")]
    pub sentiment: Option<Sentiment>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "lenient_source")]
    pub source: Vec<String>,
}

impl CandidateRecord {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_source<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Parse one uploaded row on its own, so a malformed row fails alone.
    pub fn from_json(row: &Value) -> Result<CandidateRecord, String> {
        CandidateRecord::deserialize(row).map_err(|err| format!("invalid row: {err}"))
    }

    /// Best-effort copy of a row that failed to parse, for error reports.
    ///
    /// Keeps every field that has the expected shape and drops the rest.
    pub fn salvage(row: &Value) -> CandidateRecord {
        let text = |key: &str| row.get(key).and_then(Value::as_str).map(str::to_string);

        CandidateRecord {
            email: text("email").unwrap_or_default(),
            name: text("name").unwrap_or_default(),
            phone: text("phone"),
            company: text("company"),
            title: text("title"),
            status: text("status")
                .and_then(|value| LeadStatus::from_str(&value).ok())
                .unwrap_or_default(),
            sentiment: text("sentiment").and_then(|value| Sentiment::from_str(&value).ok()),
            notes: text("notes"),
            source: row
                .get("source")
                .and_then(Value::as_array)
                .map(|tags| {
                    tags.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// The form of this row that is written to the store.
    ///
    /// Email is normalized, text is trimmed, blank optionals become `None` and
    /// source tags are de-duplicated in sorted order.
    pub fn normalized(&self) -> CandidateRecord {
        CandidateRecord {
            email: normalize_email(&self.email),
            name: self.name.trim().to_string(),
            phone: normalize_optional_text(self.phone.clone()),
            company: normalize_optional_text(self.company.clone()),
            title: normalize_optional_text(self.title.clone()),
            status: self.status,
            sentiment: self.sentiment,
            notes: normalize_optional_text(self.notes.clone()),
            source: source_set(&self.source)
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

fn lenient_status<'de, D>(deserializer: D) -> Result<LeadStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(LeadStatus::default()),
        Some(value) => LeadStatus::from_str(value).map_err(serde::de::Error::custom),
    }
}

fn lenient_sentiment<'de, D>(deserializer: D) -> Result<Option<Sentiment>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => Sentiment::from_str(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn lenient_source<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
