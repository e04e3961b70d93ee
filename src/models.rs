use chrono::{DateTime, Utc};
use rocket_db_pools::sqlx::{self, FromRow};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of a persisted contact row.
pub type ContactId = i32;

// ===== Ownership =====

/// The organization a contact belongs to. Lookups and writes never cross scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Scope(pub Uuid);

impl Scope {
    pub fn new(org_id: Uuid) -> Self {
        Self(org_id)
    }

    pub fn org_id(&self) -> Uuid {
        self.0
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ===== Contact Enums =====

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, sqlx::Type, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[sqlx(type_name = "lead_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Qualified,
    Proposal,
    Won,
    Lost,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 6] = [
        LeadStatus::New,
        LeadStatus::Contacted,
        LeadStatus::Qualified,
        LeadStatus::Proposal,
        LeadStatus::Won,
        LeadStatus::Lost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Proposal => "proposal",
            LeadStatus::Won => "won",
            LeadStatus::Lost => "lost",
        }
    }
}

impl FromStr for LeadStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        LeadStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| format!("unknown lead status '{value}'"))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "lead_sentiment", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl FromStr for Sentiment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "neutral" => Ok(Sentiment::Neutral),
            "negative" => Ok(Sentiment::Negative),
            other => Err(format!("unknown sentiment '{other}'")),
        }
    }
}

// ===== Core Data Models (scoped by org_id) =====

/// A persisted contact.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: ContactId,
    pub org_id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub status: LeadStatus,
    pub sentiment: Option<Sentiment>,
    pub notes: Option<String>,
    pub source: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct StatusCount {
    pub status: LeadStatus,
    pub count: usize,
}

/// Per-scope listing statistics shown on the contacts dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContactStats {
    pub total: usize,
    pub by_status: Vec<StatusCount>,
}

impl ContactStats {
    pub fn from_contacts(contacts: &[Contact]) -> Self {
        let by_status = LeadStatus::ALL
            .into_iter()
            .map(|status| StatusCount {
                status,
                count: contacts.iter().filter(|c| c.status == status).count(),
            })
            .collect();

        Self {
            total: contacts.len(),
            by_status,
        }
    }
}

// ===== Response Envelopes =====

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DataResponse<T> {
    pub data: T,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_status_parses_case_insensitively() {
        assert_eq!("Qualified".parse::<LeadStatus>(), Ok(LeadStatus::Qualified));
        assert_eq!(" won ".parse::<LeadStatus>(), Ok(LeadStatus::Won));
        assert!("archived".parse::<LeadStatus>().is_err());
    }

    #[test]
    fn stats_count_every_status() {
        let stats = ContactStats::from_contacts(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.by_status.len(), LeadStatus::ALL.len());
        assert!(stats.by_status.iter().all(|entry| entry.count == 0));
    }
}
