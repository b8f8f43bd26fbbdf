//! Core domain model for the offer sync & notify service.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CRATE_NAME: &str = "ofd-core";

/// Closed set of shift codes stored as single letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shift {
    #[serde(rename = "M")]
    Morning,
    #[serde(rename = "T")]
    Afternoon,
    #[serde(rename = "N")]
    Night,
    #[serde(rename = "V")]
    Evening,
    #[serde(rename = "A")]
    Rotating,
}

impl Shift {
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'M' => Some(Self::Morning),
            'T' => Some(Self::Afternoon),
            'N' => Some(Self::Night),
            'V' => Some(Self::Evening),
            'A' => Some(Self::Rotating),
            _ => None,
        }
    }

    pub fn as_code(&self) -> &'static str {
        match self {
            Self::Morning => "M",
            Self::Afternoon => "T",
            Self::Night => "N",
            Self::Evening => "V",
            Self::Rotating => "A",
        }
    }
}

/// Closed set of employment-category codes stored as single letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmploymentCategory {
    #[serde(rename = "S")]
    Substitute,
    #[serde(rename = "T")]
    Tenured,
    #[serde(rename = "I")]
    Interim,
    #[serde(rename = "P")]
    Provisional,
}

impl EmploymentCategory {
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'S' => Some(Self::Substitute),
            'T' => Some(Self::Tenured),
            'I' => Some(Self::Interim),
            'P' => Some(Self::Provisional),
            _ => None,
        }
    }

    pub fn as_code(&self) -> &'static str {
        match self {
            Self::Substitute => "S",
            Self::Tenured => "T",
            Self::Interim => "I",
            Self::Provisional => "P",
        }
    }
}

/// One weekday entry of an offer's schedule. Insertion order is the
/// fixed weekday order the normalizer walks, never the feed's order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub day: String,
    pub time_text: String,
}

/// Normalized handoff contract from the feed into the reconciler.
/// Lifecycle columns (`is_active`, seen timestamps) are owned by the
/// store and absent here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferDraft {
    pub id: String,
    pub role: Option<String>,
    pub district: Option<String>,
    pub modality: Option<String>,
    pub school: Option<String>,
    pub section: Option<String>,
    pub shift: Option<Shift>,
    pub employment_category: Option<EmploymentCategory>,
    pub hours_or_modules: Option<String>,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
    pub weekly_schedule: Vec<ScheduleEntry>,
    pub address: Option<String>,
    pub replaces_name: Option<String>,
    pub replacement_reason: Option<String>,
    pub closing_at: Option<DateTime<Utc>>,
    pub raw_source: serde_json::Value,
}

/// Canonical persisted offer row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub role: Option<String>,
    pub district: Option<String>,
    pub modality: Option<String>,
    pub school: Option<String>,
    pub section: Option<String>,
    pub shift: Option<Shift>,
    pub employment_category: Option<EmploymentCategory>,
    pub hours_or_modules: Option<String>,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
    pub weekly_schedule: Vec<ScheduleEntry>,
    pub address: Option<String>,
    pub replaces_name: Option<String>,
    pub replacement_reason: Option<String>,
    pub closing_at: Option<DateTime<Utc>>,
    pub raw_source: serde_json::Value,
    pub is_active: bool,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data-quality repair performed while normalizing a single record.
/// Warnings are operational detail only; they never abort a batch and
/// are never surfaced to end users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NormalizeWarning {
    MissingId,
    UnparsableDate { field: &'static str, raw: String },
    IllogicalDateRange { from: String, to: String },
    InvalidCode { field: &'static str, raw: String },
}

impl NormalizeWarning {
    /// True for repairs that nulled one or both date endpoints.
    pub fn is_date_repair(&self) -> bool {
        matches!(
            self,
            Self::UnparsableDate { .. } | Self::IllogicalDateRange { .. }
        )
    }

    /// True for repairs that dropped an out-of-set code.
    pub fn is_code_repair(&self) -> bool {
        matches!(self, Self::InvalidCode { .. })
    }
}

/// Auditable record of one reconciliation attempt. Opened at run start
/// and closed exactly once, on both the success and failure paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub offers_seen: i64,
    pub offers_inserted: i64,
    pub offers_deactivated: i64,
    pub notes: Option<String>,
}

/// Push transport a delivery address belongs to, derived purely from
/// the address's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Transport {
    Expo,
    Fcm,
}

impl Transport {
    /// Expo addresses carry a recognizable prefix; everything else is
    /// assumed to be an FCM registration token.
    pub fn for_address(address: &str) -> Self {
        if address.trim_start().starts_with("ExponentPushToken[") {
            Self::Expo
        } else {
            Self::Fcm
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expo => "expo",
            Self::Fcm => "fcm",
        }
    }
}

/// A user eligible for notification in the current pass. Computed
/// fresh from user + preference + offer state, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub user_id: Uuid,
    pub delivery_address: String,
    pub transport: Transport,
    pub match_count: i64,
}

impl Recipient {
    pub fn new(user_id: Uuid, delivery_address: String, match_count: i64) -> Self {
        let transport = Transport::for_address(&delivery_address);
        Self {
            user_id,
            delivery_address,
            transport,
            match_count,
        }
    }
}
