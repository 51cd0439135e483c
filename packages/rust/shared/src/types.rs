//! Core domain types for court cases, defendants, and skip-trace enrichment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Billing rate applied to each production lookup, in dollars.
pub const PRODUCTION_COST_PER_LOOKUP: f64 = 0.07;

// ---------------------------------------------------------------------------
// Region
// ---------------------------------------------------------------------------

/// A named locality (town) and the parent area (county) it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub parent_area: String,
}

impl Region {
    pub fn new(name: impl Into<String>, parent_area: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_area: parent_area.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Execution mode for phone lookups.
///
/// Each environment owns its own skip-trace table and billing rate; records
/// from one are never visible through the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Sandbox,
    Production,
}

impl Environment {
    /// Name of the table holding this environment's skip-trace records.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Sandbox => "skiptrace_sandbox",
            Self::Production => "skiptrace",
        }
    }

    /// Cost recorded in the ledger for each successful lookup.
    pub fn cost_per_lookup(&self) -> f64 {
        match self {
            Self::Sandbox => 0.0,
            Self::Production => PRODUCTION_COST_PER_LOOKUP,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Production => "production",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Environment {
    type Err = crate::DocketError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Ok(Self::Sandbox),
            "production" | "prod" => Ok(Self::Production),
            other => Err(crate::DocketError::validation(format!(
                "unknown environment '{other}' (expected sandbox or production)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Case / Defendant
// ---------------------------------------------------------------------------

/// A court case scraped from the public search interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub case_name: String,
    /// Unique external identifier; correlates every other record.
    pub docket_number: String,
    pub docket_url: String,
    pub region: String,
}

/// A party named as defendant on a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Defendant {
    pub name: String,
    pub docket_number: String,
    /// Free-text property address as shown by the source; may be a placeholder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
}

// ---------------------------------------------------------------------------
// Skip tracing
// ---------------------------------------------------------------------------

/// Best-effort label for a phone number. Not authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhoneType {
    Mobile,
    Landline,
}

impl PhoneType {
    /// Placeholder classification by number pattern.
    pub fn classify(phone: &str) -> Self {
        if phone.contains("555-01") || phone.contains("860-") {
            Self::Mobile
        } else {
            Self::Landline
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mobile => "mobile",
            Self::Landline => "landline",
        }
    }
}

impl std::str::FromStr for PhoneType {
    type Err = crate::DocketError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "mobile" => Ok(Self::Mobile),
            "landline" => Ok(Self::Landline),
            other => Err(crate::DocketError::parse(format!("unknown phone type '{other}'"))),
        }
    }
}

/// One phone number found for a case. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipTraceRecord {
    pub docket_number: String,
    pub phone_number: String,
    pub phone_type: PhoneType,
    pub environment: Environment,
    /// Raw lookup response the number was taken from (JSON text).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

/// Accumulated billable lookups for one case in one environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostLedgerEntry {
    pub docket_number: String,
    pub environment: Environment,
    pub lookup_count: u32,
    pub cost_per_lookup: f64,
}

impl CostLedgerEntry {
    pub fn total_cost(&self) -> f64 {
        f64::from(self.lookup_count) * self.cost_per_lookup
    }
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for scrape job identifiers (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Generate a new time-sortable job identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Lifecycle state of a scrape job: `pending → running → completed | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One region's extraction run, tracked for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeJob {
    pub job_id: JobId,
    pub region: String,
    pub status: JobStatus,
    /// Set when the job is submitted.
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cases_found: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScrapeJob {
    pub fn pending(region: impl Into<String>) -> Self {
        Self {
            job_id: JobId::new(),
            region: region.into(),
            status: JobStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            cases_found: None,
            error: None,
        }
    }
}
