use serde::Serialize;
use uuid::Uuid;

use super::{
    intent::QueryType,
    price::Money,
    record::ExtractedRecord,
    site::SiteId,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    Extraction(String),
    SessionUnavailable,
    Timeout,
    Aborted,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Extraction(message) => write!(f, "extraction: {}", message),
            FailureReason::SessionUnavailable => f.write_str("session-unavailable"),
            FailureReason::Timeout => f.write_str("timeout"),
            FailureReason::Aborted => f.write_str("aborted"),
        }
    }
}

/// What one site's pipeline produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteHarvest {
    pub records: Vec<ExtractedRecord>,
    pub skipped_steps: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiteReport {
    pub site: SiteId,
    pub result: Result<SiteHarvest, FailureReason>,
}

impl SiteReport {
    pub fn harvested(site: SiteId, records: Vec<ExtractedRecord>, skipped_steps: usize) -> Self {
        SiteReport {
            site,
            result: Ok(SiteHarvest {
                records,
                skipped_steps,
            }),
        }
    }

    pub fn failed(site: SiteId, reason: FailureReason) -> Self {
        SiteReport {
            site,
            result: Err(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CoverageStatus {
    Succeeded,
    /// Records were found but some workflow steps were skipped.
    Partial,
    Empty,
    Failed { reason: FailureReason },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteCoverage {
    pub site: SiteId,
    #[serde(flatten)]
    pub status: CoverageStatus,
    pub records: usize,
    pub skipped_steps: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparedRecord {
    #[serde(flatten)]
    pub record: ExtractedRecord,
    pub group: Option<String>,
    pub best_value: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub within_budget: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestValue {
    pub group: String,
    pub site: SiteId,
    pub price: Money,
    /// Index into [`ComparisonResult::records`].
    pub record_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub run_id: Uuid,
    pub query_type: QueryType,
    pub records: Vec<ComparedRecord>,
    pub best_values: Vec<BestValue>,
    pub coverage: Vec<SiteCoverage>,
}

impl ComparisonResult {
    pub fn coverage_of(&self, site: &SiteId) -> Option<&CoverageStatus> {
        self.coverage
            .iter()
            .find(|c| &c.site == site)
            .map(|c| &c.status)
    }

    pub fn best_values_in(&self, group: &str) -> impl Iterator<Item = &ComparedRecord> {
        let group = group.to_string();
        self.best_values
            .iter()
            .filter(move |b| b.group == group)
            .filter_map(|b| self.records.get(b.record_index))
    }

    pub fn all_failed(&self) -> bool {
        self.coverage
            .iter()
            .all(|c| matches!(c.status, CoverageStatus::Failed { .. }))
    }
}
