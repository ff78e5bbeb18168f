use itertools::Itertools;
use uuid::Uuid;

use crate::domain::{
    comparison::{
        BestValue, ComparedRecord, ComparisonResult, CoverageStatus, FailureReason, SiteCoverage,
        SiteReport,
    },
    intent::{QueryIntent, QueryType},
    record::ExtractedRecord,
};

/// Merges per-site reports into one result. Sites are laid out in request
/// order whatever order their reports arrived in; a requested site without a
/// report is counted as aborted.
pub fn aggregate(intent: &QueryIntent, mut reports: Vec<SiteReport>) -> ComparisonResult {
    let groups = group_labels(intent);
    let budget = intent.search_params().budget_max;

    let mut records: Vec<ComparedRecord> = vec![];
    let mut coverage: Vec<SiteCoverage> = vec![];

    for site in intent.target_sites() {
        let report = match reports.iter().position(|r| &r.site == site) {
            Some(index) => reports.swap_remove(index),
            None => SiteReport::failed(site.clone(), FailureReason::Aborted),
        };

        match report.result {
            Ok(harvest) => {
                let status = match (harvest.records.is_empty(), harvest.skipped_steps) {
                    (true, _) => CoverageStatus::Empty,
                    (false, 0) => CoverageStatus::Succeeded,
                    (false, _) => CoverageStatus::Partial,
                };
                coverage.push(SiteCoverage {
                    site: site.clone(),
                    status,
                    records: harvest.records.len(),
                    skipped_steps: harvest.skipped_steps,
                });

                records.extend(harvest.records.into_iter().map(|record| ComparedRecord {
                    group: group_of(&record, &groups),
                    within_budget: budget.and_then(|limit| {
                        record
                            .price
                            .filter(|p| p.currency == limit.currency)
                            .map(|p| p.amount <= limit.amount)
                    }),
                    best_value: false,
                    record,
                }));
            }
            Err(reason) => coverage.push(SiteCoverage {
                site: site.clone(),
                status: CoverageStatus::Failed { reason },
                records: 0,
                skipped_steps: 0,
            }),
        }
    }

    let best_values = best_values(&records, &groups);
    for best in &best_values {
        if let Some(record) = records.get_mut(best.record_index) {
            record.best_value = true;
        }
    }

    ComparisonResult {
        run_id: Uuid::new_v4(),
        query_type: intent.query_type().clone(),
        records,
        best_values,
        coverage,
    }
}

enum Groups {
    /// Records are grouped by the first term their title contains.
    Terms(Vec<String>),
    /// Every record is a fare for the same route.
    Route(String),
    None,
}

fn group_labels(intent: &QueryIntent) -> Groups {
    let params = intent.search_params();
    match intent.query_type() {
        QueryType::ProductSearch | QueryType::PriceComparison => {
            Groups::Terms(params.comparison_terms())
        }
        QueryType::FlightSearch => match (params.origin(), params.destination()) {
            (Some(origin), Some(destination)) => {
                Groups::Route(format!("{} to {}", origin, destination))
            }
            _ => Groups::None,
        },
        QueryType::Unrecognized(_) => Groups::None,
    }
}

fn group_of(record: &ExtractedRecord, groups: &Groups) -> Option<String> {
    match groups {
        Groups::Terms(terms) => terms.iter().find(|t| record.title_contains(t)).cloned(),
        Groups::Route(route) => Some(route.clone()),
        Groups::None => None,
    }
}

fn group_rank(group: &str, groups: &Groups) -> usize {
    match groups {
        Groups::Terms(terms) => terms.iter().position(|t| t == group).unwrap_or(terms.len()),
        _ => 0,
    }
}

/// Lowest price per (group, currency). Prices in different currencies are never
/// compared. `min_by` keeps the first of equal minimums, and records are in
/// request order, so ties go to the earliest requested site.
fn best_values(records: &[ComparedRecord], groups: &Groups) -> Vec<BestValue> {
    records
        .iter()
        .enumerate()
        .filter_map(|(index, compared)| {
            let group = compared.group.clone()?;
            let price = compared.record.price?;
            Some(((group, price.currency), index))
        })
        .into_group_map()
        .into_iter()
        .filter_map(|((group, _), indices)| {
            let best = indices.into_iter().min_by(|a, b| {
                let (a, b) = (&records[*a].record.price, &records[*b].record.price);
                match (a, b) {
                    (Some(a), Some(b)) => a.amount.total_cmp(&b.amount),
                    _ => std::cmp::Ordering::Equal,
                }
            })?;
            let record = &records[best].record;
            Some(BestValue {
                group,
                site: record.site.clone(),
                price: record.price?,
                record_index: best,
            })
        })
        .sorted_by_key(|b| (group_rank(&b.group, groups), b.price.currency, b.record_index))
        .collect()
}
