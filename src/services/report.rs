use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use askama::Template;
use thiserror::Error;

use crate::domain::{
    comparison::{ComparisonResult, CoverageStatus},
    price::{Currency, Money},
    site::{SiteId, SiteRegistry},
};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to render report: {0}")]
    Render(#[from] askama::Error),
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

/// Persists a finished comparison somewhere a person can look at it.
pub trait ReportRenderer: Send + Sync {
    fn render(&self, result: &ComparisonResult) -> Result<PathBuf, ReportError>;
}

/// Writes `query_report_<id>.html` files into one directory.
pub struct HtmlReport {
    dir: PathBuf,
    registry: Arc<SiteRegistry>,
}

#[derive(Template)]
#[template(path = "report.html")]
struct ReportTemplate {
    run_id: String,
    query_type: String,
    rows: Vec<ReportRow>,
    chart: Vec<ChartBar>,
    coverage: Vec<CoverageRow>,
}

struct ReportRow {
    site: String,
    title: String,
    price: String,
    timestamp: String,
    below_average: bool,
    best_value: bool,
}

/// Lowest price a site offered in one currency, scaled against the highest
/// such price in that currency.
struct ChartBar {
    site: String,
    price: String,
    width: u32,
}

struct CoverageRow {
    site: String,
    status: String,
    records: usize,
    failed: bool,
}

impl HtmlReport {
    pub fn new(dir: impl Into<PathBuf>, registry: Arc<SiteRegistry>) -> Self {
        HtmlReport {
            dir: dir.into(),
            registry,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(result: &ComparisonResult) -> String {
        let id = result.run_id.simple().to_string();
        format!("query_report_{}.html", &id[..8])
    }

    fn site_name(&self, site: &SiteId) -> String {
        self.registry
            .get(site)
            .map(|profile| profile.display_name.clone())
            .unwrap_or_else(|| site.to_string())
    }

    pub fn to_html(&self, result: &ComparisonResult) -> Result<String, ReportError> {
        let averages = average_prices(result);

        let rows = result
            .records
            .iter()
            .map(|compared| {
                let record = &compared.record;
                let below_average = record.price.is_some_and(|p| {
                    averages
                        .get(&p.currency)
                        .is_some_and(|average| p.amount < *average)
                });
                ReportRow {
                    site: self.site_name(&record.site),
                    title: record.title.clone().unwrap_or_else(|| "N/A".to_string()),
                    price: match (&record.price, &record.raw_price) {
                        (Some(price), _) => price.to_string(),
                        (None, Some(raw)) => raw.clone(),
                        (None, None) => "N/A".to_string(),
                    },
                    timestamp: record.scraped_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    below_average,
                    best_value: compared.best_value,
                }
            })
            .collect();

        let coverage = result
            .coverage
            .iter()
            .map(|site| CoverageRow {
                site: self.site_name(&site.site),
                status: match &site.status {
                    CoverageStatus::Succeeded => "succeeded".to_string(),
                    CoverageStatus::Partial => {
                        format!("partial, {} step(s) skipped", site.skipped_steps)
                    }
                    CoverageStatus::Empty => "no results".to_string(),
                    CoverageStatus::Failed { reason } => format!("failed ({})", reason),
                },
                records: site.records,
                failed: matches!(site.status, CoverageStatus::Failed { .. }),
            })
            .collect();

        let chart = lowest_prices(result)
            .into_iter()
            .map(|(site, price, highest)| ChartBar {
                site: self.site_name(&site),
                price: price.to_string(),
                width: match highest > 0.0 {
                    true => (price.amount / highest * 100.0).round() as u32,
                    false => 0,
                },
            })
            .collect();

        let template = ReportTemplate {
            run_id: result.run_id.to_string(),
            query_type: result.query_type.to_string(),
            rows,
            chart,
            coverage,
        };
        Ok(template.render()?)
    }
}

impl ReportRenderer for HtmlReport {
    fn render(&self, result: &ComparisonResult) -> Result<PathBuf, ReportError> {
        let html = self.to_html(result)?;
        std::fs::create_dir_all(&self.dir)?;

        let path = self.dir.join(HtmlReport::file_name(result));
        std::fs::write(&path, html)?;
        log::info!("Report saved to {}", path.display());
        Ok(path)
    }
}

/// Mean price per currency. Prices in different currencies are not mixed.
fn average_prices(result: &ComparisonResult) -> HashMap<Currency, f64> {
    let mut sums: HashMap<Currency, (f64, usize)> = HashMap::new();
    for price in result.records.iter().filter_map(|r| r.record.price) {
        let entry = sums.entry(price.currency).or_insert((0.0, 0));
        entry.0 += price.amount;
        entry.1 += 1;
    }

    sums.into_iter()
        .map(|(currency, (sum, count))| (currency, sum / count as f64))
        .collect()
}

/// Each site's lowest price per currency in first-seen order, paired with the
/// highest of those lowest prices in the same currency.
fn lowest_prices(result: &ComparisonResult) -> Vec<(SiteId, Money, f64)> {
    let mut lowest: Vec<(SiteId, Money)> = vec![];
    for record in result.records.iter().map(|r| &r.record) {
        let Some(price) = record.price else {
            continue;
        };
        match lowest
            .iter_mut()
            .find(|(site, p)| site == &record.site && p.currency == price.currency)
        {
            Some((_, p)) if price.amount < p.amount => *p = price,
            Some(_) => {}
            None => lowest.push((record.site.clone(), price)),
        }
    }

    let mut highest: HashMap<Currency, f64> = HashMap::new();
    for (_, price) in &lowest {
        let entry = highest.entry(price.currency).or_insert(price.amount);
        *entry = entry.max(price.amount);
    }

    lowest
        .into_iter()
        .map(|(site, price)| {
            let top = highest.get(&price.currency).copied().unwrap_or(price.amount);
            (site, price, top)
        })
        .collect()
}
