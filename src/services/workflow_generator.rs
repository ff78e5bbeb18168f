use std::sync::Arc;

use thiserror::Error;

use crate::domain::{
    command::{Command, ValidationError},
    intent::{IntentIncompleteError, QueryIntent, QueryType},
    site::{SiteId, SiteProfile, SiteRegistry},
    workflow::Workflow,
};

use super::events::{EventSink, PipelineEvent};

const SCROLL_PIXELS: i64 = 2000;
const SEARCH_SETTLE_SECS: f64 = 2.0;
const FLIGHT_SETTLE_SECS: f64 = 3.0;
const SUBMIT_KEY: &str = "Enter";

#[derive(Debug, Error, PartialEq)]
pub enum GenerateError {
    #[error(transparent)]
    Incomplete(#[from] IntentIncompleteError),
    #[error("site {site} has an invalid profile: {source}")]
    InvalidProfile {
        site: SiteId,
        source: ValidationError,
    },
}

/// Turns an intent into one command sequence per site. Output depends only on
/// the intent, the site and the registry.
pub struct WorkflowGenerator {
    registry: Arc<SiteRegistry>,
    sink: Arc<dyn EventSink>,
}

impl WorkflowGenerator {
    pub fn new(registry: Arc<SiteRegistry>, sink: Arc<dyn EventSink>) -> Self {
        WorkflowGenerator { registry, sink }
    }

    pub fn plan(&self, intent: &QueryIntent) -> Result<Vec<Workflow>, GenerateError> {
        for site in intent.unsupported_sites() {
            self.sink
                .emit(PipelineEvent::SiteDropped { site: site.clone() });
        }

        intent
            .target_sites()
            .iter()
            .map(|site| self.generate(intent, site))
            .collect()
    }

    pub fn generate(&self, intent: &QueryIntent, site: &SiteId) -> Result<Workflow, GenerateError> {
        let request = SiteRequest::from_intent(intent)?;

        let Some(profile) = self.registry.get(site) else {
            self.warn(site, "site is not in the registry, nothing to execute");
            return Ok(Workflow::empty(site.clone()));
        };

        let commands = match request {
            SiteRequest::Search { terms } => self.search_commands(profile, &terms),
            SiteRequest::Flight {
                origin,
                destination,
                date,
            } => self.flight_commands(profile, origin, destination, date),
            SiteRequest::Unrecognized(label) => {
                self.warn(site, &format!("unrecognized query type {label:?}"));
                Ok(vec![])
            }
        }
        .map_err(|source| GenerateError::InvalidProfile {
            site: site.clone(),
            source,
        })?;

        self.sink.emit(PipelineEvent::WorkflowGenerated {
            site: site.clone(),
            commands: commands.len(),
        });
        let workflow = Workflow::new(site.clone(), commands);
        match workflow.is_empty() {
            true => Ok(workflow),
            false => Ok(workflow.with_ready_selector(&profile.selectors.container)),
        }
    }

    fn search_commands(
        &self,
        profile: &SiteProfile,
        terms: &str,
    ) -> Result<Vec<Command>, ValidationError> {
        let Some(url) = profile.search_url_for(terms) else {
            self.warn(&profile.id, "site has no search page");
            return Ok(vec![]);
        };

        let mut commands = vec![
            Command::navigate(&url)?,
            Command::scroll(SCROLL_PIXELS)?,
            Command::wait(SEARCH_SETTLE_SECS)?,
        ];
        if let Some(search_box) = &profile.search_box {
            commands.push(Command::type_text(search_box, terms)?);
            commands.push(Command::press_key(SUBMIT_KEY)?);
        }

        Ok(commands)
    }

    fn flight_commands(
        &self,
        profile: &SiteProfile,
        origin: &str,
        destination: &str,
        date: Option<&str>,
    ) -> Result<Vec<Command>, ValidationError> {
        let Some(form) = &profile.flight_form else {
            self.warn(&profile.id, "site has no flight search form");
            return Ok(vec![]);
        };

        let mut commands = vec![
            Command::navigate(&profile.base_url)?,
            Command::type_text(&form.origin, origin)?,
            Command::type_text(&form.destination, destination)?,
        ];
        if let Some(date) = date {
            commands.push(Command::type_text(&form.date, date)?);
        }
        commands.push(Command::press_key(SUBMIT_KEY)?);
        commands.push(Command::wait(FLIGHT_SETTLE_SECS)?);
        commands.push(Command::scroll(SCROLL_PIXELS)?);

        Ok(commands)
    }

    fn warn(&self, site: &SiteId, message: &str) {
        self.sink.emit(PipelineEvent::GenerationWarning {
            site: site.clone(),
            message: message.to_string(),
        });
    }
}

/// The site-independent part of a workflow, checked for required fields.
enum SiteRequest<'a> {
    Search {
        terms: String,
    },
    Flight {
        origin: &'a str,
        destination: &'a str,
        date: Option<&'a str>,
    },
    Unrecognized(&'a str),
}

impl<'a> SiteRequest<'a> {
    fn from_intent(intent: &'a QueryIntent) -> Result<Self, IntentIncompleteError> {
        let params = intent.search_params();
        let missing = |field| IntentIncompleteError {
            query_type: intent.query_type().clone(),
            field,
        };

        match intent.query_type() {
            QueryType::ProductSearch => {
                let keyword = params.keyword().ok_or_else(|| missing("keyword"))?;
                Ok(SiteRequest::Search {
                    terms: keyword.to_string(),
                })
            }
            QueryType::PriceComparison => {
                let terms = params.comparison_terms();
                match terms.is_empty() {
                    true => Err(missing("keyword")),
                    false => Ok(SiteRequest::Search {
                        terms: terms.join(" "),
                    }),
                }
            }
            QueryType::FlightSearch => Ok(SiteRequest::Flight {
                origin: params.origin().ok_or_else(|| missing("origin"))?,
                destination: params.destination().ok_or_else(|| missing("destination"))?,
                date: params.date(),
            }),
            QueryType::Unrecognized(label) => Ok(SiteRequest::Unrecognized(label)),
        }
    }
}
