use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tokio::{
    sync::mpsc,
    time::{self, Instant},
};

use crate::domain::{
    comparison::{ComparisonResult, FailureReason, SiteReport},
    intent::QueryIntent,
    site::SiteId,
    workflow::Workflow,
};

use super::{
    aggregator::aggregate,
    browser_session::{BrowserSession, SessionProvider},
    events::{EventSink, PipelineEvent},
    extractor::Extractor,
    intent_parser::{IntentParseError, IntentParser},
    workflow_executor::WorkflowExecutor,
    workflow_generator::{GenerateError, WorkflowGenerator},
};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Parse(#[from] IntentParseError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error("no intent parser is configured")]
    NoParser,
}

#[derive(Debug, Clone, Copy)]
pub struct RunnerSettings {
    /// Wall-clock ceiling for one site's pipeline, opening the session included.
    pub pipeline_timeout: Duration,
    pub close_timeout: Duration,
    /// Extra time the barrier waits past the pipeline deadline.
    pub barrier_grace: Duration,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        RunnerSettings {
            pipeline_timeout: Duration::from_secs(120),
            close_timeout: Duration::from_secs(10),
            barrier_grace: Duration::from_secs(2),
        }
    }
}

/// Runs one query end to end: one pipeline per site, all at once, then a
/// single merge once every pipeline has reported or the deadline has passed.
pub struct QueryRunner {
    generator: WorkflowGenerator,
    parser: Option<Arc<dyn IntentParser>>,
    pipeline: Pipeline,
    settings: RunnerSettings,
}

#[derive(Clone)]
struct Pipeline {
    executor: Arc<WorkflowExecutor>,
    extractor: Arc<Extractor>,
    provider: Arc<dyn SessionProvider>,
    sink: Arc<dyn EventSink>,
    close_timeout: Duration,
}

impl QueryRunner {
    pub fn new(
        generator: WorkflowGenerator,
        executor: WorkflowExecutor,
        extractor: Extractor,
        provider: Arc<dyn SessionProvider>,
        sink: Arc<dyn EventSink>,
        settings: RunnerSettings,
    ) -> Self {
        QueryRunner {
            generator,
            parser: None,
            pipeline: Pipeline {
                executor: Arc::new(executor),
                extractor: Arc::new(extractor),
                provider,
                sink,
                close_timeout: settings.close_timeout,
            },
            settings,
        }
    }

    pub fn with_parser(mut self, parser: Arc<dyn IntentParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Parses `query` and runs it. A parse failure ends the whole query.
    pub async fn run_query(&self, query: &str) -> Result<ComparisonResult, QueryError> {
        let parser = self.parser.as_ref().ok_or(QueryError::NoParser)?;
        let intent = parser.parse(query).await?;
        self.run(&intent).await
    }

    pub async fn run(&self, intent: &QueryIntent) -> Result<ComparisonResult, QueryError> {
        let workflows = self.generator.plan(intent)?;
        let expected = workflows.len();
        let deadline = Instant::now() + self.settings.pipeline_timeout;

        let (sender, mut receiver) = mpsc::unbounded_channel::<SiteReport>();
        for workflow in workflows {
            let sender = sender.clone();
            let pipeline = self.pipeline.clone();
            tokio::spawn(async move {
                let report = pipeline.run(workflow, deadline).await;
                _ = sender.send(report);
            });
        }
        drop(sender);

        let mut reports: Vec<SiteReport> = Vec::with_capacity(expected);
        let mut barrier_expired = false;
        while reports.len() < expected {
            match time::timeout_at(deadline + self.settings.barrier_grace, receiver.recv()).await {
                Ok(Some(report)) => reports.push(report),
                // Every sender is gone: the remaining pipelines died without reporting.
                Ok(None) => break,
                Err(_) => {
                    barrier_expired = true;
                    break;
                }
            }
        }

        for site in intent.target_sites() {
            if reports.iter().any(|r| &r.site == site) {
                continue;
            }
            let reason = match barrier_expired {
                true => FailureReason::Timeout,
                false => FailureReason::Aborted,
            };
            self.pipeline.sink.emit(PipelineEvent::SiteFailed {
                site: site.clone(),
                reason: reason.clone(),
            });
            reports.push(SiteReport::failed(site.clone(), reason));
        }

        let result = aggregate(intent, reports);
        self.pipeline.sink.emit(PipelineEvent::RunFinished {
            run_id: result.run_id,
            records: result.records.len(),
        });
        Ok(result)
    }
}

impl Pipeline {
    async fn run(&self, workflow: Workflow, deadline: Instant) -> SiteReport {
        let site = workflow.site().clone();
        let report = self.drive(&site, &workflow, deadline).await;

        match &report.result {
            Ok(harvest) => self.sink.emit(PipelineEvent::SiteCompleted {
                site: site.clone(),
                records: harvest.records.len(),
                skipped_steps: harvest.skipped_steps,
            }),
            Err(reason) => self.sink.emit(PipelineEvent::SiteFailed {
                site: site.clone(),
                reason: reason.clone(),
            }),
        }
        report
    }

    async fn drive(&self, site: &SiteId, workflow: &Workflow, deadline: Instant) -> SiteReport {
        if workflow.is_empty() {
            log::info!("Nothing to run for {}", site);
            return SiteReport::harvested(site.clone(), vec![], 0);
        }

        let mut session = match time::timeout_at(deadline, self.provider.open(site)).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                log::error!("Could not open a browser session for {}: {}", site, e);
                return SiteReport::failed(site.clone(), FailureReason::SessionUnavailable);
            }
            Err(_) => return SiteReport::failed(site.clone(), FailureReason::Timeout),
        };

        let executed =
            time::timeout_at(deadline, self.executor.execute(workflow, session.as_mut())).await;
        let outcome = match executed {
            Ok(outcome) => outcome,
            Err(_) => {
                // Released in the background so the barrier is not held up.
                tokio::spawn(release(
                    session,
                    site.clone(),
                    self.close_timeout,
                    self.sink.clone(),
                ));
                return SiteReport::failed(site.clone(), FailureReason::Timeout);
            }
        };
        release(session, site.clone(), self.close_timeout, self.sink.clone()).await;

        if outcome.session_lost {
            return SiteReport::failed(site.clone(), FailureReason::SessionUnavailable);
        }

        match self.extractor.harvest(site, outcome.page.as_ref()) {
            Ok(records) => SiteReport::harvested(site.clone(), records, outcome.skipped()),
            Err(e) => SiteReport::failed(site.clone(), FailureReason::Extraction(e.to_string())),
        }
    }
}

async fn release(
    session: Box<dyn BrowserSession>,
    site: SiteId,
    close_timeout: Duration,
    sink: Arc<dyn EventSink>,
) {
    let message = match time::timeout(close_timeout, session.close()).await {
        Ok(Ok(())) => return,
        Ok(Err(e)) => e.to_string(),
        Err(_) => format!("close timed out after {:?}", close_timeout),
    };
    sink.emit(PipelineEvent::SessionCloseFailed { site, message });
}
