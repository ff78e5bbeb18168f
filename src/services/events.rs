use std::sync::Mutex;

use uuid::Uuid;

use crate::domain::{
    command::CommandKind, comparison::FailureReason, site::SiteId, workflow::SkipReason,
};

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    SiteDropped {
        site: SiteId,
    },
    GenerationWarning {
        site: SiteId,
        message: String,
    },
    WorkflowGenerated {
        site: SiteId,
        commands: usize,
    },
    StepApplied {
        site: SiteId,
        index: usize,
        kind: CommandKind,
    },
    StepSkipped {
        site: SiteId,
        index: usize,
        kind: CommandKind,
        reason: SkipReason,
    },
    PageCaptureFailed {
        site: SiteId,
        message: String,
    },
    SessionCloseFailed {
        site: SiteId,
        message: String,
    },
    SiteCompleted {
        site: SiteId,
        records: usize,
        skipped_steps: usize,
    },
    SiteFailed {
        site: SiteId,
        reason: FailureReason,
    },
    RunFinished {
        run_id: Uuid,
        records: usize,
    },
}

/// Receives structured events from the generator, executor and runner.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// Forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::SiteDropped { site } => {
                log::warn!("Unsupported site dropped from intent: {}", site)
            }
            PipelineEvent::GenerationWarning { site, message } => {
                log::warn!("Workflow generation for {}: {}", site, message)
            }
            PipelineEvent::WorkflowGenerated { site, commands } => {
                log::info!("Generated workflow for {} with {} command(s)", site, commands)
            }
            PipelineEvent::StepApplied { site, index, kind } => {
                log::debug!("{} step {} ({}) applied", site, index, kind)
            }
            PipelineEvent::StepSkipped {
                site,
                index,
                kind,
                reason,
            } => log::error!("{} step {} ({}) skipped: {}", site, index, kind, reason),
            PipelineEvent::PageCaptureFailed { site, message } => {
                log::warn!("Could not capture final page for {}: {}", site, message)
            }
            PipelineEvent::SessionCloseFailed { site, message } => {
                log::error!("Failed to release browser session for {}: {}", site, message)
            }
            PipelineEvent::SiteCompleted {
                site,
                records,
                skipped_steps,
            } => log::info!(
                "Scraped {} items from {} ({} step(s) skipped)",
                records,
                site,
                skipped_steps
            ),
            PipelineEvent::SiteFailed { site, reason } => {
                log::error!("Pipeline for {} failed: {}", site, reason)
            }
            PipelineEvent::RunFinished { run_id, records } => {
                log::info!("Run {} finished with {} record(s)", run_id, records)
            }
        }
    }
}

/// Keeps every event in memory, for callers that report events back.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl MemorySink {
    pub fn events(&self) -> Vec<PipelineEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: PipelineEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
