use serde::Serialize;

use super::{command::Command, site::SiteId};

/// Ordered commands for exactly one site. Sequence order is execution order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Workflow {
    site: SiteId,
    commands: Vec<Command>,
    /// Results container the executor waits for before capturing the page.
    #[serde(skip_serializing_if = "Option::is_none")]
    ready_selector: Option<String>,
}

impl Workflow {
    pub fn new(site: SiteId, commands: Vec<Command>) -> Self {
        Workflow {
            site,
            commands,
            ready_selector: None,
        }
    }

    pub fn with_ready_selector(mut self, selector: &str) -> Self {
        self.ready_selector = Some(selector.to_string());
        self
    }

    pub fn empty(site: SiteId) -> Self {
        Workflow::new(site, vec![])
    }

    pub fn site(&self) -> &SiteId {
        &self.site
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn ready_selector(&self) -> Option<&str> {
        self.ready_selector.as_deref()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Applied,
    Skipped { reason: SkipReason },
}

impl StepOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, StepOutcome::Applied)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    StepFailed(String),
    SessionUnavailable,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::StepFailed(message) => write!(f, "step failed: {}", message),
            SkipReason::SessionUnavailable => f.write_str("session-unavailable"),
        }
    }
}

/// Page state captured once a workflow has run.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSnapshot {
    pub html: String,
}

impl PageSnapshot {
    pub fn new(html: impl Into<String>) -> Self {
        PageSnapshot { html: html.into() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub site: SiteId,
    pub steps: Vec<StepOutcome>,
    pub page: Option<PageSnapshot>,
    /// Set when the session became unusable before the page could be captured.
    pub session_lost: bool,
}

impl ExecutionOutcome {
    pub fn skipped(&self) -> usize {
        self.steps.iter().filter(|s| !s.is_applied()).count()
    }
}
