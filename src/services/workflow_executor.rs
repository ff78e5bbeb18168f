use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::{self, Instant};

use crate::domain::{
    command::Command,
    workflow::{ExecutionOutcome, PageSnapshot, SkipReason, StepOutcome, Workflow},
};

use super::{
    browser_session::{BrowserSession, SessionError},
    events::{EventSink, PipelineEvent},
};

#[derive(Debug, Clone, Copy)]
pub struct ExecutorSettings {
    /// Upper bound for any single session call.
    pub step_timeout: Duration,
    /// `wait` commands longer than this are shortened to it.
    pub max_wait: Duration,
    /// How long to wait for the results container before capturing the page.
    pub results_wait: Duration,
    pub poll_interval: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        ExecutorSettings {
            step_timeout: Duration::from_secs(30),
            max_wait: Duration::from_secs(30),
            results_wait: Duration::from_secs(10),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Runs a workflow's commands one after the other on a single session.
pub struct WorkflowExecutor {
    settings: ExecutorSettings,
    sink: Arc<dyn EventSink>,
}

impl WorkflowExecutor {
    pub fn new(settings: ExecutorSettings, sink: Arc<dyn EventSink>) -> Self {
        WorkflowExecutor { settings, sink }
    }

    pub async fn execute(
        &self,
        workflow: &Workflow,
        session: &mut dyn BrowserSession,
    ) -> ExecutionOutcome {
        let site = workflow.site().clone();
        let mut steps = Vec::with_capacity(workflow.len());
        let mut session_lost = false;

        for (index, command) in workflow.commands().iter().enumerate() {
            let outcome = match session_lost {
                true => StepOutcome::Skipped {
                    reason: SkipReason::SessionUnavailable,
                },
                false => match self.apply(command, session).await {
                    Ok(()) => StepOutcome::Applied,
                    Err(SessionError::Step(message)) => StepOutcome::Skipped {
                        reason: SkipReason::StepFailed(message),
                    },
                    Err(SessionError::Unavailable(_)) => {
                        session_lost = true;
                        StepOutcome::Skipped {
                            reason: SkipReason::SessionUnavailable,
                        }
                    }
                },
            };

            match &outcome {
                StepOutcome::Applied => self.sink.emit(PipelineEvent::StepApplied {
                    site: site.clone(),
                    index,
                    kind: command.kind(),
                }),
                StepOutcome::Skipped { reason } => self.sink.emit(PipelineEvent::StepSkipped {
                    site: site.clone(),
                    index,
                    kind: command.kind(),
                    reason: reason.clone(),
                }),
            }
            steps.push(outcome);
        }

        let mut page = None;
        if !session_lost {
            match self.capture(workflow, session).await {
                Ok(snapshot) => page = Some(snapshot),
                Err(SessionError::Unavailable(_)) => session_lost = true,
                Err(SessionError::Step(message)) => {
                    self.sink.emit(PipelineEvent::PageCaptureFailed {
                        site: site.clone(),
                        message,
                    })
                }
            }
        }

        ExecutionOutcome {
            site,
            steps,
            page,
            session_lost,
        }
    }

    async fn apply(
        &self,
        command: &Command,
        session: &mut dyn BrowserSession,
    ) -> Result<(), SessionError> {
        let limit = self.settings.step_timeout;
        match command {
            Command::Navigate { url } => {
                bounded(limit, "navigate", session.navigate(url.as_str())).await
            }
            Command::Scroll { pixels } => {
                bounded(limit, "scroll", session.scroll_by(*pixels)).await
            }
            Command::Wait { duration } => {
                let duration = (*duration).min(self.settings.max_wait);
                bounded(limit + duration, "wait", session.wait(duration)).await
            }
            Command::Type { selector, text } => {
                bounded(limit, "type", session.type_into(selector, text)).await
            }
            Command::PressKey { key } => {
                bounded(limit, "press_key", session.press_key(key)).await
            }
        }
    }

    async fn capture(
        &self,
        workflow: &Workflow,
        session: &mut dyn BrowserSession,
    ) -> Result<PageSnapshot, SessionError> {
        let limit = self.settings.step_timeout;
        match bounded(limit, "dialog check", session.accept_dialog()).await {
            Ok(true) => log::info!("Accepted a page dialog on {}", workflow.site()),
            Ok(false) => {}
            Err(e) if e.is_unavailable() => return Err(e),
            Err(e) => log::debug!("Dialog check failed on {}: {}", workflow.site(), e),
        }
        if let Some(selector) = workflow.ready_selector() {
            self.wait_for_results(selector, session).await?;
        }
        bounded(limit, "page capture", session.page_snapshot()).await
    }

    /// Polls until `selector` matches something or `results_wait` runs out.
    /// Finding nothing is not an error: the page may simply have no results.
    async fn wait_for_results(
        &self,
        selector: &str,
        session: &mut dyn BrowserSession,
    ) -> Result<(), SessionError> {
        let deadline = Instant::now() + self.settings.results_wait;

        loop {
            let found = bounded(
                self.settings.step_timeout,
                "query",
                session.query_all(selector),
            )
            .await;
            match found {
                Ok(found) if found > 0 => return Ok(()),
                Ok(_) => {}
                Err(e) if e.is_unavailable() => return Err(e),
                Err(_) => return Ok(()),
            }
            if Instant::now() + self.settings.poll_interval > deadline {
                return Ok(());
            }
            time::sleep(self.settings.poll_interval).await;
        }
    }
}

async fn bounded<T>(
    limit: Duration,
    what: &str,
    call: impl Future<Output = Result<T, SessionError>>,
) -> Result<T, SessionError> {
    match time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(SessionError::Step(format!("{} timed out after {:?}", what, limit))),
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use tokio::time::Instant;

    use crate::{
        domain::{
            command::Command,
            site::SiteId,
            workflow::{SkipReason, StepOutcome, Workflow},
        },
        services::{
            browser_session::{
                testing::{Call, FakeSession, Script},
                SessionError,
            },
            events::{MemorySink, PipelineEvent},
        },
    };

    use super::{ExecutorSettings, WorkflowExecutor};

    fn executor() -> WorkflowExecutor {
        WorkflowExecutor::new(ExecutorSettings::default(), Arc::new(MemorySink::default()))
    }

    fn four_step_workflow() -> Workflow {
        Workflow::new(
            SiteId::new("flipkart"),
            vec![
                Command::navigate("https://www.flipkart.com/search?q=trimmer").unwrap(),
                Command::type_text("input[name='q']", "trimmer").unwrap(),
                Command::press_key("Enter").unwrap(),
                Command::scroll(2000).unwrap(),
            ],
        )
    }

    #[tokio::test(start_paused = true)]
    async fn failed_step_is_skipped_and_execution_continues() {
        let mut session = FakeSession::new(
            Script::with_html("<html></html>")
                .failing_at(1, SessionError::Step("no such element".to_string())),
        );

        let outcome = executor()
            .execute(&four_step_workflow(), &mut session)
            .await;

        assert_eq!(outcome.steps.len(), 4);
        assert_eq!(outcome.steps[0], StepOutcome::Applied);
        assert_eq!(
            outcome.steps[1],
            StepOutcome::Skipped {
                reason: SkipReason::StepFailed("no such element".to_string())
            }
        );
        assert_eq!(outcome.steps[2], StepOutcome::Applied);
        assert_eq!(outcome.steps[3], StepOutcome::Applied);
        assert_eq!(outcome.skipped(), 1);
        assert!(outcome.page.is_some());
        assert_eq!(
            session.calls(),
            vec![
                Call::Navigate("https://www.flipkart.com/search?q=trimmer".to_string()),
                Call::Press("Enter".to_string()),
                Call::Scroll(2000),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn lost_session_marks_remaining_steps_unavailable() {
        let mut session = FakeSession::new(
            Script::with_html("<html></html>")
                .failing_at(1, SessionError::Unavailable("chrome not reachable".to_string())),
        );

        let outcome = executor()
            .execute(&four_step_workflow(), &mut session)
            .await;

        let unavailable = StepOutcome::Skipped {
            reason: SkipReason::SessionUnavailable,
        };
        assert_eq!(
            outcome.steps,
            vec![
                StepOutcome::Applied,
                unavailable.clone(),
                unavailable.clone(),
                unavailable
            ]
        );
        assert!(outcome.session_lost);
        assert!(outcome.page.is_none());
        assert_eq!(session.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn long_waits_are_clamped() {
        let settings = ExecutorSettings {
            max_wait: Duration::from_secs(5),
            ..Default::default()
        };
        let executor = WorkflowExecutor::new(settings, Arc::new(MemorySink::default()));
        let workflow = Workflow::new(
            SiteId::new("amazon"),
            vec![Command::wait(600.0).unwrap()],
        );
        let mut session = FakeSession::new(Script::default());

        let outcome = executor.execute(&workflow, &mut session).await;

        assert_eq!(outcome.steps, vec![StepOutcome::Applied]);
        assert_eq!(session.calls(), vec![Call::Wait(Duration::from_secs(5))]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_calls_become_step_failures() {
        let settings = ExecutorSettings {
            step_timeout: Duration::from_secs(1),
            ..Default::default()
        };
        let executor = WorkflowExecutor::new(settings, Arc::new(MemorySink::default()));
        let mut session = FakeSession::new(Script {
            latency: Some(Duration::from_secs(5)),
            ..Default::default()
        });
        let workflow = Workflow::new(SiteId::new("amazon"), vec![Command::scroll(100).unwrap()]);

        let outcome = executor.execute(&workflow, &mut session).await;

        assert!(matches!(
            &outcome.steps[0],
            StepOutcome::Skipped {
                reason: SkipReason::StepFailed(message)
            } if message.contains("timed out")
        ));
        assert!(!outcome.session_lost);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_workflow_still_captures_page() {
        let sink = Arc::new(MemorySink::default());
        let executor = WorkflowExecutor::new(ExecutorSettings::default(), sink.clone());
        let mut session = FakeSession::new(Script::with_html("<p>hello</p>"));

        let outcome = executor
            .execute(&Workflow::empty(SiteId::new("ebay")), &mut session)
            .await;

        assert!(outcome.steps.is_empty());
        assert_eq!(outcome.page.unwrap().html, "<p>hello</p>");
        assert!(sink.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn every_step_is_reported_to_the_sink() {
        let sink = Arc::new(MemorySink::default());
        let executor = WorkflowExecutor::new(ExecutorSettings::default(), sink.clone());
        let mut session = FakeSession::new(
            Script::default().failing_at(2, SessionError::Step("key not sent".to_string())),
        );

        executor.execute(&four_step_workflow(), &mut session).await;

        let skipped: Vec<usize> = sink
            .events()
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::StepSkipped { index, .. } => Some(*index),
                _ => None,
            })
            .collect();
        assert_eq!(skipped, vec![2]);
        assert_eq!(sink.events().len(), 4);
    }

    fn results_workflow() -> Workflow {
        Workflow::new(
            SiteId::new("amazon"),
            vec![Command::navigate("https://www.amazon.in/s?k=trimmer").unwrap()],
        )
        .with_ready_selector("div.s-result-item")
    }

    const RESULTS_PAGE: &str = r#"<div class="s-result-item">Philips Trimmer</div>"#;

    #[tokio::test(start_paused = true)]
    async fn waits_for_results_before_capturing() {
        let mut session = FakeSession::new(Script {
            ready_after: 3,
            ..Script::with_html(RESULTS_PAGE)
        });
        let started = Instant::now();

        let outcome = executor().execute(&results_workflow(), &mut session).await;

        assert_eq!(session.queries(), 4);
        assert!(started.elapsed() >= Duration::from_millis(1500));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(outcome.page.unwrap().html, RESULTS_PAGE);
    }

    #[tokio::test(start_paused = true)]
    async fn captures_anyway_when_results_never_show() {
        let mut session = FakeSession::new(Script::with_html("<p>No results for trimmer</p>"));
        let started = Instant::now();

        let outcome = executor().execute(&results_workflow(), &mut session).await;

        assert!(started.elapsed() >= Duration::from_secs(9));
        assert!(started.elapsed() < Duration::from_secs(11));
        assert!(session.queries() > 1);
        assert!(outcome.page.is_some());
        assert!(!outcome.session_lost);
    }

    #[tokio::test(start_paused = true)]
    async fn session_dying_while_waiting_for_results_is_lost() {
        let mut session = FakeSession::new(Script {
            query_failure: Some(SessionError::Unavailable("tab crashed".to_string())),
            ..Script::with_html(RESULTS_PAGE)
        });

        let outcome = executor().execute(&results_workflow(), &mut session).await;

        assert_eq!(outcome.steps, vec![StepOutcome::Applied]);
        assert!(outcome.session_lost);
        assert!(outcome.page.is_none());
        assert_eq!(session.queries(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn open_dialog_is_accepted_before_capture() {
        let mut session = FakeSession::new(Script {
            dialog_open: true,
            ..Script::with_html(RESULTS_PAGE)
        });

        let outcome = executor().execute(&results_workflow(), &mut session).await;

        assert_eq!(session.dialogs_accepted(), 1);
        assert!(outcome.page.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_capture_leaves_no_page() {
        let sink = Arc::new(MemorySink::default());
        let executor = WorkflowExecutor::new(ExecutorSettings::default(), sink.clone());
        let mut session = FakeSession::new(Script {
            capture_failure: Some(SessionError::Step("page source unavailable".to_string())),
            ..Script::with_html(RESULTS_PAGE)
        });

        let outcome = executor.execute(&results_workflow(), &mut session).await;

        assert!(outcome.page.is_none());
        assert!(!outcome.session_lost);
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, PipelineEvent::PageCaptureFailed { .. })));
    }
}
