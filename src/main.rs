use std::{net::TcpListener, sync::Arc};

use env_logger::Env;
use pricehound::{
    configuration::get_configuration,
    services::{
        Extractor, HtmlReport, LlmIntentParser, LogSink, QueryRunner, WorkflowExecutor,
        WorkflowGenerator,
    },
    startup::run,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = get_configuration()?;
    let registry = Arc::new(configuration.registry());
    let sink = Arc::new(LogSink);

    let parser = LlmIntentParser::new(
        Arc::from(configuration.completion_provider()),
        registry.clone(),
        configuration.llm.parse_attempts,
    );
    let runner = QueryRunner::new(
        WorkflowGenerator::new(registry.clone(), sink.clone()),
        WorkflowExecutor::new(configuration.executor(), sink.clone()),
        Extractor::new(registry.clone()),
        Arc::new(configuration.session_provider()),
        sink,
        configuration.runner(),
    )
    .with_parser(Arc::new(parser));

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    log::info!(
        "Listening on {} with {} site(s) and the {:?} intent provider",
        address,
        registry.ids().count(),
        configuration.llm.provider
    );

    let report = HtmlReport::new(
        configuration.application.reports_dir.clone(),
        registry.clone(),
    );
    run(listener, runner, registry, report)?.await?;
    Ok(())
}
