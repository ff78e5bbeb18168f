use std::sync::Arc;

use actix_web::{post, web, HttpResponse};
use serde::Serialize;

use crate::{
    domain::{intent::IntentRequest, site::SiteRegistry, workflow::Workflow},
    services::{MemorySink, PipelineEvent, WorkflowGenerator},
};

#[derive(Serialize)]
struct WorkflowPreview {
    workflows: Vec<Workflow>,
    warnings: Vec<String>,
}

/// Shows the commands an intent would run, without opening a browser.
#[post("/workflow")]
async fn preview_workflow(
    registry: web::Data<Arc<SiteRegistry>>,
    body: web::Json<IntentRequest>,
) -> HttpResponse {
    let intent = match body.into_inner().into_intent(&registry) {
        Ok(intent) => intent,
        Err(e) => return HttpResponse::BadRequest().body(e.to_string()),
    };

    let sink = Arc::new(MemorySink::default());
    let generator = WorkflowGenerator::new(registry.get_ref().clone(), sink.clone());
    let workflows = match generator.plan(&intent) {
        Ok(workflows) => workflows,
        Err(e) => return HttpResponse::UnprocessableEntity().body(e.to_string()),
    };

    let warnings = sink
        .events()
        .into_iter()
        .filter_map(|event| match event {
            PipelineEvent::SiteDropped { site } => Some(format!("{}: unsupported site", site)),
            PipelineEvent::GenerationWarning { site, message } => {
                Some(format!("{}: {}", site, message))
            }
            _ => None,
        })
        .collect();

    HttpResponse::Ok().json(WorkflowPreview {
        workflows,
        warnings,
    })
}
