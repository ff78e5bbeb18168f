use actix_web::{get, http::header, web, HttpResponse};
use serde::Deserialize;

use crate::services::{
    HtmlReport, IntentParseError, QueryError, QueryRunner, ReportRenderer,
};

#[derive(Deserialize)]
struct QueryParams {
    q: String,
}

#[get("/query")]
async fn query(runner: web::Data<QueryRunner>, params: web::Query<QueryParams>) -> HttpResponse {
    match runner.run_query(&params.q).await {
        Ok(result) => {
            if result.all_failed() {
                log::warn!("Every site failed for query {:?}", params.q);
            }
            HttpResponse::Ok().json(result)
        }
        Err(e) => error_response(e),
    }
}

/// Runs the query, saves the HTML report and redirects to it.
#[get("/report")]
async fn report(
    runner: web::Data<QueryRunner>,
    renderer: web::Data<HtmlReport>,
    params: web::Query<QueryParams>,
) -> HttpResponse {
    let result = match runner.run_query(&params.q).await {
        Ok(result) => result,
        Err(e) => return error_response(e),
    };

    match renderer.render(&result) {
        Ok(_) => HttpResponse::SeeOther()
            .insert_header((
                header::LOCATION,
                format!("/reports/{}", HtmlReport::file_name(&result)),
            ))
            .finish(),
        Err(e) => {
            log::error!("Failed to save report for run {}: {}", result.run_id, e);
            HttpResponse::InternalServerError().body(e.to_string())
        }
    }
}

fn error_response(e: QueryError) -> HttpResponse {
    log::error!("Query failed: {}", e);
    match e {
        QueryError::NoParser => HttpResponse::ServiceUnavailable().body(e.to_string()),
        QueryError::Parse(IntentParseError::Provider(_)) => {
            HttpResponse::BadGateway().body(e.to_string())
        }
        QueryError::Parse(_) | QueryError::Generate(_) => {
            HttpResponse::UnprocessableEntity().body(e.to_string())
        }
    }
}
