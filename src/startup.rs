use std::{net::TcpListener, sync::Arc};

use actix_files::Files;
use actix_web::{dev::Server, middleware::Logger, web, App, HttpServer};

use crate::{
    domain::site::SiteRegistry,
    routes::{default_route, query_route, workflow_route},
    services::{HtmlReport, QueryRunner},
};

pub fn run(
    listener: TcpListener,
    runner: QueryRunner,
    registry: Arc<SiteRegistry>,
    report: HtmlReport,
) -> Result<Server, std::io::Error> {
    let reports_dir = report.dir().to_path_buf();
    std::fs::create_dir_all(&reports_dir)?;

    let runner = web::Data::new(runner);
    let registry = web::Data::new(registry);
    let report = web::Data::new(report);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .service(Files::new("/reports", reports_dir.clone()).prefer_utf8(true))
            .service(default_route::default)
            .service(query_route::query)
            .service(query_route::report)
            .service(workflow_route::preview_workflow)
            .app_data(runner.clone())
            .app_data(registry.clone())
            .app_data(report.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
