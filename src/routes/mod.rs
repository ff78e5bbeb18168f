pub mod default_route;
pub mod query_route;
pub mod workflow_route;
