// Application layer - Rendering pipeline and the ports it depends on
pub mod artifact_sink;
pub mod dashboard_repository;
pub mod data_fetcher;
pub mod error;
pub mod orchestrator;
pub mod panel_renderer;
pub mod query_builder;
pub mod render_result;
pub mod telemetry_repository;
pub mod variable_resolver;
