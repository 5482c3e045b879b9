// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod file_sink;
pub mod grafana_client;
pub mod grafana_model;
pub mod prometheus_client;
