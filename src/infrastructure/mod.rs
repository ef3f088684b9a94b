// Infrastructure layer - External dependencies and adapters
pub mod chart_surface;
pub mod config;
pub mod http_backend;
pub mod http_response;
pub mod local_store;
