// Presentation layer - HTTP API over the builder session
pub mod app_state;
pub mod handlers;
