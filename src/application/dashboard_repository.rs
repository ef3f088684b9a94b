// Repository traits for the dashboard backend and the stored-query directory
use crate::domain::dashboard::Dashboard;
use crate::domain::render_shape::Row;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    #[error("backend unreachable: {0}")]
    Unreachable(String),
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode backend response: {0}")]
    Decode(String),
}

/// A named query the backend can execute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StoredQuery {
    pub title: String,
    #[serde(default)]
    pub query_text: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Widget editor contents submitted to the backend
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetForm {
    pub title: String,
    pub source: Option<String>,
    pub refresh_interval_ms: u64,
    pub font_size: Option<u32>,
    pub text_content: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WidgetSaveResponse {
    pub message: String,
    /// Result set already executed for the bound source, if the backend ran it
    pub saved_query: Option<Vec<Row>>,
}

#[async_trait]
pub trait DashboardRepository: Send + Sync {
    async fn list_dashboards(&self) -> Result<Vec<Dashboard>, RepositoryError>;

    /// `Ok(None)` when the backend has no dashboard with this id
    async fn get_dashboard(&self, id: &str) -> Result<Option<Dashboard>, RepositoryError>;

    async fn create_dashboard(
        &self,
        name: &str,
        description: &str,
    ) -> Result<Dashboard, RepositoryError>;

    async fn update_dashboard(&self, dashboard: &Dashboard) -> Result<(), RepositoryError>;

    async fn delete_dashboard(&self, id: &str) -> Result<(), RepositoryError>;

    async fn save_widget(&self, form: &WidgetForm) -> Result<WidgetSaveResponse, RepositoryError>;
}

#[async_trait]
pub trait QueryDirectory: Send + Sync {
    /// Queries offered in the widget editor's source picker
    async fn list_queries(&self) -> Result<Vec<StoredQuery>, RepositoryError>;

    /// Executes the stored query titled `title` and returns its rows
    async fn run_query(&self, title: &str) -> Result<Vec<Row>, RepositoryError>;
}
