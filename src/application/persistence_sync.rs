// Persistence sync - remote backend first, local fallback store always
use crate::application::dashboard_repository::{
    DashboardRepository, RepositoryError, WidgetForm, WidgetSaveResponse,
};
use crate::application::local_store::{LocalStore, StoreError};
use crate::domain::dashboard::Dashboard;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;

/// Key under which the full dashboard list is cached locally
pub const LOCAL_DASHBOARDS_KEY: &str = "dashboard-builder.dashboards";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Remote(#[from] RepositoryError),
    #[error(transparent)]
    Local(#[from] StoreError),
}

/// Result of creating a dashboard; `remote_error` is set when only a local copy exists
#[derive(Debug)]
pub struct Created {
    pub dashboard: Dashboard,
    pub remote_error: Option<RepositoryError>,
}

#[derive(Clone)]
pub struct PersistenceSync {
    repository: Arc<dyn DashboardRepository>,
    store: Arc<dyn LocalStore>,
}

impl PersistenceSync {
    pub fn new(repository: Arc<dyn DashboardRepository>, store: Arc<dyn LocalStore>) -> Self {
        Self { repository, store }
    }

    /// Pushes to the backend, then upserts the local copy whatever the remote outcome.
    /// An error means the save degraded; the local write has still been attempted.
    pub async fn save(&self, dashboard: &Dashboard) -> Result<(), PersistenceError> {
        let remote = self.repository.update_dashboard(dashboard).await;
        if let Err(e) = &remote {
            tracing::warn!("Remote save of dashboard {} failed: {}", dashboard.id, e);
        }

        let mut local = self.read_local();
        match local.iter_mut().find(|d| d.id == dashboard.id) {
            Some(existing) => *existing = dashboard.clone(),
            None => local.insert(0, dashboard.clone()),
        }
        self.write_local(&local)?;

        remote.map_err(PersistenceError::from)
    }

    /// Remote first; falls back to the local copy when the backend fails or lacks the id
    pub async fn load(&self, id: &str) -> Option<Dashboard> {
        let remote = match self.repository.get_dashboard(id).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Remote load of dashboard {} failed, using local copy: {}", id, e);
                None
            }
        };

        let mut dashboard = remote.or_else(|| self.read_local().into_iter().find(|d| d.id == id))?;
        dashboard.normalize();
        Some(dashboard)
    }

    /// The backend is authoritative when reachable and replaces the local list
    pub async fn list(&self) -> Vec<Dashboard> {
        match self.repository.list_dashboards().await {
            Ok(dashboards) => {
                if let Err(e) = self.write_local(&dashboards) {
                    tracing::warn!("Failed to refresh local dashboard cache: {}", e);
                }
                dashboards
            }
            Err(e) => {
                tracing::warn!("Remote dashboard listing failed, using local copy: {}", e);
                self.read_local()
            }
        }
    }

    /// Local removal happens even when the remote delete fails
    pub async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        let remote = self.repository.delete_dashboard(id).await;
        if let Err(e) = &remote {
            tracing::warn!("Remote delete of dashboard {} failed: {}", id, e);
        }

        let mut local = self.read_local();
        let before = local.len();
        local.retain(|d| d.id != id);
        if local.is_empty() {
            self.store.remove(LOCAL_DASHBOARDS_KEY)?;
        } else if local.len() != before {
            self.write_local(&local)?;
        }

        remote.map_err(PersistenceError::from)
    }

    /// Trims `name` and checks it against every other dashboard, case-insensitively.
    /// `renaming` is the id of the dashboard taking the name, if it already exists.
    pub async fn validate_name(&self, name: &str, renaming: Option<&str>) -> Result<String, PersistenceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PersistenceError::Validation("Dashboard name is required".into()));
        }
        let existing = self.list().await;
        let taken = existing
            .iter()
            .filter(|d| Some(d.id.as_str()) != renaming)
            .any(|d| d.name.trim().eq_ignore_ascii_case(name));
        if taken {
            return Err(PersistenceError::Validation(format!(
                "A dashboard named '{}' already exists",
                name
            )));
        }
        Ok(name.to_string())
    }

    pub async fn create(&self, name: &str, description: &str) -> Result<Created, PersistenceError> {
        let name = self.validate_name(name, None).await?;
        let name = name.as_str();

        let (mut dashboard, remote_error) =
            match self.repository.create_dashboard(name, description.trim()).await {
                Ok(dashboard) => (dashboard, None),
                Err(e) => {
                    tracing::warn!("Remote create of dashboard '{}' failed, keeping it locally: {}", name, e);
                    let id = format!("local-{}", Utc::now().timestamp_millis());
                    (Dashboard::new(id, name.to_string(), description.trim().to_string()), Some(e))
                }
            };
        dashboard.normalize();

        let mut local = self.read_local();
        local.retain(|d| d.id != dashboard.id);
        local.insert(0, dashboard.clone());
        self.write_local(&local)?;

        Ok(Created {
            dashboard,
            remote_error,
        })
    }

    pub async fn save_widget(&self, form: &WidgetForm) -> Result<WidgetSaveResponse, RepositoryError> {
        self.repository.save_widget(form).await
    }

    fn read_local(&self) -> Vec<Dashboard> {
        let value = match self.store.get(LOCAL_DASHBOARDS_KEY) {
            Ok(Some(value)) => value,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!("Local dashboard cache unreadable: {}", e);
                return Vec::new();
            }
        };

        serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::warn!("Local dashboard cache malformed, ignoring it: {}", e);
            Vec::new()
        })
    }

    fn write_local(&self, dashboards: &[Dashboard]) -> Result<(), StoreError> {
        let value = serde_json::to_value(dashboards)?;
        self.store.set(LOCAL_DASHBOARDS_KEY, value)
    }
}
