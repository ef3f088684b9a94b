// In-memory collaborators for unit tests
use crate::application::dashboard_repository::{
    DashboardRepository, QueryDirectory, RepositoryError, StoredQuery, WidgetForm,
    WidgetSaveResponse,
};
use crate::application::render_dispatcher::{ChartHandle, ChartRenderer};
use crate::domain::dashboard::Dashboard;
use crate::domain::render_shape::Row;
use crate::domain::view::ChartConfig;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Scripted = (Duration, Result<Vec<Row>, String>);

#[derive(Default)]
pub struct FakeBackend {
    unreachable: AtomicBool,
    dashboards: Mutex<Vec<Dashboard>>,
    rows: Mutex<HashMap<String, Vec<Row>>>,
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<HashMap<String, usize>>,
    widget_forms: Mutex<Vec<WidgetForm>>,
    saved_query: Mutex<Option<Vec<Row>>>,
    update_delay: Mutex<Duration>,
}

pub fn rows(value: serde_json::Value) -> Vec<Row> {
    serde_json::from_value(value).expect("rows fixture")
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.unreachable.store(!reachable, Ordering::SeqCst);
    }

    pub fn dashboards(&self) -> Vec<Dashboard> {
        self.dashboards.lock().unwrap().clone()
    }

    pub fn set_rows(&self, title: &str, rows: Vec<Row>) {
        self.rows.lock().unwrap().insert(title.to_string(), rows);
    }

    /// Queues a one-off response for the next run of `title`
    pub fn script(&self, title: &str, delay: Duration, result: Result<Vec<Row>, String>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(title.to_string())
            .or_default()
            .push_back((delay, result));
    }

    pub fn query_calls(&self, title: &str) -> usize {
        self.calls.lock().unwrap().get(title).copied().unwrap_or(0)
    }

    pub fn widget_forms(&self) -> Vec<WidgetForm> {
        self.widget_forms.lock().unwrap().clone()
    }

    pub fn set_saved_query(&self, rows: Option<Vec<Row>>) {
        *self.saved_query.lock().unwrap() = rows;
    }

    /// Slows every `update_dashboard` down by `delay`
    pub fn set_update_delay(&self, delay: Duration) {
        *self.update_delay.lock().unwrap() = delay;
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(RepositoryError::Unreachable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DashboardRepository for FakeBackend {
    async fn list_dashboards(&self) -> Result<Vec<Dashboard>, RepositoryError> {
        self.check()?;
        Ok(self.dashboards())
    }

    async fn get_dashboard(&self, id: &str) -> Result<Option<Dashboard>, RepositoryError> {
        self.check()?;
        Ok(self.dashboards().into_iter().find(|d| d.id == id))
    }

    async fn create_dashboard(&self, name: &str, description: &str) -> Result<Dashboard, RepositoryError> {
        self.check()?;
        let mut dashboards = self.dashboards.lock().unwrap();
        let dashboard = Dashboard::new(
            format!("dash-{}", dashboards.len() + 1),
            name.to_string(),
            description.to_string(),
        );
        dashboards.push(dashboard.clone());
        Ok(dashboard)
    }

    async fn update_dashboard(&self, dashboard: &Dashboard) -> Result<(), RepositoryError> {
        let delay = *self.update_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        self.check()?;
        let mut dashboards = self.dashboards.lock().unwrap();
        match dashboards.iter_mut().find(|d| d.id == dashboard.id) {
            Some(existing) => *existing = dashboard.clone(),
            None => dashboards.push(dashboard.clone()),
        }
        Ok(())
    }

    async fn delete_dashboard(&self, id: &str) -> Result<(), RepositoryError> {
        self.check()?;
        self.dashboards.lock().unwrap().retain(|d| d.id != id);
        Ok(())
    }

    async fn save_widget(&self, form: &WidgetForm) -> Result<WidgetSaveResponse, RepositoryError> {
        self.check()?;
        self.widget_forms.lock().unwrap().push(form.clone());
        Ok(WidgetSaveResponse {
            message: "Widget saved".into(),
            saved_query: self.saved_query.lock().unwrap().clone(),
        })
    }
}

#[async_trait]
impl QueryDirectory for FakeBackend {
    async fn list_queries(&self) -> Result<Vec<StoredQuery>, RepositoryError> {
        self.check()?;
        let mut titles: Vec<String> = self.rows.lock().unwrap().keys().cloned().collect();
        titles.sort();
        Ok(titles
            .into_iter()
            .map(|title| StoredQuery {
                title,
                query_text: String::new(),
                description: None,
            })
            .collect())
    }

    async fn run_query(&self, title: &str) -> Result<Vec<Row>, RepositoryError> {
        *self.calls.lock().unwrap().entry(title.to_string()).or_default() += 1;
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(title)
            .and_then(|queue| queue.pop_front());

        if let Some((delay, result)) = scripted {
            tokio::time::sleep(delay).await;
            return result.map_err(RepositoryError::Unreachable);
        }

        self.check()?;
        Ok(self.rows.lock().unwrap().get(title).cloned().unwrap_or_default())
    }
}

/// Chart renderer that records every create and destroy call
#[derive(Default)]
pub struct RecordingCharts {
    pub log: Arc<Mutex<Vec<String>>>,
}

struct RecordedHandle {
    widget_id: String,
    log: Arc<Mutex<Vec<String>>>,
}

impl ChartHandle for RecordedHandle {
    fn destroy(&mut self) {
        self.log.lock().unwrap().push(format!("destroy {}", self.widget_id));
    }
}

impl ChartRenderer for RecordingCharts {
    fn create(&self, widget_id: &str, _config: &ChartConfig) -> Box<dyn ChartHandle> {
        self.log.lock().unwrap().push(format!("create {}", widget_id));
        Box::new(RecordedHandle {
            widget_id: widget_id.to_string(),
            log: self.log.clone(),
        })
    }
}

impl RecordingCharts {
    pub fn entries(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn live(&self) -> i64 {
        self.entries().iter().fold(0, |n, e| {
            if e.starts_with("create") {
                n + 1
            } else {
                n - 1
            }
        })
    }
}
