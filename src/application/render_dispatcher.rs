// Render dispatcher - coalesces render requests and keeps one live chart per widget
use crate::application::notifier::Notification;
use crate::domain::dashboard::Dashboard;
use crate::domain::interaction::InteractionState;
use crate::domain::view::{self, ChartConfig, EditorView, WidgetBody, WidgetView};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Charting collaborator: draws a chart from a declarative config
pub trait ChartRenderer: Send + Sync {
    fn create(&self, widget_id: &str, config: &ChartConfig) -> Box<dyn ChartHandle>;
}

pub trait ChartHandle: Send {
    fn destroy(&mut self);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub is_published: bool,
    pub auto_refresh: bool,
    #[serde(rename = "refreshInterval")]
    pub refresh_interval_seconds: u32,
    pub last_modified: DateTime<Utc>,
}

/// Everything the output surface needs to draw the canvas
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasView {
    pub revision: u64,
    pub dashboard: Option<DashboardSummary>,
    pub empty: bool,
    pub widgets: Vec<WidgetView>,
    pub editor: Option<EditorView>,
    pub interaction: &'static str,
    pub notifications: Vec<Notification>,
}

impl CanvasView {
    pub fn blank() -> Self {
        Self {
            revision: 0,
            dashboard: None,
            empty: true,
            widgets: Vec::new(),
            editor: None,
            interaction: "idle",
            notifications: Vec::new(),
        }
    }
}

struct LiveChart {
    config: ChartConfig,
    handle: Box<dyn ChartHandle>,
}

pub struct RenderDispatcher {
    charts: Arc<dyn ChartRenderer>,
    live: HashMap<String, LiveChart>,
    relayout: HashSet<String>,
    dirty: bool,
    revision: u64,
}

impl RenderDispatcher {
    pub fn new(charts: Arc<dyn ChartRenderer>) -> Self {
        Self {
            charts,
            live: HashMap::new(),
            relayout: HashSet::new(),
            dirty: true,
            revision: 0,
        }
    }

    /// Marks the canvas for the next flush; repeated requests collapse into one render
    pub fn request_render(&mut self) {
        self.dirty = true;
    }

    #[cfg(test)]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Rebuilds the widget's chart on the next flush even if its config is unchanged
    pub fn relayout_chart(&mut self, widget_id: &str) {
        if self.live.contains_key(widget_id) {
            self.relayout.insert(widget_id.to_string());
            self.dirty = true;
        }
    }

    pub fn live_charts(&self) -> usize {
        self.live.len()
    }

    /// Produces one view of the latest state, or `None` when nothing changed since the last flush
    pub fn flush(
        &mut self,
        dashboard: Option<&Dashboard>,
        interaction: &InteractionState,
        notifications: Vec<Notification>,
    ) -> Option<CanvasView> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        self.revision += 1;

        let widgets: Vec<WidgetView> = dashboard
            .map(|d| d.widgets.iter().map(view::describe_widget).collect())
            .unwrap_or_default();
        self.sync_charts(&widgets);

        let view = CanvasView {
            revision: self.revision,
            dashboard: dashboard.map(|d| DashboardSummary {
                id: d.id.clone(),
                name: d.name.clone(),
                description: d.description.clone(),
                is_published: d.is_published,
                auto_refresh: d.auto_refresh,
                refresh_interval_seconds: d.refresh_interval_seconds,
                last_modified: d.last_modified,
            }),
            empty: dashboard.map_or(true, Dashboard::is_empty),
            editor: dashboard.and_then(|d| d.selected()).map(view::editor_for),
            widgets,
            interaction: interaction.label(),
            notifications,
        };
        Some(view)
    }

    /// Destroys every live chart, e.g. when the dashboard closes
    pub fn clear(&mut self) {
        for (widget_id, mut chart) in self.live.drain() {
            tracing::debug!("Destroying chart for {}", widget_id);
            chart.handle.destroy();
        }
        self.relayout.clear();
        self.dirty = true;
    }

    fn sync_charts(&mut self, widgets: &[WidgetView]) {
        let mut wanted: HashMap<&str, &ChartConfig> = HashMap::new();
        for widget in widgets {
            if let WidgetBody::Chart(config) = &widget.body {
                wanted.insert(widget.id.as_str(), config);
            }
        }

        let stale: Vec<String> = self
            .live
            .iter()
            .filter(|(id, live)| {
                self.relayout.contains(*id)
                    || wanted.get(id.as_str()).is_none_or(|config| **config != live.config)
            })
            .map(|(id, _)| id.clone())
            .collect();

        // old instance goes before its replacement is built
        for id in stale {
            if let Some(mut chart) = self.live.remove(&id) {
                chart.handle.destroy();
            }
        }
        self.relayout.clear();

        for (widget_id, config) in wanted {
            if !self.live.contains_key(widget_id) {
                let handle = self.charts.create(widget_id, config);
                self.live.insert(
                    widget_id.to_string(),
                    LiveChart {
                        config: config.clone(),
                        handle,
                    },
                );
            }
        }
    }
}

impl Drop for RenderDispatcher {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{rows, RecordingCharts};
    use crate::domain::render_shape::{chart_points, WidgetData};
    use crate::domain::widget::WidgetType;
    use serde_json::json;

    fn setup() -> (RenderDispatcher, Arc<RecordingCharts>, Dashboard) {
        let charts = Arc::new(RecordingCharts::default());
        let dispatcher = RenderDispatcher::new(charts.clone());
        let dashboard = Dashboard::new("d1".into(), "Sales".into(), String::new());
        (dispatcher, charts, dashboard)
    }

    fn chart_data(value: i64) -> WidgetData {
        WidgetData::Chart(chart_points(&rows(json!([{"name": "A", "value": value}]))))
    }

    #[test]
    fn test_many_requests_one_render() {
        let (mut dispatcher, _charts, mut dashboard) = setup();
        let idle = InteractionState::Idle;

        assert!(dispatcher.flush(Some(&dashboard), &idle, Vec::new()).is_some());
        for _ in 0..5 {
            dashboard.create_widget(WidgetType::Table);
            dispatcher.request_render();
        }
        let view = dispatcher.flush(Some(&dashboard), &idle, Vec::new()).unwrap();
        assert_eq!(view.revision, 2);
        assert_eq!(view.widgets.len(), 5);
        assert!(dispatcher.flush(Some(&dashboard), &idle, Vec::new()).is_none());
    }

    #[test]
    fn test_chart_replaced_only_after_destroy() {
        let (mut dispatcher, charts, mut dashboard) = setup();
        let idle = InteractionState::Idle;
        let id = dashboard.create_widget(WidgetType::Bar).id.clone();

        dashboard.apply_widget_data(&id, chart_data(1));
        dispatcher.flush(Some(&dashboard), &idle, Vec::new());
        dispatcher.request_render();
        dispatcher.flush(Some(&dashboard), &idle, Vec::new());
        assert_eq!(charts.entries(), vec!["create widget-1"]);

        dashboard.apply_widget_data(&id, chart_data(2));
        dispatcher.request_render();
        dispatcher.flush(Some(&dashboard), &idle, Vec::new());
        assert_eq!(
            charts.entries(),
            vec!["create widget-1", "destroy widget-1", "create widget-1"]
        );
        assert_eq!(dispatcher.live_charts(), 1);
    }

    #[test]
    fn test_relayout_rebuilds_chart() {
        let (mut dispatcher, charts, mut dashboard) = setup();
        let idle = InteractionState::Idle;
        let id = dashboard.create_widget(WidgetType::Line).id.clone();
        dashboard.apply_widget_data(&id, chart_data(1));
        dispatcher.flush(Some(&dashboard), &idle, Vec::new());

        dispatcher.relayout_chart(&id);
        assert!(dispatcher.is_dirty());
        dispatcher.flush(Some(&dashboard), &idle, Vec::new());
        assert_eq!(charts.entries().len(), 3);
        assert_eq!(charts.live(), 1);
    }

    #[test]
    fn test_charts_destroyed_when_not_shown() {
        let (mut dispatcher, charts, mut dashboard) = setup();
        let idle = InteractionState::Idle;
        let a = dashboard.create_widget(WidgetType::Pie).id.clone();
        let b = dashboard.create_widget(WidgetType::Donut).id.clone();
        dashboard.apply_widget_data(&a, chart_data(1));
        dashboard.apply_widget_data(&b, chart_data(1));
        dispatcher.flush(Some(&dashboard), &idle, Vec::new());
        assert_eq!(charts.live(), 2);

        dashboard.toggle_minimize(&a);
        dashboard.delete_widget(&b);
        dispatcher.request_render();
        dispatcher.flush(Some(&dashboard), &idle, Vec::new());
        assert_eq!(charts.live(), 0);

        dashboard.toggle_minimize(&a);
        dispatcher.request_render();
        dispatcher.flush(Some(&dashboard), &idle, Vec::new());
        assert_eq!(charts.live(), 1);

        dispatcher.clear();
        assert_eq!(charts.live(), 0);
    }

    #[test]
    fn test_view_carries_editor_and_empty_state() {
        let (mut dispatcher, _charts, mut dashboard) = setup();
        let idle = InteractionState::Idle;

        let view = dispatcher.flush(Some(&dashboard), &idle, Vec::new()).unwrap();
        assert!(view.empty);
        assert!(view.editor.is_none());

        let id = dashboard.create_widget(WidgetType::Table).id.clone();
        dashboard.select_widget(&id);
        dispatcher.request_render();
        let view = dispatcher.flush(Some(&dashboard), &idle, Vec::new()).unwrap();
        assert!(!view.empty);
        assert_eq!(view.editor.map(|e| e.widget_id), Some(id));
    }
}
