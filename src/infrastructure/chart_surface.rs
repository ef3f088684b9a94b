// Chart surface - in-process chart renderer whose live instances can be inspected
use crate::application::render_dispatcher::{ChartHandle, ChartRenderer};
use crate::domain::view::{ChartConfig, ChartKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChart {
    pub instance: u64,
    pub widget_id: String,
    pub kind: ChartKind,
    pub points: usize,
    pub created_at: DateTime<Utc>,
}

type Registry = Arc<Mutex<BTreeMap<u64, LiveChart>>>;

#[derive(Debug, Default)]
pub struct ChartSurface {
    next_instance: AtomicU64,
    live: Registry,
}

struct SurfaceHandle {
    instance: u64,
    live: Registry,
}

impl ChartSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_charts(&self) -> Vec<LiveChart> {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

impl ChartRenderer for ChartSurface {
    fn create(&self, widget_id: &str, config: &ChartConfig) -> Box<dyn ChartHandle> {
        let instance = self.next_instance.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!("Creating {:?} chart #{} for {}", config.kind, instance, widget_id);

        self.live.lock().unwrap_or_else(PoisonError::into_inner).insert(
            instance,
            LiveChart {
                instance,
                widget_id: widget_id.to_string(),
                kind: config.kind,
                points: config.data.values.len(),
                created_at: Utc::now(),
            },
        );

        Box::new(SurfaceHandle {
            instance,
            live: self.live.clone(),
        })
    }
}

impl ChartHandle for SurfaceHandle {
    fn destroy(&mut self) {
        let removed = self
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.instance);
        if removed.is_none() {
            tracing::warn!("Chart #{} destroyed twice", self.instance);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::render_shape::ChartPoint;
    use crate::domain::view::chart_config;
    use crate::domain::widget::WidgetType;

    fn config() -> ChartConfig {
        let points = vec![ChartPoint {
            name: "A".into(),
            value: 13.0,
            color: "#4e79a7".into(),
        }];
        chart_config(WidgetType::Donut, &points)
    }

    #[test]
    fn test_destroy_removes_live_instance() {
        let surface = ChartSurface::new();
        let mut first = surface.create("widget-1", &config());
        let _second = surface.create("widget-2", &config());

        let live = surface.live_charts();
        assert_eq!(live.len(), 2);
        assert_eq!(live[0].kind, ChartKind::Doughnut);
        assert_eq!(live[0].points, 1);

        first.destroy();
        let live = surface.live_charts();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].widget_id, "widget-2");
    }
}
