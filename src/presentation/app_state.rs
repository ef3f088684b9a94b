// Application state for HTTP handlers
use crate::application::builder_session::BuilderHandle;
use crate::infrastructure::chart_surface::ChartSurface;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub builder: BuilderHandle,
    pub charts: Arc<ChartSurface>,
}
