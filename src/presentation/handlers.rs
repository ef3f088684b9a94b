// HTTP request handlers
use crate::application::builder_session::BuilderError;
use crate::application::dashboard_repository::StoredQuery;
use crate::application::render_dispatcher::CanvasView;
use crate::domain::dashboard::{Dashboard, DashboardSettings, WidgetConfig};
use crate::domain::interaction::PointerEvent;
use crate::domain::widget::WidgetType;
use crate::infrastructure::chart_surface::LiveChart;
use crate::infrastructure::http_response::ApiResult;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct NewDashboardRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize)]
pub struct AddWidgetRequest {
    #[serde(rename = "type")]
    pub widget_type: WidgetType,
}

#[derive(Serialize)]
pub struct WidgetCreated {
    pub id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRequest {
    pub content: String,
    #[serde(default)]
    pub font_size: Option<u32>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetAction {
    Select,
    Minimize,
    Expand,
    Retry,
}

fn canvas(state: &AppState) -> Json<CanvasView> {
    Json(state.builder.canvas().as_ref().clone())
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn list_dashboards(State(state): State<Arc<AppState>>) -> Json<Vec<Dashboard>> {
    Json(state.builder.list_dashboards().await)
}

pub async fn create_dashboard(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewDashboardRequest>,
) -> ApiResult<(StatusCode, Json<Dashboard>)> {
    let dashboard = state
        .builder
        .create_dashboard(&request.name, &request.description)
        .await?;
    Ok((StatusCode::CREATED, Json(dashboard)))
}

pub async fn open_dashboard(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<CanvasView>> {
    state.builder.open_dashboard(&id).await?;
    Ok(canvas(&state))
}

pub async fn delete_dashboard(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<StatusCode> {
    state.builder.delete_dashboard(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Stored queries offered as widget data sources
pub async fn list_queries(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<StoredQuery>>> {
    Ok(Json(state.builder.list_queries().await?))
}

pub async fn get_canvas(State(state): State<Arc<AppState>>) -> Json<CanvasView> {
    canvas(&state)
}

/// Closes the open dashboard, saving any pending edits first
pub async fn close_canvas(State(state): State<Arc<AppState>>) -> ApiResult<Json<CanvasView>> {
    state.builder.close_dashboard().await?;
    Ok(canvas(&state))
}

/// The open dashboard's full model, as it will be saved
pub async fn get_open_dashboard(State(state): State<Arc<AppState>>) -> ApiResult<Json<Dashboard>> {
    let dashboard = state
        .builder
        .snapshot()
        .await?
        .ok_or(BuilderError::NoDashboard)?;
    Ok(Json(dashboard))
}

/// Pushes the canvas once on connect and again after every flush
pub async fn canvas_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.builder.subscribe();

    let stream = async_stream::stream! {
        loop {
            let view = rx.borrow_and_update().clone();
            match Event::default().event("canvas").json_data(view.as_ref()) {
                Ok(event) => yield Ok::<_, Infallible>(event),
                Err(e) => tracing::warn!("Failed to encode canvas event: {}", e),
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub async fn add_widget(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddWidgetRequest>,
) -> ApiResult<(StatusCode, Json<WidgetCreated>)> {
    let id = state.builder.add_widget(request.widget_type).await?;
    Ok((StatusCode::CREATED, Json(WidgetCreated { id })))
}

pub async fn delete_widget(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<CanvasView>> {
    state.builder.delete_widget(&id).await?;
    Ok(canvas(&state))
}

pub async fn widget_action(
    Path((id, action)): Path<(String, WidgetAction)>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<CanvasView>> {
    match action {
        WidgetAction::Select => state.builder.select_widget(&id).await?,
        WidgetAction::Minimize => state.builder.toggle_minimize(&id).await?,
        WidgetAction::Expand => state.builder.toggle_expand(&id).await?,
        WidgetAction::Retry => state.builder.retry(&id).await?,
    }
    Ok(canvas(&state))
}

pub async fn configure_widget(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(config): Json<WidgetConfig>,
) -> ApiResult<Json<CanvasView>> {
    state.builder.configure_widget(&id, config).await?;
    Ok(canvas(&state))
}

pub async fn set_text(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<TextRequest>,
) -> ApiResult<Json<CanvasView>> {
    state
        .builder
        .set_text(&id, request.content, request.font_size)
        .await?;
    Ok(canvas(&state))
}

pub async fn pointer(
    State(state): State<Arc<AppState>>,
    Json(event): Json<PointerEvent>,
) -> ApiResult<Json<CanvasView>> {
    state.builder.pointer(event).await?;
    Ok(canvas(&state))
}

pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(settings): Json<DashboardSettings>,
) -> ApiResult<Json<CanvasView>> {
    state.builder.update_settings(settings).await?;
    Ok(canvas(&state))
}

pub async fn live_charts(State(state): State<Arc<AppState>>) -> Json<Vec<LiveChart>> {
    Json(state.charts.live_charts())
}
