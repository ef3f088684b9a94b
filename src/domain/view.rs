// Declarative widget views - a pure mapping from widget state to what gets drawn
use super::render_shape::{ChartPoint, SingleValueData, TableData, WidgetData};
use super::widget::{DataState, ExpansionState, Widget, WidgetType, DEFAULT_FONT_SIZE};
use serde::Serialize;

pub const HEADER_HEIGHT: f64 = 40.0;
pub const EDITOR_GAP: f64 = 8.0;
pub const EXPANDED_WIDTH_SCALE: f64 = 1.5;
pub const EXPANDED_HEIGHT_SCALE: f64 = 1.3;
pub const DONUT_CUTOUT: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Frame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetView {
    pub id: String,
    #[serde(rename = "type")]
    pub widget_type: WidgetType,
    pub title: String,
    pub frame: Frame,
    pub selected: bool,
    pub expansion: ExpansionState,
    pub body: WidgetBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "render", rename_all = "kebab-case")]
pub enum WidgetBody {
    Loading,
    Error {
        message: String,
        retry: bool,
        #[serde(rename = "hasStaleData")]
        has_stale_data: bool,
    },
    NotConfigured,
    Collapsed,
    Text {
        content: String,
        #[serde(rename = "fontSize")]
        font_size: u32,
        editable: bool,
    },
    Table(TableData),
    SingleValue(SingleValueData),
    Chart(ChartConfig),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Doughnut,
}

/// Config handed to the charting collaborator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartConfig {
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub data: ChartDataSet,
    pub options: ChartOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartDataSet {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub colors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartOptions {
    pub responsive: bool,
    pub maintain_aspect_ratio: bool,
    pub show_axes: bool,
    pub show_legend: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cutout: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bar_percentage: Option<f64>,
}

impl ChartOptions {
    fn cartesian() -> Self {
        Self {
            responsive: true,
            maintain_aspect_ratio: false,
            show_axes: true,
            show_legend: false,
            cutout: None,
            bar_percentage: None,
        }
    }

    fn circular() -> Self {
        Self {
            responsive: true,
            maintain_aspect_ratio: false,
            show_axes: false,
            show_legend: true,
            cutout: None,
            bar_percentage: None,
        }
    }
}

/// Where the inline editor for the selected widget sits: directly below its frame
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorView {
    pub widget_id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
}

/// Rendered frame; expansion is visual only and never touches the stored size
pub fn frame_of(widget: &Widget) -> Frame {
    let (width, height) = match widget.expansion {
        ExpansionState::Normal => (widget.size.width, widget.size.height),
        ExpansionState::Expanded => (
            widget.size.width * EXPANDED_WIDTH_SCALE,
            widget.size.height * EXPANDED_HEIGHT_SCALE,
        ),
        ExpansionState::Minimized => (widget.size.width, HEADER_HEIGHT),
    };

    Frame {
        x: widget.position.x,
        y: widget.position.y,
        width,
        height,
    }
}

pub fn describe_widget(widget: &Widget) -> WidgetView {
    WidgetView {
        id: widget.id.clone(),
        widget_type: widget.widget_type,
        title: widget.title.clone(),
        frame: frame_of(widget),
        selected: widget.is_selected(),
        expansion: widget.expansion,
        body: body_of(widget),
    }
}

pub fn editor_for(widget: &Widget) -> EditorView {
    let frame = frame_of(widget);
    EditorView {
        widget_id: widget.id.clone(),
        x: frame.x,
        y: frame.y + frame.height + EDITOR_GAP,
        width: frame.width,
    }
}

fn body_of(widget: &Widget) -> WidgetBody {
    if widget.expansion == ExpansionState::Minimized {
        return WidgetBody::Collapsed;
    }

    match widget.data_state {
        DataState::Loading => WidgetBody::Loading,
        DataState::Error => WidgetBody::Error {
            message: widget.error.clone().unwrap_or_default(),
            retry: widget.data_source.is_some(),
            has_stale_data: widget.data.is_some(),
        },
        DataState::Empty => WidgetBody::NotConfigured,
        DataState::Ready => ready_body(widget),
    }
}

fn ready_body(widget: &Widget) -> WidgetBody {
    match (widget.widget_type, &widget.data) {
        (WidgetType::TextHeader, _) => WidgetBody::Text {
            content: widget.content.clone().unwrap_or_default(),
            font_size: widget.font_size.unwrap_or(DEFAULT_FONT_SIZE),
            editable: true,
        },
        (WidgetType::Table, Some(WidgetData::Table(table))) => WidgetBody::Table(table.clone()),
        (WidgetType::SingleValue, Some(WidgetData::SingleValue(value))) => {
            WidgetBody::SingleValue(value.clone())
        }
        (t, Some(WidgetData::Chart(points))) if t.is_chart() => {
            WidgetBody::Chart(chart_config(t, points))
        }
        _ => WidgetBody::NotConfigured,
    }
}

pub fn chart_config(widget_type: WidgetType, points: &[ChartPoint]) -> ChartConfig {
    let (kind, options) = match widget_type {
        WidgetType::Line => (ChartKind::Line, ChartOptions::cartesian()),
        WidgetType::Histogram => (
            ChartKind::Bar,
            ChartOptions {
                bar_percentage: Some(1.0),
                ..ChartOptions::cartesian()
            },
        ),
        WidgetType::Pie => (ChartKind::Pie, ChartOptions::circular()),
        WidgetType::Donut => (
            ChartKind::Doughnut,
            ChartOptions {
                cutout: Some(DONUT_CUTOUT),
                ..ChartOptions::circular()
            },
        ),
        _ => (ChartKind::Bar, ChartOptions::cartesian()),
    };

    ChartConfig {
        kind,
        data: ChartDataSet {
            labels: points.iter().map(|p| p.name.clone()).collect(),
            values: points.iter().map(|p| p.value).collect(),
            colors: points.iter().map(|p| p.color.clone()).collect(),
        },
        options,
    }
}
