// Widget domain model
use super::render_shape::WidgetData;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WidgetType {
    TextHeader,
    Table,
    Bar,
    Line,
    Pie,
    Donut,
    Histogram,
    SingleValue,
}

impl WidgetType {
    pub const ALL: [WidgetType; 8] = [
        WidgetType::TextHeader,
        WidgetType::Table,
        WidgetType::Bar,
        WidgetType::Line,
        WidgetType::Pie,
        WidgetType::Donut,
        WidgetType::Histogram,
        WidgetType::SingleValue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetType::TextHeader => "text-header",
            WidgetType::Table => "table",
            WidgetType::Bar => "bar",
            WidgetType::Line => "line",
            WidgetType::Pie => "pie",
            WidgetType::Donut => "donut",
            WidgetType::Histogram => "histogram",
            WidgetType::SingleValue => "single-value",
        }
    }

    pub fn is_chart(&self) -> bool {
        matches!(
            self,
            WidgetType::Bar
                | WidgetType::Line
                | WidgetType::Pie
                | WidgetType::Donut
                | WidgetType::Histogram
        )
    }

    /// Text headers carry their own content and never bind to a source
    pub fn is_data_bound(&self) -> bool {
        !matches!(self, WidgetType::TextHeader)
    }

    pub fn default_size(&self) -> Size {
        match self {
            WidgetType::Table => Size::new(400.0, 300.0),
            WidgetType::TextHeader => Size::new(300.0, 60.0),
            _ => Size::new(300.0, 250.0),
        }
    }

    pub fn min_size(&self) -> Size {
        match self {
            WidgetType::TextHeader => Size::new(150.0, 40.0),
            _ => Size::new(250.0, 200.0),
        }
    }

    pub fn default_title(&self) -> String {
        default_title(self.as_str())
    }
}

impl fmt::Display for WidgetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WidgetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WidgetType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown widget type '{}'", s))
    }
}

/// Title for a freshly created widget, looked up by type name
pub fn default_title(type_name: &str) -> String {
    let known = match type_name {
        "text-header" => Some("Text Header"),
        "table" => Some("Data Table"),
        "bar" => Some("Bar Chart"),
        "line" => Some("Line Chart"),
        "pie" => Some("Pie Chart"),
        "donut" => Some("Donut Chart"),
        "histogram" => Some("Histogram"),
        "single-value" => Some("Single Value"),
        _ => None,
    };

    match known {
        Some(title) => title.to_string(),
        None => {
            let mut chars = type_name.chars();
            let capitalized = match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::from("Custom"),
            };
            format!("{} Chart", capitalized)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionState {
    #[default]
    None,
    Selected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpansionState {
    #[default]
    Normal,
    Expanded,
    Minimized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataState {
    #[default]
    Empty,
    Loading,
    Ready,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    pub id: String,
    #[serde(rename = "type")]
    pub widget_type: WidgetType,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    #[serde(default)]
    pub refresh_interval_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
    pub position: Position,
    pub size: Size,
    #[serde(default)]
    pub selection: SelectionState,
    #[serde(default)]
    pub expansion: ExpansionState,
    #[serde(default)]
    pub data_state: DataState,
    #[serde(default)]
    pub data: Option<WidgetData>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

pub const DEFAULT_FONT_SIZE: u32 = 24;
pub const DEFAULT_HEADER_TEXT: &str = "Dashboard Header";

impl Widget {
    pub fn new(id: String, widget_type: WidgetType, position: Position) -> Self {
        let mut widget = Self {
            id,
            widget_type,
            title: widget_type.default_title(),
            content: None,
            data_source: None,
            refresh_interval_ms: 0,
            font_size: None,
            position,
            size: widget_type.default_size(),
            selection: SelectionState::None,
            expansion: ExpansionState::Normal,
            data_state: DataState::Empty,
            data: None,
            error: None,
            last_updated: None,
        };

        if widget_type == WidgetType::TextHeader {
            widget.font_size = Some(DEFAULT_FONT_SIZE);
            widget.set_text(DEFAULT_HEADER_TEXT.to_string());
        }

        widget
    }

    pub fn is_selected(&self) -> bool {
        self.selection == SelectionState::Selected
    }

    /// Right edge of the stored frame
    pub fn right_edge(&self) -> f64 {
        self.position.x + self.size.width
    }

    pub fn set_text(&mut self, content: String) {
        self.data = Some(WidgetData::Text(content.clone()));
        self.content = Some(content);
        self.data_state = DataState::Ready;
        self.error = None;
        self.last_updated = Some(Utc::now());
    }

    /// Loading keeps whatever data was shown before
    pub fn begin_loading(&mut self) {
        self.data_state = DataState::Loading;
    }

    pub fn apply_data(&mut self, data: WidgetData) {
        self.data = Some(data);
        self.error = None;
        self.data_state = DataState::Ready;
        self.last_updated = Some(Utc::now());
    }

    /// Errors keep the last good payload so it stays visible behind the error
    pub fn apply_error(&mut self, message: String) {
        self.error = Some(message);
        self.data_state = DataState::Error;
    }

    /// Drops data, e.g. after the data source was cleared
    pub fn reset_data(&mut self) {
        self.data = None;
        self.error = None;
        self.data_state = DataState::Empty;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::render_shape::SingleValueData;

    #[test]
    fn test_default_sizes() {
        assert_eq!(WidgetType::Table.default_size(), Size::new(400.0, 300.0));
        assert_eq!(WidgetType::TextHeader.default_size(), Size::new(300.0, 60.0));
        assert_eq!(WidgetType::Donut.default_size(), Size::new(300.0, 250.0));
        assert_eq!(WidgetType::Histogram.default_size(), Size::new(300.0, 250.0));
    }

    #[test]
    fn test_default_titles() {
        assert_eq!(WidgetType::Donut.default_title(), "Donut Chart");
        assert_eq!(WidgetType::Table.default_title(), "Data Table");
        assert_eq!(default_title("scatter"), "Scatter Chart");
        assert_eq!(default_title(""), "Custom Chart");
    }

    #[test]
    fn test_type_round_trip_through_str() {
        for t in WidgetType::ALL {
            assert_eq!(t.as_str().parse::<WidgetType>(), Ok(t));
        }
        assert!("radar".parse::<WidgetType>().is_err());
    }

    #[test]
    fn test_text_header_starts_ready() {
        let widget = Widget::new("widget-1".into(), WidgetType::TextHeader, Position::default());
        assert_eq!(widget.data_state, DataState::Ready);
        assert_eq!(widget.content.as_deref(), Some(DEFAULT_HEADER_TEXT));
        assert_eq!(widget.font_size, Some(DEFAULT_FONT_SIZE));
    }

    #[test]
    fn test_error_keeps_stale_data() {
        let mut widget = Widget::new("widget-1".into(), WidgetType::SingleValue, Position::default());
        let data = WidgetData::SingleValue(SingleValueData {
            value: 42.0,
            label: "Total".into(),
            formatted: "42".into(),
        });
        widget.apply_data(data.clone());
        widget.begin_loading();
        widget.apply_error("timeout".into());

        assert_eq!(widget.data_state, DataState::Error);
        assert_eq!(widget.data, Some(data));
        assert_eq!(widget.error.as_deref(), Some("timeout"));

        widget.apply_data(WidgetData::Text("x".into()));
        assert_eq!(widget.data_state, DataState::Ready);
        assert!(widget.error.is_none());
    }
}
