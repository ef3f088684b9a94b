// Dashboard domain model - owns the widget sequence and every operation that changes it
use super::layout;
use super::render_shape::WidgetData;
use super::widget::{ExpansionState, Position, SelectionState, Size, Widget, WidgetType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, with = "widgets_json")]
    pub widgets: Vec<Widget>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub auto_refresh: bool,
    #[serde(default, rename = "refreshInterval")]
    pub refresh_interval_seconds: u32,
    #[serde(default)]
    next_widget_seq: u64,
}

/// Editor fields applied to a data-bound widget
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfig {
    pub title: Option<String>,
    pub data_source: Option<String>,
    pub refresh_interval_ms: Option<u64>,
}

/// What a configure call changed, so timers and bindings can follow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigChange {
    pub title_changed: bool,
    pub source_changed: bool,
    pub interval_changed: bool,
}

/// Dashboard metadata edited outside the canvas
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSettings {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_published: Option<bool>,
    pub auto_refresh: Option<bool>,
    #[serde(rename = "refreshInterval")]
    pub refresh_interval_seconds: Option<u32>,
}

impl Dashboard {
    pub fn new(id: String, name: String, description: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            name,
            description,
            widgets: Vec::new(),
            is_published: false,
            created_at: now,
            last_modified: now,
            auto_refresh: false,
            refresh_interval_seconds: 0,
            next_widget_seq: 1,
        }
    }

    /// Brings the id counter past every id already in use.
    /// Needed after loading records written without the counter.
    pub fn normalize(&mut self) {
        let highest = self
            .widgets
            .iter()
            .filter_map(|w| w.id.strip_prefix("widget-"))
            .filter_map(|n| n.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        self.next_widget_seq = self.next_widget_seq.max(highest + 1).max(1);
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    pub fn widget(&self, id: &str) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.id == id)
    }

    fn widget_mut(&mut self, id: &str) -> Option<&mut Widget> {
        self.widgets.iter_mut().find(|w| w.id == id)
    }

    pub fn selected(&self) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.is_selected())
    }

    fn touch(&mut self) {
        self.last_modified = Utc::now();
    }

    /// Appends a widget of `widget_type` at the layout engine's insertion point
    pub fn create_widget(&mut self, widget_type: WidgetType) -> &Widget {
        self.normalize();
        let id = format!("widget-{}", self.next_widget_seq);
        self.next_widget_seq += 1;

        let position = layout::insertion_point(&self.widgets);
        self.widgets.push(Widget::new(id, widget_type, position));
        self.touch();

        let last = self.widgets.len() - 1;
        &self.widgets[last]
    }

    /// Toggles selection of `id`; any other selected widget is deselected.
    /// Returns the new state of `id`, or `None` for an unknown id.
    pub fn select_widget(&mut self, id: &str) -> Option<SelectionState> {
        let target = self.widgets.iter().position(|w| w.id == id)?;
        let next = match self.widgets[target].selection {
            SelectionState::Selected => SelectionState::None,
            SelectionState::None => SelectionState::Selected,
        };

        for (i, widget) in self.widgets.iter_mut().enumerate() {
            widget.selection = if i == target { next } else { SelectionState::None };
        }
        Some(next)
    }

    pub fn clear_selection(&mut self) -> bool {
        let mut changed = false;
        for widget in self.widgets.iter_mut().filter(|w| w.is_selected()) {
            widget.selection = SelectionState::None;
            changed = true;
        }
        changed
    }

    pub fn delete_widget(&mut self, id: &str) -> Option<Widget> {
        let index = self.widgets.iter().position(|w| w.id == id)?;
        let removed = self.widgets.remove(index);
        self.touch();
        Some(removed)
    }

    pub fn toggle_minimize(&mut self, id: &str) -> Option<ExpansionState> {
        self.toggle_expansion(id, ExpansionState::Minimized)
    }

    pub fn toggle_expand(&mut self, id: &str) -> Option<ExpansionState> {
        self.toggle_expansion(id, ExpansionState::Expanded)
    }

    fn toggle_expansion(&mut self, id: &str, state: ExpansionState) -> Option<ExpansionState> {
        let widget = self.widget_mut(id)?;
        widget.expansion = if widget.expansion == state {
            ExpansionState::Normal
        } else {
            state
        };
        let expansion = widget.expansion;
        self.touch();
        Some(expansion)
    }

    pub fn move_widget(&mut self, id: &str, position: Position) -> bool {
        match self.widget_mut(id) {
            Some(widget) => {
                widget.position = position;
                true
            }
            None => false,
        }
    }

    pub fn resize_widget(&mut self, id: &str, size: Size) -> bool {
        match self.widget_mut(id) {
            Some(widget) => {
                let min = widget.widget_type.min_size();
                widget.size = Size::new(size.width.max(min.width), size.height.max(min.height));
                true
            }
            None => false,
        }
    }

    /// Marks geometry changes from a finished gesture as a modification
    pub fn commit_geometry(&mut self, id: &str) -> bool {
        let known = self.widget(id).is_some();
        if known {
            self.touch();
        }
        known
    }

    pub fn configure_widget(&mut self, id: &str, config: WidgetConfig) -> Option<ConfigChange> {
        let widget = self.widget_mut(id)?;
        let mut change = ConfigChange::default();

        if let Some(title) = config.title {
            let title = title.trim();
            if !title.is_empty() && title != widget.title {
                widget.title = title.to_string();
                change.title_changed = true;
            }
        }

        if widget.widget_type.is_data_bound() {
            if let Some(source) = config.data_source {
                let source = Some(source.trim().to_string()).filter(|s| !s.is_empty());
                if source != widget.data_source {
                    widget.data_source = source;
                    change.source_changed = true;
                    if widget.data_source.is_none() {
                        widget.reset_data();
                    }
                }
            }
            if let Some(interval) = config.refresh_interval_ms {
                if interval != widget.refresh_interval_ms {
                    widget.refresh_interval_ms = interval;
                    change.interval_changed = true;
                }
            }
        }

        self.touch();
        Some(change)
    }

    pub fn set_widget_text(&mut self, id: &str, content: String, font_size: Option<u32>) -> bool {
        let Some(widget) = self.widget_mut(id) else {
            return false;
        };
        if widget.widget_type != WidgetType::TextHeader {
            return false;
        }
        widget.set_text(content);
        if let Some(size) = font_size {
            widget.font_size = Some(size.max(1));
        }
        self.touch();
        true
    }

    pub fn begin_loading(&mut self, id: &str) -> bool {
        match self.widget_mut(id) {
            Some(widget) => {
                widget.begin_loading();
                true
            }
            None => false,
        }
    }

    pub fn apply_widget_data(&mut self, id: &str, data: WidgetData) -> bool {
        match self.widget_mut(id) {
            Some(widget) => {
                widget.apply_data(data);
                true
            }
            None => false,
        }
    }

    pub fn apply_widget_error(&mut self, id: &str, message: String) -> bool {
        match self.widget_mut(id) {
            Some(widget) => {
                widget.apply_error(message);
                true
            }
            None => false,
        }
    }

    /// Nothing changes when the settings carry a blank name
    pub fn apply_settings(&mut self, settings: DashboardSettings) -> Result<(), String> {
        if let Some(name) = &settings.name {
            if name.trim().is_empty() {
                return Err("Dashboard name is required".into());
            }
        }

        if let Some(name) = settings.name {
            self.name = name.trim().to_string();
        }
        if let Some(description) = settings.description {
            self.description = description;
        }
        if let Some(published) = settings.is_published {
            self.is_published = published;
        }
        if let Some(auto_refresh) = settings.auto_refresh {
            self.auto_refresh = auto_refresh;
        }
        if let Some(seconds) = settings.refresh_interval_seconds {
            self.refresh_interval_seconds = seconds;
        }
        self.touch();
        Ok(())
    }
}

/// The backend stores `widgets` as a JSON string. Reading accepts a string or a
/// raw array; anything unparsable becomes an empty sequence.
mod widgets_json {
    use super::Widget;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S>(widgets: &[Widget], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let encoded = serde_json::to_string(widgets).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&encoded)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Widget>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        let parsed = match raw {
            Value::String(text) => serde_json::from_str::<Vec<Widget>>(&text),
            Value::Array(_) => serde_json::from_value::<Vec<Widget>>(raw),
            _ => return Ok(Vec::new()),
        };

        Ok(parsed.unwrap_or_else(|e| {
            tracing::warn!("Discarding malformed widgets payload: {}", e);
            Vec::new()
        }))
    }
}
