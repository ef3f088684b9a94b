// Render shapes - maps raw query rows into the payload each widget type draws
use super::widget::WidgetType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One result row of a stored query, keys in column order
pub type Row = serde_json::Map<String, Value>;

pub const CHART_PALETTE: [&str; 10] = [
    "#4e79a7", "#f28e2b", "#e15759", "#76b7b2", "#59a14f", "#edc948", "#b07aa1", "#ff9da7",
    "#9c755f", "#bab0ac",
];

const COLUMN_NAMES: [(&str, &str); 14] = [
    ("id", "ID"),
    ("AppName", "Application"),
    ("appName", "Application"),
    ("messageCollected", "Messages Collected"),
    ("msgCount", "Message Count"),
    ("errorCount", "Errors"),
    ("errorRate", "Error Rate (%)"),
    ("avgLatencyMs", "Avg Latency (ms)"),
    ("ts", "Timestamp"),
    ("createdAt", "Created"),
    ("updatedAt", "Updated"),
    ("cnt", "Count"),
    ("qty", "Quantity"),
    ("url", "URL"),
];

const SINGLE_VALUE_FIELDS: [&str; 10] = [
    "value",
    "total",
    "count",
    "totalCount",
    "messageCollected",
    "sum",
    "amount",
    "revenue",
    "avg",
    "cnt",
];

const NAME_FIELDS: [&str; 8] = [
    "name", "label", "AppName", "appName", "category", "key", "title", "date",
];

const VALUE_FIELDS: [&str; 9] = [
    "value",
    "count",
    "messageCollected",
    "total",
    "amount",
    "revenue",
    "sum",
    "cnt",
    "y",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "kebab-case")]
pub enum WidgetData {
    Text(String),
    Table(TableData),
    SingleValue(SingleValueData),
    Chart(Vec<ChartPoint>),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleValueData {
    pub value: f64,
    pub label: String,
    pub formatted: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub name: String,
    pub value: f64,
    pub color: String,
}

/// Maps a result set to the shape rendered by `widget_type`.
/// Text headers have no data shape and yield `None`.
pub fn shape_rows(widget_type: WidgetType, rows: &[Row]) -> Option<WidgetData> {
    match widget_type {
        WidgetType::TextHeader => None,
        WidgetType::Table => Some(WidgetData::Table(table_data(rows))),
        WidgetType::SingleValue => Some(WidgetData::SingleValue(single_value_data(rows))),
        WidgetType::Bar
        | WidgetType::Line
        | WidgetType::Pie
        | WidgetType::Donut
        | WidgetType::Histogram => Some(WidgetData::Chart(chart_points(rows))),
    }
}

pub fn table_data(rows: &[Row]) -> TableData {
    let mut keys: Vec<&str> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !keys.contains(&key.as_str()) {
                keys.push(key);
            }
        }
    }

    let rows = rows
        .iter()
        .map(|row| {
            keys.iter()
                .map(|key| row.get(*key).map(stringify).unwrap_or_default())
                .collect()
        })
        .collect();

    TableData {
        columns: keys.iter().map(|key| column_header(key)).collect(),
        rows,
    }
}

pub fn single_value_data(rows: &[Row]) -> SingleValueData {
    let found = rows.first().and_then(|row| {
        SINGLE_VALUE_FIELDS
            .iter()
            .find_map(|field| row.get(*field).and_then(as_number).map(|v| (*field, v)))
    });

    let (value, label) = match found {
        Some((field, value)) => (value, column_header(field)),
        None => (rows.len() as f64, String::from("Total Records")),
    };

    SingleValueData {
        value,
        label,
        formatted: format_grouped(value),
    }
}

/// Rows sharing a name are summed, then sorted by value descending
pub fn chart_points(rows: &[Row]) -> Vec<ChartPoint> {
    let mut totals: Vec<(String, f64)> = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        let name = NAME_FIELDS
            .iter()
            .find_map(|field| match row.get(*field) {
                Some(Value::Null) | None => None,
                Some(value) => Some(stringify(value)),
            })
            .unwrap_or_else(|| format!("Item {}", index + 1));
        let value = VALUE_FIELDS
            .iter()
            .find_map(|field| row.get(*field).and_then(as_number))
            .unwrap_or(0.0);

        match totals.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, total)) => *total += value,
            None => totals.push((name, value)),
        }
    }

    // stable sort keeps first-seen order between equal totals
    totals.sort_by(|a, b| b.1.total_cmp(&a.1));

    totals
        .into_iter()
        .enumerate()
        .map(|(index, (name, value))| ChartPoint {
            name,
            value,
            color: CHART_PALETTE[index % CHART_PALETTE.len()].to_string(),
        })
        .collect()
}

/// Display name for a raw field: known names first, then Title Case
pub fn column_header(field: &str) -> String {
    COLUMN_NAMES
        .iter()
        .find(|(raw, _)| *raw == field)
        .map(|(_, display)| display.to_string())
        .unwrap_or_else(|| title_case(field))
}

/// "messageCollected" -> "Message Collected", "total_amount" -> "Total Amount",
/// "userID" -> "User ID"
pub fn title_case(field: &str) -> String {
    let chars: Vec<char> = field.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' || c.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower)
            {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .into_iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Groups the integer part with commas and keeps at most two decimals
pub fn format_grouped(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    let negative = rounded < 0.0;
    let abs = rounded.abs();
    let whole = abs.trunc() as u64;
    let cents = ((abs - abs.trunc()) * 100.0).round() as u64;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if cents > 0 {
        let fraction = format!("{:02}", cents);
        out.push('.');
        out.push_str(fraction.trim_end_matches('0'));
    }
    out
}
