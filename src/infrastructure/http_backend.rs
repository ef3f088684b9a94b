// HTTP backend - reqwest client for the dashboard CRUD API and the stored-query directory
use crate::application::dashboard_repository::{
    DashboardRepository, QueryDirectory, RepositoryError, StoredQuery, WidgetForm,
    WidgetSaveResponse,
};
use crate::domain::dashboard::Dashboard;
use crate::domain::render_shape::Row;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct NewDashboard<'a> {
    name: &'a str,
    description: &'a str,
}

/// Widget editor form as the backend expects it
#[derive(Debug, Serialize, PartialEq)]
struct WidgetFormBody {
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "ApiEndpoint")]
    api_endpoint: String,
    /// Seconds on the wire
    #[serde(rename = "RefreshInterval")]
    refresh_interval: u64,
    #[serde(rename = "fontSizeInput", skip_serializing_if = "Option::is_none")]
    font_size: Option<u32>,
    #[serde(rename = "textContentInput", skip_serializing_if = "Option::is_none")]
    text_content: Option<String>,
}

impl From<&WidgetForm> for WidgetFormBody {
    fn from(form: &WidgetForm) -> Self {
        Self {
            title: form.title.clone(),
            api_endpoint: form.source.clone().unwrap_or_default(),
            refresh_interval: form.refresh_interval_ms / 1000,
            font_size: form.font_size,
            text_content: form.text_content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WidgetSaveBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    saved_query: Option<Value>,
}

impl From<WidgetSaveBody> for WidgetSaveResponse {
    fn from(body: WidgetSaveBody) -> Self {
        // anything but an array of row objects is treated as "not executed"
        let saved_query = body.saved_query.and_then(|value| match value {
            Value::Array(items) => Some(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Object(row) => Some(row),
                        _ => None,
                    })
                    .collect::<Vec<Row>>(),
            ),
            _ => None,
        });

        WidgetSaveResponse {
            message: body.message,
            saved_query,
        }
    }
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn dashboard_url(&self, id: &str) -> String {
        self.url(&format!("/dashboards/{}", urlencoding::encode(id)))
    }

    fn query_results_url(&self, title: &str) -> String {
        self.url(&format!("/queries/{}/results", urlencoding::encode(title)))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RepositoryError> {
        let response = request
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| RepositoryError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Backend request failed with status {}: {}", status, body);
            return Err(RepositoryError::Status { status, body });
        }
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RepositoryError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| RepositoryError::Decode(e.to_string()))
    }
}

#[async_trait]
impl DashboardRepository for HttpBackend {
    async fn list_dashboards(&self) -> Result<Vec<Dashboard>, RepositoryError> {
        tracing::debug!("Listing dashboards");
        self.json(self.client.get(self.url("/dashboards"))).await
    }

    async fn get_dashboard(&self, id: &str) -> Result<Option<Dashboard>, RepositoryError> {
        match self.json(self.client.get(self.dashboard_url(id))).await {
            Ok(dashboard) => Ok(Some(dashboard)),
            Err(RepositoryError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn create_dashboard(
        &self,
        name: &str,
        description: &str,
    ) -> Result<Dashboard, RepositoryError> {
        let body = NewDashboard { name, description };
        self.json(self.client.post(self.url("/dashboards")).json(&body))
            .await
    }

    async fn update_dashboard(&self, dashboard: &Dashboard) -> Result<(), RepositoryError> {
        self.send(self.client.put(self.dashboard_url(&dashboard.id)).json(dashboard))
            .await?;
        Ok(())
    }

    async fn delete_dashboard(&self, id: &str) -> Result<(), RepositoryError> {
        self.send(self.client.delete(self.dashboard_url(id))).await?;
        Ok(())
    }

    async fn save_widget(&self, form: &WidgetForm) -> Result<WidgetSaveResponse, RepositoryError> {
        let body = WidgetFormBody::from(form);
        let saved: WidgetSaveBody = self
            .json(self.client.post(self.url("/widgets")).json(&body))
            .await?;
        Ok(saved.into())
    }
}

#[async_trait]
impl QueryDirectory for HttpBackend {
    async fn list_queries(&self) -> Result<Vec<StoredQuery>, RepositoryError> {
        self.json(self.client.get(self.url("/queries"))).await
    }

    async fn run_query(&self, title: &str) -> Result<Vec<Row>, RepositoryError> {
        tracing::debug!("Running stored query '{}'", title);
        self.json(self.client.get(self.query_results_url(title))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn backend() -> HttpBackend {
        HttpBackend::new("http://localhost:3000/api/", Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_urls_are_encoded() {
        let backend = backend();
        assert_eq!(backend.url("/dashboards"), "http://localhost:3000/api/dashboards");
        assert_eq!(
            backend.query_results_url("Product Performance"),
            "http://localhost:3000/api/queries/Product%20Performance/results"
        );
        assert_eq!(
            backend.dashboard_url("local-1/2"),
            "http://localhost:3000/api/dashboards/local-1%2F2"
        );
    }

    #[test]
    fn test_widget_form_uses_backend_field_names() {
        let form = WidgetForm {
            title: "Sales by app".into(),
            source: Some("Product Performance".into()),
            refresh_interval_ms: 30_000,
            font_size: None,
            text_content: None,
        };

        let body = serde_json::to_value(WidgetFormBody::from(&form)).unwrap();
        assert_eq!(
            body,
            json!({
                "Title": "Sales by app",
                "ApiEndpoint": "Product Performance",
                "RefreshInterval": 30
            })
        );
    }

    #[test]
    fn test_saved_query_rows_are_extracted() {
        let body: WidgetSaveBody = serde_json::from_value(json!({
            "message": "Widget saved",
            "savedQuery": [{"name": "A", "value": 1}, "junk"]
        }))
        .unwrap();
        let response = WidgetSaveResponse::from(body);
        assert_eq!(response.message, "Widget saved");
        assert_eq!(response.saved_query.map(|rows| rows.len()), Some(1));

        let body: WidgetSaveBody = serde_json::from_value(json!({"message": "ok", "savedQuery": null})).unwrap();
        assert!(WidgetSaveResponse::from(body).saved_query.is_none());
    }
}
