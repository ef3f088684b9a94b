// Configuration loading - config/builder.toml layered under BUILDER__* environment variables
use crate::application::builder_session::SessionSettings;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub backend: BackendSettings,
    pub store: StoreSettings,
    pub cache: CacheSettings,
    pub canvas: CanvasSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind_addr: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendSettings {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreSettings {
    /// Empty keeps the fallback store in memory only
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheSettings {
    pub ttl_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CanvasSettings {
    pub resize_settle_ms: u64,
    pub notification_limit: usize,
}

impl AppConfig {
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            cache_ttl: Duration::from_millis(self.cache.ttl_ms),
            resize_settle: Duration::from_millis(self.canvas.resize_settle_ms),
            notification_limit: self.canvas.notification_limit,
        }
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.timeout_secs)
    }

    pub fn store_path(&self) -> Option<&str> {
        Some(self.store.path.trim()).filter(|p| !p.is_empty())
    }
}

fn builder() -> anyhow::Result<config::ConfigBuilder<config::builder::DefaultState>> {
    Ok(config::Config::builder()
        .set_default("server.bind_addr", "0.0.0.0:8080")?
        .set_default("backend.base_url", "http://localhost:3000/api")?
        .set_default("backend.timeout_secs", 10)?
        .set_default("store.path", "")?
        .set_default("cache.ttl_ms", 5_000)?
        .set_default("canvas.resize_settle_ms", 150)?
        .set_default("canvas.notification_limit", 20)?)
}

pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let settings = builder()?
        .add_source(config::File::with_name("config/builder").required(false))
        .add_source(config::Environment::with_prefix("BUILDER").separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_sources() {
        let config: AppConfig = builder().unwrap().build().unwrap().try_deserialize().unwrap();

        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.store_path(), None);
        assert_eq!(config.backend_timeout(), Duration::from_secs(10));

        let session = config.session_settings();
        assert_eq!(session.cache_ttl, Duration::from_millis(5_000));
        assert_eq!(session.resize_settle, Duration::from_millis(150));
        assert_eq!(session.notification_limit, 20);
    }

    #[test]
    fn test_overrides_take_precedence() {
        let config: AppConfig = builder()
            .unwrap()
            .set_override("store.path", "  data/dashboards.json ")
            .unwrap()
            .set_override("cache.ttl_ms", 0)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.store_path(), Some("data/dashboards.json"));
        assert_eq!(config.session_settings().cache_ttl, Duration::ZERO);
    }
}
