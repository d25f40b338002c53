use std::{fs, path::Path, str::FromStr, time::Duration};

use anyhow::{anyhow, Context};
use serde::Deserialize;

pub const SETTINGS_FILE: &str = "list_browser.toml";
const DEV_API_BASE_URL: &str = "http://localhost:5000/api";
const PRODUCTION_API_PATH: &str = "/api";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" | "" => Ok(Self::Development),
            other => Err(anyhow!("unknown environment '{other}'")),
        }
    }
}

/// How selection and sort order changes reach the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistenceMode {
    /// One independent request per change; server-side arrival order is not guaranteed.
    #[default]
    FireAndForget,
    /// One request in flight per resource; changes made meanwhile collapse into the latest value.
    Coalescing,
}

impl FromStr for PersistenceMode {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "fire-and-forget" | "lenient" => Ok(Self::FireAndForget),
            "coalescing" | "coalesce" => Ok(Self::Coalescing),
            other => Err(anyhow!("unknown persistence mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: Environment,
    pub api_base_url: Option<String>,
    pub public_origin: Option<String>,
    pub persistence: PersistenceMode,
    pub restore_sort_order: bool,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            api_base_url: None,
            public_origin: None,
            persistence: PersistenceMode::FireAndForget,
            restore_sort_order: false,
            request_timeout_secs: 30,
        }
    }
}

impl Settings {
    /// Resolves the API root: an explicit url wins, production serves under the
    /// public origin's `/api`, development targets the local dev server.
    pub fn api_base_url(&self) -> anyhow::Result<String> {
        if let Some(url) = self.api_base_url.as_deref().filter(|v| !v.trim().is_empty()) {
            return Ok(url.trim().trim_end_matches('/').to_string());
        }

        match self.environment {
            Environment::Development => Ok(DEV_API_BASE_URL.to_string()),
            Environment::Production => {
                let origin = self
                    .public_origin
                    .as_deref()
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .ok_or_else(|| {
                        anyhow!("production environment requires APP__PUBLIC_ORIGIN or api_base_url")
                    })?;
                Ok(format!(
                    "{}{PRODUCTION_API_PATH}",
                    origin.trim_end_matches('/')
                ))
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    environment: Option<String>,
    api_base_url: Option<String>,
    public_origin: Option<String>,
    persistence: Option<String>,
    restore_sort_order: Option<bool>,
    request_timeout_secs: Option<u64>,
}

pub fn load_settings() -> Settings {
    load_settings_with(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_with(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    match read_file_settings(path) {
        Ok(Some(file_cfg)) => apply_file_settings(&mut settings, file_cfg),
        Ok(None) => {}
        Err(err) => tracing::warn!(path = %path.display(), "ignoring settings file: {err:#}"),
    }

    apply_env_settings(&mut settings, env);
    settings
}

fn read_file_settings(path: &Path) -> anyhow::Result<Option<FileSettings>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("failed to read {}", path.display())),
    };
    let parsed = toml::from_str::<FileSettings>(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(parsed))
}

fn apply_file_settings(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.environment {
        match v.parse() {
            Ok(env) => settings.environment = env,
            Err(err) => tracing::warn!("settings file: {err}"),
        }
    }
    if let Some(v) = file_cfg.api_base_url {
        settings.api_base_url = Some(v);
    }
    if let Some(v) = file_cfg.public_origin {
        settings.public_origin = Some(v);
    }
    if let Some(v) = file_cfg.persistence {
        match v.parse() {
            Ok(mode) => settings.persistence = mode,
            Err(err) => tracing::warn!("settings file: {err}"),
        }
    }
    if let Some(v) = file_cfg.restore_sort_order {
        settings.restore_sort_order = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
}

fn apply_env_settings(settings: &mut Settings, env: impl Fn(&str) -> Option<String>) {
    if let Some(v) = env("APP_ENV") {
        match v.parse() {
            Ok(parsed) => settings.environment = parsed,
            Err(err) => tracing::warn!("APP_ENV: {err}"),
        }
    }
    if let Some(v) = env("APP__API_BASE_URL") {
        settings.api_base_url = Some(v);
    }
    if let Some(v) = env("APP__PUBLIC_ORIGIN") {
        settings.public_origin = Some(v);
    }
    if let Some(v) = env("APP__PERSISTENCE") {
        match v.parse() {
            Ok(parsed) => settings.persistence = parsed,
            Err(err) => tracing::warn!("APP__PERSISTENCE: {err}"),
        }
    }
    if let Some(v) = env("APP__RESTORE_SORT_ORDER") {
        settings.restore_sort_order = matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        );
    }
    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
