use std::{collections::HashMap, fs, path::Path};

use anyhow::Context;

const DEFAULT_CONFIG_FILE: &str = "roster.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_url: String,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/roster.db".into(),
            log_filter: "info".into(),
        }
    }
}

/// Defaults, then the config file, then environment variables.
///
/// An explicitly named config file must exist; the default `roster.toml` is optional.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let raw = match config_path {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("failed to read config file '{}'", path.display()))?,
        ),
        None => fs::read_to_string(DEFAULT_CONFIG_FILE).ok(),
    };
    if let Some(raw) = raw {
        apply_file_overrides(&mut settings, &raw)?;
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file_overrides(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg =
        toml::from_str::<HashMap<String, String>>(raw).context("malformed roster config")?;
    if let Some(v) = file_cfg.get("database_url") {
        settings.database_url = v.clone();
    }
    if let Some(v) = file_cfg.get("log_filter") {
        settings.log_filter = v.clone();
    }
    Ok(())
}

fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("ROSTER_DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = lookup("APP__DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = lookup("ROSTER_LOG") {
        settings.log_filter = v;
    }
}

impl Settings {
    /// `database_url` as an sqlx SQLite url. Bare paths and `sqlite:path` become
    /// `sqlite://path` with forward slashes; a blank value means the default.
    pub fn sqlite_url(&self) -> String {
        let raw = self.database_url.trim();
        if raw.is_empty() {
            return Settings::default().database_url;
        }
        if raw.starts_with("sqlite://") || raw.starts_with("sqlite::memory:") {
            return raw.to_string();
        }

        let path = raw.strip_prefix("sqlite:").unwrap_or(raw);
        format!("sqlite://{}", path.replace('\\', "/"))
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
