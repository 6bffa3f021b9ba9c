use std::{collections::HashMap, fs, path::Path};

use anyhow::{bail, Context};
use client_core::ListNames;

use crate::controller::DEFAULT_RECENT_ACTIVITY_LIMIT;

pub const DEFAULT_CONFIG_FILE: &str = "mail_panel.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub site_url: String,
    pub lists: ListNames,
    pub recent_activity_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            site_url: String::new(),
            lists: ListNames::default(),
            recent_activity_limit: DEFAULT_RECENT_ACTIVITY_LIMIT,
        }
    }
}

impl Settings {
    fn set(&mut self, key: &str, value: String) {
        match key {
            "site_url" => self.site_url = value,
            "pipelines_list" => self.lists.pipelines = value,
            "boxes_list" => self.lists.boxes = value,
            "emails_list" => self.lists.emails = value,
            "activities_list" => self.lists.activities = value,
            "stages_list" => self.lists.stages = value,
            "recent_activity_limit" => match value.trim().parse::<usize>() {
                Ok(parsed) if parsed > 0 => self.recent_activity_limit = parsed,
                _ => tracing::warn!(value = %value, "ignoring invalid recent_activity_limit"),
            },
            other => tracing::debug!(key = other, "ignoring unknown config key"),
        }
    }

    /// Site url with surrounding whitespace and trailing slashes removed.
    pub fn site_url(&self) -> anyhow::Result<String> {
        normalize_site_url(&self.site_url)
    }
}

pub fn normalize_site_url(raw: &str) -> anyhow::Result<String> {
    let site_url = raw.trim().trim_end_matches('/');
    if site_url.is_empty() {
        bail!(
            "no list store site url configured; set site_url in {DEFAULT_CONFIG_FILE}, \
             LIST_STORE_SITE_URL or --site-url"
        );
    }
    Ok(site_url.to_string())
}

/// Defaults, then the config file, then the process environment.
///
/// An explicit `path` must exist; the default file is optional.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file '{}'", path.display()))?;
            apply_file(&mut settings, &raw)
                .with_context(|| format!("invalid config file '{}'", path.display()))?;
        }
        None => {
            if let Ok(raw) = fs::read_to_string(DEFAULT_CONFIG_FILE) {
                apply_file(&mut settings, &raw)
                    .with_context(|| format!("invalid config file '{DEFAULT_CONFIG_FILE}'"))?;
            }
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

pub fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg = toml::from_str::<HashMap<String, toml::Value>>(raw)?;
    for (key, value) in file_cfg {
        let value = match value {
            toml::Value::String(v) => v,
            toml::Value::Integer(v) => v.to_string(),
            other => bail!(
                "config key '{key}' must be a string or integer, found {}",
                other.type_str()
            ),
        };
        settings.set(&key, value);
    }
    Ok(())
}

pub fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    const ENV_KEYS: &[(&str, &str)] = &[
        ("LIST_STORE_SITE_URL", "site_url"),
        ("APP__SITE_URL", "site_url"),
        ("APP__PIPELINES_LIST", "pipelines_list"),
        ("APP__BOXES_LIST", "boxes_list"),
        ("APP__EMAILS_LIST", "emails_list"),
        ("APP__ACTIVITIES_LIST", "activities_list"),
        ("APP__STAGES_LIST", "stages_list"),
        ("APP__RECENT_ACTIVITY_LIMIT", "recent_activity_limit"),
    ];

    for (var, key) in ENV_KEYS {
        if let Some(value) = lookup(var) {
            settings.set(key, value);
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
