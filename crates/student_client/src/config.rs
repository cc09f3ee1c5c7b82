use std::{collections::HashMap, fs, path::Path, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use url::Url;

use crate::{progress::DEFAULT_ALERT_WINDOW, transport::DEFAULT_CSRF_HEADER};

pub const SETTINGS_FILE: &str = "student.toml";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Settings {
    pub page_url: String,
    pub csrf_token: Option<String>,
    pub csrf_header: String,
    pub alert_window_ms: u64,
    pub no_filter: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            page_url: "http://127.0.0.1:8000/".into(),
            csrf_token: None,
            csrf_header: DEFAULT_CSRF_HEADER.into(),
            alert_window_ms: DEFAULT_ALERT_WINDOW.as_millis() as u64,
            no_filter: false,
        }
    }
}

impl Settings {
    pub fn page_url(&self) -> anyhow::Result<Url> {
        Url::parse(&self.page_url)
            .with_context(|| format!("invalid page url '{}'", self.page_url))
    }

    pub fn alert_window(&self) -> Duration {
        Duration::from_millis(self.alert_window_ms)
    }
}

/// Defaults, then `student.toml` in the working directory, then environment.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        apply_file_overrides(&mut settings, &raw);
    }
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());

    settings
}

pub fn load_settings_from(path: &Path) -> anyhow::Result<Settings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
    let mut settings = Settings::default();
    apply_file_overrides(&mut settings, &raw);
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

/// Unknown keys and values of the wrong type are ignored.
pub fn apply_file_overrides(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, toml::Value>>(raw) else {
        return;
    };

    if let Some(v) = file_cfg.get("page_url").and_then(toml::Value::as_str) {
        settings.page_url = v.to_string();
    }
    if let Some(v) = file_cfg.get("csrf_token").and_then(toml::Value::as_str) {
        settings.csrf_token = Some(v.to_string());
    }
    if let Some(v) = file_cfg.get("csrf_header").and_then(toml::Value::as_str) {
        settings.csrf_header = v.to_string();
    }
    if let Some(v) = file_cfg
        .get("alert_window_ms")
        .and_then(toml::Value::as_integer)
        .and_then(|v| u64::try_from(v).ok())
    {
        settings.alert_window_ms = v;
    }
    if let Some(v) = file_cfg.get("no_filter").and_then(toml::Value::as_bool) {
        settings.no_filter = v;
    }
}

pub fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("STUDENT_PAGE_URL") {
        settings.page_url = v;
    }
    if let Some(v) = lookup("APP__PAGE_URL") {
        settings.page_url = v;
    }

    if let Some(v) = lookup("STUDENT_CSRF_TOKEN") {
        settings.csrf_token = Some(v);
    }
    if let Some(v) = lookup("APP__CSRF_TOKEN") {
        settings.csrf_token = Some(v);
    }

    if let Some(v) = lookup("APP__CSRF_HEADER") {
        settings.csrf_header = v;
    }

    if let Some(v) = lookup("APP__ALERT_WINDOW_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.alert_window_ms = parsed;
        }
    }

    if let Some(v) = lookup("APP__NO_FILTER") {
        settings.no_filter = matches!(v.trim(), "1" | "true" | "yes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_three_second_alert_window() {
        let settings = Settings::default();
        assert_eq!(settings.alert_window(), Duration::from_millis(3000));
        assert_eq!(settings.csrf_header, "X-CSRFToken");
        assert!(settings.csrf_token.is_none());
    }

    #[test]
    fn file_overrides_known_keys() {
        let mut settings = Settings::default();
        apply_file_overrides(
            &mut settings,
            r#"
page_url = "https://trix.example/assignments/?tags=python"
csrf_token = "abc"
alert_window_ms = 1500
no_filter = true
unknown = "ignored"
"#,
        );

        assert_eq!(settings.page_url, "https://trix.example/assignments/?tags=python");
        assert_eq!(settings.csrf_token.as_deref(), Some("abc"));
        assert_eq!(settings.alert_window_ms, 1500);
        assert!(settings.no_filter);
    }

    #[test]
    fn malformed_file_leaves_defaults() {
        let mut settings = Settings::default();
        apply_file_overrides(&mut settings, "page_url = ");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn app_prefixed_env_wins_over_short_name() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("STUDENT_PAGE_URL", "https://short.example/"),
            ("APP__PAGE_URL", "https://app.example/"),
            ("APP__ALERT_WINDOW_MS", "not-a-number"),
            ("APP__NO_FILTER", "1"),
        ]);
        let mut settings = Settings::default();
        apply_env_overrides(&mut settings, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings.page_url, "https://app.example/");
        assert_eq!(settings.alert_window_ms, 3000);
        assert!(settings.no_filter);
    }

    #[test]
    fn rejects_unparseable_page_url() {
        let settings = Settings {
            page_url: "not a url".into(),
            ..Settings::default()
        };
        let err = settings.page_url().expect_err("invalid url");
        assert!(err.to_string().contains("not a url"));
    }
}
