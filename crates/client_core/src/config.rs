use std::{collections::HashMap, fs, path::Path, time::Duration};

use tracing::warn;

use crate::{
    notification::DEFAULT_NOTIFICATION_TTL, query_cache::DEFAULT_PAGE_SIZE,
    watch_sync::{WatchSyncOptions, DEFAULT_PUSH_RETRY_DELAY},
};

pub const DEFAULT_CONFIG_FILE: &str = "client.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub backend_url: String,
    pub page_size: usize,
    pub notification_ttl: Duration,
    pub push_retry_delay: Duration,
    pub invalidate_on_pushed_finish: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8000".into(),
            page_size: DEFAULT_PAGE_SIZE,
            notification_ttl: DEFAULT_NOTIFICATION_TTL,
            push_retry_delay: DEFAULT_PUSH_RETRY_DELAY,
            invalidate_on_pushed_finish: false,
        }
    }
}

impl ClientSettings {
    pub fn watch_sync_options(&self) -> WatchSyncOptions {
        WatchSyncOptions {
            push_retry_delay: self.push_retry_delay,
            invalidate_on_pushed_finish: self.invalidate_on_pushed_finish,
        }
    }
}

/// Defaults, then `client.toml` in the working directory, then the environment.
pub fn load_settings() -> ClientSettings {
    load_settings_from(Path::new(DEFAULT_CONFIG_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    config_file: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(config_file) {
        match toml::from_str::<HashMap<String, String>>(&raw) {
            Ok(file_cfg) => apply_file(&mut settings, &file_cfg),
            Err(err) => warn!(
                path = %config_file.display(),
                error = %err,
                "ignoring unreadable client config"
            ),
        }
    }

    apply_env(&mut settings, env);
    settings
}

fn apply_file(settings: &mut ClientSettings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("backend_url") {
        settings.backend_url = v.clone();
    }
    if let Some(v) = file_cfg.get("page_size") {
        set_page_size(settings, v);
    }
    if let Some(v) = file_cfg.get("notification_ttl_ms") {
        set_millis(&mut settings.notification_ttl, "notification_ttl_ms", v);
    }
    if let Some(v) = file_cfg.get("push_retry_ms") {
        set_millis(&mut settings.push_retry_delay, "push_retry_ms", v);
    }
    if let Some(v) = file_cfg.get("invalidate_on_pushed_finish") {
        set_flag(settings, v);
    }
}

fn apply_env(settings: &mut ClientSettings, env: impl Fn(&str) -> Option<String>) {
    if let Some(v) = env("BACKEND_URL") {
        settings.backend_url = v;
    }
    if let Some(v) = env("APP__BACKEND_URL") {
        settings.backend_url = v;
    }

    if let Some(v) = env("APP__PAGE_SIZE") {
        set_page_size(settings, &v);
    }

    if let Some(v) = env("APP__NOTIFICATION_TTL_MS") {
        set_millis(&mut settings.notification_ttl, "APP__NOTIFICATION_TTL_MS", &v);
    }

    if let Some(v) = env("APP__PUSH_RETRY_MS") {
        set_millis(&mut settings.push_retry_delay, "APP__PUSH_RETRY_MS", &v);
    }

    if let Some(v) = env("APP__INVALIDATE_ON_PUSHED_FINISH") {
        set_flag(settings, &v);
    }
}

fn set_page_size(settings: &mut ClientSettings, raw: &str) {
    match raw.trim().parse::<usize>() {
        Ok(parsed) if parsed > 0 => settings.page_size = parsed,
        _ => warn!(value = raw, "ignoring invalid page size"),
    }
}

fn set_millis(target: &mut Duration, key: &str, raw: &str) {
    match raw.trim().parse::<u64>() {
        Ok(parsed) => *target = Duration::from_millis(parsed),
        Err(_) => warn!(key, value = raw, "ignoring invalid duration"),
    }
}

fn set_flag(settings: &mut ClientSettings, raw: &str) {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => settings.invalidate_on_pushed_finish = true,
        "0" | "false" | "no" => settings.invalidate_on_pushed_finish = false,
        _ => warn!(value = raw, "ignoring invalid invalidate_on_pushed_finish"),
    }
}
