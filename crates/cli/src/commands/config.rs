use std::env;
use std::fs;
use std::path::Path;

use cotiza_core::config::{resolve_config_path, AppConfig, LoadOptions, LogFormat};
use toml::Value;

struct Field {
    key_path: &'static str,
    env_keys: &'static [&'static str],
    flag: Option<&'static str>,
    value: String,
}

pub fn run(options: LoadOptions) -> String {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let overrides = &options.overrides;

    let fields = [
        Field {
            key_path: "engine.currency",
            env_keys: &["COTIZA_ENGINE_CURRENCY"],
            flag: overrides.currency.is_some().then_some("--currency"),
            value: config.engine.currency.clone(),
        },
        Field {
            key_path: "engine.catalog_dir",
            env_keys: &["COTIZA_ENGINE_CATALOG_DIR"],
            flag: overrides.catalog_dir.is_some().then_some("--catalog-dir"),
            value: config
                .engine
                .catalog_dir
                .as_ref()
                .map(|dir| dir.display().to_string())
                .unwrap_or_else(|| "<builtin only>".to_string()),
        },
        Field {
            key_path: "logging.level",
            env_keys: &["COTIZA_LOGGING_LEVEL", "COTIZA_LOG_LEVEL"],
            flag: overrides.log_level.is_some().then_some("override"),
            value: config.logging.level.clone(),
        },
        Field {
            key_path: "logging.format",
            env_keys: &["COTIZA_LOGGING_FORMAT", "COTIZA_LOG_FORMAT"],
            flag: overrides.log_format.is_some().then_some("override"),
            value: render_format(config.logging.format).to_string(),
        },
    ];

    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    for field in &fields {
        let source = field_source(field, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(format!("- {} = {} (source: {source})", field.key_path, field.value));
    }

    lines.join("\n")
}

fn render_format(format: LogFormat) -> &'static str {
    match format {
        LogFormat::Compact => "compact",
        LogFormat::Pretty => "pretty",
        LogFormat::Json => "json",
    }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    field: &Field,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(flag) = field.flag {
        return format!("flag ({flag})");
    }

    let env_key = field
        .env_keys
        .iter()
        .find(|key| env::var(key).is_ok_and(|value| !value.trim().is_empty()));
    if let Some(env_key) = env_key {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, field.key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}
