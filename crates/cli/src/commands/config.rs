use std::env;
use std::path::{Path, PathBuf};

use quotecalc_core::config::{AppConfig, LoadOptions};

/// Print effective configuration values with a best-effort source tag per
/// field (env beats file beats default).
pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file = detect_config_path();
    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        field_source("QUOTECALC_DATABASE_URL", config_file.as_deref()),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        field_source("QUOTECALC_DATABASE_MAX_CONNECTIONS", config_file.as_deref()),
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        field_source("QUOTECALC_DATABASE_TIMEOUT_SECS", config_file.as_deref()),
    ));
    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        field_source("QUOTECALC_LOG_LEVEL", config_file.as_deref()),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format).to_lowercase(),
        field_source("QUOTECALC_LOG_FORMAT", config_file.as_deref()),
    ));

    lines.join("\n")
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("  {key} = {value}  ({source})")
}

fn field_source(env_key: &str, config_file: Option<&Path>) -> String {
    if env::var(env_key).map(|value| !value.trim().is_empty()).unwrap_or(false) {
        return format!("env:{env_key}");
    }
    if let Some(path) = config_file {
        return format!("file:{}", path.display());
    }
    "default".to_string()
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("quotecalc.toml"), PathBuf::from("config/quotecalc.toml")]
        .into_iter()
        .find(|path| path.exists())
}
