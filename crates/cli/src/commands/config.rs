use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use salesgate_core::config::{AppConfig, LoadOptions};
use toml::Value;

use crate::commands::CommandResult;

struct Field<'a> {
    key_path: &'static str,
    value: String,
    env_keys: &'a [&'static str],
}

/// Effective configuration with the source each value came from.
pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let fields = [
        Field {
            key_path: "database.url",
            value: config.database.url.clone(),
            env_keys: &["SALESGATE_DATABASE_URL"],
        },
        Field {
            key_path: "database.max_connections",
            value: config.database.max_connections.to_string(),
            env_keys: &["SALESGATE_DATABASE_MAX_CONNECTIONS"],
        },
        Field {
            key_path: "database.timeout_secs",
            value: config.database.timeout_secs.to_string(),
            env_keys: &["SALESGATE_DATABASE_TIMEOUT_SECS"],
        },
        Field {
            key_path: "company.currency",
            value: config.company.currency.clone(),
            env_keys: &["SALESGATE_COMPANY_CURRENCY"],
        },
        Field {
            key_path: "approval.sequence_code",
            value: config.approval.sequence_code.clone(),
            env_keys: &[],
        },
        Field {
            key_path: "approval.sequence_prefix",
            value: config.approval.sequence_prefix.clone(),
            env_keys: &["SALESGATE_APPROVAL_SEQUENCE_PREFIX"],
        },
        Field {
            key_path: "approval.sequence_padding",
            value: config.approval.sequence_padding.to_string(),
            env_keys: &["SALESGATE_APPROVAL_SEQUENCE_PADDING"],
        },
        Field {
            key_path: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["SALESGATE_LOGGING_LEVEL", "SALESGATE_LOG_LEVEL"],
        },
        Field {
            key_path: "logging.format",
            value: format!("{:?}", config.logging.format).to_ascii_lowercase(),
            env_keys: &["SALESGATE_LOGGING_FORMAT", "SALESGATE_LOG_FORMAT"],
        },
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(fields.iter().map(|field| {
        render_line(
            field.key_path,
            &field.value,
            field_source(
                field.key_path,
                field.env_keys,
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        )
    }));

    CommandResult::success("config", lines.join("\n"))
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("salesgate.toml"), PathBuf::from("config/salesgate.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let from_env = env_keys
        .iter()
        .find(|key| env::var(key).map(|value| !value.trim().is_empty()).unwrap_or(false));
    if let Some(env_key) = from_env {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
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

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
