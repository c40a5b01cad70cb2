use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use stockpilot_core::config::{AnalyticsConfig, LoadOptions};
use toml::Value;

use crate::commands::CommandResult;

const COMMAND: &str = "config";

pub fn run(config_path: Option<&Path>) -> CommandResult {
    let options = LoadOptions {
        config_path: config_path.map(Path::to_path_buf),
        require_file: config_path.is_some(),
        ..LoadOptions::default()
    };
    let config = match AnalyticsConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let config_file_path = config_path.map(Path::to_path_buf).or_else(detect_config_path);
    let doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines =
        vec!["effective config (source precedence: override > env > file > default):".to_string()];

    lines.push(render_line(
        "abc.class_a_boundary",
        &config.abc.class_a_boundary.to_string(),
        source("abc.class_a_boundary", &["STOCKPILOT_ABC_CLASS_A_BOUNDARY", "STOCKPILOT_ABC_PROFILE"]),
    ));
    lines.push(render_line(
        "abc.class_b_boundary",
        &config.abc.class_b_boundary.to_string(),
        source("abc.class_b_boundary", &["STOCKPILOT_ABC_CLASS_B_BOUNDARY", "STOCKPILOT_ABC_PROFILE"]),
    ));

    lines.push(render_line(
        "window.months",
        &config.window.months.to_string(),
        source("window.months", &["STOCKPILOT_WINDOW_MONTHS"]),
    ));
    lines.push(render_line(
        "window.anchor",
        &format!("{:?}", config.window.anchor),
        source("window.anchor", &["STOCKPILOT_WINDOW_ANCHOR"]),
    ));
    lines.push(render_line(
        "window.calendar_year",
        &config.window.calendar_year.map(|year| year.to_string()).unwrap_or_else(|| "<unset>".to_string()),
        source("window.calendar_year", &["STOCKPILOT_WINDOW_CALENDAR_YEAR"]),
    ));

    lines.push(render_line(
        "association.method",
        config.association.method.as_str(),
        source("association.method", &["STOCKPILOT_ASSOCIATION_METHOD"]),
    ));
    lines.push(render_line(
        "association.correlation_threshold",
        &config.association.correlation_threshold.to_string(),
        source("association.correlation_threshold", &["STOCKPILOT_CORRELATION_THRESHOLD"]),
    ));
    lines.push(render_line(
        "association.min_support",
        &config.association.basket.min_support.to_string(),
        source("association.min_support", &["STOCKPILOT_BASKET_MIN_SUPPORT"]),
    ));
    lines.push(render_line(
        "association.min_confidence",
        &config.association.basket.min_confidence.to_string(),
        source("association.min_confidence", &["STOCKPILOT_BASKET_MIN_CONFIDENCE"]),
    ));
    lines.push(render_line(
        "association.min_lift",
        &config.association.basket.min_lift.to_string(),
        source("association.min_lift", &["STOCKPILOT_BASKET_MIN_LIFT"]),
    ));

    lines.push(render_line(
        "kits.pool_size",
        &config.kits.pool_size.to_string(),
        source("kits.pool_size", &["STOCKPILOT_KITS_POOL_SIZE"]),
    ));
    lines.push(render_line(
        "kits.top_k",
        &config.kits.top_k.to_string(),
        source("kits.top_k", &["STOCKPILOT_KITS_TOP_K"]),
    ));
    lines.push(render_line(
        "kits.max_pair_evaluations",
        &config.kits.max_pair_evaluations.to_string(),
        source("kits.max_pair_evaluations", &[]),
    ));

    lines.push(render_line(
        "safety.trailing_months",
        &config.safety.trailing_months.to_string(),
        source("safety.trailing_months", &[]),
    ));
    let threshold_source = if doc.as_ref().is_some_and(|doc| contains_path(doc, "safety.fixed_threshold")) {
        source("safety.fixed_threshold", &["STOCKPILOT_SAFETY_THRESHOLD"])
    } else {
        source("safety.percentile", &["STOCKPILOT_SAFETY_THRESHOLD"])
    };
    lines.push(render_line("safety.threshold", &config.safety.threshold.to_string(), threshold_source));

    lines.push(render_line(
        "momentum.alpha",
        &config.momentum.alpha.to_string(),
        source("momentum.alpha", &["STOCKPILOT_MOMENTUM_ALPHA"]),
    ));
    lines.push(render_line(
        "momentum.max_adjustment",
        &config.momentum.max_adjustment.to_string(),
        source("momentum.max_adjustment", &[]),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["STOCKPILOT_LOGGING_LEVEL", "STOCKPILOT_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", &["STOCKPILOT_LOGGING_FORMAT", "STOCKPILOT_LOG_FORMAT"]),
    ));

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn detect_config_path() -> Option<PathBuf> {
    ["stockpilot.toml", "config/stockpilot.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
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
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_paths_are_found_in_toml_documents() {
        let doc: Value = "[kits]\ntop_k = 5\n".parse().unwrap();
        assert!(contains_path(&doc, "kits.top_k"));
        assert!(!contains_path(&doc, "kits.pool_size"));
        assert!(!contains_path(&doc, "safety.trailing_months"));
    }

    #[test]
    fn file_source_names_the_file() {
        let doc: Value = "[momentum]\nalpha = 0.2\n".parse().unwrap();
        let source =
            field_source("momentum.alpha", &[], Some(&doc), Some(Path::new("conf/stockpilot.toml")));
        assert_eq!(source, "file (conf/stockpilot.toml)");
        assert_eq!(field_source("momentum.alpha", &[], None, None), "default");
    }
}
