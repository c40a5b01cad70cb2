use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::abc::{AbcProfile, AbcThresholds};
use crate::association::{AssociationMethod, BasketConfig, SIGNIFICANT_CORRELATION_N12};
use crate::kits::KitConfig;
use crate::series::WindowAnchor;
use crate::stock::{MomentumConfig, SafetyConfig, SafetyThreshold, StockMultipliers};

#[derive(Clone, Debug, PartialEq)]
pub struct AnalyticsConfig {
    pub abc: AbcThresholds,
    pub window: WindowConfig,
    pub association: AssociationConfig,
    pub kits: KitConfig,
    pub safety: SafetyConfig,
    pub momentum: MomentumConfig,
    pub stock_multipliers: StockMultipliers,
    pub sku_flags: SkuFlagConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WindowConfig {
    pub months: u32,
    pub anchor: AnchorKind,
    pub calendar_year: Option<i32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AssociationConfig {
    pub method: AssociationMethod,
    pub correlation_threshold: f64,
    pub basket: BasketConfig,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SkuFlagConfig {
    /// Share of SKUs (by rank) flagged as best sellers.
    pub best_seller_percent: f64,
    /// Share of SKUs (by rank) flagged as visible.
    pub visible_percent: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorKind {
    /// Window ends at the month of the most recent dated record.
    LatestRecord,
    /// Window ends at the month of the caller-supplied reference date.
    AsOf,
    /// Twelve calendar months of `window.calendar_year`.
    CalendarYear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub abc_profile: Option<AbcProfile>,
    pub window_months: Option<u32>,
    pub association_method: Option<AssociationMethod>,
    pub correlation_threshold: Option<f64>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            abc: AbcThresholds::STANDARD,
            window: WindowConfig { months: 12, anchor: AnchorKind::LatestRecord, calendar_year: None },
            association: AssociationConfig {
                method: AssociationMethod::Auto,
                correlation_threshold: SIGNIFICANT_CORRELATION_N12,
                basket: BasketConfig::default(),
            },
            kits: KitConfig::default(),
            safety: SafetyConfig::default(),
            momentum: MomentumConfig::default(),
            stock_multipliers: StockMultipliers::default(),
            sku_flags: SkuFlagConfig { best_seller_percent: 20.0, visible_percent: 80.0 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl std::str::FromStr for AnchorKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "latest_record" => Ok(Self::LatestRecord),
            "as_of" | "now" => Ok(Self::AsOf),
            "calendar_year" => Ok(Self::CalendarYear),
            other => Err(ConfigError::Validation(format!(
                "unsupported window anchor `{other}` (expected latest_record|as_of|calendar_year)"
            ))),
        }
    }
}

impl WindowConfig {
    /// Resolve the configured anchor against the caller's reference date.
    pub fn anchor(&self, as_of: NaiveDate) -> WindowAnchor {
        match self.anchor {
            AnchorKind::LatestRecord => WindowAnchor::LatestRecord { fallback: as_of },
            AnchorKind::AsOf => WindowAnchor::EndingAt(as_of),
            AnchorKind::CalendarYear => {
                WindowAnchor::CalendarYear(self.calendar_year.unwrap_or_else(|| as_of.year()))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.months as usize
    }

    pub fn is_empty(&self) -> bool {
        self.months == 0
    }
}

impl AnalyticsConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("stockpilot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(abc) = patch.abc {
            if let Some(profile) = abc.profile {
                self.abc = AbcThresholds::from_profile(profile);
            }
            if let Some(shares) = abc.shares {
                self.abc = AbcThresholds::from_shares(shares.a, shares.b, shares.c)
                    .map_err(ConfigError::Validation)?;
            }
            if let Some(class_a_boundary) = abc.class_a_boundary {
                self.abc.class_a_boundary = class_a_boundary;
            }
            if let Some(class_b_boundary) = abc.class_b_boundary {
                self.abc.class_b_boundary = class_b_boundary;
            }
        }

        if let Some(window) = patch.window {
            if let Some(months) = window.months {
                self.window.months = months;
            }
            if let Some(anchor) = window.anchor {
                self.window.anchor = anchor;
            }
            if let Some(calendar_year) = window.calendar_year {
                self.window.calendar_year = Some(calendar_year);
            }
        }

        if let Some(association) = patch.association {
            if let Some(method) = association.method {
                self.association.method = method;
            }
            if let Some(correlation_threshold) = association.correlation_threshold {
                self.association.correlation_threshold = correlation_threshold;
            }
            if let Some(min_support) = association.min_support {
                self.association.basket.min_support = min_support;
            }
            if let Some(min_confidence) = association.min_confidence {
                self.association.basket.min_confidence = min_confidence;
            }
            if let Some(min_lift) = association.min_lift {
                self.association.basket.min_lift = min_lift;
            }
            if let Some(rules_per_sku) = association.rules_per_sku {
                self.association.basket.rules_per_sku = rules_per_sku;
            }
        }

        if let Some(kits) = patch.kits {
            if let Some(pool_size) = kits.pool_size {
                self.kits.pool_size = pool_size;
            }
            if let Some(max_pair_evaluations) = kits.max_pair_evaluations {
                self.kits.max_pair_evaluations = max_pair_evaluations;
            }
            if let Some(top_k) = kits.top_k {
                self.kits.top_k = top_k;
            }
            if let Some(versatile_top_k) = kits.versatile_top_k {
                self.kits.versatile_top_k = versatile_top_k;
            }
            if let Some(base_stock_multiplier) = kits.base_stock_multiplier {
                self.kits.base_stock_multiplier = base_stock_multiplier;
            }
        }

        if let Some(safety) = patch.safety {
            if let Some(trailing_months) = safety.trailing_months {
                self.safety.trailing_months = trailing_months;
            }
            if let Some(percentile) = safety.percentile {
                self.safety.threshold = SafetyThreshold::AutoPercentile(percentile);
            }
            if let Some(fixed_threshold) = safety.fixed_threshold {
                self.safety.threshold = SafetyThreshold::Fixed(fixed_threshold);
            }
            if let Some(safe_multiplier) = safety.safe_multiplier {
                self.safety.safe_multiplier = safe_multiplier;
            }
            if let Some(conservative_multiplier) = safety.conservative_multiplier {
                self.safety.conservative_multiplier = conservative_multiplier;
            }
        }

        if let Some(momentum) = patch.momentum {
            if let Some(alpha) = momentum.alpha {
                self.momentum.alpha = alpha;
            }
            if let Some(max_adjustment) = momentum.max_adjustment {
                self.momentum.max_adjustment = max_adjustment;
            }
        }

        if let Some(multipliers) = patch.stock_multipliers {
            if let Some(a) = multipliers.a {
                self.stock_multipliers.a = a;
            }
            if let Some(b) = multipliers.b {
                self.stock_multipliers.b = b;
            }
            if let Some(c) = multipliers.c {
                self.stock_multipliers.c = c;
            }
        }

        if let Some(flags) = patch.sku_flags {
            if let Some(best_seller_percent) = flags.best_seller_percent {
                self.sku_flags.best_seller_percent = best_seller_percent;
            }
            if let Some(visible_percent) = flags.visible_percent {
                self.sku_flags.visible_percent = visible_percent;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("STOCKPILOT_ABC_PROFILE") {
            self.abc = AbcThresholds::from_profile(value.parse().map_err(|_| {
                ConfigError::InvalidEnvOverride { key: "STOCKPILOT_ABC_PROFILE".to_string(), value }
            })?);
        }
        if let Some(value) = read_env("STOCKPILOT_ABC_CLASS_A_BOUNDARY") {
            self.abc.class_a_boundary = parse_f64("STOCKPILOT_ABC_CLASS_A_BOUNDARY", &value)?;
        }
        if let Some(value) = read_env("STOCKPILOT_ABC_CLASS_B_BOUNDARY") {
            self.abc.class_b_boundary = parse_f64("STOCKPILOT_ABC_CLASS_B_BOUNDARY", &value)?;
        }

        if let Some(value) = read_env("STOCKPILOT_WINDOW_MONTHS") {
            self.window.months = parse_u32("STOCKPILOT_WINDOW_MONTHS", &value)?;
        }
        if let Some(value) = read_env("STOCKPILOT_WINDOW_ANCHOR") {
            self.window.anchor = value.parse()?;
        }
        if let Some(value) = read_env("STOCKPILOT_WINDOW_CALENDAR_YEAR") {
            self.window.calendar_year = Some(parse_i32("STOCKPILOT_WINDOW_CALENDAR_YEAR", &value)?);
        }

        if let Some(value) = read_env("STOCKPILOT_ASSOCIATION_METHOD") {
            self.association.method = value.parse().map_err(|_| {
                ConfigError::InvalidEnvOverride {
                    key: "STOCKPILOT_ASSOCIATION_METHOD".to_string(),
                    value: value.clone(),
                }
            })?;
        }
        if let Some(value) = read_env("STOCKPILOT_CORRELATION_THRESHOLD") {
            self.association.correlation_threshold =
                parse_f64("STOCKPILOT_CORRELATION_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("STOCKPILOT_BASKET_MIN_SUPPORT") {
            self.association.basket.min_support = parse_f64("STOCKPILOT_BASKET_MIN_SUPPORT", &value)?;
        }
        if let Some(value) = read_env("STOCKPILOT_BASKET_MIN_CONFIDENCE") {
            self.association.basket.min_confidence =
                parse_f64("STOCKPILOT_BASKET_MIN_CONFIDENCE", &value)?;
        }
        if let Some(value) = read_env("STOCKPILOT_BASKET_MIN_LIFT") {
            self.association.basket.min_lift = parse_f64("STOCKPILOT_BASKET_MIN_LIFT", &value)?;
        }

        if let Some(value) = read_env("STOCKPILOT_KITS_TOP_K") {
            self.kits.top_k = parse_usize("STOCKPILOT_KITS_TOP_K", &value)?;
        }
        if let Some(value) = read_env("STOCKPILOT_KITS_POOL_SIZE") {
            self.kits.pool_size = parse_usize("STOCKPILOT_KITS_POOL_SIZE", &value)?;
        }

        if let Some(value) = read_env("STOCKPILOT_SAFETY_THRESHOLD") {
            self.safety.threshold = value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "STOCKPILOT_SAFETY_THRESHOLD".to_string(),
                value: value.clone(),
            })?;
        }

        if let Some(value) = read_env("STOCKPILOT_MOMENTUM_ALPHA") {
            self.momentum.alpha = parse_f64("STOCKPILOT_MOMENTUM_ALPHA", &value)?;
        }

        let log_level =
            read_env("STOCKPILOT_LOGGING_LEVEL").or_else(|| read_env("STOCKPILOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("STOCKPILOT_LOGGING_FORMAT").or_else(|| read_env("STOCKPILOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(profile) = overrides.abc_profile {
            self.abc = AbcThresholds::from_profile(profile);
        }
        if let Some(window_months) = overrides.window_months {
            self.window.months = window_months;
        }
        if let Some(method) = overrides.association_method {
            self.association.method = method;
        }
        if let Some(correlation_threshold) = overrides.correlation_threshold {
            self.association.correlation_threshold = correlation_threshold;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.abc.validate().map_err(ConfigError::Validation)?;
        validate_window(&self.window)?;
        validate_association(&self.association)?;
        validate_kits(&self.kits)?;
        validate_safety(&self.safety, &self.window)?;
        validate_momentum(&self.momentum)?;
        validate_stock_multipliers(&self.stock_multipliers)?;
        validate_sku_flags(&self.sku_flags)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("stockpilot.toml"), PathBuf::from("config/stockpilot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_window(window: &WindowConfig) -> Result<(), ConfigError> {
    if window.months == 0 || window.months > 120 {
        return Err(ConfigError::Validation("window.months must be in range 1..=120".to_string()));
    }

    if window.anchor == AnchorKind::CalendarYear && window.months != 12 {
        return Err(ConfigError::Validation(
            "window.months must be 12 when window.anchor is calendar_year".to_string(),
        ));
    }

    Ok(())
}

fn validate_association(association: &AssociationConfig) -> Result<(), ConfigError> {
    let threshold = association.correlation_threshold;
    if !(threshold > 0.0 && threshold <= 1.0) {
        return Err(ConfigError::Validation(
            "association.correlation_threshold must be in range (0, 1]".to_string(),
        ));
    }

    let basket = &association.basket;
    if !(0.0..=1.0).contains(&basket.min_support) {
        return Err(ConfigError::Validation(
            "association.min_support must be in range 0..=1".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&basket.min_confidence) {
        return Err(ConfigError::Validation(
            "association.min_confidence must be in range 0..=1".to_string(),
        ));
    }
    if !(basket.min_lift >= 0.0) {
        return Err(ConfigError::Validation(
            "association.min_lift must not be negative".to_string(),
        ));
    }
    if basket.rules_per_sku == 0 {
        return Err(ConfigError::Validation(
            "association.rules_per_sku must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_kits(kits: &KitConfig) -> Result<(), ConfigError> {
    if kits.pool_size == 0 || kits.max_pair_evaluations == 0 {
        return Err(ConfigError::Validation(
            "kits.pool_size and kits.max_pair_evaluations must be greater than zero".to_string(),
        ));
    }
    if kits.top_k == 0 || kits.versatile_top_k == 0 {
        return Err(ConfigError::Validation(
            "kits.top_k and kits.versatile_top_k must be greater than zero".to_string(),
        ));
    }
    if !(kits.base_stock_multiplier > 0.0) {
        return Err(ConfigError::Validation(
            "kits.base_stock_multiplier must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_safety(safety: &SafetyConfig, window: &WindowConfig) -> Result<(), ConfigError> {
    if safety.trailing_months == 0 || safety.trailing_months > window.months {
        return Err(ConfigError::Validation(
            "safety.trailing_months must be in range 1..=window.months".to_string(),
        ));
    }

    match safety.threshold {
        SafetyThreshold::Fixed(value) if !(value >= 0.0) => {
            return Err(ConfigError::Validation(
                "safety.fixed_threshold must not be negative".to_string(),
            ));
        }
        SafetyThreshold::AutoPercentile(percentile) if !(0.0..=100.0).contains(&percentile) => {
            return Err(ConfigError::Validation(
                "safety.percentile must be in range 0..=100".to_string(),
            ));
        }
        _ => {}
    }

    if !(safety.conservative_multiplier > 0.0) || safety.safe_multiplier < safety.conservative_multiplier
    {
        return Err(ConfigError::Validation(
            "safety multipliers must be positive and safe_multiplier >= conservative_multiplier"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_momentum(momentum: &MomentumConfig) -> Result<(), ConfigError> {
    if !(momentum.alpha >= 0.0) {
        return Err(ConfigError::Validation("momentum.alpha must not be negative".to_string()));
    }
    if !(0.0..=1.0).contains(&momentum.max_adjustment) {
        return Err(ConfigError::Validation(
            "momentum.max_adjustment must be in range 0..=1".to_string(),
        ));
    }
    Ok(())
}

fn validate_stock_multipliers(multipliers: &StockMultipliers) -> Result<(), ConfigError> {
    let all_positive = [multipliers.a, multipliers.b, multipliers.c].iter().all(|value| *value > 0.0);
    if !all_positive {
        return Err(ConfigError::Validation(
            "stock_multipliers.a, .b and .c must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_sku_flags(flags: &SkuFlagConfig) -> Result<(), ConfigError> {
    let in_range = |value: f64| value > 0.0 && value <= 100.0;
    if !in_range(flags.best_seller_percent) || !in_range(flags.visible_percent) {
        return Err(ConfigError::Validation(
            "sku_flags percentages must be in range (0, 100]".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_i32(key: &str, value: &str) -> Result<i32, ConfigError> {
    value.trim().parse::<i32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    abc: Option<AbcPatch>,
    window: Option<WindowPatch>,
    association: Option<AssociationPatch>,
    kits: Option<KitsPatch>,
    safety: Option<SafetyPatch>,
    momentum: Option<MomentumPatch>,
    stock_multipliers: Option<StockMultipliersPatch>,
    sku_flags: Option<SkuFlagsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct AbcPatch {
    profile: Option<AbcProfile>,
    shares: Option<AbcSharesPatch>,
    class_a_boundary: Option<f64>,
    class_b_boundary: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct AbcSharesPatch {
    a: f64,
    b: f64,
    c: f64,
}

#[derive(Debug, Default, Deserialize)]
struct WindowPatch {
    months: Option<u32>,
    anchor: Option<AnchorKind>,
    calendar_year: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct AssociationPatch {
    method: Option<AssociationMethod>,
    correlation_threshold: Option<f64>,
    min_support: Option<f64>,
    min_confidence: Option<f64>,
    min_lift: Option<f64>,
    rules_per_sku: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct KitsPatch {
    pool_size: Option<usize>,
    max_pair_evaluations: Option<usize>,
    top_k: Option<usize>,
    versatile_top_k: Option<usize>,
    base_stock_multiplier: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct SafetyPatch {
    trailing_months: Option<u32>,
    percentile: Option<f64>,
    fixed_threshold: Option<f64>,
    safe_multiplier: Option<f64>,
    conservative_multiplier: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct MomentumPatch {
    alpha: Option<f64>,
    max_adjustment: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct StockMultipliersPatch {
    a: Option<f64>,
    b: Option<f64>,
    c: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct SkuFlagsPatch {
    best_seller_percent: Option<f64>,
    visible_percent: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AnalyticsConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
    use crate::abc::{AbcProfile, AbcThresholds};
    use crate::stock::SafetyThreshold;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_validate() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AnalyticsConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.abc == AbcThresholds::STANDARD, "default abc profile should be 80/95")?;
        ensure(config.window.months == 12, "default window should be 12 months")?;
        ensure(
            matches!(config.safety.threshold, SafetyThreshold::AutoPercentile(p) if p == 75.0),
            "default safety threshold should be the 75th percentile",
        )?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }

    #[test]
    fn file_load_supports_profiles_and_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_STOCKPILOT_THRESHOLD", "0.7");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("stockpilot.toml");
            fs::write(
                &path,
                r#"
[abc]
profile = "concentrated"

[association]
correlation_threshold = ${TEST_STOCKPILOT_THRESHOLD}

[safety]
fixed_threshold = 40.0
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AnalyticsConfig::load(LoadOptions {
                config_path: Some(path),
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.abc == AbcThresholds::CONCENTRATED, "profile should switch to 20/50")?;
            ensure(
                (config.association.correlation_threshold - 0.7).abs() < 1e-12,
                "threshold should be interpolated from environment",
            )?;
            ensure(
                config.safety.threshold == SafetyThreshold::Fixed(40.0),
                "fixed safety threshold should be loaded",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_STOCKPILOT_THRESHOLD"]);
        result
    }

    #[test]
    fn class_shares_are_converted_to_boundaries() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("stockpilot.toml");
        fs::write(&path, "[abc.shares]\na = 70\nb = 20\nc = 10\n").map_err(|err| err.to_string())?;

        let config =
            AnalyticsConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.abc.class_a_boundary == 70.0, "class a boundary should be 70")?;
        ensure(config.abc.class_b_boundary == 90.0, "class b boundary should be 90")
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("STOCKPILOT_WINDOW_MONTHS", "6");
        env::set_var("STOCKPILOT_LOG_LEVEL", "warn");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("stockpilot.toml");
            fs::write(
                &path,
                r#"
[window]
months = 9

[association]
correlation_threshold = 0.8

[logging]
level = "debug"
format = "json"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AnalyticsConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    correlation_threshold: Some(0.65),
                    abc_profile: Some(AbcProfile::Concentrated),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.window.months == 6, "env window should win over file")?;
            ensure(config.logging.level == "warn", "env log level should win over file")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "file log format should win over default",
            )?;
            ensure(
                (config.association.correlation_threshold - 0.65).abs() < 1e-12,
                "override threshold should win",
            )?;
            ensure(config.abc == AbcThresholds::CONCENTRATED, "override profile should win")?;
            Ok(())
        })();

        clear_vars(&["STOCKPILOT_WINDOW_MONTHS", "STOCKPILOT_LOG_LEVEL"]);
        result
    }

    #[test]
    fn thresholds_that_do_not_partition_fail_validation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("STOCKPILOT_ABC_CLASS_A_BOUNDARY", "97");

        let result = (|| -> Result<(), String> {
            let error = match AnalyticsConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("class_a_boundary")
            );
            ensure(has_message, "validation failure should mention class_a_boundary")
        })();

        clear_vars(&["STOCKPILOT_ABC_CLASS_A_BOUNDARY"]);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("STOCKPILOT_MOMENTUM_ALPHA", "fast");

        let result = (|| -> Result<(), String> {
            let error = AnalyticsConfig::load(LoadOptions::default())
                .err()
                .ok_or_else(|| "expected env override failure".to_string())?;
            ensure(
                matches!(error, ConfigError::InvalidEnvOverride { ref key, .. } if key == "STOCKPILOT_MOMENTUM_ALPHA"),
                "error should name the offending variable",
            )
        })();

        clear_vars(&["STOCKPILOT_MOMENTUM_ALPHA"]);
        result
    }

    #[test]
    fn zero_window_is_rejected() {
        let mut config = AnalyticsConfig::default();
        config.window.months = 0;

        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn trailing_window_cannot_exceed_analysis_window() {
        let mut config = AnalyticsConfig::default();
        config.window.months = 3;
        config.safety.trailing_months = 4;

        let error = config.validate().err().map(|error| error.to_string()).unwrap_or_default();
        assert!(error.contains("safety.trailing_months"));
    }

    #[test]
    fn missing_required_file_is_reported() {
        let error = AnalyticsConfig::load(LoadOptions {
            config_path: Some("/definitely/not/here/stockpilot.toml".into()),
            require_file: true,
            ..LoadOptions::default()
        });

        assert!(matches!(error, Err(ConfigError::MissingConfigFile(_))));
    }
}
