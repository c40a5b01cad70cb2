use stockpilot_core::config::ConfigOverrides;
use stockpilot_core::engine::MerchandisingEngine;
use stockpilot_core::errors::ApplicationError;
use stockpilot_core::normalize::RecordNormalizer;

use crate::commands::{load_config, load_transactions, resolve_as_of, CommandResult};
use crate::KitsArgs;

const COMMAND: &str = "kits";

pub fn run(args: &KitsArgs) -> CommandResult {
    match execute(args) {
        Ok(result) => result,
        Err(error) => CommandResult::from_error(COMMAND, &error),
    }
}

fn execute(args: &KitsArgs) -> Result<CommandResult, ApplicationError> {
    if let Some(threshold) = args.threshold {
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(ApplicationError::Configuration(format!(
                "--threshold must be in range -1..=1 (got {threshold})"
            )));
        }
    }

    let config = load_config(args.config.clone(), ConfigOverrides::default())?;
    let transactions = load_transactions(&args.input)?;
    let as_of = resolve_as_of(args.as_of);

    let records = RecordNormalizer::new().normalize_all(&transactions);
    let kits = MerchandisingEngine::new(config).recommend_kits(&records, as_of, args.threshold);
    Ok(CommandResult::report(COMMAND, &kits))
}
