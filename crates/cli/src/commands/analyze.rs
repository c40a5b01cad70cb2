use stockpilot_core::association::AssociationMethod;
use stockpilot_core::config::ConfigOverrides;
use stockpilot_core::engine::MerchandisingEngine;
use stockpilot_core::errors::ApplicationError;

use crate::commands::{load_config, load_transactions, resolve_as_of, CommandResult};
use crate::AnalyzeArgs;

const COMMAND: &str = "analyze";

pub fn run(args: &AnalyzeArgs) -> CommandResult {
    match execute(args) {
        Ok(result) => result,
        Err(error) => CommandResult::from_error(COMMAND, &error),
    }
}

fn execute(args: &AnalyzeArgs) -> Result<CommandResult, ApplicationError> {
    let association_method = args
        .method
        .as_deref()
        .map(str::parse::<AssociationMethod>)
        .transpose()
        .map_err(ApplicationError::Configuration)?;
    let overrides =
        ConfigOverrides { association_method, window_months: args.window_months, ..ConfigOverrides::default() };

    let config = load_config(args.config.clone(), overrides)?;
    let transactions = load_transactions(&args.input)?;
    let as_of = resolve_as_of(args.as_of);

    let report = MerchandisingEngine::new(config).analyze_raw(&transactions, as_of)?;
    Ok(CommandResult::report(COMMAND, &report))
}
