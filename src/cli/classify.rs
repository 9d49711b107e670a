use crate::classifier::classify;
use crate::cli::ClassifyArgs;
use crate::config::Config;
use crate::discovery::PathRelevanceFilter;
use crate::parser::{ResultBlobParser, ResultSet};
use serde_json::json;
use std::path::Path;
use tracing::{error, warn};

pub fn execute(args: ClassifyArgs) -> anyhow::Result<()> {
    let config = Config::load_or_default(&args.config)?;
    let filter = PathRelevanceFilter::from_config(&config.relevance)?;
    let parser = ResultBlobParser::from_config(&config.parser, filter);

    let with_change = load(&parser, &args.with_change)?;
    let repeat_with = args
        .repeat_with_change
        .as_deref()
        .map(|p| load(&parser, p))
        .transpose()?;
    let repeat_without = args
        .repeat_without_change
        .as_deref()
        .map(|p| load(&parser, p))
        .transpose()?;
    let clean_tree = args
        .clean_tree
        .as_deref()
        .map(|p| load(&parser, p))
        .transpose()?;

    let classification = classify(
        &with_change,
        clean_tree.as_ref(),
        repeat_with.as_ref(),
        repeat_without.as_ref(),
    )?;
    let verdict = classification.verdict();

    if classification.lacks_clean_majority() {
        warn!(
            "{} reproduced vs {} unreproduced failures; too many flaky failures for a clean signal",
            classification.reproduced, classification.unreproduced
        );
    }

    let output = json!({
        "verdict": verdict,
        "classification": classification,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    if verdict.is_blocking() {
        error!("Classification found new failures: {}", verdict);
        std::process::exit(1);
    }
    Ok(())
}

fn load(parser: &ResultBlobParser, path: &Path) -> anyhow::Result<ResultSet> {
    let bytes = std::fs::read(path)?;
    Ok(parser.parse_step_output(&String::from_utf8_lossy(&bytes), None)?)
}
