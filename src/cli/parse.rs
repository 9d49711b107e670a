use crate::cli::ParseArgs;
use crate::config::Config;
use crate::discovery::PathRelevanceFilter;
use crate::parser::ResultBlobParser;
use tracing::info;

pub fn execute(args: ParseArgs) -> anyhow::Result<()> {
    let config = Config::load_or_default(&args.config)?;
    // Worker logs are not guaranteed UTF-8; decode the way stage output is
    let bytes = std::fs::read(&args.file)?;
    let raw = String::from_utf8_lossy(&bytes);

    let parser = if args.no_filter {
        ResultBlobParser::new(&config.parser.envelope_prefix, &config.parser.envelope_suffix)
    } else {
        let filter = PathRelevanceFilter::from_config(&config.relevance)?;
        ResultBlobParser::from_config(&config.parser, filter)
    };

    // Saved stdout may carry the early-exit banner
    let results = parser.parse_step_output(&raw, None)?;
    info!(
        "Parsed {} outcomes ({} failing, {} flaky, {} missing)",
        results.outcomes().len(),
        results.failing().len(),
        results.flaky().len(),
        results.missing().len()
    );

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
