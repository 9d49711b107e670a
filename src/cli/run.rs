use crate::cli::RunArgs;
use crate::config::Config;
use crate::discovery::{discover_touched_tests, PathRelevanceFilter};
use crate::executor::CommandExecutor;
use crate::notify::FileSink;
use crate::output::write_triage_outputs;
use crate::parser::ResultBlobParser;
use crate::runner::{AttemptContext, Orchestrator};
use std::sync::Arc;
use tracing::{error, info, warn};

pub async fn execute(args: RunArgs) -> anyhow::Result<()> {
    // Load and validate config
    info!("Loading config from {:?}", args.config);
    let mut config = Config::load_or_default(&args.config)?;

    // Apply CLI overrides
    if let Some(max_retries) = args.max_retries {
        config.retry.max_retries = max_retries;
    }
    if let Some(report_dir) = args.report_dir {
        config.report_dir = report_dir;
    }
    if !args.command.is_empty() {
        config.executor.command = args.command;
    }

    config.validate()?;

    let filter = PathRelevanceFilter::from_config(&config.relevance)?;

    let touched_tests = match &args.diff_base {
        Some(base) => match discover_touched_tests(&config.executor.working_dir, base, &filter) {
            Ok(tests) => tests,
            Err(e) => {
                warn!("Could not determine touched tests: {}", e);
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    let context = AttemptContext {
        change_id: args.change_id,
        author: args.author,
        host: args.host,
        lane: args.lane,
        environment: args.env.into_iter().collect(),
        touched_tests,
    };

    if args.dry_run {
        info!("DRY RUN - the suite will not be executed");
        print_execution_plan(&config, &context);
        return Ok(());
    }

    let executor = CommandExecutor::from_config(&config)?;
    let parser = ResultBlobParser::from_config(&config.parser, filter);

    // One report directory per change
    let report_dir = config.report_dir.join(&context.change_id);
    info!("Reports will be written to {:?}", report_dir);

    let orchestrator = Orchestrator::new(config.clone(), Arc::new(executor), parser)
        .with_sink(Arc::new(FileSink::new(report_dir.clone())));
    let report = orchestrator.triage(&context).await;

    write_triage_outputs(&report_dir, &report)?;

    info!(
        "Completed in {:.1}s after {} stages ({} retries)",
        report.duration.as_secs_f64(),
        report.stages.len(),
        report.retry_count
    );
    println!("{}", report.summary);

    if report.verdict.is_blocking() {
        error!("Change {} introduces new test failures", context.change_id);
        std::process::exit(1);
    }

    Ok(())
}

fn print_execution_plan(config: &Config, context: &AttemptContext) {
    println!("\n=== Triage Plan ===\n");
    println!("Change: {}", context.change_id);
    if let Some(ref author) = context.author {
        println!("Author: {}", author);
    }
    println!("Command: {}", config.executor.command.join(" "));
    println!("Report dir: {:?}", config.report_dir.join(&context.change_id));
    println!(
        "First run: failure limit {}, deadline {:?}",
        config.suite.failure_limit,
        config.suite.first_run_deadline()
    );
    println!(
        "Repeats: {} each, deadline {:?}",
        config.suite.repeat_count,
        config.suite.repeat_deadline()
    );
    println!(
        "Retries: up to {}, baseline timeout policy: {}",
        config.retry.max_retries, config.baseline_timeout
    );

    if !context.environment.is_empty() {
        println!("\nEnvironment:");
        for (key, value) in &context.environment {
            println!("  {}={}", key, value);
        }
    }
    if !context.touched_tests.is_empty() {
        println!("\nTouched tests:");
        for test in &context.touched_tests {
            println!("  - {}", test);
        }
    }
    println!();
}
