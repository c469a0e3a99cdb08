use anyhow::{Context, Result};
use clap::ArgMatches;
use classcrawl_core::config::{
    ConfigError, CrawlOptions, Engine, ProxySettings, parse_paths_to_avoid,
};
use classcrawl_core::WaitCondition;
use classcrawl_core::crawl::{CrawlProgressCallback, execute_crawl};
use classcrawl_core::report::{
    ReportData, ReportFormat, format_elapsed, generate_json_report, generate_table_report,
};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default log filter when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "warn";

/// Logs go to stderr so the report on stdout can be piped.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Build crawl options and the report format from parsed arguments. Proxy
/// variables are only read when `--proxy` is given.
pub fn options_from_matches(
    matches: &ArgMatches,
) -> Result<(CrawlOptions, ReportFormat), ConfigError> {
    let domain = matches
        .get_one::<String>("domain")
        .cloned()
        .unwrap_or_default();
    let class_name = matches
        .get_one::<String>("class")
        .cloned()
        .unwrap_or_default();

    let mut options = CrawlOptions::new(domain, class_name);

    if let Some(raw) = matches.get_one::<String>("pathsToAvoid") {
        options.paths_to_avoid = parse_paths_to_avoid(raw);
    }

    if matches.get_flag("proxy") {
        let env_file = matches.get_one::<PathBuf>("env-file");
        options.proxy = Some(ProxySettings::from_env(env_file.map(PathBuf::as_path))?);
    }

    if let Some(engine) = matches.get_one::<String>("engine") {
        options.engine = engine.parse::<Engine>()?;
    }

    if let Some(secs) = matches.get_one::<u64>("timeout") {
        options.navigation_timeout = Duration::from_secs(*secs);
    }
    if let Some(secs) = matches.get_one::<u64>("eval-timeout") {
        options.evaluation_timeout = (*secs > 0).then(|| Duration::from_secs(*secs));
    }
    if let Some(wait_until) = matches
        .get_one::<String>("wait-until")
        .and_then(|w| WaitCondition::from_str(w))
    {
        options.wait_until = wait_until;
    }

    options.headless = !matches.get_flag("headed");
    options.chrome_path = matches.get_one::<PathBuf>("chrome-path").cloned();
    options.show_progress_bars = !matches.get_flag("quiet");

    options.validate()?;

    Ok((options, report_format(matches)))
}

fn report_format(matches: &ArgMatches) -> ReportFormat {
    matches
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Table)
}

/// Run a crawl and print its report. The elapsed time since `started` is
/// printed whether or not the crawl succeeded.
pub async fn handle_crawl(matches: &ArgMatches, started: Instant) -> Result<()> {
    init_tracing();

    let format = report_format(matches);

    let outcome = run_crawl(matches).await;

    // JSON output stays parseable
    let elapsed = format_elapsed(started.elapsed());
    match format {
        ReportFormat::Table => println!("{}", elapsed),
        ReportFormat::Json => eprintln!("{}", elapsed),
    }

    outcome
}

async fn run_crawl(matches: &ArgMatches) -> Result<()> {
    let (options, format) = options_from_matches(matches).context("Invalid configuration")?;

    let progress_callback: Option<CrawlProgressCallback> = if options.show_progress_bars {
        Some(Arc::new(|msg: String| {
            eprintln!("{} {}", "→".blue(), msg);
        }))
    } else {
        None
    };

    let summary = execute_crawl(options.clone(), progress_callback)
        .await
        .context("Crawl failed")?;

    match format {
        ReportFormat::Table => print!("{}", generate_table_report(&summary)),
        ReportFormat::Json => {
            let report = generate_json_report(&ReportData::new(&options, &summary))
                .context("Failed to serialize report")?;
            println!("{}", report);
        }
    }

    Ok(())
}
