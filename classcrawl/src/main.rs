use classcrawl::commands::{command_argument_builder, normalize_legacy_args};
use classcrawl::handlers::handle_crawl;
use colored::Colorize;
use std::time::Instant;

#[tokio::main]
async fn main() {
    let started = Instant::now();

    let args = normalize_legacy_args(std::env::args_os());
    let matches = command_argument_builder().get_matches_from(args);

    if let Err(e) = handle_crawl(&matches, started).await {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
