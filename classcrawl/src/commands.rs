use clap::{ArgAction, arg};
use classcrawl_core::Engine;
use classcrawl_core::WaitCondition;
use std::ffi::OsString;
use std::path::PathBuf;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

/// Long options that may also be written with a single dash.
const LONG_OPTIONS: &[&str] = &[
    "domain",
    "class",
    "pathsToAvoid",
    "proxy",
    "engine",
    "format",
    "timeout",
    "eval-timeout",
    "wait-until",
    "env-file",
    "headed",
    "chrome-path",
    "quiet",
];

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("classcrawl")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("classcrawl")
        .about("Crawl a site and report which pages use a CSS class (exact name or prefix)")
        .styles(CLAP_STYLING)
        .arg(
            arg!(--"domain" <URL>)
                .required(true)
                .help("Seed URL; only pages on this host are crawled"),
        )
        .arg(
            arg!(--"class" <CLASS>)
                .required(true)
                .help("Class name to look for; tokens starting with it also match"),
        )
        .arg(
            arg!(--"pathsToAvoid" <PATHS>)
                .required(false)
                .alias("paths-to-avoid")
                .help("Comma separated substrings, optionally in parentheses: (/admin,/logout)"),
        )
        .arg(
            arg!(--"proxy")
                .required(false)
                .help("Route traffic through PROXY_URL, authenticating with PROXY_USER/PROXY_PASS")
                .action(ArgAction::SetTrue),
        )
        .arg(
            arg!(--"engine" <ENGINE>)
                .required(false)
                .help("Page engine: browser renders scripts, http reads static HTML")
                .value_parser(["browser", "http"])
                .default_value(Engine::default().as_str()),
        )
        .arg(
            arg!(-f --"format" <FORMAT>)
                .required(false)
                .help("Report format: table, json")
                .value_parser(["table", "json"])
                .default_value("table"),
        )
        .arg(
            arg!(--"timeout" <SECONDS>)
                .required(false)
                .help("Navigation timeout per page in seconds")
                .value_parser(clap::value_parser!(u64))
                .default_value("30"),
        )
        .arg(
            arg!(--"eval-timeout" <SECONDS>)
                .required(false)
                .help("Timeout for each in-page query in seconds (0 disables it)")
                .value_parser(clap::value_parser!(u64))
                .default_value("30"),
        )
        .arg(
            arg!(--"wait-until" <EVENT>)
                .required(false)
                .help("Page event that ends a navigation: domcontentloaded, load")
                .value_parser(["domcontentloaded", "load"])
                .default_value(WaitCondition::default().as_str()),
        )
        .arg(
            arg!(--"env-file" <PATH>)
                .required(false)
                .help("Env file holding the proxy variables (default: ./.env)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            arg!(--"headed")
                .required(false)
                .help("Show the browser window instead of running headless")
                .action(ArgAction::SetTrue),
        )
        .arg(
            arg!(--"chrome-path" <PATH>)
                .required(false)
                .help("Chrome or Chromium executable for the browser engine")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(arg!(-q --"quiet" "Hide the progress spinner").required(false))
}

/// Rewrite single-dash long options (`-domain=x`, `-proxy`) to their
/// double-dash form so clap can parse them.
pub fn normalize_legacy_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| match arg.to_str() {
            Some(s) if is_legacy_long_option(s) => OsString::from(format!("-{}", s)),
            _ => arg,
        })
        .collect()
}

fn is_legacy_long_option(arg: &str) -> bool {
    let Some(rest) = arg.strip_prefix('-') else {
        return false;
    };
    if rest.starts_with('-') {
        return false;
    }
    let name = rest.split_once('=').map_or(rest, |(name, _)| name);
    LONG_OPTIONS.contains(&name)
}
