// Report rendering for a finished crawl

use crate::config::CrawlOptions;
use classcrawl_scanner::{CrawlSummary, VisitStatus};
use colored::{ColoredString, Colorize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Table,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" | "text" => Some(ReportFormat::Table),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

/// Everything the JSON report carries besides the records themselves.
#[derive(Debug, Clone)]
pub struct ReportData<'a> {
    pub domain: &'a str,
    pub class_name: &'a str,
    pub engine: &'static str,
    pub paths_to_avoid: &'a [String],
    pub summary: &'a CrawlSummary,
}

impl<'a> ReportData<'a> {
    pub fn new(options: &'a CrawlOptions, summary: &'a CrawlSummary) -> Self {
        Self {
            domain: &options.domain,
            class_name: &options.class_name,
            engine: options.engine.as_str(),
            paths_to_avoid: &options.paths_to_avoid,
            summary,
        }
    }
}

const INDEX_HEADER: &str = "#";
const URL_HEADER: &str = "URL";
const STATUS_HEADER: &str = "Status";
const FOUND_HEADER: &str = "Found";

/// One row per visited page in visit order, then the visited total.
pub fn generate_table_report(summary: &CrawlSummary) -> String {
    let index_width = summary
        .records
        .len()
        .saturating_sub(1)
        .to_string()
        .len()
        .max(INDEX_HEADER.len());
    let url_width = summary
        .records
        .iter()
        .map(|r| r.url.as_str().len())
        .max()
        .unwrap_or(0)
        .max(URL_HEADER.len());
    let status_width = summary
        .records
        .iter()
        .map(|r| r.status.to_string().len())
        .max()
        .unwrap_or(0)
        .max(STATUS_HEADER.len());

    let rule = format!(
        "{}\n",
        "━".repeat(index_width + url_width + status_width + FOUND_HEADER.len() + 9)
    );

    let mut report = String::new();
    report.push_str(&rule);
    report.push_str(&format!(
        "{:<iw$} │ {:<uw$} │ {:<sw$} │ {}\n",
        INDEX_HEADER,
        URL_HEADER,
        STATUS_HEADER,
        FOUND_HEADER,
        iw = index_width,
        uw = url_width,
        sw = status_width
    ));
    report.push_str(&rule);

    for (idx, record) in summary.records.iter().enumerate() {
        // Pad before colouring so escape codes do not skew the columns
        let status = format!("{:<sw$}", record.status.to_string(), sw = status_width);
        let found = if record.found {
            "Yes".green().bold()
        } else {
            "No".normal()
        };
        report.push_str(&format!(
            "{:<iw$} │ {:<uw$} │ {} │ {}\n",
            idx,
            record.url.as_str(),
            colorize_status(&record.status, &status),
            found,
            iw = index_width,
            uw = url_width
        ));
    }

    report.push_str(&rule);
    report.push_str(&format!("Total Links Visited: {}\n", summary.total_visited));
    report
}

fn colorize_status(status: &VisitStatus, text: &str) -> ColoredString {
    match status.code() {
        Some(100..=199) => text.white(),
        Some(200..=299) => text.green(),
        Some(300..=399) => text.cyan(),
        Some(400..=499) => text.yellow(),
        Some(500..=599) => text.red(),
        Some(_) => text.normal(),
        None if status.is_error() => text.red(),
        None => text.bright_black(),
    }
}

pub fn generate_json_report(data: &ReportData) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "classcrawl",
                "version": env!("CARGO_PKG_VERSION"),
                "engine": data.engine,
            },
            "target": {
                "domain": data.domain,
                "class": data.class_name,
                "paths_to_avoid": data.paths_to_avoid,
            },
            "summary": {
                "total_visited": data.summary.total_visited,
                "found": data.summary.found_count(),
                "errors": data.summary.error_count(),
            },
            "records": data.summary.records,
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn format_elapsed(elapsed: Duration) -> String {
    format!("Total Crawling Time: {}ms", elapsed.as_millis())
}
