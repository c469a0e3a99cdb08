pub mod config;
pub mod crawl;
pub mod report;

pub use config::{ConfigError, CrawlOptions, Engine, ProxySettings};
pub use crawl::{CrawlError, CrawlProgressCallback, execute_crawl};
pub use report::ReportFormat;

pub use classcrawl_scanner::WaitCondition;
