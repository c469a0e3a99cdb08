pub mod crawler;
pub mod driver;
pub mod error;
pub mod exclusion;
pub mod frontier;
pub mod http_driver;
pub mod normalize;
pub mod recorder;
pub mod result;

#[cfg(feature = "browser")]
pub mod browser;

pub use crawler::{Crawler, VisitCallback};
pub use driver::{NavigateOptions, PageDriver, PageQuery, ProxyCredentials, WaitCondition};
pub use error::ScanError;
pub use exclusion::ExclusionFilter;
pub use http_driver::HttpPageDriver;
pub use normalize::{NormalizedUrl, normalize};
pub use result::{CrawlSummary, VisitRecord, VisitStatus};

#[cfg(feature = "browser")]
pub use browser::{BrowserOptions, BrowserPageDriver};
