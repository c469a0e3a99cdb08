pub mod commands;
pub mod handlers;

pub use commands::{command_argument_builder, normalize_legacy_args};
pub use handlers::{handle_crawl, options_from_matches};
