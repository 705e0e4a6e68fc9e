pub mod browser;
pub mod config;
pub mod document;

pub use browser::BrowserTrait;
pub use config::Config;
pub use document::{DocumentQuery, ElementWriter, Page};
