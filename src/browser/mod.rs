pub mod chrome;
pub mod page;

pub use chrome::ChromeBrowser;
pub use page::PageDocument;
