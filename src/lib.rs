pub mod digest;
pub mod fs;
pub mod scraper;
pub mod termio;

mod chapter;
mod client;
mod release;
mod selectors;
mod store;
mod watermark;

pub use chapter::{Chapter, ChapterRecord, ChapterValue};
pub use client::Client;
pub use release::{new_releases, Release, ScrapedReleases};
pub use store::PageMarkStore;
pub use watermark::{PageMark, PageMarkRecord, SerieID};

use selectors::{DIV_SELECTOR, RELEASE_TABLE_SELECTOR, SERIE_TITLE_SELECTOR};
