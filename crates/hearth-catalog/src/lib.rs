//! Hearth model catalog.
//!
//! Resolves the list of models that can be pulled from the hub through a
//! fallback chain of sources:
//! - the structured model listing
//! - the search endpoint
//! - the HTML library page
//! - a bundled static list
//!
//! Entries from every source are normalized to one shape with sizes in bytes.

mod cache;
mod config;
mod entry;
mod error;
mod resolver;
mod search;
pub mod size;
pub mod sources;

pub use cache::CatalogCache;
pub use config::{CatalogConfig, CatalogConfigBuilder};
pub use entry::{entries_from_records, CatalogEntry, CatalogSource};
pub use error::CatalogError;
pub use resolver::CatalogResolver;
pub use search::{matches, normalize, search_entries, tokenize};
pub use sources::CatalogTier;

/// Default model hub.
pub const DEFAULT_HUB_URL: &str = "https://ollama.com";
