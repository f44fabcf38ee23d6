//! # pages2pdf
//!
//! A CLI utility to download a book that is served as individually numbered
//! page images and save it as a single PDF.
//!
//! ## How it works
//!
//! - Logs in through the provider's Keycloak form and keeps the session cookies
//! - Finds the number of pages by probing, since there is no page listing
//! - Downloads a page range one page at a time, stopping at the first failure
//! - Merges the page images into one PDF
//!
//! ## Usage
//!
//! ```bash
//! pages2pdf --username me --password secret download KLB-0123456789 -o book.pdf
//! ```

mod address;
mod assembler;
mod auth;
mod config;
mod discovery;
mod error;
mod pipeline;
mod range;
mod retriever;
mod scratch;
mod session;
mod transport;

#[cfg(test)]
mod test_support;

pub use address::{CollectionId, Endpoint, Tier, DEFAULT_HOST};
pub use assembler::{DocumentAssembler, PdfAssembler, DEFAULT_DPI};
pub use auth::{authenticate, Credentials};
pub use config::{load_file, ConfigLayer, Settings};
pub use discovery::{
    discover_boundary, discover_count, DiscoveryTuning, ExistenceOracle, PageOracle,
};
pub use error::{AuthError, Error, FetchCause, Result};
pub use pipeline::{count_pages, download, pages_dir_for, DownloadJob, Report};
pub use range::PageRange;
pub use retriever::{retrieve, Progress, RetrievedPage};
pub use scratch::Scratch;
pub use session::Session;
pub use transport::{HttpTransport, Redirects, Reply, Transport, DEFAULT_TIMEOUT};
