//! Link sources for an issue.
//!
//! Scraping follows the same two-phase pattern for every source:
//!
//! 1. **Indexing**: find the page to read (the newest issue in the archive)
//! 2. **Fetching**: download that page and collect its outbound links
//!
//! Only the AI newsletter ([`newsletter`]) is supported.

pub mod newsletter;
