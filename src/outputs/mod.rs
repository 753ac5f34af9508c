//! Output generation: per-post Markdown and PDF, and the assembled issue folder.
//!
//! # Submodules
//!
//! - [`markdown`]: Renders one [`PostRecord`](crate::models::PostRecord) as Markdown
//! - [`pdf`]: Renders one post as a PDF document
//! - [`issue`]: Creates the dated folder, writes `sources.txt`, moves artifacts in
//! - [`index`]: Writes the issue's `index.md`
//! - [`json`]: Writes the issue's `issue.json` manifest
//!
//! # Output Structure
//!
//! ```text
//! output_root/
//! └── 2025-05-20_AI_News_Issue/
//!     ├── index.md
//!     ├── issue.json
//!     ├── sources.txt
//!     ├── tweet_1793364230056202389.md
//!     ├── 1793364230056202389.pdf
//!     └── 1793364230056202389_image_0.jpg
//! ```

pub mod index;
pub mod issue;
pub mod json;
pub mod markdown;
pub mod pdf;
