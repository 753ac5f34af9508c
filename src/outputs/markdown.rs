//! Markdown rendering of a single extracted post.
//!
//! # Format
//!
//! ```text
//! ## Original Post URL: https://x.com/user/status/123
//!
//! ### Post Text:
//! hello
//!
//! ### Attached Images:
//! - ![](123_image_0.jpg)
//!
//! ---
//! ```
//!
//! The images section is left out when the post has no media. Images are
//! referenced by file name only, since artifacts and media end up side by
//! side in the issue folder.

use std::fmt::Write;
use std::path::Path;

use crate::models::PostRecord;

/// Render a post as Markdown. Same record, same bytes.
pub fn post_to_markdown(record: &PostRecord) -> String {
    let mut md = String::new();

    let _ = writeln!(md, "## Original Post URL: {}\n", record.url);
    let _ = writeln!(md, "### Post Text:\n{}\n", record.text_or_absent());

    if !record.media.is_empty() {
        md.push_str("### Attached Images:\n");
        for path in &record.media {
            let _ = writeln!(md, "- ![]({})", media_reference(path));
        }
        md.push('\n');
    }

    md.push_str("---\n\n");
    md
}

fn media_reference(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned()
}
