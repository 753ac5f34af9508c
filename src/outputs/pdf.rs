//! PDF rendering of one post.
//!
//! The document carries the source link, the post text wrapped to the page
//! width, then every local image on a page of its own. Text is drawn with a
//! builtin Helvetica, so characters outside printable ASCII become `?`.

use std::path::{Path, PathBuf};

use printpdf::image_crate::{self, GenericImageView};
use printpdf::{BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use tokio::fs;
use tokio::task;
use tracing::{info, instrument, warn};

use crate::error::{Result, ScrapeError};
use crate::models::PostRecord;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 15.0;
const FONT_SIZE: f32 = 11.0;
const LINE_HEIGHT: f32 = 6.0;
const WRAP_COLUMNS: usize = 90;
const LAYER: &str = "Layer 1";

/// Document file name for a post: `<id>.pdf`.
pub fn pdf_file_name(record: &PostRecord) -> String {
    format!("{}.pdf", record.id())
}

/// Replace anything the builtin font cannot draw.
fn printable(text: &str) -> String {
    text.chars()
        .map(|c| if c == ' ' || c.is_ascii_graphic() { c } else { '?' })
        .collect()
}

/// Greedy word wrap; words longer than `width` are split.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let chars: Vec<char> = word.chars().collect();
            for chunk in chars.chunks(width.max(1)) {
                let chunk: String = chunk.iter().collect();
                if !line.is_empty() && line.len() + 1 + chunk.len() > width {
                    lines.push(std::mem::take(&mut line));
                }
                if !line.is_empty() {
                    line.push(' ');
                }
                line.push_str(&chunk);
            }
        }
        lines.push(line);
    }
    lines
}

/// Render `record` into PDF bytes.
///
/// Images that cannot be decoded are logged and left out.
pub fn render_pdf(record: &PostRecord) -> Result<Vec<u8>> {
    let title = format!("Post {}", record.id());
    let (doc, page, layer) = PdfDocument::new(&title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER);
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ScrapeError::document(e.to_string()))?;

    let mut layer = doc.get_page(page).get_layer(layer);
    let mut y = PAGE_HEIGHT - MARGIN;

    let source = printable(&format!("Source: {}", record.url));
    let body = printable(record.text_or_absent());
    let lines = wrap(&source, WRAP_COLUMNS)
        .into_iter()
        .chain(std::iter::once(String::new()))
        .chain(wrap(&body, WRAP_COLUMNS));

    for line in lines {
        if y < MARGIN {
            let (page, next) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER);
            layer = doc.get_page(page).get_layer(next);
            y = PAGE_HEIGHT - MARGIN;
        }
        draw_line(&layer, &font, &line, y);
        y -= LINE_HEIGHT;
    }

    for path in &record.media {
        let decoded = match image_crate::open(path) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Image left out of PDF");
                continue;
            }
        };
        let (page, next) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER);
        place_image(doc.get_page(page).get_layer(next), &decoded);
    }

    doc.save_to_bytes()
        .map_err(|e| ScrapeError::document(e.to_string()))
}

fn draw_line(layer: &PdfLayerReference, font: &IndirectFontRef, line: &str, y: f32) {
    if !line.is_empty() {
        layer.use_text(line, FONT_SIZE, Mm(MARGIN), Mm(y), font);
    }
}

/// Scale the image down to the printable area and pin it to the top margin.
fn place_image(layer: PdfLayerReference, decoded: &image_crate::DynamicImage) {
    let (width_px, height_px) = decoded.dimensions();
    let max_width = PAGE_WIDTH - 2.0 * MARGIN;
    let max_height = PAGE_HEIGHT - 2.0 * MARGIN;
    let dpi = [
        300.0,
        width_px as f32 * 25.4 / max_width,
        height_px as f32 * 25.4 / max_height,
    ]
    .into_iter()
    .fold(f32::MIN, f32::max);
    let height_mm = height_px as f32 * 25.4 / dpi;

    Image::from_dynamic_image(decoded).add_to_layer(
        layer,
        ImageTransform {
            translate_x: Some(Mm(MARGIN)),
            translate_y: Some(Mm(PAGE_HEIGHT - MARGIN - height_mm)),
            dpi: Some(dpi),
            ..ImageTransform::default()
        },
    );
}

/// Write `record` as `<id>.pdf` inside `dir`.
///
/// # Arguments
///
/// * `record` - The extracted post. Its media paths must point at local files.
/// * `dir` - Directory the document is written to, normally the one holding
///   the Markdown artifact.
///
/// # Returns
///
/// The path of the written document.
///
/// # Errors
///
/// Returns [`ScrapeError::Document`] when the PDF cannot be assembled and
/// [`ScrapeError::Io`] when it cannot be written.
#[instrument(level = "info", skip_all, fields(url = %record.url))]
pub async fn write_post_pdf(record: &PostRecord, dir: &Path) -> Result<PathBuf> {
    let owned = record.clone();
    let bytes = task::spawn_blocking(move || render_pdf(&owned))
        .await
        .map_err(|e| ScrapeError::document(format!("PDF task failed: {e}")))??;

    fs::create_dir_all(dir).await?;
    let path = dir.join(pdf_file_name(record));
    fs::write(&path, bytes).await?;
    info!(path = %path.display(), "Generated PDF");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: Option<&str>) -> PostRecord {
        let mut record = PostRecord::new("https://x.com/u/status/123");
        record.text = text.map(str::to_string);
        record
    }

    #[test]
    fn test_pdf_file_name_uses_post_id() {
        assert_eq!(pdf_file_name(&record(None)), "123.pdf");
        assert_eq!(pdf_file_name(&PostRecord::new("https://x.com/u")), "unknown_tweet.pdf");
    }

    #[test]
    fn test_wrap_breaks_on_words_and_long_tokens() {
        assert_eq!(wrap("aa bb cc", 5), vec!["aa bb", "cc"]);
        assert_eq!(wrap("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert_eq!(wrap("one\n\ntwo", 10), vec!["one", "", "two"]);
    }

    #[test]
    fn test_printable_replaces_non_ascii() {
        assert_eq!(printable("naïve 🚀 ok"), "na?ve ? ok");
    }

    #[tokio::test]
    async fn test_write_post_pdf_produces_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let long = "word ".repeat(2_000);

        let path = write_post_pdf(&record(Some(&long)), dir.path()).await.unwrap();

        assert_eq!(path, dir.path().join("123.pdf"));
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_undecodable_image_is_left_out() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("123_image_0.jpg");
        std::fs::write(&image, b"not an image").unwrap();
        let mut post = record(None);
        post.media.push(image);

        let path = write_post_pdf(&post, dir.path()).await.unwrap();

        assert!(std::fs::read(path).unwrap().starts_with(b"%PDF"));
    }
}
