//! # News Issue Builder
//!
//! Builds a dated folder for one AI newsletter issue: the issue's web
//! sources, plus a Markdown capture (text and images) of every microblog
//! post it links to.
//!
//! ## Usage
//!
//! ```sh
//! TWITTER_EMAIL=... TWITTER_USERNAME=... TWITTER_PASSWORD=... news_issue_builder -o ./issues
//! ```
//!
//! ## Architecture
//!
//! 1. **Indexing**: find the newest newsletter issue and collect its links
//!    (or read them from `--links-file`)
//! 2. **Classifying**: split links into microblog posts, web sources and
//!    excluded chat invites; write the web sources to `sources.txt`
//! 3. **Scraping**: render each post in a logged-in headless Chrome, one at a
//!    time, downloading attached images and writing `tweet_<id>.md`
//! 4. **Assembly**: move everything into `{YYYY-MM-DD}_AI_News_Issue/` and
//!    write `index.md` and `issue.json`
//!
//! Any failure past start-up is logged as critical, and the files this run
//! wrote are removed before exiting. Nothing else in the work, media or output
//! directories is touched.

use std::error::Error;
use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::Parser;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod batch;
mod classify;
mod cli;
mod config;
mod error;
mod fetch;
mod media;
mod models;
mod outputs;
mod render;
mod retry;
mod scrapers;
mod session;
#[cfg(test)]
mod test_helpers;
mod utils;

use batch::BatchOrchestrator;
use cli::Cli;
use config::PipelineConfig;
use fetch::{HttpFetcher, RetryFetch};
use media::MediaDownloader;
use models::{BatchSummary, IssueManifest};
use outputs::issue::RunFiles;
use outputs::{index, issue, json};
use render::PostRenderer;
use scrapers::newsletter;
use session::SessionManager;
use session::chrome::ChromeLauncher;
use utils::{ensure_writable_dir, read_links};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_issue_builder starting up");

    if let Err(e) = dotenvy::dotenv() {
        debug!(error = %e, "No .env file loaded");
    }

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.output_root, ?args.work_dir, ?args.links_file, "Parsed CLI arguments");

    let config = match PipelineConfig::from_cli(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(critical = true, error = %e, "Cannot start");
            return Err(e.into());
        }
    };

    let local_date = Local::now().date_naive();
    let mut run = RunFiles::default();
    match build_issue(&args, &config, local_date, &mut run).await {
        Ok(issue_dir) => {
            let elapsed = start_time.elapsed();
            info!(
                issue = %issue_dir.display(),
                ?elapsed,
                secs = elapsed.as_secs(),
                millis = elapsed.subsec_millis(),
                "Execution complete"
            );
            Ok(())
        }
        Err(e) => {
            error!(critical = true, error = %e, "Issue build failed; cleaning up");
            run.cleanup().await;
            Err(e)
        }
    }
}

/// Run every stage and return the finished issue folder.
///
/// Every file and directory written along the way is recorded in `run`, so
/// the caller can undo exactly that on failure.
async fn build_issue(
    args: &Cli,
    config: &PipelineConfig,
    local_date: NaiveDate,
    run: &mut RunFiles,
) -> Result<PathBuf, Box<dyn Error>> {
    if let Err(e) = ensure_writable_dir(&config.output_root).await {
        error!(
            path = %config.output_root.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let client = newsletter::client(config.http_timeout)?;

    // ---- Index links ----
    let (newsletter_url, links) = match &args.links_file {
        Some(path) => (None, read_links(path).await?),
        None => {
            let issue_url = match &args.issue_url {
                Some(url) => url.clone(),
                None => newsletter::latest_issue_url(&client, &args.archive_url).await?,
            };
            let links = newsletter::index_links(&client, &issue_url).await?;
            (Some(issue_url), links)
        }
    };

    let links = classify::partition(&links);
    issue::write_sources(&config.sources_file, &links.web).await?;
    run.add_file(&config.sources_file);
    let issue_dir = issue::create_issue_folder(&config.output_root, local_date, run).await?;

    // ---- Scrape posts ----
    let mut summary = if links.microblog.is_empty() {
        warn!("No microblog links found; issue will only list web sources");
        BatchSummary::default()
    } else {
        run.create_dir(&config.work_dir).await?;
        run.create_dir(&config.media_dir).await?;
        let sessions = SessionManager::new(
            ChromeLauncher::new(config.browser.clone(), config.credentials.clone()),
            config.rotate_after,
        );
        let downloader = MediaDownloader::new(
            RetryFetch::new(HttpFetcher::new(config.http_timeout)?, config.fetch_retry),
            &config.media_dir,
        );
        let mut batch = BatchOrchestrator::new(
            sessions,
            PostRenderer::new(config.render.clone()),
            downloader,
            &config.work_dir,
            config.pacing,
        );
        let outcome = batch.run(&links.microblog).await;
        run.add_files(batch.produced_files().iter().cloned());
        outcome?
    };

    // ---- Assemble issue ----
    run.move_into(&issue_dir).await?;
    run.prune_empty_dirs().await;
    summary.relocate_artifacts(&issue_dir);

    let date = local_date.format("%Y-%m-%d").to_string();
    run.add_file(index::write_index(&issue_dir, &date, &summary, links.web.len()).await?);

    let manifest = IssueManifest {
        local_date: date,
        newsletter_url,
        web_sources: links.web.len(),
        excluded_links: links.excluded.len(),
        posts: summary.posts,
    };
    run.add_file(json::write_manifest(&issue_dir, &manifest).await?);

    Ok(issue_dir)
}
