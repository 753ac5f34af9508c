//! Command-line interface definitions.
//!
//! All arguments can be provided via command-line flags; the credentials are
//! normally taken from the environment (or a `.env` file).

use std::path::PathBuf;

use clap::Parser;

use crate::scrapers::newsletter::DEFAULT_ARCHIVE_URL;

/// Command-line arguments for the issue builder.
///
/// # Examples
///
/// ```sh
/// # Scrape the latest issue from the archive
/// news_issue_builder
///
/// # A specific issue, visible browser
/// news_issue_builder --issue-url https://news.smol.ai/issues/25-05-20-google-io/ --headed
///
/// # Skip the newsletter and use a prepared link list
/// news_issue_builder --links-file ai_news_links.txt
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Newsletter issue page to scrape; defaults to the newest issue in the archive
    #[arg(long)]
    pub issue_url: Option<String>,

    /// Archive page listing the newsletter issues
    #[arg(long, default_value = DEFAULT_ARCHIVE_URL)]
    pub archive_url: String,

    /// Read links from this file (one per line) instead of scraping the newsletter
    #[arg(short, long)]
    pub links_file: Option<PathBuf>,

    /// Directory the dated issue folder is created in
    #[arg(short, long, default_value = ".")]
    pub output_root: PathBuf,

    /// Scratch directory for post artifacts before they move into the issue folder
    #[arg(short, long, default_value = "tweet_markdowns")]
    pub work_dir: PathBuf,

    /// Directory for downloaded images (defaults to the work directory)
    #[arg(long)]
    pub media_dir: Option<PathBuf>,

    /// Chrome/Chromium executable
    #[arg(long)]
    pub chrome_path: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Restart the browser after this many posts
    #[arg(long, default_value_t = 20)]
    pub rotate_after: usize,

    /// Attempts per post render and per image download
    #[arg(long, default_value_t = 5)]
    pub max_attempts: u32,

    /// Wait after the first failed attempt, doubled on each further failure
    #[arg(long, default_value_t = 5)]
    pub base_wait_secs: u64,

    /// Account e-mail used to log in
    #[arg(long, env = "TWITTER_EMAIL", hide_env_values = true)]
    pub twitter_email: Option<String>,

    /// Account handle, asked for by the login challenge
    #[arg(long, env = "TWITTER_USERNAME", hide_env_values = true)]
    pub twitter_username: Option<String>,

    /// Account password
    #[arg(long, env = "TWITTER_PASSWORD", hide_env_values = true)]
    pub twitter_password: Option<String>,
}
