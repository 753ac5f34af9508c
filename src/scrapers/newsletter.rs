//! AI newsletter scraper.
//!
//! The archive page lists issues newest first as
//! `div.arrow-card > a[href="/issues/<slug>/"]`. The issue page itself is
//! plain HTML; every absolute link on it is a candidate source.
//!
//! # URL Pattern
//!
//! Issue links are relative and resolved against the archive URL, e.g.
//! `https://news.smol.ai/issues/25-05-20-google-io/`.

use std::time::Duration;

use itertools::Itertools;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument};
use url::Url;

use crate::error::{Result, ScrapeError};
use crate::fetch::USER_AGENT;

pub const DEFAULT_ARCHIVE_URL: &str = "https://news.smol.ai/issues";

const ISSUE_LINK_SELECTOR: &str = r#"div.arrow-card > a[href^="/issues/"]"#;

/// Client for the archive and issue pages.
pub fn client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()?)
}

async fn get_html(client: &Client, url: &str) -> Result<String> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ScrapeError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response.text().await?)
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScrapeError::scrape(css, e.to_string()))
}

/// URL of the newest issue listed on the archive page.
#[instrument(level = "info", skip(client))]
pub async fn latest_issue_url(client: &Client, archive_url: &str) -> Result<String> {
    let base = Url::parse(archive_url)?;
    let html = get_html(client, archive_url).await?;
    let document = Html::parse_document(&html);
    let issue_selector = selector(ISSUE_LINK_SELECTOR)?;

    let href = document
        .select(&issue_selector)
        .find_map(|a| a.value().attr("href"))
        .ok_or_else(|| ScrapeError::scrape(archive_url, "no issue links on archive page"))?;

    let latest = base.join(href)?;
    if latest == base {
        return Err(ScrapeError::scrape(
            archive_url,
            "latest issue link points back at the archive",
        ));
    }

    info!(url = %latest, "Found latest newsletter issue");
    Ok(latest.to_string())
}

/// Every absolute http(s) link on an issue page, first occurrence order.
#[instrument(level = "info", skip(client))]
pub async fn index_links(client: &Client, issue_url: &str) -> Result<Vec<String>> {
    let html = get_html(client, issue_url).await?;
    let document = Html::parse_document(&html);
    let link_selector = selector("a[href]")?;

    let links: Vec<String> = document
        .select(&link_selector)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| href.starts_with("http://") || href.starts_with("https://"))
        .unique()
        .map(str::to_string)
        .collect();

    info!(count = links.len(), source = issue_url, "Indexed newsletter links");
    debug!(urls = ?links, "Newsletter links");
    Ok(links)
}
