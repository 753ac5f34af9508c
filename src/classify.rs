//! Sorting of newsletter links into posts to render, web sources and
//! excluded chat invites.

use itertools::Itertools;
use tracing::{debug, info};
use url::Url;

const MICROBLOG_HOSTS: &[&str] = &["twitter.com", "x.com"];
const CHAT_HOSTS: &[&str] = &["discord.com", "discord.gg"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkCategory {
    /// A microblog post, rendered through the browser.
    Microblog,
    /// Chat server link, dropped.
    Chat,
    Web,
}

/// Links of one issue, each list in input order without duplicates.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PartitionedLinks {
    pub microblog: Vec<String>,
    pub web: Vec<String>,
    pub excluded: Vec<String>,
}

fn host_matches(host: &str, domains: &[&str]) -> bool {
    domains
        .iter()
        .any(|d| host == *d || host.strip_suffix(d).is_some_and(|rest| rest.ends_with('.')))
}

/// Classify a link by its host. Unparseable links count as web sources.
pub fn classify(url: &str) -> LinkCategory {
    let Some(host) = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
    else {
        return LinkCategory::Web;
    };

    if host_matches(&host, MICROBLOG_HOSTS) {
        LinkCategory::Microblog
    } else if host_matches(&host, CHAT_HOSTS) {
        LinkCategory::Chat
    } else {
        LinkCategory::Web
    }
}

pub fn partition<I, S>(urls: I) -> PartitionedLinks
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut links = PartitionedLinks::default();
    for url in urls
        .into_iter()
        .map(|u| u.as_ref().trim().to_string())
        .filter(|u| !u.is_empty())
        .unique()
    {
        match classify(&url) {
            LinkCategory::Microblog => links.microblog.push(url),
            LinkCategory::Web => links.web.push(url),
            LinkCategory::Chat => {
                debug!(%url, "Excluding chat link");
                links.excluded.push(url)
            }
        }
    }
    info!(
        microblog = links.microblog.len(),
        web = links.web.len(),
        excluded = links.excluded.len(),
        "Partitioned links"
    );
    links
}
