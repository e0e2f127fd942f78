//! Link discovery: fetch the seed page through the SOCKS proxy and extract
//! candidate onion addresses from its anchors

use crate::{CaptureError, Config, OnionValidator};
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info};

/// Fetches a seed onion page and returns the valid onion links it points at,
/// in document order. Duplicates are preserved; downstream artifact naming
/// makes them idempotent.
pub struct LinkDiscoverer {
    client: reqwest::Client,
    validator: OnionValidator,
    url_pattern: Regex,
}

impl LinkDiscoverer {
    pub fn new(config: &Config, validator: OnionValidator) -> Result<Self, CaptureError> {
        let proxy = reqwest::Proxy::all(config.proxy.fetch_url())
            .map_err(|e| CaptureError::Configuration(format!("proxy: {e}")))?;

        let client = reqwest::Client::builder()
            .proxy(proxy)
            .timeout(config.fetch_timeout)
            .build()
            .map_err(|e| CaptureError::Configuration(format!("http client: {e}")))?;

        Ok(Self {
            client,
            validator,
            url_pattern: Regex::new(r"https?://\S+").expect("url pattern is a valid regex"),
        })
    }

    /// Fetch the seed page and extract candidates.
    ///
    /// Fails with [`CaptureError::FetchFailed`] when the proxied request
    /// cannot complete and with [`CaptureError::EmptyPage`] when the page
    /// yields zero candidates; neither is fatal to the caller.
    pub async fn discover(&self, seed: &str) -> Result<Vec<String>, CaptureError> {
        debug!("Fetching {seed} through the proxy");
        let body = self.client.get(seed).send().await?.text().await?;

        let links = self.extract_links(&body);
        if links.is_empty() {
            return Err(CaptureError::EmptyPage);
        }

        info!("Found {} links on {seed}", links.len());
        Ok(links)
    }

    /// Pull `http(s)://…` substrings out of every anchor's href, keeping the
    /// ones that pass the onion-syntax check. Addresses failing the check are
    /// excluded outright, not flagged.
    fn extract_links(&self, body: &str) -> Vec<String> {
        let document = Html::parse_document(body);
        let anchors = Selector::parse("a").expect("anchor selector is valid");

        let mut found = Vec::new();
        for element in document.select(&anchors) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            for candidate in self.url_pattern.find_iter(href) {
                if self.validator.is_valid(candidate.as_str()) {
                    found.push(candidate.as_str().to_string());
                }
            }
        }
        found
    }
}
