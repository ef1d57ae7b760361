//! src/offer_prober.rs

use crate::configuration::Location;
use crate::domain::City;
use crate::telemetry::spawn_blocking_with_tracing;
use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum ProbeError {
    #[error("Failed to fetch the portal search page.")]
    Request(#[from] reqwest::Error),
    #[error("Failed to inspect the portal search page.")]
    Inspection(#[source] anyhow::Error),
}

/// Answers whether the housing portal currently lists an offer for a city.
#[async_trait]
pub trait OfferProber: Send + Sync {
    async fn probe(&self, city: &City) -> Result<bool, ProbeError>;
}

pub struct PortalProber {
    http_client: Client,
    base_url: String,
    locations: Vec<Location>,
    default_location_code: u32,
}

impl PortalProber {
    pub fn new(
        base_url: String,
        locations: Vec<Location>,
        default_location_code: u32,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url,
            locations,
            default_location_code,
        })
    }

    /// Unknown cities fall back to the default location code.
    pub fn location_code(&self, city: &City) -> u32 {
        self.locations
            .iter()
            .find(|l| l.label == city.as_ref())
            .map(|l| l.code)
            .unwrap_or(self.default_location_code)
    }

    pub fn search_url(&self, city: &City) -> String {
        format!(
            "{}/tools/{}/search",
            self.base_url,
            self.location_code(city)
        )
    }
}

#[async_trait]
impl OfferProber for PortalProber {
    #[tracing::instrument(name = "Probe portal for offers", skip(self), fields(city = %city))]
    async fn probe(&self, city: &City) -> Result<bool, ProbeError> {
        let page = self
            .http_client
            .get(self.search_url(city))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let city = city.clone();
        spawn_blocking_with_tracing(move || page_mentions_city(&page, &city))
            .await
            .map_err(|e| ProbeError::Inspection(e.into()))?
            .map_err(ProbeError::Inspection)
    }
}

/// Whole-word, case-insensitive search for the city in the visible page text.
/// Labels may start or end with punctuation, so the edges are "not a word
/// character" rather than `\b`.
pub fn page_mentions_city(page: &str, city: &City) -> Result<bool, anyhow::Error> {
    let pattern = format!(r"(?i)(?:^|\W){}(?:$|\W)", regex::escape(city.as_ref()));
    let matcher = regex::Regex::new(&pattern)?;
    let document = Html::parse_document(page);
    let text = document.root_element().text().collect::<Vec<_>>().join(" ");
    Ok(matcher.is_match(&text))
}
