use super::normalize::{PriceRow, build_snapshot};
use crate::errors::{AppError, Result};
use crate::models::PriceSnapshot;
use chrono::Utc;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Handle for the upstream price API. Create once and share; the inner HTTP
/// client pools connections.
#[derive(Clone)]
pub struct PriceClient {
    http: Client,
    base_url: Url,
}

impl PriceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Config(format!("PRICE_API_URL: {base_url} cannot be a base URL")));
        }
        Ok(Self { http, base_url })
    }

    /// `{base}/{item}?locations=a,b`
    pub fn item_url(&self, item_id: &str, locations: &[String]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Other(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .push(item_id);
        url.query_pairs_mut()
            .append_pair("locations", &locations.join(","));
        Ok(url)
    }

    /// Query quotes for one item at all `locations` in a single request.
    pub async fn try_fetch(&self, item_id: &str, locations: &[String]) -> Result<PriceSnapshot> {
        let url = self.item_url(item_id, locations)?;
        debug!(item = item_id, %url, "[FETCH] requesting prices");

        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Upstream {
                status: status.as_u16(),
            });
        }
        let rows: Vec<PriceRow> = resp.json().await?;
        Ok(build_snapshot(item_id, locations, &rows, Utc::now()))
    }

    /// Like [`try_fetch`](Self::try_fetch) but logs failures and returns `None`,
    /// meaning "no update this cycle".
    pub async fn fetch(&self, item_id: &str, locations: &[String]) -> Option<PriceSnapshot> {
        match self.try_fetch(item_id, locations).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(item = item_id, error = %e, "[FETCH] price fetch failed");
                None
            }
        }
    }
}
