//! Client side of the broadcast server's ingest endpoint.
//!
//! Delivery is best effort and at most once: a failed publish is logged and dropped,
//! the next poll cycle carries fresher data anyway.

use crate::errors::{AppError, Result};
use crate::models::{Opportunity, PriceLevels, PriceSnapshot};
use reqwest::Client;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PublishBody<'a> {
    item_id: &'a str,
    region: &'a [String],
    prices: BTreeMap<String, PriceLevels>,
    #[serde(skip_serializing_if = "Option::is_none")]
    opportunity: Option<&'a Opportunity>,
}

/// Handle for publishing snapshots. Created once at startup and passed to the scheduler.
#[derive(Clone)]
pub struct Publisher {
    http: Client,
    ingest_url: Url,
}

impl Publisher {
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        let mut ingest_url = Url::parse(server_url)?;
        ingest_url
            .path_segments_mut()
            .map_err(|_| AppError::Config(format!("SERVER_URL: {server_url} cannot be a base URL")))?
            .pop_if_empty()
            .push("publish");
        Ok(Self { http, ingest_url })
    }

    pub fn ingest_url(&self) -> &Url {
        &self.ingest_url
    }

    pub async fn try_publish(
        &self,
        snapshot: &PriceSnapshot,
        opportunity: Option<&Opportunity>,
    ) -> Result<()> {
        let body = PublishBody {
            item_id: snapshot.item_id(),
            region: snapshot.locations(),
            prices: snapshot.wire_prices(),
            opportunity,
        };
        let resp = self.http.post(self.ingest_url.clone()).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Upstream {
                status: status.as_u16(),
            });
        }
        debug!(
            item = snapshot.item_id(),
            with_opportunity = opportunity.is_some(),
            "[PUBLISH] delivered"
        );
        Ok(())
    }

    /// Publish and report whether the server accepted it. Failures are only logged.
    pub async fn publish(&self, snapshot: &PriceSnapshot, opportunity: Option<&Opportunity>) -> bool {
        match self.try_publish(snapshot, opportunity).await {
            Ok(()) => true,
            Err(e) => {
                warn!(item = snapshot.item_id(), error = %e, "[PUBLISH] publish failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceQuote;
    use crate::utils::spawn_test_server;
    use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
    use chrono::Utc;
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::sync::Arc;

    fn snapshot() -> PriceSnapshot {
        let locations = vec!["Caerleon".to_string(), "BlackMarket".to_string()];
        let quotes = vec![PriceQuote {
            location: "Caerleon".into(),
            sell_price_min: Some(1000.0),
            buy_price_max: Some(900.0),
            quality: Some(1),
        }];
        PriceSnapshot::new("T4_SWORD", &locations, quotes, Utc::now())
    }

    fn recorder() -> (Router, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                "/publish",
                post(
                    |State(seen): State<Arc<Mutex<Vec<Value>>>>, Json(body): Json<Value>| async move {
                        seen.lock().push(body);
                        Json(serde_json::json!({"ok": true}))
                    },
                ),
            )
            .with_state(seen.clone());
        (app, seen)
    }

    #[test]
    fn ingest_url_appends_publish() {
        let p = Publisher::new("http://localhost:4000", Duration::from_secs(1)).unwrap();
        assert_eq!(p.ingest_url().as_str(), "http://localhost:4000/publish");
        let p = Publisher::new("http://host/relay/", Duration::from_secs(1)).unwrap();
        assert_eq!(p.ingest_url().as_str(), "http://host/relay/publish");
    }

    #[tokio::test]
    async fn sends_snapshot_without_opportunity_field() {
        let (app, seen) = recorder();
        let base = spawn_test_server(app).await;
        let publisher = Publisher::new(&base, Duration::from_secs(5)).unwrap();

        assert!(publisher.publish(&snapshot(), None).await);

        let bodies = seen.lock().clone();
        assert_eq!(bodies.len(), 1);
        let body = &bodies[0];
        assert_eq!(body["itemId"], "T4_SWORD");
        assert_eq!(body["region"], serde_json::json!(["Caerleon", "BlackMarket"]));
        assert_eq!(body["prices"]["Caerleon"]["sell"], 1000.0);
        assert_eq!(body["prices"]["Caerleon"]["quality"], 1);
        assert!(body["prices"]["BlackMarket"]["buy"].is_null());
        assert!(body.get("opportunity").is_none());
    }

    #[tokio::test]
    async fn sends_opportunity_when_present() {
        let (app, seen) = recorder();
        let base = spawn_test_server(app).await;
        let publisher = Publisher::new(&base, Duration::from_secs(5)).unwrap();
        let snap = snapshot();
        let opp = Opportunity {
            item_id: "T4_SWORD".into(),
            from_location: "Caerleon".into(),
            to_location: "BlackMarket".into(),
            buy_price: 1000.0,
            sell_price: 1400.0,
            profit: 330,
            detected_at: snap.observed_at(),
        };

        assert!(publisher.publish(&snap, Some(&opp)).await);

        let body = seen.lock()[0].clone();
        assert_eq!(body["opportunity"]["from"], "Caerleon");
        assert_eq!(body["opportunity"]["profit"], 330);
    }

    #[tokio::test]
    async fn rejected_publish_is_reported_not_raised() {
        let app = Router::new().route(
            "/publish",
            post(|| async { (StatusCode::BAD_REQUEST, Json(serde_json::json!({"error": "nope"}))) }),
        );
        let base = spawn_test_server(app).await;
        let publisher = Publisher::new(&base, Duration::from_secs(5)).unwrap();

        assert!(matches!(
            publisher.try_publish(&snapshot(), None).await,
            Err(AppError::Upstream { status: 400 })
        ));
        assert!(!publisher.publish(&snapshot(), None).await);
    }

    #[tokio::test]
    async fn unreachable_server_is_reported_not_raised() {
        let publisher = Publisher::new("http://127.0.0.1:1", Duration::from_millis(500)).unwrap();
        assert!(!publisher.publish(&snapshot(), None).await);
    }
}
