use crate::models::{PriceQuote, PriceSnapshot};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One row of the upstream price response. The API returns one row per location and
/// quality grade and reports a missing side as `0`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PriceRow {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub sell_price_min: Option<f64>,
    #[serde(default)]
    pub buy_price_max: Option<f64>,
    #[serde(default)]
    pub quality: Option<u32>,
}

impl PriceRow {
    fn location_name(&self) -> Option<&str> {
        self.city.as_deref().or(self.location.as_deref())
    }
}

/// Map upstream rows onto the configured locations.
///
/// Rows are matched to locations ignoring case and whitespace, rows for unknown
/// locations are dropped, and a later row with data replaces an earlier one for the
/// same location.
pub fn build_snapshot(
    item_id: &str,
    locations: &[String],
    rows: &[PriceRow],
    observed_at: DateTime<Utc>,
) -> PriceSnapshot {
    let keys: Vec<String> = locations.iter().map(|l| location_key(l)).collect();
    let mut quotes: Vec<PriceQuote> = locations.iter().map(|l| PriceQuote::empty(l.as_str())).collect();

    for row in rows {
        let Some(name) = row.location_name() else {
            tracing::debug!(item = item_id, "[FETCH] row without location ignored");
            continue;
        };
        let key = location_key(name);
        let Some(idx) = keys.iter().position(|k| *k == key) else {
            continue;
        };
        let quote = PriceQuote {
            location: locations[idx].clone(),
            sell_price_min: quote_side(row.sell_price_min),
            buy_price_max: quote_side(row.buy_price_max),
            quality: row
                .quality
                .and_then(|q| u8::try_from(q).ok())
                .filter(|q| *q > 0),
        };
        if quote.has_data() {
            quotes[idx] = quote;
        }
    }

    PriceSnapshot::new(item_id, locations, quotes, observed_at)
}

fn location_key(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn quote_side(price: Option<f64>) -> Option<f64> {
    price.filter(|p| p.is_finite() && *p > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locs() -> Vec<String> {
        vec!["Caerleon".into(), "BlackMarket".into()]
    }

    fn row(city: &str, sell: f64, buy: f64, quality: u32) -> PriceRow {
        PriceRow {
            city: Some(city.into()),
            sell_price_min: Some(sell),
            buy_price_max: Some(buy),
            quality: Some(quality),
            ..Default::default()
        }
    }

    #[test]
    fn absent_locations_default_to_empty_quotes() {
        let snap = build_snapshot("T4_SWORD", &locs(), &[row("Caerleon", 1000.0, 900.0, 1)], Utc::now());

        let caerleon = snap.quote("Caerleon").unwrap();
        assert_eq!(caerleon.sell_price_min, Some(1000.0));
        assert_eq!(caerleon.buy_price_max, Some(900.0));
        assert_eq!(caerleon.quality, Some(1));

        let black_market = snap.quote("BlackMarket").unwrap();
        assert!(!black_market.has_data());
        assert_eq!(black_market.quality, None);
    }

    #[test]
    fn zero_prices_mean_no_quote() {
        let snap = build_snapshot("T4_SWORD", &locs(), &[row("Caerleon", 0.0, 900.0, 2)], Utc::now());
        let caerleon = snap.quote("Caerleon").unwrap();
        assert_eq!(caerleon.sell_price_min, None);
        assert_eq!(caerleon.buy_price_max, Some(900.0));
    }

    #[test]
    fn unknown_locations_are_ignored() {
        let snap = build_snapshot("T4_SWORD", &locs(), &[row("Thetford", 10.0, 5.0, 1)], Utc::now());
        assert!(snap.quote("Thetford").is_none());
        assert!(snap.locations().iter().all(|l| !snap.quote(l).unwrap().has_data()));
    }

    #[test]
    fn location_names_match_loosely_but_keep_configured_spelling() {
        let snap = build_snapshot("T4_SWORD", &locs(), &[row("Black Market", 1500.0, 1400.0, 1)], Utc::now());
        let quote = snap.quote("BlackMarket").unwrap();
        assert_eq!(quote.location, "BlackMarket");
        assert_eq!(quote.buy_price_max, Some(1400.0));
    }

    #[test]
    fn location_field_is_used_when_city_is_absent() {
        let rows = vec![PriceRow {
            location: Some("caerleon".into()),
            sell_price_min: Some(10.0),
            ..Default::default()
        }];
        let snap = build_snapshot("T4_SWORD", &locs(), &rows, Utc::now());
        assert_eq!(snap.quote("Caerleon").unwrap().sell_price_min, Some(10.0));
    }

    #[test]
    fn later_rows_with_data_win_and_empty_rows_do_not_erase() {
        let rows = vec![
            row("Caerleon", 1000.0, 900.0, 1),
            row("Caerleon", 1100.0, 950.0, 2),
            row("Caerleon", 0.0, 0.0, 3),
        ];
        let snap = build_snapshot("T4_SWORD", &locs(), &rows, Utc::now());
        let quote = snap.quote("Caerleon").unwrap();
        assert_eq!(quote.sell_price_min, Some(1100.0));
        assert_eq!(quote.quality, Some(2));
    }

    #[test]
    fn parses_upstream_payload() {
        let raw = r#"[
            {"item_id":"T4_SWORD","city":"Caerleon","quality":1,"sell_price_min":1000,
             "sell_price_min_date":"2024-01-01T00:00:00","buy_price_max":900},
            {"item_id":"T4_SWORD","city":"Black Market","quality":1,"sell_price_min":0,
             "buy_price_max":1400}
        ]"#;
        let rows: Vec<PriceRow> = serde_json::from_str(raw).unwrap();
        let snap = build_snapshot("T4_SWORD", &locs(), &rows, Utc::now());
        assert_eq!(snap.quote("Caerleon").unwrap().sell_price_min, Some(1000.0));
        assert_eq!(snap.quote("BlackMarket").unwrap().sell_price_min, None);
        assert_eq!(snap.quote("BlackMarket").unwrap().buy_price_max, Some(1400.0));
    }
}
