//! Shared data structures used throughout the application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One observation of both sides of the market for an item at a location.
///
/// `None` means nobody is quoting that side there, which is not the same as a price of zero.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub location: String,
    /// Lowest ask, i.e. what it costs to buy here.
    pub sell_price_min: Option<f64>,
    /// Highest bid, i.e. what selling here pays.
    pub buy_price_max: Option<f64>,
    pub quality: Option<u8>,
}

impl PriceQuote {
    /// A quote with no active order on either side.
    pub fn empty(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            sell_price_min: None,
            buy_price_max: None,
            quality: None,
        }
    }

    pub fn has_data(&self) -> bool {
        self.sell_price_min.is_some() || self.buy_price_max.is_some()
    }

    pub fn levels(&self) -> PriceLevels {
        PriceLevels {
            sell: self.sell_price_min,
            buy: self.buy_price_max,
            quality: self.quality,
        }
    }
}

/// Wire form of a quote as carried in the `prices` map of a publish request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevels {
    pub sell: Option<f64>,
    pub buy: Option<f64>,
    pub quality: Option<u8>,
}

/// Prices for one item across every configured location at one point in time.
///
/// Built once per poll cycle and never modified; the next cycle produces a new snapshot.
#[derive(Debug, Clone)]
pub struct PriceSnapshot {
    item_id: String,
    locations: Vec<String>,
    quotes: BTreeMap<String, PriceQuote>,
    observed_at: DateTime<Utc>,
}

impl PriceSnapshot {
    /// Builds a snapshot holding a quote for every location in `locations`.
    ///
    /// Quotes for locations outside the configured set are discarded and configured
    /// locations without a quote get an empty one.
    pub fn new(
        item_id: impl Into<String>,
        locations: &[String],
        quotes: impl IntoIterator<Item = PriceQuote>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        let mut by_location: BTreeMap<String, PriceQuote> = locations
            .iter()
            .map(|loc| (loc.clone(), PriceQuote::empty(loc.clone())))
            .collect();
        for quote in quotes {
            if let Some(slot) = by_location.get_mut(&quote.location) {
                *slot = quote;
            }
        }
        Self {
            item_id: item_id.into(),
            locations: locations.to_vec(),
            quotes: by_location,
            observed_at,
        }
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    /// Configured locations in configuration order.
    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    pub fn quote(&self, location: &str) -> Option<&PriceQuote> {
        self.quotes.get(location)
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    /// The `prices` map sent to the broadcast server.
    pub fn wire_prices(&self) -> BTreeMap<String, PriceLevels> {
        self.quotes
            .iter()
            .map(|(loc, quote)| (loc.clone(), quote.levels()))
            .collect()
    }
}

/// A profitable buy-here, sell-there flip for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    pub item_id: String,
    #[serde(rename = "from", alias = "fromLocation")]
    pub from_location: String,
    #[serde(rename = "to", alias = "toLocation")]
    pub to_location: String,
    /// Ask at `from_location`.
    pub buy_price: f64,
    /// Bid at `to_location`.
    pub sell_price: f64,
    pub profit: i64,
    #[serde(rename = "ts", alias = "detectedAt", with = "chrono::serde::ts_milliseconds")]
    pub detected_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn locs() -> Vec<String> {
        vec!["Caerleon".into(), "BlackMarket".into()]
    }

    #[test]
    fn snapshot_fills_missing_locations_and_drops_unknown() {
        let quotes = vec![
            PriceQuote {
                location: "Caerleon".into(),
                sell_price_min: Some(1000.0),
                buy_price_max: Some(900.0),
                quality: Some(1),
            },
            PriceQuote {
                location: "Thetford".into(),
                sell_price_min: Some(1.0),
                buy_price_max: None,
                quality: None,
            },
        ];
        let snap = PriceSnapshot::new("T4_SWORD", &locs(), quotes, Utc::now());

        assert_eq!(snap.locations(), locs().as_slice());
        assert_eq!(snap.quote("Caerleon").unwrap().sell_price_min, Some(1000.0));
        assert_eq!(snap.quote("BlackMarket"), Some(&PriceQuote::empty("BlackMarket")));
        assert!(snap.quote("Thetford").is_none());
        assert_eq!(snap.wire_prices().len(), 2);
    }

    #[test]
    fn opportunity_serializes_with_consumer_field_names() {
        let opp = Opportunity {
            item_id: "T4_SWORD".into(),
            from_location: "Caerleon".into(),
            to_location: "BlackMarket".into(),
            buy_price: 1000.0,
            sell_price: 1400.0,
            profit: 330,
            detected_at: Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
        };
        let json = serde_json::to_value(&opp).unwrap();
        assert_eq!(json["itemId"], "T4_SWORD");
        assert_eq!(json["from"], "Caerleon");
        assert_eq!(json["to"], "BlackMarket");
        assert_eq!(json["profit"], 330);
        assert_eq!(json["ts"], 1_700_000_000_123i64);
    }

    #[test]
    fn opportunity_accepts_long_field_names() {
        let raw = r#"{
            "itemId": "T4_SWORD",
            "fromLocation": "Caerleon",
            "toLocation": "BlackMarket",
            "buyPrice": 1000,
            "sellPrice": 1400,
            "profit": 330,
            "detectedAt": 1700000000000
        }"#;
        let opp: Opportunity = serde_json::from_str(raw).unwrap();
        assert_eq!(opp.from_location, "Caerleon");
        assert_eq!(opp.detected_at.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn levels_keep_nulls() {
        let json = serde_json::to_value(PriceQuote::empty("Caerleon").levels()).unwrap();
        assert!(json["sell"].is_null());
        assert!(json["buy"].is_null());
        assert!(json["quality"].is_null());
    }
}
