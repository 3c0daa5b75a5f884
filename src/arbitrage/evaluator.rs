use super::types::DetectorConfig;
use crate::models::{Opportunity, PriceSnapshot};

/// Evaluate every ordered pair of distinct configured locations.
///
/// Pairs are visited in configuration order (`from` outer, `to` inner), so the output
/// order is stable for identical input.
pub fn detect_opportunities(snapshot: &PriceSnapshot, config: &DetectorConfig) -> Vec<Opportunity> {
    let locations = snapshot.locations();
    let mut opportunities = Vec::new();

    for (i, from) in locations.iter().enumerate() {
        for (j, to) in locations.iter().enumerate() {
            if i == j {
                continue;
            }
            if let Some(opp) = evaluate_pair(snapshot, from, to, config) {
                opportunities.push(opp);
            }
        }
    }

    opportunities
}

/// Evaluate buying at `from` and selling at `to`.
///
/// Returns `None` when the ask at `from` or the bid at `to` is missing, or when the
/// rounded profit is below `min_profit`.
pub fn evaluate_pair(
    snapshot: &PriceSnapshot,
    from: &str,
    to: &str,
    config: &DetectorConfig,
) -> Option<Opportunity> {
    if from == to {
        return None;
    }
    let buy_price = snapshot.quote(from)?.sell_price_min?;
    let sell_price = snapshot.quote(to)?.buy_price_max?;
    if !buy_price.is_finite() || !sell_price.is_finite() {
        return None;
    }

    let profit = net_profit(buy_price, sell_price, config.fee_percent);
    if profit < config.min_profit {
        return None;
    }

    Some(Opportunity {
        item_id: snapshot.item_id().to_string(),
        from_location: from.to_string(),
        to_location: to.to_string(),
        buy_price,
        sell_price,
        profit,
        detected_at: snapshot.observed_at(),
    })
}

/// Profit of a flip after the sell-side fee, rounded half away from zero.
pub fn net_profit(buy_price: f64, sell_price: f64, fee_percent: f64) -> i64 {
    let gross = sell_price - buy_price;
    let fee = sell_price * (fee_percent / 100.0);
    (gross - fee).round() as i64
}
