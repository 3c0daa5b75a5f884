//! Poll loop driving fetch, detection and publishing for every configured item.

use crate::arbitrage::{DetectorConfig, detect_opportunities};
use crate::config::AppConfig;
use crate::models::{Opportunity, PriceSnapshot};
use crate::publisher::Publisher;
use crate::upstream::PriceClient;
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Where snapshots come from. `None` means no data for this item this cycle.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch(&self, item_id: &str, locations: &[String]) -> Option<PriceSnapshot>;
}

/// Where snapshots go. Returns whether the publish was accepted.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn publish(&self, snapshot: &PriceSnapshot, opportunity: Option<&Opportunity>) -> bool;
}

#[async_trait]
impl QuoteSource for PriceClient {
    async fn fetch(&self, item_id: &str, locations: &[String]) -> Option<PriceSnapshot> {
        PriceClient::fetch(self, item_id, locations).await
    }
}

#[async_trait]
impl SnapshotSink for Publisher {
    async fn publish(&self, snapshot: &PriceSnapshot, opportunity: Option<&Opportunity>) -> bool {
        Publisher::publish(self, snapshot, opportunity).await
    }
}

/// What the loop polls and how fast.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub items: Vec<String>,
    pub locations: Vec<String>,
    pub interval: Duration,
    pub item_delay: Duration,
    pub detector: DetectorConfig,
}

impl From<&AppConfig> for ScheduleConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            items: cfg.items.clone(),
            locations: cfg.locations.clone(),
            interval: cfg.interval,
            item_delay: cfg.item_delay,
            detector: DetectorConfig::from(cfg),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Items that produced a snapshot.
    pub polled: usize,
    /// Items with no data this cycle.
    pub skipped: usize,
    pub opportunities: usize,
}

pub struct Scheduler<S, P> {
    source: S,
    sink: P,
    config: ScheduleConfig,
}

impl<S: QuoteSource, P: SnapshotSink> Scheduler<S, P> {
    pub fn new(source: S, sink: P, config: ScheduleConfig) -> Self {
        Self {
            source,
            sink,
            config,
        }
    }

    /// Poll until `cancel` fires. Cancellation is observed between items and while
    /// sleeping; a fetch or publish already in flight runs to completion.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            items = ?self.config.items,
            locations = ?self.config.locations,
            interval_secs = self.config.interval.as_secs_f64(),
            fee_percent = self.config.detector.fee_percent,
            min_profit = self.config.detector.min_profit,
            "[INIT] poll loop starting"
        );

        let mut cycle: u64 = 0;
        while !cancel.is_cancelled() {
            let stats = self.run_cycle(&cancel).await;
            cycle += 1;
            info!(
                cycle,
                polled = stats.polled,
                skipped = stats.skipped,
                opportunities = stats.opportunities,
                "[HEARTBEAT] cycle complete"
            );
            if !pause(&cancel, self.config.interval).await {
                break;
            }
        }

        info!(cycles = cycle, "[SHUTDOWN] poll loop stopped");
    }

    /// One pass over all items, pausing `item_delay` between consecutive items.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleStats {
        let mut stats = CycleStats::default();

        for (idx, item) in self.config.items.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            match self.poll_item(item).await {
                Some(found) => {
                    stats.polled += 1;
                    stats.opportunities += found;
                }
                None => stats.skipped += 1,
            }
            let more = idx + 1 < self.config.items.len();
            if more && !pause(cancel, self.config.item_delay).await {
                break;
            }
        }

        stats
    }

    /// Fetch, publish and detect for one item. Returns the number of opportunities,
    /// or `None` when the item had no data.
    async fn poll_item(&self, item: &str) -> Option<usize> {
        let snapshot = self.source.fetch(item, &self.config.locations).await?;

        debug!(item, "[PUBLISH] publishing snapshot");
        self.sink.publish(&snapshot, None).await;

        let opportunities = detect_opportunities(&snapshot, &self.config.detector);
        for opp in &opportunities {
            info!(
                item,
                from = %opp.from_location,
                to = %opp.to_location,
                buy_price = opp.buy_price,
                sell_price = opp.sell_price,
                profit = opp.profit,
                "[OPP] flip found"
            );
            self.sink.publish(&snapshot, Some(opp)).await;
        }

        Some(opportunities.len())
    }
}

/// Sleep for `duration` unless cancelled first. Returns `false` on cancellation.
async fn pause(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
