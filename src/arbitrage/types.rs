/// Configuration for flip detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    /// Marketplace fee charged on the sell side, in percent.
    pub fee_percent: f64,
    /// Flips whose rounded profit is below this are never reported.
    pub min_profit: i64,
}

impl DetectorConfig {
    pub fn new(fee_percent: f64, min_profit: i64) -> Self {
        Self {
            fee_percent,
            min_profit,
        }
    }
}

impl From<&crate::config::AppConfig> for DetectorConfig {
    fn from(cfg: &crate::config::AppConfig) -> Self {
        Self::new(cfg.fee_percent, cfg.min_profit)
    }
}
