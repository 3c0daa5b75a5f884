pub mod evaluator;
pub mod types;

pub use evaluator::{detect_opportunities, evaluate_pair, net_profit};
pub use types::DetectorConfig;
