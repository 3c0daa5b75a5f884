//! Upstream price API integration.

pub mod client;
pub mod normalize;

pub use client::PriceClient;
pub use normalize::{PriceRow, build_snapshot};
