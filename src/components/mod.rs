//! External collaborators: the risk-analysis supplier, the price supplier and
//! the event fan-out.

pub mod deep3;
pub mod event_bus;
pub mod price_feed;

pub use deep3::{Deep3Analysis, MockDeep3Analyzer, RiskAnalyzer};
pub use event_bus::{EventBus, ShieldEvent};
pub use price_feed::{MockPriceSource, PriceFeed, PriceSource};
