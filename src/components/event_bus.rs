//! Event fan-out
//!
//! Services produce tagged payloads; delivery is best-effort over a tokio
//! broadcast channel. Slow subscribers lag and lose events instead of
//! blocking producers.

use crate::tier::TierResolution;
use crate::types::{ArbitrageBot, ThreatLevel, Tier, Transaction};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Tier change notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierChange {
    pub wallet_id: String,
    pub address: String,
    pub previous: Tier,
    pub resolution: TierResolution,
}

/// Bot change notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotChange {
    Created,
    Updated,
    Paused,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ShieldEvent {
    /// A classified transaction was stored
    Transaction(Transaction),
    /// Final threat level is above SAFE
    ThreatDetected {
        transaction: Transaction,
        threat_level: ThreatLevel,
    },
    BotUpdate {
        change: BotChange,
        bot: ArbitrageBot,
    },
    TierUpdate(TierChange),
}

impl ShieldEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ShieldEvent::Transaction(_) => "transaction",
            ShieldEvent::ThreatDetected { .. } => "threat_detected",
            ShieldEvent::BotUpdate { .. } => "bot_update",
            ShieldEvent::TierUpdate(_) => "tier_update",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ShieldEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Fire-and-forget; returns the number of receivers reached
    pub fn publish(&self, event: ShieldEvent) -> usize {
        let kind = event.kind();
        match self.tx.send(event) {
            Ok(n) => n,
            Err(_) => {
                trace!(kind, "No subscribers for event");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShieldEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::TierSource;

    fn tier_event() -> ShieldEvent {
        ShieldEvent::TierUpdate(TierChange {
            wallet_id: "w1".to_string(),
            address: "Addr".to_string(),
            previous: Tier::Basic,
            resolution: TierResolution {
                tier: Tier::Pro,
                source: TierSource::CathHoldings,
                cath_balance: 60.0,
                cath_value_in_sol: 0.3,
                meets_pro_threshold: true,
                meets_pro_plus_threshold: false,
                has_paid_subscription: false,
            },
        })
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = EventBus::new(8);
        assert_eq!(bus.publish(tier_event()), 0);
    }

    #[tokio::test]
    async fn test_fan_out() {
        let bus = EventBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        assert_eq!(bus.publish(tier_event()), 2);
        assert_eq!(a.recv().await.unwrap().kind(), "tier_update");
        assert_eq!(b.recv().await.unwrap(), tier_event());
    }

    #[test]
    fn test_wire_shape() {
        let json = serde_json::to_value(tier_event()).unwrap();
        assert_eq!(json["type"], "tier_update");
        assert_eq!(json["data"]["resolution"]["source"], "cath_holdings");
        assert_eq!(json["data"]["resolution"]["tier"], "pro");
    }
}
