use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::values::{MarketName, Price, Timestamp, Volume};

/// Snapshot of one market's summary, as pushed by the feed
///
/// Field names follow the wire format (`MarketName`, `OpenBuyOrders`, ...).
/// Records are produced by decoding inbound batches and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MarketUpdate {
    pub market_name: MarketName,
    pub high: Price,
    pub low: Price,
    pub volume: Volume,
    pub last: Price,
    pub base_volume: Volume,
    #[serde(rename = "TimeStamp")]
    pub timestamp: Timestamp,
    pub bid: Price,
    pub ask: Price,
    pub open_buy_orders: u32,
    pub open_sell_orders: u32,
    pub prev_day: Price,
    pub created: Timestamp,
    #[serde(default)]
    pub display_market_name: Option<String>,
}

impl MarketUpdate {
    /// Get the market name as a string slice
    pub fn market(&self) -> &str {
        &self.market_name
    }

    /// Returns the bid/ask spread (ask - bid)
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }

    /// Change of the last price relative to the previous day's price
    pub fn change_from_prev_day(&self) -> Decimal {
        self.last - self.prev_day
    }

    /// Total number of resting orders on both sides
    pub fn open_orders(&self) -> u64 {
        u64::from(self.open_buy_orders) + u64::from(self.open_sell_orders)
    }
}
