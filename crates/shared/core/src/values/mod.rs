use chrono::NaiveDateTime;
use rust_decimal::Decimal;

/// Price value - uses Decimal for precision
pub type Price = Decimal;

/// Traded volume, in either the market or the base currency
pub type Volume = Decimal;

/// Feed timestamps carry no offset on the wire and are interpreted as UTC
pub type Timestamp = NaiveDateTime;

/// Market identifier as published by the feed, e.g. `BTC-LTC`
pub type MarketName = String;
