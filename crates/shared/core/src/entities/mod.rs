mod market_update;
mod subscription;
mod summary_batch;

pub use market_update::MarketUpdate;
pub use subscription::{MarketFilter, SubscriptionId};
pub use summary_batch::SummaryBatch;
