use async_trait::async_trait;

use crate::cookies::CookieSet;

/// Port for the anti-bot challenge solver
///
/// Given the protected address and the identity (user agent) the transport
/// will present, returns session cookies, or `None` when the challenge could
/// not be solved within `timeout_secs`.
#[async_trait]
pub trait ChallengeSolver: Send + Sync {
    async fn get_cookies(
        &self,
        address: &str,
        identity: &str,
        timeout_secs: u64,
    ) -> Option<CookieSet>;

    /// Get the solver's name for logging
    fn name(&self) -> &str {
        "ChallengeSolver"
    }
}
