use async_trait::async_trait;
use deltastream_ports::{ChallengeSolver, CookieSet};
use log::debug;
use parking_lot::Mutex;

/// Arguments of one `get_cookies` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverCall {
    pub address: String,
    pub identity: String,
    pub timeout_secs: u64,
}

/// Challenge solver with a canned answer
pub struct ScriptedSolver {
    answer: Mutex<Option<CookieSet>>,
    calls: Mutex<Vec<SolverCall>>,
}

impl ScriptedSolver {
    /// Solver that always hands out `cookies`
    pub fn granting(cookies: CookieSet) -> Self {
        Self {
            answer: Mutex::new(Some(cookies)),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Solver that never solves the challenge
    pub fn refusing() -> Self {
        Self {
            answer: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_answer(&self, answer: Option<CookieSet>) {
        *self.answer.lock() = answer;
    }

    pub fn calls(&self) -> Vec<SolverCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl ChallengeSolver for ScriptedSolver {
    async fn get_cookies(
        &self,
        address: &str,
        identity: &str,
        timeout_secs: u64,
    ) -> Option<CookieSet> {
        debug!("Solving challenge for {}", address);
        self.calls.lock().push(SolverCall {
            address: address.to_string(),
            identity: identity.to_string(),
            timeout_secs,
        });
        self.answer.lock().clone()
    }

    fn name(&self) -> &str {
        "ScriptedSolver"
    }
}
