use crate::cache::MxOutcome;
use crate::validation::dnsmx::{MxLookup, ResolveFault};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// In-memory [`MxLookup`] with canned answers and call counting.
///
/// Unknown domains answer `Ok(false)`, like a domain without MX records.
#[derive(Default)]
pub struct ScriptedLookup {
    answers: HashMap<String, MxOutcome>,
    delay: Option<Duration>,
    calls: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
}

impl ScriptedLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_answer(mut self, domain: &str, has_mx: bool) -> Self {
        self.answers.insert(domain.to_string(), Ok(has_mx));
        self
    }

    pub fn with_fault(mut self, domain: &str, fault: ResolveFault) -> Self {
        self.answers.insert(domain.to_string(), Err(fault));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls_for(&self, domain: &str) -> usize {
        self.calls.lock().get(domain).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MxLookup for ScriptedLookup {
    async fn has_mx(&self, domain: &str) -> Result<bool, ResolveFault> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self.calls.lock().entry(domain.to_string()).or_insert(0) += 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.answers.get(domain).cloned().unwrap_or(Ok(false))
    }
}
