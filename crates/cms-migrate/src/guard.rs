//! Existence guard: keeps re-runs idempotent.
//!
//! A slug is claimed in-process before the destination is consulted, so two
//! concurrent workers can never both decide the same slug is free. The claim
//! set is only touched under a short lock that is never held across an
//! await.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::connectors::{DestinationConnector, ExistingRecord};
use crate::error::Result;
use crate::retry::{with_retry, RetryConfig};

/// What the guard decided for a slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Slug is free; this worker owns it for the rest of the run.
    Proceed,
    /// Destination already holds the slug.
    Exists(ExistingRecord),
    /// Another item in this run already claimed the slug.
    DuplicateInRun,
}

/// Decision plus any warning worth recording on the item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardOutcome {
    /// Decision.
    pub decision: GuardDecision,
    /// Set when the remote check failed and the guard assumed absence.
    pub warning: Option<String>,
}

/// Serializes slug claims and checks the destination.
pub struct ExistenceGuard {
    destination: Arc<dyn DestinationConnector>,
    record_type: String,
    retry: RetryConfig,
    assume_absent_on_error: bool,
    claimed: Mutex<HashSet<String>>,
}

impl ExistenceGuard {
    /// Creates a guard for one destination record type.
    pub fn new(
        destination: Arc<dyn DestinationConnector>,
        record_type: &str,
        retry: RetryConfig,
        assume_absent_on_error: bool,
    ) -> Self {
        Self {
            destination,
            record_type: record_type.to_string(),
            retry,
            assume_absent_on_error,
            claimed: Mutex::new(HashSet::new()),
        }
    }

    /// Atomically claims `slug`; false if it was already claimed.
    fn claim(&self, slug: &str) -> bool {
        self.claimed.lock().insert(slug.to_string())
    }

    /// Number of slugs claimed so far.
    pub fn claimed_count(&self) -> usize {
        self.claimed.lock().len()
    }

    /// Claims `slug` and checks whether the destination already holds it.
    ///
    /// # Errors
    ///
    /// Returns the lookup error after retries, unless the guard is set to
    /// assume absence on error, in which case it proceeds with a warning.
    pub async fn check(&self, slug: &str) -> Result<GuardOutcome> {
        if !self.claim(slug) {
            debug!("slug '{}' already claimed in this run", slug);
            return Ok(GuardOutcome {
                decision: GuardDecision::DuplicateInRun,
                warning: None,
            });
        }

        let operation = format!("existence check {}/{}", self.record_type, slug);
        let lookup = with_retry(&self.retry, &operation, || {
            self.destination.find_existing(&self.record_type, slug)
        })
        .await;

        match lookup {
            Ok(Some(existing)) => Ok(GuardOutcome {
                decision: GuardDecision::Exists(existing),
                warning: None,
            }),
            Ok(None) => Ok(GuardOutcome {
                decision: GuardDecision::Proceed,
                warning: None,
            }),
            Err(e) if self.assume_absent_on_error => {
                let warning = format!("existence check failed, assuming absent: {e}");
                warn!("{}: {}", slug, warning);
                Ok(GuardOutcome {
                    decision: GuardDecision::Proceed,
                    warning: Some(warning),
                })
            }
            Err(e) => Err(e),
        }
    }
}
