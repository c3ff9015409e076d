//! Registration Coordinator
//!
//! Drives the bootstrap loop:
//!
//! ```text
//!            ┌──────────────────────────────────────────┐
//!            ▼                                          │ probe or
//!   deadline passed? ──yes──▶ FatalTimeout              │ submission
//!            │ no                                       │ failed
//!            ▼                                          │
//!   sleep(interval) ─▶ probe ─▶ submit every record ────┘
//!                                       │ all accepted
//!                                       ▼
//!                                     Done
//! ```
//!
//! An attempt never resumes: the first rejected record abandons the rest,
//! and the next attempt starts again from the first record. The registry
//! accepts re-registration of an identical schema, so repeats are harmless.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};

use crate::client::{Registry, RegistryClient};
use crate::config::{BootstrapConfig, RegistryEndpoint, RetryConfig};
use crate::error::{BootstrapError, Result, SubmissionError};
use crate::loader::load_bundle;
use crate::schema::SchemaRecord;
use crate::source::DocumentSource;

/// How long to keep trying, and how long to wait before each probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub budget: Duration,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            budget: Duration::from_secs(config.budget_secs),
            interval: Duration::from_secs(config.interval_secs),
        }
    }
}

/// Result of one registration pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    AllRegistered,
    Failed {
        subject: String,
        cause: SubmissionError,
    },
}

/// What a successful bootstrap took
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapSummary {
    /// Readiness probes sent, successful or not
    pub probes: u32,
    /// Registration passes started
    pub attempts: u32,
    /// Records registered in the final pass
    pub registered: usize,
    pub elapsed: Duration,
}

/// Registers a fixed record list against a registry within a time budget
pub struct Coordinator<R> {
    registry: R,
    policy: RetryPolicy,
}

impl<R: Registry> Coordinator<R> {
    pub fn new(registry: R, policy: RetryPolicy) -> Self {
        Self { registry, policy }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Run until every record is registered in a single pass, or the budget
    /// runs out ([`BootstrapError::Timeout`])
    pub async fn run(&self, records: &[SchemaRecord]) -> Result<BootstrapSummary> {
        let started = Instant::now();
        let deadline = started + self.policy.budget;
        let mut probes = 0u32;
        let mut attempts = 0u32;

        loop {
            if Instant::now() >= deadline {
                error!(
                    budget = ?self.policy.budget,
                    probes,
                    attempts,
                    "timeout trying to setup registry"
                );
                return Err(BootstrapError::Timeout(self.policy.budget));
            }

            sleep(self.policy.interval).await;

            probes += 1;
            if let Err(e) = self.registry.probe().await {
                warn!(probe = probes, error = %e, "failed to dial registry");
                continue;
            }

            attempts += 1;
            match self.register_all(records).await {
                AttemptOutcome::AllRegistered => {
                    let elapsed = started.elapsed();
                    info!(
                        schemas = records.len(),
                        attempts,
                        elapsed = ?elapsed,
                        "all schemas successfully sent to the registry"
                    );
                    return Ok(BootstrapSummary {
                        probes,
                        attempts,
                        registered: records.len(),
                        elapsed,
                    });
                }
                AttemptOutcome::Failed { subject, cause } => {
                    warn!(
                        attempt = attempts,
                        subject = %subject,
                        error = %cause,
                        "failed to register schema, restarting"
                    );
                }
            }
        }
    }

    /// Submit every record in order, stopping at the first failure
    pub async fn register_all(&self, records: &[SchemaRecord]) -> AttemptOutcome {
        for record in records {
            if let Err(cause) = self.registry.submit(&record.name, &record.body).await {
                return AttemptOutcome::Failed {
                    subject: record.name.clone(),
                    cause,
                };
            }
        }
        AttemptOutcome::AllRegistered
    }
}

/// Full bootstrap: resolve the endpoint through `lookup`, load the bundle
/// from `source`, then run the loop against a [`RegistryClient`].
///
/// The endpoint is resolved before the bundle is read or any request is
/// made, so a missing `KAFKA_SCHEMA_REGISTRY_ENDPOINT` fails immediately.
pub async fn bootstrap(
    lookup: impl Fn(&str) -> Option<String>,
    config: &BootstrapConfig,
    source: &dyn DocumentSource,
) -> Result<BootstrapSummary> {
    let endpoint = RegistryEndpoint::from_lookup(lookup)?;

    let bundle = load_bundle(source)?;
    info!(
        schemas = bundle.len(),
        digest = %bundle.digest,
        endpoint = %endpoint,
        "loaded schema bundle"
    );

    let client = RegistryClient::new(endpoint, config.registry.request_timeout())?;
    Coordinator::new(client, RetryPolicy::from(&config.retry))
        .run(&bundle.records)
        .await
}
