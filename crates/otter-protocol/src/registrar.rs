//! Membership heartbeats.
//!
//! A member proves liveness by rewriting `/ping/<host>` every interval with
//! a fresh timestamp and a TTL; a member that stops simply expires out of
//! the host list. Each rewrite is a compare-and-swap on the value this
//! registrar wrote last, so a second process claiming the same host name
//! breaks the chain and is reported as an identity collision.

use crate::client::OtterClient;
use crate::errors::RegistrarError;
use chrono::{DateTime, SecondsFormat, Utc};
use otter_core::effects::{
    CancellationToken, CoordinationEffects, CoordinationError, PhysicalTime,
    PhysicalTimeEffects, RandomEffects, Revision,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Heartbeat timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrarConfig {
    /// Time between heartbeats
    pub interval: Duration,
    /// Lifetime of each heartbeat
    pub ttl: Duration,
}

impl Default for RegistrarConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            ttl: Duration::from_secs(60),
        }
    }
}

/// Where the registrar is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrarState {
    /// Nothing written yet, or the entry expired
    Unregistered,
    /// Last heartbeat we wrote
    Registered {
        /// Value written, used as the next compare-and-swap precondition
        value: String,
        /// Per-key version reported for that write, if any
        version: Option<u64>,
    },
    /// Identity collision observed; no further heartbeats
    Collided,
}

/// Outcome of a single heartbeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heartbeat {
    /// Timestamp written
    pub value: String,
    /// Store revision of the write
    pub revision: Revision,
    /// True when the write was unconditional (first or after expiry)
    pub registered: bool,
}

/// Heartbeat state machine
pub struct MembershipRegistrar<C, R, T> {
    client: Arc<OtterClient<C, R>>,
    time: T,
    config: RegistrarConfig,
    state: RegistrarState,
}

/// Render a heartbeat timestamp.
pub fn heartbeat_value(now: PhysicalTime) -> String {
    DateTime::<Utc>::from_timestamp_millis(now.ts_ms as i64)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl<C, R, T> MembershipRegistrar<C, R, T>
where
    C: CoordinationEffects,
    R: RandomEffects,
    T: PhysicalTimeEffects,
{
    /// Create an unregistered registrar.
    pub fn new(client: Arc<OtterClient<C, R>>, time: T, config: RegistrarConfig) -> Self {
        Self {
            client,
            time,
            config,
            state: RegistrarState::Unregistered,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &RegistrarState {
        &self.state
    }

    /// Write one heartbeat.
    pub async fn step(&mut self) -> Result<Heartbeat, RegistrarError> {
        let host = self.client.hostname().to_string();
        let (previous, version) = match &self.state {
            RegistrarState::Collided => {
                return Err(RegistrarError::IdentityCollision {
                    host,
                    reason: "registrar already stopped".to_string(),
                })
            }
            RegistrarState::Unregistered => (None, None),
            RegistrarState::Registered { value, version } => (Some(value.clone()), *version),
        };

        let value = heartbeat_value(self.time.physical_time().await?);
        let outcome = self
            .client
            .update_host(&value, previous.as_deref(), self.config.ttl)
            .await;

        let revision = match outcome {
            Ok(revision) => revision,
            Err(CoordinationError::NotFound { .. }) if previous.is_some() => {
                warn!(host = %host, "heartbeat expired, registering again");
                self.state = RegistrarState::Unregistered;
                let revision = self
                    .client
                    .update_host(&value, None, self.config.ttl)
                    .await?;
                return Ok(self.accept(value, revision, true));
            }
            Err(CoordinationError::CompareFailed { reason, .. }) => {
                return Err(self.collide(host, format!("heartbeat replaced: {reason}")));
            }
            Err(e) => return Err(e.into()),
        };

        if let (Some(prior), Some(current)) = (version, revision.version) {
            if current != prior + 1 {
                return Err(self.collide(
                    host,
                    format!("version jumped from {prior} to {current}"),
                ));
            }
        }
        let registered = previous.is_none();
        Ok(self.accept(value, revision, registered))
    }

    /// Heartbeat until `shutdown` fires or a fatal error occurs.
    ///
    /// Non-fatal store errors are logged and retried on the next tick.
    pub async fn run<S>(&mut self, shutdown: &S) -> Result<(), RegistrarError>
    where
        S: CancellationToken + ?Sized,
    {
        info!(host = %self.client.hostname(), "starting membership heartbeat");
        loop {
            if shutdown.is_cancelled() {
                return Ok(());
            }
            match self.step().await {
                Ok(beat) => debug!(value = %beat.value, index = beat.revision.index, "heartbeat"),
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "membership heartbeat stopped");
                    return Err(e);
                }
                Err(e) => warn!(error = %e, "heartbeat failed"),
            }
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                _ = self.time.sleep(self.config.interval) => {}
            }
        }
    }

    fn accept(&mut self, value: String, revision: Revision, registered: bool) -> Heartbeat {
        if registered {
            info!(host = %self.client.hostname(), index = revision.index, "registered");
        }
        self.state = RegistrarState::Registered {
            value: value.clone(),
            version: revision.version,
        };
        Heartbeat {
            value,
            revision,
            registered,
        }
    }

    fn collide(&mut self, host: String, reason: String) -> RegistrarError {
        self.state = RegistrarState::Collided;
        RegistrarError::IdentityCollision { host, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_values_are_rfc3339() {
        let value = heartbeat_value(PhysicalTime::from_millis(1_700_000_000_123));
        assert_eq!(value, "2023-11-14T22:13:20.123Z");
    }

    #[test]
    fn defaults_match_membership_timing() {
        let config = RegistrarConfig::default();
        assert_eq!(config.interval, Duration::from_secs(15));
        assert_eq!(config.ttl, Duration::from_secs(60));
    }
}
