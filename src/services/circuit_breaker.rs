//! Circuit breaker over shared persistent state.
//!
//! Every process reads and writes `systemStatus/circuitBreaker`, so a failing
//! upstream observed by one instance stops calls from all of them. After
//! `failure_threshold` consecutive failures the circuit opens for `cooldown`.
//! Once the cooldown passes the circuit is half-open: exactly one caller per
//! cooldown-long epoch wins the trial slot through an atomic increment on
//! `trial_{epoch}`, and its outcome closes or re-opens the circuit.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::errors::DomainResult;
use crate::domain::models::breaker::{
    breaker_path, stale_trial_fields, trial_field, BreakerCheck, BreakerSnapshot, BreakerState,
    CONSECUTIVE_FAILURES_FIELD,
};
use crate::domain::models::config::CircuitBreakerConfig;
use crate::domain::ports::{Clock, DocumentStore};

pub struct CircuitBreakerService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    config: CircuitBreakerConfig,
}

impl CircuitBreakerService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        config: CircuitBreakerConfig,
    ) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn cooldown(&self) -> chrono::Duration {
        let secs = i64::try_from(self.config.cooldown_secs).unwrap_or(i64::MAX / 1000);
        chrono::Duration::seconds(secs.max(1))
    }

    async fn load(&self) -> DomainResult<BreakerState> {
        let path = breaker_path()?;
        match self.store.get(&path).await? {
            Some(doc) => BreakerState::from_document(doc),
            None => Ok(BreakerState::default()),
        }
    }

    /// Decide whether a call may proceed.
    ///
    /// A half-open check may claim the trial slot; callers that end up not
    /// calling upstream must hand it back with [`Self::release_trial`].
    pub async fn check(&self) -> DomainResult<BreakerCheck> {
        if !self.config.enabled {
            return Ok(BreakerCheck::Closed);
        }

        let state = self.load().await?;
        let now = self.clock.now();
        let Some(open_until) = state.open_until else {
            return Ok(BreakerCheck::Closed);
        };

        if now < open_until {
            return Ok(BreakerCheck::Open {
                retry_after: until(open_until, now),
            });
        }

        let cooldown_ms = self.cooldown().num_milliseconds();
        let epoch = (now - open_until).num_milliseconds() / cooldown_ms;
        let claims = self
            .store
            .atomic_increment(&breaker_path()?, &trial_field(epoch), 1)
            .await?;

        if claims == 1 {
            tracing::info!(
                epoch,
                consecutive_failures = state.consecutive_failures,
                "Circuit half-open, admitting trial call"
            );
            return Ok(BreakerCheck::Trial { epoch });
        }

        let epoch_end =
            open_until + chrono::Duration::milliseconds(cooldown_ms.saturating_mul(epoch + 1));
        tracing::debug!(epoch, claims, "Trial call already in flight");
        Ok(BreakerCheck::Open {
            retry_after: until(epoch_end, now),
        })
    }

    /// True when calls are currently rejected. Claims the trial slot when
    /// half-open, like [`Self::check`].
    pub async fn is_open(&self) -> DomainResult<bool> {
        Ok(self.check().await?.is_open())
    }

    /// Give back a trial slot that was claimed but not used, and drop the
    /// claims of earlier epochs so the breaker document stays bounded.
    pub async fn release_trial(&self, check: &BreakerCheck) -> DomainResult<()> {
        let BreakerCheck::Trial { epoch } = check else {
            return Ok(());
        };

        let path = breaker_path()?;
        self.store
            .atomic_increment(&path, &trial_field(*epoch), -1)
            .await?;

        if let Some(document) = self.store.get(&path).await? {
            for field in stale_trial_fields(&document, *epoch) {
                self.store.remove_field(&path, &field).await?;
            }
        }
        tracing::debug!(epoch, "Released unused trial slot");
        Ok(())
    }

    pub async fn record_success(&self) -> DomainResult<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let state = self.load().await?;
        if state.consecutive_failures == 0 && state.open_until.is_none() {
            return Ok(());
        }

        self.write_closed().await?;
        if state.open_until.is_some() {
            tracing::info!("Circuit closed after successful call");
        }
        Ok(())
    }

    pub async fn record_failure(&self) -> DomainResult<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let path = breaker_path()?;
        let failures = self
            .store
            .atomic_increment(&path, CONSECUTIVE_FAILURES_FIELD, 1)
            .await?;

        if failures >= i64::from(self.config.failure_threshold) {
            let now = self.clock.now();
            let open_until = now + self.cooldown();
            // Full overwrite also drops the claims of earlier trial epochs.
            let state = BreakerState::tripped(failures, open_until, now);
            self.store.set(&path, state.to_document()?).await?;

            tracing::warn!(
                consecutive_failures = failures,
                open_until = %open_until.to_rfc3339(),
                "Circuit opened"
            );
        } else {
            tracing::debug!(consecutive_failures = failures, "Recorded upstream failure");
        }
        Ok(())
    }

    /// Manually close the circuit.
    pub async fn reset(&self) -> DomainResult<()> {
        self.write_closed().await?;
        tracing::info!("Circuit manually reset");
        Ok(())
    }

    pub async fn state(&self) -> DomainResult<BreakerSnapshot> {
        let state = self.load().await?;
        Ok(BreakerSnapshot {
            state: state.state_at(self.clock.now()),
            consecutive_failures: state.consecutive_failures,
            failure_threshold: self.config.failure_threshold,
            open_until: state.open_until,
            last_updated: state.last_updated,
        })
    }

    async fn write_closed(&self) -> DomainResult<()> {
        let state = BreakerState::closed(self.clock.now());
        self.store.set(&breaker_path()?, state.to_document()?).await
    }
}

fn until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (deadline - now).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryDocumentStore, ManualClock};
    use crate::domain::models::breaker::CircuitState;
    use chrono::TimeZone;

    fn setup() -> (Arc<ManualClock>, CircuitBreakerService) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 10, 16, 10, 0, 0).unwrap(),
        ));
        let service = CircuitBreakerService::new(
            Arc::new(InMemoryDocumentStore::new()),
            clock.clone(),
            CircuitBreakerConfig::default(),
        );
        (clock, service)
    }

    async fn trip(service: &CircuitBreakerService) {
        for _ in 0..service.config().failure_threshold {
            service.record_failure().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_starts_closed() {
        let (_, service) = setup();
        assert_eq!(service.check().await.unwrap(), BreakerCheck::Closed);
        assert_eq!(service.state().await.unwrap().state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_opens_at_threshold() {
        let (_, service) = setup();
        for _ in 0..4 {
            service.record_failure().await.unwrap();
        }
        assert!(!service.is_open().await.unwrap());

        service.record_failure().await.unwrap();
        match service.check().await.unwrap() {
            BreakerCheck::Open { retry_after } => assert_eq!(retry_after, Duration::from_secs(60)),
            other => panic!("expected open, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_success_resets_failures() {
        let (_, service) = setup();
        for _ in 0..4 {
            service.record_failure().await.unwrap();
        }
        service.record_success().await.unwrap();
        for _ in 0..4 {
            service.record_failure().await.unwrap();
        }
        assert!(!service.is_open().await.unwrap());
        assert_eq!(service.state().await.unwrap().consecutive_failures, 4);
    }

    #[tokio::test]
    async fn test_single_trial_after_cooldown() {
        let (clock, service) = setup();
        trip(&service).await;

        clock.advance(Duration::from_secs(60));
        assert_eq!(service.state().await.unwrap().state, CircuitState::HalfOpen);
        assert_eq!(service.check().await.unwrap(), BreakerCheck::Trial { epoch: 0 });

        clock.advance(Duration::from_secs(5));
        match service.check().await.unwrap() {
            BreakerCheck::Open { retry_after } => assert_eq!(retry_after, Duration::from_secs(55)),
            other => panic!("expected open, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_trial_success_closes() {
        let (clock, service) = setup();
        trip(&service).await;
        clock.advance(Duration::from_secs(61));

        assert!(matches!(service.check().await.unwrap(), BreakerCheck::Trial { .. }));
        service.record_success().await.unwrap();

        assert_eq!(service.check().await.unwrap(), BreakerCheck::Closed);
        assert_eq!(service.state().await.unwrap().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_trial_failure_reopens() {
        let (clock, service) = setup();
        trip(&service).await;
        clock.advance(Duration::from_secs(61));

        assert!(matches!(service.check().await.unwrap(), BreakerCheck::Trial { .. }));
        service.record_failure().await.unwrap();

        match service.check().await.unwrap() {
            BreakerCheck::Open { retry_after } => assert_eq!(retry_after, Duration::from_secs(60)),
            other => panic!("expected open, got {other:?}"),
        }

        clock.advance(Duration::from_secs(60));
        assert_eq!(service.check().await.unwrap(), BreakerCheck::Trial { epoch: 0 });
    }

    #[tokio::test]
    async fn test_abandoned_trial_frees_next_epoch() {
        let (clock, service) = setup();
        trip(&service).await;
        clock.advance(Duration::from_secs(60));
        assert_eq!(service.check().await.unwrap(), BreakerCheck::Trial { epoch: 0 });

        clock.advance(Duration::from_secs(60));
        assert_eq!(service.check().await.unwrap(), BreakerCheck::Trial { epoch: 1 });
    }

    #[tokio::test]
    async fn test_released_trial_can_be_reclaimed() {
        let (clock, service) = setup();
        trip(&service).await;
        clock.advance(Duration::from_secs(60));

        let check = service.check().await.unwrap();
        service.release_trial(&check).await.unwrap();
        assert_eq!(service.check().await.unwrap(), check);
    }

    #[tokio::test]
    async fn test_released_claims_do_not_accumulate() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 10, 16, 10, 0, 0).unwrap(),
        ));
        let service =
            CircuitBreakerService::new(store.clone(), clock.clone(), CircuitBreakerConfig::default());
        trip(&service).await;

        for expected_epoch in 0..30 {
            clock.advance(Duration::from_secs(60));
            let check = service.check().await.unwrap();
            assert_eq!(check, BreakerCheck::Trial { epoch: expected_epoch });
            service.release_trial(&check).await.unwrap();
        }

        let document = store.get(&breaker_path().unwrap()).await.unwrap().unwrap();
        let trial_fields: Vec<_> = document.keys().filter(|k| k.starts_with("trial_")).collect();
        assert_eq!(trial_fields, vec!["trial_29"]);
        assert_eq!(service.state().await.unwrap().state, CircuitState::HalfOpen);
    }

    #[tokio::test]
    async fn test_reset_closes() {
        let (_, service) = setup();
        trip(&service).await;
        assert!(service.is_open().await.unwrap());

        service.reset().await.unwrap();
        assert!(!service.is_open().await.unwrap());
    }

    #[tokio::test]
    async fn test_disabled_breaker_never_opens() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let service = CircuitBreakerService::new(
            Arc::new(InMemoryDocumentStore::new()),
            clock,
            CircuitBreakerConfig {
                enabled: false,
                ..CircuitBreakerConfig::default()
            },
        );
        trip(&service).await;
        assert_eq!(service.check().await.unwrap(), BreakerCheck::Closed);
    }
}
