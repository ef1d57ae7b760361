//! src/alert_engine.rs

use crate::domain::Subscription;
use crate::notifier::Notifier;
use crate::offer_prober::OfferProber;
use crate::subscription_store::SubscriptionStore;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{field::display, Span};

/// What happened to one subscriber during a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    /// Alerted less than one cooldown ago; the portal was not asked.
    CoolingDown,
    NoOffer,
    /// Portal unreachable or unreadable; handled like `NoOffer`.
    ProbeFailed,
    Notified,
    /// Offer found but the message did not go out; `last_alert` is left
    /// as is so the next check tries again.
    DeliveryFailed,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: usize,
    pub cooling_down: usize,
    pub no_offer: usize,
    pub probe_failed: usize,
    pub notified: usize,
    pub delivery_failed: usize,
    /// Subscribers whose check hit a store error.
    pub errors: usize,
}

impl SweepReport {
    fn tally(&mut self, outcome: AlertOutcome) {
        self.checked += 1;
        match outcome {
            AlertOutcome::CoolingDown => self.cooling_down += 1,
            AlertOutcome::NoOffer => self.no_offer += 1,
            AlertOutcome::ProbeFailed => self.probe_failed += 1,
            AlertOutcome::Notified => self.notified += 1,
            AlertOutcome::DeliveryFailed => self.delivery_failed += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed(SweepReport),
    /// Another sweep was still running.
    Skipped,
}

pub struct AlertEngine {
    store: SubscriptionStore,
    prober: Arc<dyn OfferProber>,
    notifier: Arc<dyn Notifier>,
    cooldown: TimeDelta,
    sweep_lock: Mutex<()>,
}

impl AlertEngine {
    pub fn new(
        store: SubscriptionStore,
        prober: Arc<dyn OfferProber>,
        notifier: Arc<dyn Notifier>,
        cooldown: TimeDelta,
    ) -> Self {
        Self {
            store,
            prober,
            notifier,
            cooldown,
            sweep_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &SubscriptionStore {
        &self.store
    }

    /// Decide for a single subscriber: cooldown gate, then probe, then notify
    /// and stamp. Only store errors are returned; portal and delivery
    /// failures are logged and reported through the outcome.
    #[tracing::instrument(
        name = "Check subscriber for offers",
        skip(self, subscription),
        fields(
            subscription_id = %subscription.id,
            subscriber_email = %subscription.email,
            city = %subscription.city,
            outcome = tracing::field::Empty
        )
    )]
    pub async fn check_one(
        &self,
        subscription: &Subscription,
        now: DateTime<Utc>,
    ) -> Result<AlertOutcome, anyhow::Error> {
        let outcome = self.decide(subscription, now).await?;
        Span::current().record("outcome", &display(format!("{:?}", outcome)));
        Ok(outcome)
    }

    async fn decide(
        &self,
        subscription: &Subscription,
        now: DateTime<Utc>,
    ) -> Result<AlertOutcome, anyhow::Error> {
        if subscription.is_cooling_down(now, self.cooldown) {
            return Ok(AlertOutcome::CoolingDown);
        }
        match self.prober.probe(&subscription.city).await {
            Ok(true) => {}
            Ok(false) => return Ok(AlertOutcome::NoOffer),
            Err(e) => {
                tracing::warn!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "Failed to probe the portal. Treating as no offer.",
                );
                return Ok(AlertOutcome::ProbeFailed);
            }
        }
        if let Err(e) = self
            .notifier
            .notify(&subscription.email, &subscription.city)
            .await
        {
            tracing::error!(
                error.cause_chain = ?e,
                error.message = %e,
                "Failed to deliver the offer alert. Will retry on the next check.",
            );
            return Ok(AlertOutcome::DeliveryFailed);
        }
        self.store.record_alert(subscription.id, now).await?;
        tracing::info!("Offer alert sent.");
        Ok(AlertOutcome::Notified)
    }

    /// One pass over every subscription. Returns `Skipped` without touching
    /// anything if a sweep is already in flight.
    #[tracing::instrument(name = "Sweep all subscriptions", skip(self))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepOutcome, anyhow::Error> {
        let Ok(_guard) = self.sweep_lock.try_lock() else {
            tracing::warn!("A sweep is already running. Skipping this one.");
            return Ok(SweepOutcome::Skipped);
        };
        let subscriptions = self.store.list_all().await?;
        let mut report = SweepReport::default();
        for subscription in &subscriptions {
            match self.check_one(subscription, now).await {
                Ok(outcome) => report.tally(outcome),
                Err(e) => {
                    report.errors += 1;
                    tracing::error!(
                        error.cause_chain = ?e,
                        error.message = %e,
                        subscription_id = %subscription.id,
                        "Failed to check subscriber. Continuing with the others.",
                    );
                }
            }
        }
        tracing::info!(
            checked = report.checked,
            notified = report.notified,
            cooling_down = report.cooling_down,
            no_offer = report.no_offer,
            probe_failed = report.probe_failed,
            delivery_failed = report.delivery_failed,
            errors = report.errors,
            "Sweep finished."
        );
        Ok(SweepOutcome::Completed(report))
    }
}
