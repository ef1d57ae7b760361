//! tests/api/alert_engine.rs

use crate::fakes::{EngineHarness, FakeNotifier, FakeProber, PortalAnswer};
use crate::helpers::insert_raw_subscription;
use chrono::{TimeDelta, Utc};
use claims::{assert_none, assert_some_eq};
use housing_alert::alert_engine::{AlertOutcome, SweepOutcome, SweepReport};

#[tokio::test]
async fn recent_alert_skips_the_probe() {
    // Arrange
    let h = EngineHarness::new(FakeProber::new(PortalAnswer::Offer), FakeNotifier::succeeding())
        .await;
    let now = Utc::now();
    let subscription = h.subscribe("ursula@example.com", "Lyon").await;
    h.store
        .record_alert(subscription.id, now - TimeDelta::hours(11))
        .await
        .unwrap();

    // Act
    let outcome = h.engine.sweep(now).await.unwrap();

    // Assert
    assert_eq!(h.prober.calls(), 0);
    assert!(h.notifier.sent().is_empty());
    match outcome {
        SweepOutcome::Completed(report) => assert_eq!(report.cooling_down, 1),
        SweepOutcome::Skipped => panic!("Sweep was skipped"),
    }
}

#[tokio::test]
async fn expired_cooldown_probes_again() {
    // Arrange
    let h = EngineHarness::new(
        FakeProber::new(PortalAnswer::NoOffer),
        FakeNotifier::succeeding(),
    )
    .await;
    let now = Utc::now();
    let subscription = h.subscribe("ursula@example.com", "Lyon").await;
    h.store
        .record_alert(subscription.id, now - TimeDelta::hours(13))
        .await
        .unwrap();

    // Act
    h.engine.sweep(now).await.unwrap();

    // Assert
    assert_eq!(h.prober.calls(), 1);
}

#[tokio::test]
async fn subscriber_never_alerted_is_probed() {
    // Arrange
    let h = EngineHarness::new(
        FakeProber::new(PortalAnswer::NoOffer),
        FakeNotifier::succeeding(),
    )
    .await;
    let subscription = h.subscribe("ursula@example.com", "Lyon").await;

    // Act
    let outcome = h.engine.check_one(&subscription, Utc::now()).await.unwrap();

    // Assert
    assert_eq!(outcome, AlertOutcome::NoOffer);
    assert_eq!(h.prober.calls(), 1);
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn offer_found_notifies_and_stamps_the_check_time() {
    // Arrange
    let h = EngineHarness::new(FakeProber::new(PortalAnswer::Offer), FakeNotifier::succeeding())
        .await;
    let subscription = h.subscribe("ursula@example.com", "Lyon").await;
    let now = Utc::now();

    // Act
    let outcome = h.engine.check_one(&subscription, now).await.unwrap();

    // Assert
    assert_eq!(outcome, AlertOutcome::Notified);
    assert_eq!(
        h.notifier.sent(),
        vec![("ursula@example.com".to_string(), "Lyon".to_string())]
    );
    let stored = h.store.get(subscription.id).await.unwrap().unwrap();
    assert_some_eq!(stored.last_alert, now);
    assert_eq!(stored.email.as_ref(), "ursula@example.com");
    assert_eq!(h.store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn recheck_within_cooldown_after_notification_does_not_probe() {
    // Arrange
    let h = EngineHarness::new(FakeProber::new(PortalAnswer::Offer), FakeNotifier::succeeding())
        .await;
    let subscription = h.subscribe("ursula@example.com", "Lyon").await;
    let now = Utc::now();
    h.engine.check_one(&subscription, now).await.unwrap();
    let stamped = h.store.get(subscription.id).await.unwrap().unwrap();

    // Act
    let outcome = h
        .engine
        .check_one(&stamped, now + TimeDelta::minutes(5))
        .await
        .unwrap();

    // Assert
    assert_eq!(outcome, AlertOutcome::CoolingDown);
    assert_eq!(h.prober.calls(), 1);
    assert_eq!(h.notifier.sent().len(), 1);
}

#[tokio::test]
async fn failed_delivery_leaves_last_alert_absent() {
    // Arrange
    let h = EngineHarness::new(
        FakeProber::new(PortalAnswer::Offer),
        FakeNotifier::failing_for(&["ursula@example.com"]),
    )
    .await;
    let subscription = h.subscribe("ursula@example.com", "Lyon").await;

    // Act
    let outcome = h.engine.check_one(&subscription, Utc::now()).await.unwrap();

    // Assert
    assert_eq!(outcome, AlertOutcome::DeliveryFailed);
    let stored = h.store.get(subscription.id).await.unwrap().unwrap();
    assert_none!(stored.last_alert);
}

#[tokio::test]
async fn failed_delivery_keeps_the_previous_last_alert() {
    // Arrange
    let h = EngineHarness::new(
        FakeProber::new(PortalAnswer::Offer),
        FakeNotifier::failing_for(&["ursula@example.com"]),
    )
    .await;
    let now = Utc::now();
    let previous = now - TimeDelta::hours(20);
    let subscription = h.subscribe("ursula@example.com", "Lyon").await;
    h.store.record_alert(subscription.id, previous).await.unwrap();
    let subscription = h.store.get(subscription.id).await.unwrap().unwrap();

    // Act
    let outcome = h.engine.check_one(&subscription, now).await.unwrap();

    // Assert
    assert_eq!(outcome, AlertOutcome::DeliveryFailed);
    let stored = h.store.get(subscription.id).await.unwrap().unwrap();
    assert_some_eq!(stored.last_alert, previous);
}

#[tokio::test]
async fn failed_delivery_is_retried_on_the_next_check() {
    // Arrange
    let h = EngineHarness::new(
        FakeProber::new(PortalAnswer::Offer),
        FakeNotifier::failing_for(&["ursula@example.com"]),
    )
    .await;
    let subscription = h.subscribe("ursula@example.com", "Lyon").await;
    let now = Utc::now();
    h.engine.check_one(&subscription, now).await.unwrap();

    // Act
    let outcome = h
        .engine
        .check_one(&subscription, now + TimeDelta::minutes(1))
        .await
        .unwrap();

    // Assert
    assert_eq!(outcome, AlertOutcome::DeliveryFailed);
    assert_eq!(h.prober.calls(), 2);
}

#[tokio::test]
async fn unreachable_portal_counts_as_no_offer() {
    // Arrange
    let h = EngineHarness::new(
        FakeProber::new(PortalAnswer::Unreachable),
        FakeNotifier::succeeding(),
    )
    .await;
    let subscription = h.subscribe("ursula@example.com", "Lyon").await;

    // Act
    let outcome = h.engine.check_one(&subscription, Utc::now()).await.unwrap();

    // Assert
    assert_eq!(outcome, AlertOutcome::ProbeFailed);
    assert!(h.notifier.sent().is_empty());
    let stored = h.store.get(subscription.id).await.unwrap().unwrap();
    assert_none!(stored.last_alert);
}

#[tokio::test]
async fn one_failing_subscriber_does_not_affect_the_others() {
    // Arrange
    let h = EngineHarness::new(
        FakeProber::new(PortalAnswer::Offer),
        FakeNotifier::failing_for(&["broken@example.com"]),
    )
    .await;
    let first = h.subscribe("first@example.com", "Lyon").await;
    let broken = h.subscribe("broken@example.com", "Paris").await;
    let last = h.subscribe("last@example.com", "Grenoble").await;
    let now = Utc::now();

    // Act
    let outcome = h.engine.sweep(now).await.unwrap();

    // Assert
    assert_eq!(
        outcome,
        SweepOutcome::Completed(SweepReport {
            checked: 3,
            notified: 2,
            delivery_failed: 1,
            ..Default::default()
        })
    );
    for (id, expected) in [(first.id, Some(now)), (broken.id, None), (last.id, Some(now))] {
        let stored = h.store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.last_alert, expected);
    }
}

#[tokio::test]
async fn sweep_over_an_empty_store_completes() {
    // Arrange
    let h = EngineHarness::new(FakeProber::new(PortalAnswer::Offer), FakeNotifier::succeeding())
        .await;

    // Act
    let outcome = h.engine.sweep(Utc::now()).await.unwrap();

    // Assert
    assert_eq!(outcome, SweepOutcome::Completed(SweepReport::default()));
}

#[tokio::test]
async fn unreadable_stored_row_does_not_stop_the_sweep() {
    // Arrange
    let h = EngineHarness::new(FakeProber::new(PortalAnswer::Offer), FakeNotifier::succeeding())
        .await;
    insert_raw_subscription(&h.pool, "lyon@example.com", "Lyon").await;
    insert_raw_subscription(&h.pool, "not-an-email", "Saint-Denis (93)").await;
    insert_raw_subscription(&h.pool, "paris@example.com", "Paris").await;

    // Act
    let outcome = h.engine.sweep(Utc::now()).await.unwrap();

    // Assert
    assert_eq!(
        outcome,
        SweepOutcome::Completed(SweepReport {
            checked: 2,
            notified: 2,
            ..Default::default()
        })
    );
    assert_eq!(
        h.notifier.sent(),
        vec![
            ("lyon@example.com".to_string(), "Lyon".to_string()),
            ("paris@example.com".to_string(), "Paris".to_string()),
        ]
    );
}

#[tokio::test]
async fn city_labels_with_punctuation_are_checked_like_any_other() {
    // Arrange
    let h = EngineHarness::new(FakeProber::new(PortalAnswer::Offer), FakeNotifier::succeeding())
        .await;
    insert_raw_subscription(&h.pool, "denis@example.com", "Saint-Denis (93)").await;

    // Act
    let outcome = h.engine.sweep(Utc::now()).await.unwrap();

    // Assert
    assert!(matches!(outcome, SweepOutcome::Completed(ref r) if r.notified == 1));
    assert_eq!(
        h.notifier.sent(),
        vec![("denis@example.com".to_string(), "Saint-Denis (93)".to_string())]
    );
}
