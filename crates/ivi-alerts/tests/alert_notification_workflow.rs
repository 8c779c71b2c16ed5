//! End-to-end scenarios for the alert pipeline: score recompute, polling, manual sends, and a
//! scheduled drain, exercised only through the public services and HTTP routers.

mod common {
    use std::sync::{Arc, Mutex};

    use chrono::{NaiveDate, NaiveDateTime};

    use ivi_alerts::clock::{Clock, FixedClock};
    use ivi_alerts::risk::{
        AlertApi, AlertMessage, AlertQueue, DeliveryError, DispatchConfig, NotificationChannel,
        NotificationDispatcher, RecomputeService, ScoreInput,
    };
    use ivi_alerts::scheduler::NotificationScheduler;
    use ivi_alerts::storage::InMemoryStore;

    pub(super) fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 9, day)
            .and_then(|date| date.and_hms_opt(hour, minute, 0))
            .expect("valid timestamp")
    }

    pub(super) fn score(contract: &str, company: &str, health: f64, experience: f64, utilization: f64) -> ScoreInput {
        ScoreInput {
            contract_number: contract.to_string(),
            company_name: Some(company.to_string()),
            sector: Some("Logistics".to_string()),
            region: Some("Western".to_string()),
            health,
            experience,
            utilization,
        }
    }

    #[derive(Default)]
    pub(super) struct Outbox {
        messages: Mutex<Vec<AlertMessage>>,
    }

    impl Outbox {
        pub(super) fn titles(&self) -> Vec<String> {
            self.messages
                .lock()
                .expect("outbox mutex poisoned")
                .iter()
                .map(|message| message.title.clone())
                .collect()
        }
    }

    impl NotificationChannel for Outbox {
        async fn deliver(&self, message: AlertMessage) -> Result<(), DeliveryError> {
            self.messages
                .lock()
                .expect("outbox mutex poisoned")
                .push(message);
            Ok(())
        }
    }

    pub(super) struct Deployment {
        pub(super) clock: Arc<FixedClock>,
        pub(super) outbox: Arc<Outbox>,
        pub(super) api: Arc<AlertApi<InMemoryStore, InMemoryStore, Outbox>>,
        pub(super) scheduler: Arc<NotificationScheduler<InMemoryStore, InMemoryStore, Outbox>>,
    }

    pub(super) fn deployment() -> Deployment {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(FixedClock::new(at(22, 8, 0)));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let outbox = Arc::new(Outbox::default());
        let dispatcher = Arc::new(NotificationDispatcher::new(
            store.clone(),
            outbox.clone(),
            dyn_clock.clone(),
            DispatchConfig::default(),
        ));

        Deployment {
            api: Arc::new(AlertApi {
                recompute: RecomputeService::new(store.clone(), dyn_clock.clone()),
                queue: AlertQueue::new(store.clone()),
                dispatcher: dispatcher.clone(),
            }),
            scheduler: Arc::new(NotificationScheduler::new(store, dispatcher, dyn_clock)),
            clock,
            outbox,
        }
    }
}

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Duration;
use tower::ServiceExt;

use common::*;
use ivi_alerts::cancellation::CancellationToken;
use ivi_alerts::risk::{alert_router, AlertId, RiskCategory};
use ivi_alerts::scheduler::{RunOutcome, SettingsUpdate, TriggerOutcome};

#[tokio::test]
async fn deteriorating_portfolio_is_polled_sent_and_drained() {
    let deployment = deployment();
    let recompute = &deployment.api.recompute;

    // Monday morning baseline for two clients.
    recompute
        .recompute(score("C-1001", "Najd Foods", 85.0, 78.0, 74.0))
        .expect("baseline");
    recompute
        .recompute(score("C-1002", "Gulf Marine", 72.0, 70.0, 71.0))
        .expect("baseline");

    deployment.clock.advance(Duration::hours(2));
    let medium = recompute
        .recompute(score("C-1001", "Najd Foods", 60.0, 55.0, 50.0))
        .expect("recompute")
        .alert
        .expect("low to medium transition");
    assert_eq!(medium.previous_risk, RiskCategory::Low);
    assert_eq!(medium.new_risk, RiskCategory::Medium);

    deployment.clock.advance(Duration::hours(1));
    recompute
        .recompute(score("C-1002", "Gulf Marine", 20.0, 30.0, 25.0))
        .expect("recompute")
        .alert
        .expect("low to high transition");

    let queue = &deployment.api.queue;
    assert_eq!(queue.unread_count(AlertId::NONE).expect("count"), 2);
    let recent = queue
        .recent_since(medium.id, None)
        .expect("recent since first alert");
    assert_eq!(recent.alerts.len(), 1);
    assert_eq!(recent.latest_id, AlertId(2));

    // An operator sends the first alert from the dashboard.
    let router = alert_router(deployment.api.clone());
    let response = router
        .oneshot(
            Request::post(format!("/api/v1/alerts/{}/send", medium.id))
                .body(Body::empty())
                .expect("build request"),
        )
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(queue.unsent().expect("unsent").len(), 1);

    // Tuesday 09:00 scheduled drain picks up the rest.
    deployment
        .scheduler
        .update_settings(&SettingsUpdate {
            is_enabled: true,
            scheduled_time: "09:00".to_string(),
            days_of_week: vec![0, 1, 2, 3, 4],
        })
        .expect("settings");
    deployment.clock.set(at(23, 9, 0));
    let outcome = deployment
        .scheduler
        .tick(at(23, 9, 0))
        .await
        .expect("tick");

    let report = match outcome {
        TriggerOutcome::Completed(report) => report,
        other => panic!("expected scheduled run, got {other:?}"),
    };
    assert_eq!(report.log.outcome, RunOutcome::Success);
    assert_eq!(report.log.alerts_sent, 1);
    assert_eq!(report.next_run_at, Some(at(24, 9, 0)));
    assert!(queue.unsent().expect("unsent").is_empty());

    let titles = deployment.outbox.titles();
    assert_eq!(titles.len(), 2);
    assert!(titles[0].contains("Najd Foods"));
    assert!(titles[1].contains("Gulf Marine"));

    // A follow-up manual run finds nothing left to send.
    let follow_up = deployment
        .scheduler
        .trigger_now(&CancellationToken::new())
        .await
        .expect("manual trigger");
    match follow_up {
        TriggerOutcome::Completed(report) => assert_eq!(report.log.alerts_sent, 0),
        other => panic!("expected manual run, got {other:?}"),
    }
    assert_eq!(deployment.scheduler.logs(100).expect("logs").len(), 2);
}

#[tokio::test]
async fn stable_category_never_reaches_the_outbox() {
    let deployment = deployment();
    let recompute = &deployment.api.recompute;

    for health in [90.0, 82.0, 76.0, 71.0] {
        deployment.clock.advance(Duration::minutes(30));
        let outcome = recompute
            .recompute(score("C-2001", "Red Sea Ports", health, 75.0, 75.0))
            .expect("recompute");
        assert!(outcome.alert.is_none());
    }

    let summary = deployment
        .api
        .dispatcher
        .send_all_unsent(&CancellationToken::new())
        .await
        .expect("drain");
    assert_eq!(summary.sent, 0);
    assert!(deployment.outbox.titles().is_empty());
}
