use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::NaiveDateTime;
use ivi_alerts::clock::Clock;
use ivi_alerts::config::AlertsConfig;
use ivi_alerts::risk::{
    AlertApi, AlertQueue, DispatchConfig, LoggingChannel, NotificationDispatcher,
    RecomputeService,
};
use ivi_alerts::scheduler::NotificationScheduler;
use ivi_alerts::storage::InMemoryStore;
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type AlertService = AlertApi<InMemoryStore, InMemoryStore, LoggingChannel>;
pub(crate) type SchedulerService = NotificationScheduler<InMemoryStore, InMemoryStore, LoggingChannel>;

/// Process-wide wiring: one store shared by scores, alerts, and the scheduler singleton.
pub(crate) struct AlertServices {
    pub(crate) alerts: Arc<AlertService>,
    pub(crate) scheduler: Arc<SchedulerService>,
}

impl AlertServices {
    pub(crate) fn in_memory(config: &AlertsConfig, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let dispatcher = Arc::new(NotificationDispatcher::new(
            store.clone(),
            Arc::new(LoggingChannel),
            clock.clone(),
            DispatchConfig {
                locale: config.locale,
                delivery_timeout: config.delivery_timeout,
            },
        ));

        Self {
            alerts: Arc::new(AlertApi {
                recompute: RecomputeService::new(store.clone(), clock.clone()),
                queue: AlertQueue::new(store.clone()),
                dispatcher: dispatcher.clone(),
            }),
            scheduler: Arc::new(NotificationScheduler::new(store, dispatcher, clock)),
        }
    }
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, String> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M"))
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DDTHH:MM ({err})"))
}
