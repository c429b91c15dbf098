//! Prometheus counters fed by the core's committed-change stream.

use std::fmt;

use et_core::events::ThreadEvent;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::warn;

type KindLabels = Vec<(String, String)>;

pub struct Metrics {
    registry: Registry,
    threads_created: Counter,
    threads_updated: Counter,
    threads_deleted: Counter,
    join_requests: Counter,
    requests_resolved: Family<KindLabels, Counter>,
    messages_posted: Counter,
    api_errors: Family<KindLabels, Counter>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("eventthreads");
        let threads_created = Counter::default();
        let threads_updated = Counter::default();
        let threads_deleted = Counter::default();
        let join_requests = Counter::default();
        let requests_resolved = Family::<KindLabels, Counter>::default();
        let messages_posted = Counter::default();
        let api_errors = Family::<KindLabels, Counter>::default();

        registry.register("threads_created", "Threads created", threads_created.clone());
        registry.register("threads_updated", "Thread field edits", threads_updated.clone());
        registry.register(
            "threads_deleted",
            "Threads deleted by creator or admin",
            threads_deleted.clone(),
        );
        registry.register("join_requests", "Join requests submitted", join_requests.clone());
        registry.register(
            "requests_resolved",
            "Join requests resolved, by outcome",
            requests_resolved.clone(),
        );
        registry.register(
            "messages_posted",
            "Chat messages posted by members",
            messages_posted.clone(),
        );
        registry.register("api_errors", "Failed API calls, by error kind", api_errors.clone());

        Self {
            registry,
            threads_created,
            threads_updated,
            threads_deleted,
            join_requests,
            requests_resolved,
            messages_posted,
            api_errors,
        }
    }

    pub fn observe(&self, event: &ThreadEvent) {
        match event {
            ThreadEvent::Created { .. } => {
                self.threads_created.inc();
            }
            ThreadEvent::Updated { .. } => {
                self.threads_updated.inc();
            }
            ThreadEvent::Deleted { .. } => {
                self.threads_deleted.inc();
            }
            ThreadEvent::JoinRequested { .. } => {
                self.join_requests.inc();
            }
            ThreadEvent::RequestResolved { approved, .. } => {
                let outcome = if *approved { "approved" } else { "denied" };
                self.requests_resolved
                    .get_or_create(&vec![("outcome".to_string(), outcome.to_string())])
                    .inc();
            }
            ThreadEvent::MessagePosted { .. } => {
                self.messages_posted.inc();
            }
        }
    }

    pub fn record_error(&self, kind: &str) {
        self.api_errors.get_or_create(&vec![("kind".to_string(), kind.to_string())]).inc();
    }

    pub fn render(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();
        encode(&mut buf, &self.registry)?;
        Ok(buf)
    }
}

/// Feeds every committed event into `metrics` until the bus is dropped.
pub fn spawn_event_recorder(
    metrics: std::sync::Arc<Metrics>,
    mut rx: broadcast::Receiver<ThreadEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => metrics.observe(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "metrics recorder lagged behind event stream")
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
