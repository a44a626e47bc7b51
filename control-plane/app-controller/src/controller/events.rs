use k8s_openapi::api::core::v1::ObjectReference;
use kube::Client;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use tracing::warn;

pub const REASON_CREATED: &str = "Created";
pub const REASON_UPDATED: &str = "Updated";
pub const REASON_DELETED: &str = "Deleted";

/// Fire-and-forget event sink. Recording never fails the caller.
pub trait EventRecorder: Send + Sync {
    fn record(
        &self,
        target: &ObjectReference,
        type_: EventType,
        reason: String,
        note: String,
    );
}

/// Publishes events through the API server on a background task.
#[derive(Clone)]
pub struct KubeEventRecorder {
    recorder: Recorder,
}

impl KubeEventRecorder {
    pub fn new(client: Client, controller: &str) -> Self {
        let reporter = Reporter {
            controller: controller.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

impl EventRecorder for KubeEventRecorder {
    fn record(
        &self,
        target: &ObjectReference,
        type_: EventType,
        reason: String,
        note: String,
    ) {
        let recorder = self.recorder.clone();
        let target = target.clone();
        tokio::spawn(async move {
            let ev = Event {
                type_,
                reason: reason.clone(),
                note: Some(note),
                action: "Reconcile".into(),
                secondary: None,
            };
            if let Err(e) = recorder.publish(&ev, &target).await {
                warn!(
                    error = %e,
                    %reason,
                    name = ?target.name,
                    "failed to publish event"
                );
            }
        });
    }
}

#[cfg(test)]
pub(crate) use recording::MemoryRecorder;
