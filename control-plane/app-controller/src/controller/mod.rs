pub mod autoscaler;
pub mod child;
pub mod events;
pub mod ingress;
pub mod reconcile;
pub mod service;
pub mod trigger;
pub mod workload;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::controller::{self, Action};
use kube::runtime::reflector::{self, ObjectRef, reflector};
use kube::runtime::{Controller, WatchStreamExt, watcher};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, info, warn};

use crate::config::ControllerConfig;
use crate::crd::App;
use crate::metrics::Metrics;
use crate::store::{KubeStore, ObjectStore, StoreError, StoreOp};
use crate::templates::{BuilderDefaults, TemplateError, managed_selector};
use events::{EventRecorder, KubeEventRecorder};
use trigger::{ChangeClassifier, WatchRole, trigger_stream};

pub use reconcile::reconcile_app;

pub const CONTROLLER_NAME: &str = "app-controller";

#[derive(thiserror::Error, Debug)]
pub enum ReconcileErr {
    #[error("failed to build {kind}: {source}")]
    Build {
        kind: &'static str,
        #[source]
        source: TemplateError,
    },
    #[error("{op} {kind} {name} failed: {source}")]
    Store {
        kind: &'static str,
        op: StoreOp,
        name: String,
        #[source]
        source: StoreError,
    },
}

impl ReconcileErr {
    pub fn store(
        kind: &'static str,
        op: StoreOp,
        name: &str,
        source: StoreError,
    ) -> Self {
        ReconcileErr::Store {
            kind,
            op,
            name: name.to_string(),
            source,
        }
    }

    /// Kind of the object whose step failed.
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileErr::Build { kind, .. } => *kind,
            ReconcileErr::Store { kind, .. } => *kind,
        }
    }
}

/// Namespaced identity of an App; the unit of work of the queue.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn of(app: &App) -> Self {
        Self::new(&app.namespace().unwrap_or_default(), &app.name_any())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// One store per kind the controller reads or writes.
#[derive(Clone)]
pub struct Stores {
    pub apps: Arc<dyn ObjectStore<App>>,
    pub deployments: Arc<dyn ObjectStore<Deployment>>,
    pub autoscalers: Arc<dyn ObjectStore<HorizontalPodAutoscaler>>,
    pub services: Arc<dyn ObjectStore<Service>>,
    pub ingresses: Arc<dyn ObjectStore<Ingress>>,
}

impl Stores {
    pub fn kube(client: Client) -> Self {
        let store = KubeStore::new(client);
        Self {
            apps: Arc::new(store.clone()),
            deployments: Arc::new(store.clone()),
            autoscalers: Arc::new(store.clone()),
            services: Arc::new(store.clone()),
            ingresses: Arc::new(store),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Features {
    pub service: bool,
    pub ingress: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            service: true,
            ingress: true,
        }
    }
}

#[derive(Clone)]
pub struct ControllerContext {
    pub stores: Stores,
    pub events: Arc<dyn EventRecorder>,
    pub defaults: BuilderDefaults,
    pub features: Features,
    pub requeue_after: Duration,
    pub metrics: Metrics,
}

impl ControllerContext {
    pub fn new(client: Client, cfg: &ControllerConfig, metrics: Metrics) -> Self {
        Self {
            stores: Stores::kube(client.clone()),
            events: Arc::new(KubeEventRecorder::new(client, CONTROLLER_NAME)),
            defaults: cfg.builder_defaults(),
            features: Features {
                service: cfg.features.service,
                ingress: cfg.features.ingress,
            },
            requeue_after: cfg.requeue_after(),
            metrics,
        }
    }
}

fn scoped_api<K>(client: &Client, ns: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
    match ns {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Filtered notifications for one owned kind; only objects carrying the
/// managed-by label are watched.
fn owned_triggers<K>(
    client: Client,
    ns: Option<String>,
) -> impl futures_util::Stream<Item = Result<K, watcher::Error>> + Send + 'static
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + ChangeClassifier
        + Clone
        + fmt::Debug
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    let cfg = watcher::Config::default().labels(&managed_selector());
    let api = scoped_api::<K>(&client, ns.as_deref());
    let events = watcher(api, cfg).default_backoff();
    trigger_stream(events, WatchRole::Owned)
}

/// Runs the App controller until a shutdown signal arrives.
pub async fn run_controller(
    client: Client,
    cfg: ControllerConfig,
    metrics: Metrics,
) -> anyhow::Result<()> {
    let ns = cfg.watch_namespace().map(str::to_string);
    let ctx = Arc::new(ControllerContext::new(client.clone(), &cfg, metrics));

    let (reader, writer) = reflector::store();
    let app_events = reflector(
        writer,
        watcher(
            scoped_api::<App>(&client, ns.as_deref()),
            watcher::Config::default(),
        ),
    )
    .default_backoff();
    let app_triggers = trigger_stream(app_events, WatchRole::Owner);

    let mut controller = Controller::for_stream(app_triggers, reader)
        .with_config(
            controller::Config::default()
                .concurrency(cfg.max_concurrent_reconciles),
        )
        .owns_stream(owned_triggers::<Deployment>(client.clone(), ns.clone()))
        .owns_stream(owned_triggers::<HorizontalPodAutoscaler>(
            client.clone(),
            ns.clone(),
        ));
    if cfg.features.service {
        controller = controller
            .owns_stream(owned_triggers::<Service>(client.clone(), ns.clone()));
    }
    if cfg.features.ingress {
        controller = controller
            .owns_stream(owned_triggers::<Ingress>(client.clone(), ns.clone()));
    }
    if let Some(period) = cfg.status_resync() {
        let ticks = IntervalStream::new(tokio::time::interval_at(
            Instant::now() + period,
            period,
        ))
        .map(|_| ());
        controller = controller.reconcile_all_on(ticks);
    }

    info!(
        namespace = ns.as_deref().unwrap_or("<all>"),
        concurrency = cfg.max_concurrent_reconciles,
        "starting app controller"
    );
    controller
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj_ref, action)) => {
                    debug!(%obj_ref, ?action, "reconciled")
                }
                Err(e) => warn!(error = %e, "reconcile failed"),
            }
        })
        .await;
    info!("app controller stopped");
    Ok(())
}

/// Queue entry point: re-reads the App by key rather than trusting the
/// cached copy.
async fn reconcile(
    obj: Arc<App>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, ReconcileErr> {
    let _timer = ctx.metrics.count_and_measure();
    reconcile_app(&ObjectKey::of(&obj), &ctx).await
}

fn error_policy(
    obj: Arc<App>,
    err: &ReconcileErr,
    ctx: Arc<ControllerContext>,
) -> Action {
    ctx.metrics.reconcile_failure(err);
    error!(
        app = %ObjectRef::from_obj(obj.as_ref()),
        kind = err.kind(),
        error = %err,
        "reconcile error; requeueing"
    );
    Action::requeue(ctx.requeue_after)
}
