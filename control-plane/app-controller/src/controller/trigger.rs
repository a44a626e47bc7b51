//! Drops watch notifications that cannot change the reconcile outcome.
//!
//! The kube watcher hands out raw `Apply`/`Delete`/re-list events. A
//! [`TriggerFilter`] remembers the last object it saw per identity so it can
//! classify each event as a create, update or delete and apply the rule table
//! for the watch role.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;

use futures_util::{Stream, StreamExt, stream};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::Resource;
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher;
use tracing::{debug, info, trace};

use crate::crd::App;

/// Per-kind notion of "the desired state changed".
pub trait ChangeClassifier {
    fn spec_changed(old: &Self, new: &Self) -> bool;
}

impl ChangeClassifier for App {
    fn spec_changed(old: &Self, new: &Self) -> bool {
        old.spec != new.spec
    }
}

impl ChangeClassifier for Deployment {
    fn spec_changed(old: &Self, new: &Self) -> bool {
        old.spec != new.spec
    }
}

impl ChangeClassifier for HorizontalPodAutoscaler {
    fn spec_changed(old: &Self, new: &Self) -> bool {
        old.spec != new.spec
    }
}

impl ChangeClassifier for Service {
    fn spec_changed(old: &Self, new: &Self) -> bool {
        old.spec != new.spec
    }
}

impl ChangeClassifier for Ingress {
    fn spec_changed(old: &Self, new: &Self) -> bool {
        old.spec != new.spec
    }
}

/// Whether the watched kind is the controller's primary resource or one of
/// its children.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchRole {
    Owner,
    Owned,
}

#[derive(Debug)]
pub enum Change<'a, K> {
    Create(&'a K),
    Update { old: &'a K, new: &'a K },
    Delete(&'a K),
}

fn version_changed<K: Resource>(old: &K, new: &K) -> bool {
    old.meta().resource_version != new.meta().resource_version
}

/// The rule table.
pub fn admits<K>(role: WatchRole, change: &Change<'_, K>) -> bool
where
    K: Resource + ChangeClassifier,
{
    match (role, change) {
        (WatchRole::Owner, Change::Create(_)) => true,
        (WatchRole::Owned, Change::Create(_)) => false,
        (_, Change::Update { old, new }) => {
            version_changed(*old, *new) && K::spec_changed(*old, *new)
        }
        (WatchRole::Owner, Change::Delete(_)) => false,
        (WatchRole::Owned, Change::Delete(_)) => true,
    }
}

pub struct TriggerFilter<K>
where
    K: Resource<DynamicType = ()>,
{
    role: WatchRole,
    seen: HashMap<ObjectRef<K>, K>,
    relist: Option<HashSet<ObjectRef<K>>>,
}

impl<K> TriggerFilter<K>
where
    K: Resource<DynamicType = ()> + ChangeClassifier + Clone + Debug,
{
    pub fn new(role: WatchRole) -> Self {
        Self {
            role,
            seen: HashMap::new(),
            relist: None,
        }
    }

    fn decide(&self, change: Change<'_, K>) -> Option<K> {
        let admitted = admits(self.role, &change);
        let (verb, obj) = match change {
            Change::Create(o) => ("create", o),
            Change::Update { new, .. } => ("update", new),
            Change::Delete(o) => ("delete", o),
        };
        let name = obj.meta().name.as_deref().unwrap_or_default();
        if admitted {
            trace!(kind = %K::kind(&()), %name, verb, "trigger admitted");
            Some(obj.clone())
        } else {
            if self.role == WatchRole::Owner && verb == "delete" {
                info!(
                    kind = %K::kind(&()),
                    %name,
                    "owner deleted; children follow via garbage collection"
                );
            } else {
                trace!(kind = %K::kind(&()), %name, verb, "trigger dropped");
            }
            None
        }
    }

    fn applied(&mut self, obj: K) -> Option<K> {
        let key = ObjectRef::from_obj(&obj);
        if let Some(relist) = self.relist.as_mut() {
            relist.insert(key.clone());
        }
        let out = match self.seen.get(&key) {
            Some(old) => self.decide(Change::Update { old, new: &obj }),
            None => self.decide(Change::Create(&obj)),
        };
        self.seen.insert(key, obj);
        out
    }

    fn deleted(&mut self, obj: K) -> Option<K> {
        self.seen.remove(&ObjectRef::from_obj(&obj));
        self.decide(Change::Delete(&obj))
    }

    /// Feeds one watcher event, returning the objects that should trigger a
    /// reconcile.
    pub fn observe(&mut self, event: watcher::Event<K>) -> Vec<K> {
        match event {
            watcher::Event::Apply(obj) => self.applied(obj).into_iter().collect(),
            watcher::Event::Delete(obj) => {
                self.deleted(obj).into_iter().collect()
            }
            watcher::Event::Init => {
                self.relist = Some(HashSet::new());
                Vec::new()
            }
            watcher::Event::InitApply(obj) => {
                self.applied(obj).into_iter().collect()
            }
            watcher::Event::InitDone => {
                let Some(present) = self.relist.take() else {
                    return Vec::new();
                };
                let gone: Vec<ObjectRef<K>> = self
                    .seen
                    .keys()
                    .filter(|k| !present.contains(*k))
                    .cloned()
                    .collect();
                if !gone.is_empty() {
                    debug!(
                        kind = %K::kind(&()),
                        count = gone.len(),
                        "objects vanished across re-list"
                    );
                }
                let mut out = Vec::new();
                for key in gone {
                    if let Some(obj) = self.seen.get(&key).cloned() {
                        out.extend(self.deleted(obj));
                    }
                }
                out
            }
        }
    }
}

/// Wraps a watcher event stream into a stream of admitted objects, suitable
/// for `Controller::for_stream` / `owns_stream`.
pub fn trigger_stream<K, S>(
    events: S,
    role: WatchRole,
) -> impl Stream<Item = Result<K, watcher::Error>> + Send
where
    K: Resource<DynamicType = ()>
        + ChangeClassifier
        + Clone
        + Debug
        + Send
        + 'static,
    S: Stream<Item = Result<watcher::Event<K>, watcher::Error>> + Send,
{
    let mut filter = TriggerFilter::new(role);
    events.flat_map(move |res| {
        let out: Vec<Result<K, watcher::Error>> = match res {
            Ok(event) => filter.observe(event).into_iter().map(Ok).collect(),
            Err(e) => vec![Err(e)],
        };
        stream::iter(out)
    })
}
