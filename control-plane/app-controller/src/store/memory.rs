use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use kube::Resource;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{ObjectStore, StoreError, StoreOp, object_key};
use crate::json::merge_patch;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JournalEntry {
    pub kind: String,
    pub op: StoreOp,
    pub name: String,
}

/// Ordered log of writes, shareable across stores of different kinds so
/// tests can assert cross-kind ordering.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<JournalEntry>>>);

impl Journal {
    fn push(&self, kind: &str, op: StoreOp, name: &str) {
        lock(&self.0).push(JournalEntry {
            kind: kind.to_string(),
            op,
            name: name.to_string(),
        });
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        lock(&self.0).clone()
    }

    /// Entries other than reads.
    pub fn writes(&self) -> Vec<JournalEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.op != StoreOp::Get)
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.0).clear();
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

type Interleaved<K> = Box<dyn FnOnce(&mut K) + Send>;

struct Inner<K> {
    objects: BTreeMap<(String, String), K>,
    next_version: u64,
    failures: HashMap<StoreOp, String>,
    interleaved: HashMap<StoreOp, Interleaved<K>>,
}

/// In-process [`ObjectStore`] mimicking the API server semantics the
/// controller relies on: server-assigned `uid`/`resourceVersion`, optimistic
/// concurrency on update, status written only through `update_status`.
pub struct MemoryStore<K> {
    inner: Mutex<Inner<K>>,
    journal: Journal,
}

impl<K> Default for MemoryStore<K> {
    fn default() -> Self {
        Self::with_journal(&Journal::default())
    }
}

impl<K> MemoryStore<K> {
    pub fn with_journal(journal: &Journal) -> Self {
        Self {
            inner: Mutex::new(Inner {
                objects: BTreeMap::new(),
                next_version: 1,
                failures: HashMap::new(),
                interleaved: HashMap::new(),
            }),
            journal: journal.clone(),
        }
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// The next `op` on this store fails with an API error.
    pub fn fail_next(&self, op: StoreOp, message: &str) {
        lock(&self.inner).failures.insert(op, message.to_string());
    }

    /// Right before the next `op` runs, another writer changes the target
    /// object with `f` and bumps its `resourceVersion`.
    pub fn interleave_next(
        &self,
        op: StoreOp,
        f: impl FnOnce(&mut K) + Send + 'static,
    ) {
        lock(&self.inner).interleaved.insert(op, Box::new(f));
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K> MemoryStore<K>
where
    K: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned,
{
    /// Stores `obj` as-is apart from server-assigned metadata. Bypasses the
    /// journal and failure injection.
    pub fn seed(&self, mut obj: K) -> K {
        let mut inner = lock(&self.inner);
        stamp(&mut obj, &mut inner.next_version);
        inner.objects.insert(object_key(&obj), obj.clone());
        obj
    }

    /// Current stored copy, bypassing the journal.
    pub fn peek(&self, ns: &str, name: &str) -> Option<K> {
        lock(&self.inner)
            .objects
            .get(&(ns.to_string(), name.to_string()))
            .cloned()
    }

    /// Mutates the stored object in place as another writer would,
    /// bumping its `resourceVersion`.
    pub fn modify(&self, ns: &str, name: &str, f: impl FnOnce(&mut K)) -> bool {
        let mut inner = lock(&self.inner);
        let Inner {
            objects,
            next_version,
            ..
        } = &mut *inner;
        match objects.get_mut(&(ns.to_string(), name.to_string())) {
            Some(obj) => {
                f(obj);
                stamp(obj, next_version);
                true
            }
            None => false,
        }
    }

    fn begin(
        &self,
        op: StoreOp,
        key: &(String, String),
    ) -> Result<MutexGuard<'_, Inner<K>>, StoreError> {
        self.journal.push(&K::kind(&()), op, &key.1);
        let mut inner = lock(&self.inner);
        if let Some(msg) = inner.failures.remove(&op) {
            return Err(StoreError::Api(msg));
        }
        if let Some(f) = inner.interleaved.remove(&op) {
            let Inner {
                objects,
                next_version,
                ..
            } = &mut *inner;
            if let Some(obj) = objects.get_mut(key) {
                f(obj);
                stamp(obj, next_version);
            }
        }
        Ok(inner)
    }
}

fn stamp<K: Resource>(obj: &mut K, next_version: &mut u64) {
    let meta = obj.meta_mut();
    meta.resource_version = Some(next_version.to_string());
    *next_version += 1;
    if meta.uid.is_none() {
        meta.uid = Some(format!(
            "uid-{}-{}-{}",
            meta.namespace.as_deref().unwrap_or_default(),
            meta.name.as_deref().unwrap_or_default(),
            next_version
        ));
    }
}

#[async_trait]
impl<K> ObjectStore<K> for MemoryStore<K>
where
    K: Resource<DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, ns: &str, name: &str) -> Result<Option<K>, StoreError> {
        let key = (ns.to_string(), name.to_string());
        let inner = self.begin(StoreOp::Get, &key)?;
        Ok(inner.objects.get(&key).cloned())
    }

    async fn create(&self, obj: &K) -> Result<K, StoreError> {
        let key = object_key(obj);
        let mut inner = self.begin(StoreOp::Create, &key)?;
        if inner.objects.contains_key(&key) {
            return Err(StoreError::Conflict(format!("{}/{}", key.0, key.1)));
        }
        let mut stored = obj.clone();
        stored.meta_mut().uid = None;
        stamp(&mut stored, &mut inner.next_version);
        inner.objects.insert(key, stored.clone());
        Ok(stored)
    }

    async fn update(&self, obj: &K) -> Result<K, StoreError> {
        let key = object_key(obj);
        let mut inner = self.begin(StoreOp::Update, &key)?;
        let current = inner
            .objects
            .get(&key)
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", key.0, key.1)))?;
        let sent = obj.meta().resource_version.as_deref();
        if sent.is_some() && sent != current.meta().resource_version.as_deref() {
            return Err(StoreError::Conflict(format!("{}/{}", key.0, key.1)));
        }
        // The main resource endpoint ignores status; uid is immutable.
        let mut value = serde_json::to_value(obj)?;
        let current_value = serde_json::to_value(current)?;
        if let Some(map) = value.as_object_mut() {
            match current_value.get("status") {
                Some(status) => {
                    map.insert("status".into(), status.clone());
                }
                None => {
                    map.remove("status");
                }
            }
        }
        let uid = current.meta().uid.clone();
        let mut stored: K = serde_json::from_value(value)?;
        stored.meta_mut().uid = uid;
        stamp(&mut stored, &mut inner.next_version);
        inner.objects.insert(key, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, obj: &K) -> Result<(), StoreError> {
        let key = object_key(obj);
        let mut inner = self.begin(StoreOp::Delete, &key)?;
        inner.objects.remove(&key);
        Ok(())
    }

    async fn update_status(&self, obj: &K) -> Result<K, StoreError> {
        let key = object_key(obj);
        let mut inner = self.begin(StoreOp::UpdateStatus, &key)?;
        let current = inner
            .objects
            .get(&key)
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", key.0, key.1)))?;
        let status = serde_json::to_value(obj)?
            .get_mut("status")
            .map(Value::take)
            .unwrap_or(Value::Null);
        let mut value = serde_json::to_value(current)?;
        merge_patch(&mut value, &serde_json::json!({ "status": status }));
        let mut stored: K = serde_json::from_value(value)?;
        stamp(&mut stored, &mut inner.next_version);
        inner.objects.insert(key, stored.clone());
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;
    use std::collections::BTreeMap;

    fn cm(name: &str, value: &str) -> ConfigMap {
        let mut cm = ConfigMap::default();
        cm.metadata.name = Some(name.into());
        cm.metadata.namespace = Some("default".into());
        cm.data = Some(BTreeMap::from([("k".to_string(), value.to_string())]));
        cm
    }

    #[test_log::test(tokio::test)]
    async fn create_assigns_version_and_rejects_duplicates() {
        let store = MemoryStore::<ConfigMap>::default();
        let created = store.create(&cm("a", "1")).await.unwrap();
        assert!(created.metadata.uid.is_some());
        assert!(created.metadata.resource_version.is_some());
        let err = store.create(&cm("a", "2")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test_log::test(tokio::test)]
    async fn update_with_stale_version_conflicts() {
        let store = MemoryStore::<ConfigMap>::default();
        let created = store.create(&cm("a", "1")).await.unwrap();
        store.modify("default", "a", |o| {
            o.data = Some(BTreeMap::from([("k".into(), "other".into())]));
        });
        let mut stale = cm("a", "3");
        stale.metadata.resource_version = created.metadata.resource_version;
        let err = store.update(&stale).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test_log::test(tokio::test)]
    async fn delete_of_missing_object_succeeds() {
        let store = MemoryStore::<ConfigMap>::default();
        store.delete(&cm("ghost", "1")).await.unwrap();
        assert!(store.is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn injected_failure_is_consumed_once() {
        let store = MemoryStore::<ConfigMap>::default();
        store.fail_next(StoreOp::Get, "boom");
        assert!(store.get("default", "a").await.is_err());
        assert!(store.get("default", "a").await.unwrap().is_none());
    }

    #[test_log::test(tokio::test)]
    async fn interleaved_writer_makes_read_copy_stale() {
        let store = MemoryStore::<ConfigMap>::default();
        let read = store.create(&cm("a", "1")).await.unwrap();
        store.interleave_next(StoreOp::Update, |o| {
            o.data = Some(BTreeMap::from([("k".into(), "theirs".into())]));
        });

        let err = store.update(&read).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        let stored = store.peek("default", "a").unwrap();
        assert_eq!(stored.data.unwrap()["k"], "theirs");

        // only the next update races
        let fresh = store.get("default", "a").await.unwrap().unwrap();
        store.update(&fresh).await.unwrap();
    }
}
