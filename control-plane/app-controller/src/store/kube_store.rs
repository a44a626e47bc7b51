use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::trace;

use super::{ObjectStore, StoreError, object_key};

/// [`ObjectStore`] backed by the API server.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, ns: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.client.clone(), ns)
    }
}

fn map_kube_err(err: kube::Error, ns: &str, name: &str) -> StoreError {
    match &err {
        kube::Error::Api(resp) if resp.code == 404 => {
            StoreError::NotFound(format!("{}/{}", ns, name))
        }
        kube::Error::Api(resp) if resp.code == 409 => {
            StoreError::Conflict(format!("{}/{}", ns, name))
        }
        _ => StoreError::Api(err.to_string()),
    }
}

#[async_trait]
impl<K> ObjectStore<K> for KubeStore
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, ns: &str, name: &str) -> Result<Option<K>, StoreError> {
        self.api::<K>(ns)
            .get_opt(name)
            .await
            .map_err(|e| map_kube_err(e, ns, name))
    }

    async fn create(&self, obj: &K) -> Result<K, StoreError> {
        let (ns, name) = object_key(obj);
        trace!(%ns, %name, kind = %K::kind(&()), "store: create");
        self.api::<K>(&ns)
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| map_kube_err(e, &ns, &name))
    }

    async fn update(&self, obj: &K) -> Result<K, StoreError> {
        let (ns, name) = object_key(obj);
        trace!(%ns, %name, kind = %K::kind(&()), "store: replace");
        self.api::<K>(&ns)
            .replace(&name, &PostParams::default(), obj)
            .await
            .map_err(|e| map_kube_err(e, &ns, &name))
    }

    async fn delete(&self, obj: &K) -> Result<(), StoreError> {
        let (ns, name) = object_key(obj);
        trace!(%ns, %name, kind = %K::kind(&()), "store: delete");
        match self
            .api::<K>(&ns)
            .delete(&name, &DeleteParams::background())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => match map_kube_err(e, &ns, &name) {
                StoreError::NotFound(_) => Ok(()),
                other => Err(other),
            },
        }
    }

    async fn update_status(&self, obj: &K) -> Result<K, StoreError> {
        let (ns, name) = object_key(obj);
        let status = serde_json::to_value(obj)?
            .get_mut("status")
            .map(Value::take)
            .unwrap_or(Value::Null);
        trace!(%ns, %name, kind = %K::kind(&()), "store: patch status");
        self.api::<K>(&ns)
            .patch_status(
                &name,
                &PatchParams::default(),
                &Patch::Merge(&json!({ "status": status })),
            )
            .await
            .map_err(|e| map_kube_err(e, &ns, &name))
    }
}
