//! Kinds the controller reads and writes, built once at startup.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{Api, ApiResource, DynamicObject, ListParams};
use kube::{Client, Resource};
use tracing::{debug, error};

use crate::config::FeaturesConfig;
use crate::crd::App;

#[derive(thiserror::Error, Debug)]
#[error("{kind} ({api_version}) is not queryable; is the CRD installed? {source}")]
pub struct RegistryError {
    pub kind: String,
    pub api_version: String,
    #[source]
    pub source: kube::Error,
}

#[derive(Clone, Debug, Default)]
pub struct KindRegistry {
    kinds: Vec<ApiResource>,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<K: Resource<DynamicType = ()>>(mut self) -> Self {
        let ar = ApiResource::erase::<K>(&());
        if !self.kinds.iter().any(|k| k.kind == ar.kind && k.group == ar.group)
        {
            self.kinds.push(ar);
        }
        self
    }

    /// App plus the children enabled by `features`.
    pub fn for_features(features: &FeaturesConfig) -> Self {
        let mut registry = Self::new()
            .register::<App>()
            .register::<Deployment>()
            .register::<HorizontalPodAutoscaler>();
        if features.service {
            registry = registry.register::<Service>();
        }
        if features.ingress {
            registry = registry.register::<Ingress>();
        }
        registry
    }

    pub fn kinds(&self) -> &[ApiResource] {
        &self.kinds
    }

    pub fn get(&self, kind: &str) -> Option<&ApiResource> {
        self.kinds.iter().find(|k| k.kind == kind)
    }

    /// Lists one object of every registered kind, failing on the first kind
    /// the API server cannot serve.
    pub async fn verify(
        &self,
        client: &Client,
        namespace: Option<&str>,
    ) -> Result<(), RegistryError> {
        for ar in &self.kinds {
            let api: Api<DynamicObject> = match namespace {
                Some(ns) => Api::namespaced_with(client.clone(), ns, ar),
                None => Api::all_with(client.clone(), ar),
            };
            if let Err(source) = api.list(&ListParams::default().limit(1)).await
            {
                error!(kind = %ar.kind, error = %source, "kind is not queryable");
                return Err(RegistryError {
                    kind: ar.kind.clone(),
                    api_version: ar.api_version.clone(),
                    source,
                });
            }
            debug!(kind = %ar.kind, api_version = %ar.api_version, "kind ok");
        }
        Ok(())
    }
}
