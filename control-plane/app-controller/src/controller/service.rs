use k8s_openapi::api::core::v1::{Service, ServiceStatus};
use serde_json::Value;

use super::Stores;
use super::child::{ChildKind, null_if_unset};
use crate::crd::{App, AppStatus};
use crate::store::ObjectStore;
use crate::templates::{
    BuilderDefaults, SERVICE_SUFFIX, TemplateError, build_service,
};

// Always required: a Service is never removed once created, only updated.
impl ChildKind for Service {
    const KIND: &'static str = "Service";
    const SUFFIX: &'static str = SERVICE_SUFFIX;

    type Mirror = Option<ServiceStatus>;

    fn build(
        app: &App,
        defaults: &BuilderDefaults,
    ) -> Result<Self, TemplateError> {
        build_service(app, defaults)
    }

    fn store(stores: &Stores) -> &dyn ObjectStore<Self> {
        stores.services.as_ref()
    }

    fn observed(live: Option<&Self>, _app: &App) -> Self::Mirror {
        live.and_then(|s| s.status.clone())
    }

    fn mirrored(status: &AppStatus) -> Self::Mirror {
        status.service_status.clone()
    }

    fn apply_mirror(status: &mut AppStatus, mirror: Self::Mirror) {
        status.service_status = mirror;
    }

    // A ClusterIP service must not keep a node port from an earlier spec.
    fn mark_unset(spec: &mut Value) {
        if let Some(ports) = spec.get_mut("ports").and_then(Value::as_array_mut) {
            ports.iter_mut().for_each(|port| null_if_unset(port, "nodePort"));
        }
    }
}
