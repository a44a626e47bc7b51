use k8s_openapi::api::networking::v1::{Ingress, IngressStatus};
use serde_json::Value;

use super::Stores;
use super::child::{ChildKind, Presence, null_if_unset};
use crate::crd::{App, AppStatus};
use crate::store::ObjectStore;
use crate::templates::{
    BuilderDefaults, INGRESS_SUFFIX, TemplateError, build_ingress,
};

impl ChildKind for Ingress {
    const KIND: &'static str = "Ingress";
    const SUFFIX: &'static str = INGRESS_SUFFIX;

    type Mirror = Option<IngressStatus>;

    fn build(
        app: &App,
        defaults: &BuilderDefaults,
    ) -> Result<Self, TemplateError> {
        build_ingress(app, defaults)
    }

    fn store(stores: &Stores) -> &dyn ObjectStore<Self> {
        stores.ingresses.as_ref()
    }

    /// A node port on the Service takes precedence over the route.
    fn presence(app: &App) -> Presence {
        if app.spec.wants_ingress() {
            Presence::Required
        } else {
            Presence::Absent
        }
    }

    fn observed(live: Option<&Self>, _app: &App) -> Self::Mirror {
        live.and_then(|i| i.status.clone())
    }

    fn mirrored(status: &AppStatus) -> Self::Mirror {
        status.ingress_status.clone()
    }

    fn apply_mirror(status: &mut AppStatus, mirror: Self::Mirror) {
        status.ingress_status = mirror;
    }

    fn mark_unset(spec: &mut Value) {
        null_if_unset(spec, "ingressClassName");
        if let Some(rules) = spec.get_mut("rules").and_then(Value::as_array_mut) {
            rules.iter_mut().for_each(|rule| null_if_unset(rule, "host"));
        }
    }
}
