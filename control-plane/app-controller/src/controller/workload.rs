use k8s_openapi::api::apps::v1::{Deployment, DeploymentStatus};
use kube::ResourceExt;

use super::Stores;
use super::child::ChildKind;
use crate::crd::{App, AppStatus};
use crate::store::ObjectStore;
use crate::templates::{
    BuilderDefaults, DEPLOYMENT_SUFFIX, TemplateError, build_deployment,
    selector_string,
};

/// Workload mirror: the Deployment status plus the pod selector that backs
/// the scale subresource.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct WorkloadMirror {
    pub status: Option<DeploymentStatus>,
    pub selector: Option<String>,
}

impl ChildKind for Deployment {
    const KIND: &'static str = "Deployment";
    const SUFFIX: &'static str = DEPLOYMENT_SUFFIX;

    type Mirror = WorkloadMirror;

    fn build(
        app: &App,
        defaults: &BuilderDefaults,
    ) -> Result<Self, TemplateError> {
        build_deployment(app, defaults)
    }

    fn store(stores: &Stores) -> &dyn ObjectStore<Self> {
        stores.deployments.as_ref()
    }

    fn observed(live: Option<&Self>, app: &App) -> WorkloadMirror {
        WorkloadMirror {
            status: live.and_then(|d| d.status.clone()),
            selector: live.map(|_| selector_string(&app.name_any())),
        }
    }

    fn mirrored(status: &AppStatus) -> WorkloadMirror {
        WorkloadMirror {
            status: status.deployment_status.clone(),
            selector: status.selector.clone(),
        }
    }

    fn apply_mirror(status: &mut AppStatus, mirror: WorkloadMirror) {
        status.deployment_status = mirror.status;
        status.selector = mirror.selector;
    }
}
