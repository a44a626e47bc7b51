use k8s_openapi::api::autoscaling::v2::{
    HorizontalPodAutoscaler, HorizontalPodAutoscalerStatus,
};

use super::Stores;
use super::child::ChildKind;
use crate::crd::{App, AppStatus};
use crate::store::ObjectStore;
use crate::templates::{
    AUTOSCALER_SUFFIX, BuilderDefaults, TemplateError, build_autoscaler,
};

impl ChildKind for HorizontalPodAutoscaler {
    const KIND: &'static str = "HorizontalPodAutoscaler";
    const SUFFIX: &'static str = AUTOSCALER_SUFFIX;

    type Mirror = Option<HorizontalPodAutoscalerStatus>;

    fn build(
        app: &App,
        defaults: &BuilderDefaults,
    ) -> Result<Self, TemplateError> {
        build_autoscaler(app, defaults)
    }

    fn store(stores: &Stores) -> &dyn ObjectStore<Self> {
        stores.autoscalers.as_ref()
    }

    fn observed(live: Option<&Self>, _app: &App) -> Self::Mirror {
        live.and_then(|h| h.status.clone())
    }

    fn mirrored(status: &AppStatus) -> Self::Mirror {
        status.horizontal_pod_autoscaler_status.clone()
    }

    fn apply_mirror(status: &mut AppStatus, mirror: Self::Mirror) {
        status.horizontal_pod_autoscaler_status = mirror;
    }
}
