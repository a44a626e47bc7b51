use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::Resource;
use kube::runtime::controller::Action;
use tracing::{debug, error, info, instrument};

use super::child::{ChildKind, reconcile_child};
use super::{ControllerContext, ObjectKey, ReconcileErr};
use crate::crd::App;
use crate::crd::app::KIND as APP_KIND;
use crate::store::StoreOp;

async fn step<K: ChildKind>(
    app: &mut App,
    ctx: &ControllerContext,
) -> Result<(), ReconcileErr> {
    reconcile_child::<K>(app, ctx).await.inspect_err(|e| {
        error!(kind = K::KIND, error = %e, "child reconcile failed");
    })
}

/// One pass over an App: workload, autoscaler, service, ingress.
///
/// A missing App is terminal success. The first failing step ends the pass;
/// steps that already converged stay converged.
#[instrument(skip(ctx), fields(ns = %key.namespace, name = %key.name))]
pub async fn reconcile_app(
    key: &ObjectKey,
    ctx: &ControllerContext,
) -> Result<Action, ReconcileErr> {
    let app = ctx
        .stores
        .apps
        .get(&key.namespace, &key.name)
        .await
        .map_err(|e| ReconcileErr::store(APP_KIND, StoreOp::Get, &key.name, e))?;
    let Some(mut app) = app else {
        info!("app not found; assuming deleted");
        return Ok(Action::await_change());
    };
    if app.meta().deletion_timestamp.is_some() {
        debug!("app is being deleted; children follow via garbage collection");
        return Ok(Action::await_change());
    }

    step::<Deployment>(&mut app, ctx).await?;
    step::<HorizontalPodAutoscaler>(&mut app, ctx).await?;
    if ctx.features.service {
        step::<Service>(&mut app, ctx).await?;
    }
    if ctx.features.ingress {
        step::<Ingress>(&mut app, ctx).await?;
    }

    debug!("app reconciled");
    Ok(Action::await_change())
}
