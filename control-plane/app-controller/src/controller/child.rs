use std::fmt::Debug;

use k8s_openapi::NamespaceResourceScope;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use super::events::{REASON_CREATED, REASON_DELETED, REASON_UPDATED};
use super::{ControllerContext, ReconcileErr, Stores};
use crate::crd::app::KIND as APP_KIND;
use crate::crd::{App, AppStatus};
use crate::json::{is_subset, merge_patch};
use crate::store::{ObjectStore, StoreError, StoreOp};
use crate::templates::{BuilderDefaults, TemplateError, child_name};

/// Whether a child kind should exist for the current App spec.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presence {
    Required,
    Absent,
}

/// One child resource kind managed on behalf of an [`App`].
///
/// The generic [`reconcile_child`] drives every kind through the same
/// create/update/delete and status-mirror steps; implementations only supply
/// the kind-specific pieces.
pub trait ChildKind:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    const KIND: &'static str;
    const SUFFIX: &'static str;

    /// Slice of the App status that mirrors this kind.
    type Mirror: PartialEq + Debug + Send;

    fn build(
        app: &App,
        defaults: &BuilderDefaults,
    ) -> Result<Self, TemplateError>;

    fn store(stores: &Stores) -> &dyn ObjectStore<Self>;

    fn presence(_app: &App) -> Presence {
        Presence::Required
    }

    /// Mirror value derived from the live child (`None` when it is absent).
    fn observed(live: Option<&Self>, app: &App) -> Self::Mirror;

    fn mirrored(status: &AppStatus) -> Self::Mirror;

    fn apply_mirror(status: &mut AppStatus, mirror: Self::Mirror);

    /// Writes an explicit `null` for optional spec fields this kind owns but
    /// the built object leaves unset, so clearing them on the App clears
    /// them on the live child too.
    fn mark_unset(_spec: &mut Value) {}
}

/// Sets `key` to `null` on `obj` unless it already carries a value.
pub(crate) fn null_if_unset(obj: &mut Value, key: &str) {
    if let Some(map) = obj.as_object_mut() {
        map.entry(key).or_insert(Value::Null);
    }
}

fn spec_value<K: Serialize>(obj: &K) -> Result<Value, StoreError> {
    Ok(serde_json::to_value(obj)?
        .get_mut("spec")
        .map(Value::take)
        .unwrap_or(Value::Null))
}

fn desired_spec<K: ChildKind>(desired: &K) -> Result<Value, StoreError> {
    let mut spec = spec_value(desired)?;
    K::mark_unset(&mut spec);
    Ok(spec)
}

/// Whether `live` already carries everything `desired` asks for, including
/// the absence of owned fields `desired` leaves unset.
pub fn spec_matches<K: ChildKind>(
    desired: &K,
    live: &K,
) -> Result<bool, StoreError> {
    Ok(is_subset(&desired_spec(desired)?, &spec_value(live)?))
}

/// `live` with the desired spec, labels and owner references laid over it.
/// Keeps `resourceVersion` so the write is conditional on what was read.
fn overlay<K: ChildKind>(live: &K, desired: &K) -> Result<K, StoreError> {
    let mut value = serde_json::to_value(live)?;
    let spec = desired_spec(desired)?;
    let desired = serde_json::to_value(desired)?;
    let patch = json!({
        "metadata": {
            "labels": desired["metadata"]["labels"],
            "ownerReferences": desired["metadata"]["ownerReferences"],
        },
        "spec": spec,
    });
    merge_patch(&mut value, &patch);
    Ok(serde_json::from_value(value)?)
}

fn build<K: ChildKind>(
    app: &App,
    defaults: &BuilderDefaults,
) -> Result<K, ReconcileErr> {
    K::build(app, defaults).map_err(|source| ReconcileErr::Build {
        kind: K::KIND,
        source,
    })
}

fn record<K: ChildKind>(
    ctx: &ControllerContext,
    app: &App,
    reason: &str,
    child: &str,
) {
    ctx.events.record(
        &app.object_ref(&()),
        EventType::Normal,
        format!("{}{}", K::KIND, reason),
        format!("{} {} {}", K::KIND, child, reason.to_lowercase()),
    );
}

/// Drives one child kind toward the App spec and mirrors its status.
///
/// On success `app` holds the latest persisted copy (its `resourceVersion`
/// moves when the status block is written).
#[instrument(skip_all, fields(kind = K::KIND))]
pub async fn reconcile_child<K: ChildKind>(
    app: &mut App,
    ctx: &ControllerContext,
) -> Result<(), ReconcileErr> {
    let ns = app.namespace().unwrap_or_default();
    let name = child_name(&app.name_any(), K::SUFFIX);
    let store = K::store(&ctx.stores);
    let fail = |op: StoreOp, source: StoreError| {
        ReconcileErr::store(K::KIND, op, &name, source)
    };

    let live = store.get(&ns, &name).await.map_err(|e| fail(StoreOp::Get, e))?;

    let live = match (K::presence(app), live) {
        (Presence::Absent, None) => None,
        (Presence::Absent, Some(live)) => {
            store.delete(&live).await.map_err(|e| fail(StoreOp::Delete, e))?;
            ctx.metrics.child_write(K::KIND, StoreOp::Delete);
            info!(%ns, child = %name, "deleted {}", K::KIND);
            record::<K>(ctx, app, REASON_DELETED, &name);
            None
        }
        (Presence::Required, None) => {
            let desired = build::<K>(app, &ctx.defaults)?;
            let created =
                store.create(&desired).await.map_err(|e| fail(StoreOp::Create, e))?;
            ctx.metrics.child_write(K::KIND, StoreOp::Create);
            info!(%ns, child = %name, "created {}", K::KIND);
            record::<K>(ctx, app, REASON_CREATED, &name);
            Some(created)
        }
        (Presence::Required, Some(live)) => {
            let desired = build::<K>(app, &ctx.defaults)?;
            if spec_matches(&desired, &live).map_err(|e| fail(StoreOp::Update, e))? {
                debug!(%ns, child = %name, "{} up to date", K::KIND);
                Some(live)
            } else {
                let next =
                    overlay(&live, &desired).map_err(|e| fail(StoreOp::Update, e))?;
                let updated =
                    store.update(&next).await.map_err(|e| fail(StoreOp::Update, e))?;
                ctx.metrics.child_write(K::KIND, StoreOp::Update);
                info!(%ns, child = %name, "updated {}", K::KIND);
                record::<K>(ctx, app, REASON_UPDATED, &name);
                Some(updated)
            }
        }
    };

    let observed = K::observed(live.as_ref(), app);
    let mut status = app.status.clone().unwrap_or_default();
    if K::mirrored(&status) == observed {
        return Ok(());
    }
    debug!(%ns, app = %app.name_any(), "mirroring {} status", K::KIND);
    K::apply_mirror(&mut status, observed);
    let mut next = app.clone();
    next.status = Some(status);
    *app = ctx
        .stores
        .apps
        .update_status(&next)
        .await
        .map_err(|source| {
            warn!(%ns, app = %next.name_any(), error = %source, "status write failed");
            ReconcileErr::store(
                APP_KIND,
                StoreOp::UpdateStatus,
                &next.name_any(),
                source,
            )
        })?;
    Ok(())
}
