//! Desired-state builders for the children of an [`App`].
//!
//! Every builder is a pure function of the App (plus static
//! [`BuilderDefaults`]) and returns a typed [`TemplateError`] for specs that
//! cannot be rendered.

pub mod autoscaler;
pub mod deployment;
pub mod ingress;
pub mod service;

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{
    ObjectMeta, OwnerReference,
};
use kube::{Resource, ResourceExt};

use crate::crd::App;

pub use autoscaler::build_autoscaler;
pub use deployment::build_deployment;
pub use ingress::build_ingress;
pub use service::build_service;

pub const DEPLOYMENT_SUFFIX: &str = "-deploy";
pub const SERVICE_SUFFIX: &str = "-svc";
pub const INGRESS_SUFFIX: &str = "-ingress";
pub const AUTOSCALER_SUFFIX: &str = "-hpa";

pub const APP_LABEL: &str = "app";
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const INSTANCE_LABEL: &str = "app.kubernetes.io/instance";
pub const MANAGER_NAME: &str = "app-controller";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum TemplateError {
    #[error("app has no uid yet; cannot set owner reference")]
    MissingOwnerUid,
    #[error("app has no namespace")]
    MissingNamespace,
    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl TemplateError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        TemplateError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

/// Static knobs the builders need beyond the App itself.
#[derive(Clone, Debug, PartialEq)]
pub struct BuilderDefaults {
    pub hpa_max_replicas: i32,
    pub hpa_target_cpu: i32,
    pub ingress_class: Option<String>,
}

impl Default for BuilderDefaults {
    fn default() -> Self {
        Self {
            hpa_max_replicas: crate::crd::app::MAX_REPLICAS,
            hpa_target_cpu: 80,
            ingress_class: None,
        }
    }
}

/// Name of a child: parent name plus a fixed per-kind suffix.
pub fn child_name(app_name: &str, suffix: &str) -> String {
    format!("{}{}", app_name, suffix)
}

/// Label selector string for the app pods (`app=<name>`).
pub fn selector_string(app_name: &str) -> String {
    format!("{}={}", APP_LABEL, app_name)
}

pub fn selector_labels(app_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL.to_string(), app_name.to_string())])
}

pub fn child_labels(app_name: &str) -> BTreeMap<String, String> {
    let mut lbls = selector_labels(app_name);
    lbls.insert(MANAGED_BY_LABEL.to_string(), MANAGER_NAME.to_string());
    lbls.insert(INSTANCE_LABEL.to_string(), app_name.to_string());
    lbls
}

/// Label selector matching every child this controller manages.
pub fn managed_selector() -> String {
    format!("{}={}", MANAGED_BY_LABEL, MANAGER_NAME)
}

fn owner_ref(app: &App) -> Result<OwnerReference, TemplateError> {
    app.controller_owner_ref(&())
        .ok_or(TemplateError::MissingOwnerUid)
}

/// Metadata shared by all children: name, namespace, labels and the
/// controller owner reference back to the App.
pub(crate) fn child_meta(
    app: &App,
    suffix: &str,
) -> Result<ObjectMeta, TemplateError> {
    let ns = app.namespace().ok_or(TemplateError::MissingNamespace)?;
    let name = app.name_any();
    Ok(ObjectMeta {
        name: Some(child_name(&name, suffix)),
        namespace: Some(ns),
        labels: Some(child_labels(&name)),
        owner_references: Some(vec![owner_ref(app)?]),
        ..Default::default()
    })
}
