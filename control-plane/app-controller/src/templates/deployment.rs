use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, PodSpec, PodTemplateSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{
    LabelSelector, ObjectMeta,
};
use kube::ResourceExt;

use super::{
    BuilderDefaults, DEPLOYMENT_SUFFIX, TemplateError, child_meta,
    selector_labels,
};
use crate::crd::App;
use crate::crd::app::MAX_REPLICAS;

pub fn build_deployment(
    app: &App,
    _defaults: &BuilderDefaults,
) -> Result<Deployment, TemplateError> {
    let spec = &app.spec;
    let image = spec.deployment.image.trim();
    if image.is_empty() {
        return Err(TemplateError::invalid(
            "spec.deployment.image",
            "must not be empty",
        ));
    }
    if !(0..=MAX_REPLICAS).contains(&spec.deployment.replicas) {
        return Err(TemplateError::invalid(
            "spec.deployment.replicas",
            format!("must be within 0..={}", MAX_REPLICAS),
        ));
    }
    let name = app.name_any();
    let labels = selector_labels(&name);

    Ok(Deployment {
        metadata: child_meta(app, DEPLOYMENT_SUFFIX)?,
        spec: Some(DeploymentSpec {
            replicas: Some(spec.deployment.replicas),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: name.clone(),
                        image: Some(image.to_string()),
                        ports: Some(vec![ContainerPort {
                            container_port: spec.service.port,
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}
