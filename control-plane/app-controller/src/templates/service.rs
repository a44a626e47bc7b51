use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;

use super::{
    BuilderDefaults, SERVICE_SUFFIX, TemplateError, child_meta,
    selector_labels,
};
use crate::crd::App;
use crate::crd::app::{NODE_PORT_MAX, NODE_PORT_MIN};

pub fn build_service(
    app: &App,
    _defaults: &BuilderDefaults,
) -> Result<Service, TemplateError> {
    let net = &app.spec.service;
    if !(1..=65535).contains(&net.port) {
        return Err(TemplateError::invalid(
            "spec.service.port",
            "must be within 1..=65535",
        ));
    }
    let node_port = match net.node_port() {
        0 => None,
        p if (NODE_PORT_MIN..=NODE_PORT_MAX).contains(&p) => Some(p),
        p => {
            return Err(TemplateError::invalid(
                "spec.service.nodePort",
                format!(
                    "{} is outside {}..={}",
                    p, NODE_PORT_MIN, NODE_PORT_MAX
                ),
            ));
        }
    };

    Ok(Service {
        metadata: child_meta(app, SERVICE_SUFFIX)?,
        spec: Some(ServiceSpec {
            type_: Some(
                if node_port.is_some() { "NodePort" } else { "ClusterIP" }
                    .to_string(),
            ),
            selector: Some(selector_labels(&app.name_any())),
            ports: Some(vec![ServicePort {
                name: Some("http".to_string()),
                port: net.port,
                target_port: Some(IntOrString::Int(net.port)),
                node_port,
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    })
}
