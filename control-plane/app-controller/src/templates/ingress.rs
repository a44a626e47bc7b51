use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend,
    IngressRule, IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use kube::ResourceExt;

use super::{
    BuilderDefaults, INGRESS_SUFFIX, SERVICE_SUFFIX, TemplateError,
    child_meta, child_name,
};
use crate::crd::App;

pub fn build_ingress(
    app: &App,
    defaults: &BuilderDefaults,
) -> Result<Ingress, TemplateError> {
    let route = &app.spec.ingress;
    let path = route.path.as_deref().unwrap_or("/");
    if !path.starts_with('/') {
        return Err(TemplateError::invalid(
            "spec.ingress.path",
            "must start with '/'",
        ));
    }
    let host = route
        .host
        .as_deref()
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string);

    let backend = IngressBackend {
        service: Some(IngressServiceBackend {
            name: child_name(&app.name_any(), SERVICE_SUFFIX),
            port: Some(ServiceBackendPort {
                number: Some(app.spec.service.port),
                ..Default::default()
            }),
        }),
        ..Default::default()
    };

    Ok(Ingress {
        metadata: child_meta(app, INGRESS_SUFFIX)?,
        spec: Some(IngressSpec {
            ingress_class_name: defaults.ingress_class.clone(),
            rules: Some(vec![IngressRule {
                host,
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some(path.to_string()),
                        path_type: "Prefix".to_string(),
                        backend,
                    }],
                }),
            }]),
            ..Default::default()
        }),
        ..Default::default()
    })
}
