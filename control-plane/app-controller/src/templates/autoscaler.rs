use k8s_openapi::api::autoscaling::v2::{
    CrossVersionObjectReference, HorizontalPodAutoscaler,
    HorizontalPodAutoscalerSpec, MetricSpec, MetricTarget,
    ResourceMetricSource,
};
use kube::ResourceExt;

use super::{
    AUTOSCALER_SUFFIX, BuilderDefaults, DEPLOYMENT_SUFFIX, TemplateError,
    child_meta, child_name,
};
use crate::crd::App;

pub fn build_autoscaler(
    app: &App,
    defaults: &BuilderDefaults,
) -> Result<HorizontalPodAutoscaler, TemplateError> {
    let bounds = app.spec.autoscaling.clone().unwrap_or_default();
    let max = bounds.max_replicas.unwrap_or(defaults.hpa_max_replicas);
    let cpu = bounds
        .target_cpu_utilization_percentage
        .unwrap_or(defaults.hpa_target_cpu);
    // HPA rejects minReplicas 0 unless the alpha HPAScaleToZero gate is on.
    let min = app.spec.deployment.replicas.max(1);
    if max < min {
        return Err(TemplateError::invalid(
            "spec.autoscaling.maxReplicas",
            format!("{} is below the replica target {}", max, min),
        ));
    }
    if !(1..=100).contains(&cpu) {
        return Err(TemplateError::invalid(
            "spec.autoscaling.targetCpuUtilizationPercentage",
            "must be within 1..=100",
        ));
    }

    Ok(HorizontalPodAutoscaler {
        metadata: child_meta(app, AUTOSCALER_SUFFIX)?,
        spec: Some(HorizontalPodAutoscalerSpec {
            scale_target_ref: CrossVersionObjectReference {
                api_version: Some("apps/v1".to_string()),
                kind: "Deployment".to_string(),
                name: child_name(&app.name_any(), DEPLOYMENT_SUFFIX),
            },
            min_replicas: Some(min),
            max_replicas: max,
            metrics: Some(vec![MetricSpec {
                type_: "Resource".to_string(),
                resource: Some(ResourceMetricSource {
                    name: "cpu".to_string(),
                    target: MetricTarget {
                        type_: "Utilization".to_string(),
                        average_utilization: Some(cpu),
                        ..Default::default()
                    },
                }),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    })
}
