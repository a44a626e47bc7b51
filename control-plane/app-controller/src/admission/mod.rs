//! Admission checks for `App` objects.
//!
//! [`validate_app`] is pure; [`webhook`] serves it to the API server as a
//! validating admission webhook next to a mutating one that stamps the
//! default annotation.

pub mod webhook;

use crate::crd::AppSpec;
use crate::crd::app::{MAX_REPLICAS, NODE_PORT_MAX, NODE_PORT_MIN};

pub use webhook::{MUTATE_PATH, VALIDATE_PATH, router, serve};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error(
        "spec.ingress.enabled and spec.service.nodePort are mutually exclusive"
    )]
    IngressWithNodePort,
    #[error(
        "spec.service.nodePort {0} is outside {NODE_PORT_MIN}..={NODE_PORT_MAX}"
    )]
    NodePortOutOfRange(i32),
    #[error("spec.service.port {0} is outside 1..=65535")]
    PortOutOfRange(i32),
    #[error("spec.deployment.replicas {0} is outside 0..={MAX_REPLICAS}")]
    ReplicasOutOfRange(i32),
    #[error("spec.deployment.image must not be empty")]
    EmptyImage,
    #[error(
        "spec.autoscaling.maxReplicas {max} is below spec.deployment.replicas {replicas}"
    )]
    MaxBelowReplicas { max: i32, replicas: i32 },
    #[error(
        "spec.autoscaling.targetCpuUtilizationPercentage {0} is outside 1..=100"
    )]
    CpuTargetOutOfRange(i32),
}

/// Checks an App spec on create and update. Returns the first violation.
pub fn validate_app(spec: &AppSpec) -> Result<(), ValidationError> {
    let node_port = spec.service.node_port();
    if spec.ingress.enabled && node_port != 0 {
        return Err(ValidationError::IngressWithNodePort);
    }
    if node_port != 0 && !(NODE_PORT_MIN..=NODE_PORT_MAX).contains(&node_port)
    {
        return Err(ValidationError::NodePortOutOfRange(node_port));
    }
    if !(1..=65535).contains(&spec.service.port) {
        return Err(ValidationError::PortOutOfRange(spec.service.port));
    }
    let replicas = spec.deployment.replicas;
    if !(0..=MAX_REPLICAS).contains(&replicas) {
        return Err(ValidationError::ReplicasOutOfRange(replicas));
    }
    if spec.deployment.image.trim().is_empty() {
        return Err(ValidationError::EmptyImage);
    }
    if let Some(autoscaling) = &spec.autoscaling {
        if let Some(max) = autoscaling.max_replicas {
            if max < replicas.max(1) {
                return Err(ValidationError::MaxBelowReplicas { max, replicas });
            }
        }
        if let Some(cpu) = autoscaling.target_cpu_utilization_percentage {
            if !(1..=100).contains(&cpu) {
                return Err(ValidationError::CpuTargetOutOfRange(cpu));
            }
        }
    }
    Ok(())
}
