use k8s_openapi::api::apps::v1::DeploymentStatus;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscalerStatus;
use k8s_openapi::api::core::v1::ServiceStatus;
use k8s_openapi::api::networking::v1::IngressStatus;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const API_GROUP: &str = "aloys.tech";
pub const API_VERSION: &str = "aloys.tech/v1";
pub const KIND: &str = "App";

/// Upper bound for `spec.deployment.replicas`. The autoscaler minimum follows
/// the replica target, so it must stay below the autoscaler maximum.
pub const MAX_REPLICAS: i32 = 8;
pub const NODE_PORT_MIN: i32 = 30000;
pub const NODE_PORT_MAX: i32 = 37000;

#[derive(
    CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq,
)]
#[kube(
    group = "aloys.tech",
    version = "v1",
    kind = "App",
    plural = "apps",
    singular = "aloys",
    category = "all",
    namespaced,
    status = "AppStatus",
    scale = r#"{"specReplicasPath":".spec.deployment.replicas","statusReplicasPath":".status.deploymentStatus.replicas","labelSelectorPath":".status.selector"}"#,
    printcolumn = r#"{"name":"Image","type":"string","jsonPath":".spec.deployment.image","description":"Container image of the app"}"#,
    printcolumn = r#"{"name":"Size","type":"integer","jsonPath":".status.deploymentStatus.readyReplicas","description":"Ready replicas of the deployment"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
pub struct AppSpec {
    pub deployment: WorkloadSpec,
    #[serde(default)]
    pub service: NetworkSpec,
    #[serde(default)]
    pub ingress: IngressRouteSpec,
    /// Autoscaler bounds; defaults come from controller configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<AutoscalingSpec>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
pub struct WorkloadSpec {
    /// OCI image reference for the app container
    pub image: String,
    /// Desired replica count (also the autoscaler minimum)
    #[schemars(range(min = 0, max = 8))]
    pub replicas: i32,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSpec {
    /// Port exposed by the container and the Service
    #[serde(default = "default_port")]
    #[schemars(range(min = 1, max = 65535))]
    pub port: i32,
    /// Node-level port; when set the Service becomes a NodePort service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 30000, max = 37000))]
    pub node_port: Option<i32>,
}

impl Default for NetworkSpec {
    fn default() -> Self {
        Self {
            port: default_port(),
            node_port: None,
        }
    }
}

impl NetworkSpec {
    /// Node port with `0` and absence folded together.
    pub fn node_port(&self) -> i32 {
        self.node_port.unwrap_or(0)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Default)]
pub struct IngressRouteSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// HTTP path prefix (default "/")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AutoscalingSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1, max = 100))]
    pub target_cpu_utilization_percentage: Option<i32>,
}

/// Mirrors serialize as explicit `null` when absent so a merge patch of the
/// whole block clears a mirror whose child went away.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppStatus {
    #[serde(default)]
    pub deployment_status: Option<DeploymentStatus>,
    #[serde(default)]
    pub service_status: Option<ServiceStatus>,
    #[serde(default)]
    pub ingress_status: Option<IngressStatus>,
    #[serde(default)]
    pub horizontal_pod_autoscaler_status: Option<HorizontalPodAutoscalerStatus>,
    /// Label selector of the app pods, consumed by the scale subresource
    #[serde(default)]
    pub selector: Option<String>,
}

impl AppSpec {
    /// Whether the ingress route should exist: enabled and not shadowed by a
    /// node port on the Service.
    pub fn wants_ingress(&self) -> bool {
        self.ingress.enabled && self.service.node_port() == 0
    }
}

fn default_port() -> i32 {
    80
}
