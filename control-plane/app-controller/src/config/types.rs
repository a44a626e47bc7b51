use std::path::PathBuf;
use std::time::Duration;

use envconfig::Envconfig;

use crate::templates::BuilderDefaults;

#[derive(Envconfig, Clone, Debug)]
pub struct ControllerConfig {
    /// Flat requeue delay after a failed reconcile.
    /// Env: APP_CONTROLLER_REQUEUE_SECS
    #[envconfig(from = "APP_CONTROLLER_REQUEUE_SECS", default = "60")]
    pub requeue_secs: u64,

    #[envconfig(
        from = "APP_CONTROLLER_MAX_CONCURRENT_RECONCILES",
        default = "5"
    )]
    pub max_concurrent_reconciles: u16,

    /// Period of the full resync that catches status-only drift on children.
    /// 0 disables it.
    /// Env: APP_CONTROLLER_STATUS_RESYNC_SECS
    #[envconfig(from = "APP_CONTROLLER_STATUS_RESYNC_SECS", default = "600")]
    pub status_resync_secs: u64,

    /// Restrict watches to one namespace; unset watches all namespaces.
    #[envconfig(from = "APP_CONTROLLER_WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    #[envconfig(from = "APP_CONTROLLER_INGRESS_CLASS")]
    pub ingress_class: Option<String>,

    /// Autoscaler ceiling when the App does not set one.
    #[envconfig(from = "APP_CONTROLLER_HPA_MAX_REPLICAS", default = "8")]
    pub hpa_max_replicas: i32,

    #[envconfig(from = "APP_CONTROLLER_HPA_TARGET_CPU", default = "80")]
    pub hpa_target_cpu: i32,

    #[envconfig(nested)]
    pub features: FeaturesConfig,

    #[envconfig(nested)]
    pub webhook: WebhookConfig,
}

#[derive(Envconfig, Clone, Debug)]
pub struct FeaturesConfig {
    #[envconfig(from = "APP_CONTROLLER_FEATURES_SERVICE", default = "true")]
    pub service: bool,
    #[envconfig(from = "APP_CONTROLLER_FEATURES_INGRESS", default = "true")]
    pub ingress: bool,
}

#[derive(Envconfig, Clone, Debug)]
pub struct WebhookConfig {
    #[envconfig(from = "APP_CONTROLLER_ENABLE_WEBHOOKS", default = "true")]
    pub enabled: bool,
    #[envconfig(from = "APP_CONTROLLER_WEBHOOK_PORT", default = "9443")]
    pub port: u16,
    /// Directory holding `tls.crt` and `tls.key`.
    #[envconfig(
        from = "APP_CONTROLLER_WEBHOOK_CERT_DIR",
        default = "/tmp/k8s-webhook-server/serving-certs"
    )]
    pub cert_dir: String,
}

impl WebhookConfig {
    pub fn cert_path(&self) -> PathBuf {
        PathBuf::from(&self.cert_dir).join("tls.crt")
    }

    pub fn key_path(&self) -> PathBuf {
        PathBuf::from(&self.cert_dir).join("tls.key")
    }
}

impl ControllerConfig {
    pub fn requeue_after(&self) -> Duration {
        Duration::from_secs(self.requeue_secs)
    }

    pub fn status_resync(&self) -> Option<Duration> {
        (self.status_resync_secs > 0)
            .then(|| Duration::from_secs(self.status_resync_secs))
    }

    /// Namespace to watch, with an empty value meaning all namespaces.
    pub fn watch_namespace(&self) -> Option<&str> {
        self.watch_namespace
            .as_deref()
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
    }

    pub fn builder_defaults(&self) -> BuilderDefaults {
        BuilderDefaults {
            hpa_max_replicas: self.hpa_max_replicas,
            hpa_target_cpu: self.hpa_target_cpu,
            ingress_class: self
                .ingress_class
                .clone()
                .filter(|c| !c.trim().is_empty()),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.max_concurrent_reconciles > 0,
            "APP_CONTROLLER_MAX_CONCURRENT_RECONCILES must be positive"
        );
        anyhow::ensure!(
            self.hpa_max_replicas >= 1,
            "APP_CONTROLLER_HPA_MAX_REPLICAS must be at least 1"
        );
        anyhow::ensure!(
            (1..=100).contains(&self.hpa_target_cpu),
            "APP_CONTROLLER_HPA_TARGET_CPU must be within 1..=100"
        );
        Ok(())
    }
}
