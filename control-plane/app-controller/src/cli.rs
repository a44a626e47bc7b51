use std::net::SocketAddr;

use crate::runtime::RuntimeOptions;

/// App controller command line.
#[derive(clap::Parser, Clone, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// Address the metrics endpoint binds to; `0` disables it
    #[arg(long, default_value = ":8080")]
    pub metrics_bind_address: String,
    /// Address the health and readiness probes bind to
    #[arg(long, default_value = ":8081")]
    pub health_probe_bind_address: String,
    /// Ask for leader election before starting the controller
    #[arg(long)]
    pub leader_elect: bool,
    /// Serve metrics over HTTPS with the webhook certificate
    #[arg(long)]
    pub metrics_secure: bool,
    /// Offer HTTP/2 on the TLS listeners
    #[arg(long)]
    pub enable_http2: bool,
}

/// Parses `host:port` or `:port` (all interfaces). `0` and the empty string
/// disable the listener.
pub fn parse_bind_addr(raw: &str) -> anyhow::Result<Option<SocketAddr>> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "0" {
        return Ok(None);
    }
    let full = match raw.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => raw.to_string(),
    };
    full.parse()
        .map(Some)
        .map_err(|e| anyhow::anyhow!("invalid bind address {raw:?}: {e}"))
}

impl Cli {
    pub fn runtime_options(&self) -> anyhow::Result<RuntimeOptions> {
        Ok(RuntimeOptions {
            metrics_addr: parse_bind_addr(&self.metrics_bind_address)?,
            probe_addr: parse_bind_addr(&self.health_probe_bind_address)?,
            leader_elect: self.leader_elect,
            metrics_secure: self.metrics_secure,
            enable_http2: self.enable_http2,
        })
    }
}
