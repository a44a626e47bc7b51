use std::net::SocketAddr;

use futures_util::future::try_join_all;
use kube::Client;
use prometheus::Registry;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    admission,
    config::ControllerConfig,
    controller::run_controller,
    metrics::Metrics,
    registry::KindRegistry,
    web::{self, Readiness, tls::load_rustls_config},
};

/// Process-level options that come from the command line.
#[derive(Clone, Debug, Default)]
pub struct RuntimeOptions {
    pub metrics_addr: Option<SocketAddr>,
    pub probe_addr: Option<SocketAddr>,
    pub leader_elect: bool,
    pub metrics_secure: bool,
    pub enable_http2: bool,
}

/// Webhook listen address based on config.
pub fn compute_webhook_addr(cfg: &ControllerConfig) -> SocketAddr {
    ([0, 0, 0, 0], cfg.webhook.port).into()
}

/// Spawn the App controller; cancels `shutdown` once it stops so the servers
/// follow it down.
pub fn spawn_controller(
    client: Client,
    cfg: ControllerConfig,
    metrics: Metrics,
    shutdown: CancellationToken,
) -> JoinHandle<anyhow::Result<()>> {
    tokio::spawn(async move {
        let res = run_controller(client, cfg, metrics).await;
        shutdown.cancel();
        res
    })
}

fn spawn_server(
    addr: SocketAddr,
    router: axum::Router,
    shutdown: CancellationToken,
) -> JoinHandle<anyhow::Result<()>> {
    tokio::spawn(async move { web::serve(addr, router, shutdown).await })
}

/// Verify kinds, then run the controller, probes, metrics and webhook until
/// the controller stops or any of them fails.
pub async fn run_all(
    client: Client,
    cfg: ControllerConfig,
    opts: RuntimeOptions,
    kinds: KindRegistry,
) -> anyhow::Result<()> {
    let registry = Registry::new();
    let metrics = Metrics::new()?.register(&registry)?;

    kinds.verify(&client, cfg.watch_namespace()).await?;

    if opts.leader_elect {
        warn!(
            "leader election requested; not supported, running as the only \
             active instance"
        );
    }

    let shutdown = CancellationToken::new();
    let readiness = Readiness::default();
    let mut tasks: Vec<JoinHandle<anyhow::Result<()>>> = Vec::new();

    if let Some(addr) = opts.probe_addr {
        tasks.push(spawn_server(
            addr,
            web::probes_router(readiness.clone()),
            shutdown.clone(),
        ));
    }

    if let Some(addr) = opts.metrics_addr {
        let router = web::metrics_router(registry);
        if opts.metrics_secure {
            let tls = load_rustls_config(
                &cfg.webhook.cert_path(),
                &cfg.webhook.key_path(),
                opts.enable_http2,
            )?;
            let token = shutdown.clone();
            tasks.push(tokio::spawn(async move {
                web::serve_tls(addr, router, tls, token).await?;
                Ok::<_, anyhow::Error>(())
            }));
        } else {
            tasks.push(spawn_server(addr, router, shutdown.clone()));
        }
    } else {
        info!("metrics endpoint disabled");
    }

    if cfg.webhook.enabled {
        let tls = load_rustls_config(
            &cfg.webhook.cert_path(),
            &cfg.webhook.key_path(),
            opts.enable_http2,
        )?;
        let addr = compute_webhook_addr(&cfg);
        let token = shutdown.clone();
        tasks.push(tokio::spawn(async move {
            admission::serve(addr, tls, token).await?;
            Ok::<_, anyhow::Error>(())
        }));
    } else {
        info!("admission webhook disabled");
    }

    tasks.push(spawn_controller(client, cfg, metrics, shutdown.clone()));
    readiness.mark_ready();

    let res = try_join_all(tasks.into_iter().map(|task| async move {
        match task.await {
            Ok(res) => res,
            Err(e) => Err(anyhow::Error::from(e)),
        }
    }))
    .await;
    shutdown.cancel();
    res?;
    info!("shut down cleanly");
    Ok(())
}
