mod config;

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, Router};
use clap::{crate_authors, crate_description, crate_version, Parser};
use kaniop_cni_agent::CniAgentClient;
use kaniop_k8s_util::client::new_client_with_metrics;
use kaniop_operator::context::Context;
use kaniop_operator::metrics::Metrics;
use kaniop_operator::telemetry::{self, LogFormat};
use kube::Config as KubeConfig;
use prometheus_client::encoding::text::encode;
use prometheus_client::registry::Registry;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "kaniop-netctl",
    about = crate_description!(),
    version = crate_version!(),
    author = crate_authors!("\n"),
)]
struct Args {
    /// Path to a YAML config file; fields present here override every flag below.
    #[arg(long, env)]
    config: Option<PathBuf>,

    /// Path to the cluster's master config (networkConfig + etcdClientInfo).
    #[arg(long, env)]
    k8s_master_config: Option<PathBuf>,

    /// Path to kubeconfig; unset uses in-cluster config or `$KUBECONFIG`.
    #[arg(long, env)]
    kubeconfig: Option<PathBuf>,

    /// SDN (VSD) API base URL.
    #[arg(long, env)]
    vsd_url: Option<String>,

    /// SDN API version, e.g. "v6".
    #[arg(long, env)]
    apiversion: Option<String>,

    /// SDN Enterprise name.
    #[arg(long, env)]
    enterprise: Option<String>,

    /// SDN Domain name.
    #[arg(long, env)]
    domain: Option<String>,

    /// Client certificate for the SDN and CNI-agent mutual-TLS session.
    #[arg(long, env)]
    cert_file: Option<PathBuf>,

    /// Client key for the SDN and CNI-agent mutual-TLS session.
    #[arg(long, env)]
    key_file: Option<PathBuf>,

    /// CA bundle used to verify the SDN and CNI-agent server certificates.
    #[arg(long, env)]
    ca_file: Option<PathBuf>,

    /// TCP port per-node CNI agents listen on.
    #[arg(long, default_value_t = 9443, env)]
    cni_agent_port: u16,

    /// Health/metrics listen port.
    #[arg(long, default_value_t = 8099, env)]
    port: u16,

    /// `tracing_subscriber::filter::EnvFilter` directive, e.g. "info,kube=debug".
    #[arg(long, default_value = "info", env)]
    log_filter: String,

    /// Log format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env)]
    log_format: LogFormat,

    /// OpenTelemetry OTLP endpoint; tracing export disabled if unset.
    #[arg(long, env = "OPENTELEMETRY_ENDPOINT_URL")]
    tracing_url: Option<String>,

    /// Fraction of traces sampled when `tracing_url` is set.
    #[arg(long, default_value_t = 0.1, env)]
    sample_ratio: f64,
}

struct AppState {
    registry: Registry,
}

async fn healthz() -> impl IntoResponse {
    Json("healthy")
}

async fn metrics(State(state): State<Arc<tokio::sync::Mutex<AppState>>>) -> impl IntoResponse {
    let state = state.lock().await;
    let mut buf = String::new();
    match encode(&mut buf, &state.registry) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "application/openmetrics-text; version=1.0.0; charset=utf-8")],
            buf,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    telemetry::init(&args.log_filter, args.log_format, args.tracing_url.as_deref(), args.sample_ratio).await?;

    let cfg = match &args.config {
        Some(path) => Some(config::Config::load(path)?),
        None => None,
    };

    let master_config = match &cfg {
        Some(c) => c.master_config()?,
        None => {
            let path = args
                .k8s_master_config
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("--k8s-master-config or --config is required"))?;
            kaniop_sdn::config::MasterConfig::load(path)?
        }
    };

    let nuage_config = match cfg {
        Some(c) => c.nuage_config,
        None => kaniop_sdn::config::NuageConfig {
            vsd_url: args.vsd_url.ok_or_else(|| anyhow::anyhow!("--vsd-url or --config is required"))?,
            apiversion: args.apiversion.ok_or_else(|| anyhow::anyhow!("--apiversion or --config is required"))?,
            enterprise: args.enterprise.ok_or_else(|| anyhow::anyhow!("--enterprise or --config is required"))?,
            domain: args.domain.ok_or_else(|| anyhow::anyhow!("--domain or --config is required"))?,
            cert_file: args.cert_file.ok_or_else(|| anyhow::anyhow!("--cert-file or --config is required"))?,
            key_file: args.key_file.ok_or_else(|| anyhow::anyhow!("--key-file or --config is required"))?,
            ca_file: args.ca_file,
        },
    };

    info!(vsd_url = %nuage_config.vsd_url, enterprise = %nuage_config.enterprise, "bootstrapping SDN gateway");
    let bootstrapped = kaniop_sdn::bootstrap::bootstrap(
        &nuage_config,
        &master_config.network_config.cluster_network_cidr,
        master_config.network_config.host_subnet_length,
    )
    .await?;

    let mut registry = Registry::default();
    let metrics_collector = Arc::new(Metrics::new(&mut registry));

    let kube_config = match &args.kubeconfig {
        Some(path) => KubeConfig::from_custom_kubeconfig(
            kube::config::Kubeconfig::read_from(path)?,
            &kube::config::KubeConfigOptions::default(),
        )
        .await?,
        None => KubeConfig::infer().await?,
    };
    let client = new_client_with_metrics(kube_config, &mut registry).await?;

    let cni_agent = Arc::new(CniAgentClient::new(
        args.cni_agent_port,
        &nuage_config.cert_file,
        &nuage_config.key_file,
        nuage_config.ca_file.as_deref(),
    )?);

    let ctx = Arc::new(Context::new(client.clone(), Arc::new(bootstrapped.gateway), cni_agent, metrics_collector.clone()));

    let shutdown = CancellationToken::new();
    let reconciler = kaniop_reconciler::run(client, ctx, shutdown.clone());

    let state = Arc::new(tokio::sync::Mutex::new(AppState { registry }));
    let app = Router::new().route("/healthz", get(healthz)).route("/metrics", get(metrics)).with_state(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port)).await?;
    let shutdown_for_server = shutdown.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move { shutdown_for_server.cancelled().await });

    info!(port = args.port, "kaniop-netctl ready");
    tokio::select! {
        _ = reconciler => {},
        result = server => { result?; },
        _ = shutdown_signal() => { shutdown.cancel(); },
    }
    Ok(())
}

async fn shutdown_signal() {
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM signal handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigterm.recv() => {},
    }
}
