//! `gatehouse serve`
//!
//! Grounded in the teacher's `cli::serve::{load_config_with_overrides,
//! init_tracing, run_serve}`: layered config load, `tracing_subscriber`
//! init, bind-and-serve-with-graceful-shutdown. The teacher's health
//! checker/mDNS discovery/budget reconciliation background tasks have no
//! counterpart (there is no backend fleet to watch); in their place this
//! acquires [`crate::lifecycle::InstanceGuard`] before bind and unloads the
//! router's session on the way out, per the single-backend teardown order.

use crate::adapter::{AdapterKind, BackendAdapter};
use crate::api::{create_router, AppState};
use crate::artifact::ArtifactStore;
use crate::cli::ServeArgs;
use crate::config::{GatehouseConfig, LogFormat};
use crate::lifecycle::{default_lock_path, shutdown_signal, InstanceGuard};
use crate::metrics::{setup_metrics, MetricsCollector};
use crate::registry::ModelRegistry;
use crate::router::Router;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Load configuration with CLI overrides applied last (file < env < CLI).
pub fn load_config_with_overrides(
    args: &ServeArgs,
) -> Result<GatehouseConfig, Box<dyn std::error::Error>> {
    let mut config = if args.config.exists() {
        GatehouseConfig::load(Some(&args.config))?
    } else {
        tracing::debug!("config file not found, using defaults");
        GatehouseConfig::default()
    };

    config = config.with_env_overrides();

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if let Some(ctx_size) = args.ctx_size {
        config.engine.ctx_size = Some(ctx_size);
    }

    Ok(config)
}

pub fn init_tracing(
    config: &crate::config::LoggingConfig,
    log_file: Option<&std::path::Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter_str = crate::logging::build_filter_directives(config);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    if config.enable_content_logging {
        eprintln!("WARNING: content logging is enabled; request/response bodies will be logged.");
    }

    let writer: tracing_appender::non_blocking::NonBlocking;
    let _guard;
    if let Some(path) = log_file {
        let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        let (nb, guard) = tracing_appender::non_blocking(file);
        writer = nb;
        _guard = guard;
    } else {
        let (nb, guard) = tracing_appender::non_blocking(std::io::stderr());
        writer = nb;
        _guard = guard;
    }
    // Leak the guard: it must live for the process lifetime and `serve` never returns early.
    std::mem::forget(_guard);

    match config.format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(writer))
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
                .try_init()?;
        }
    }

    Ok(())
}

fn build_adapters(http_client: reqwest::Client) -> HashMap<AdapterKind, Arc<dyn BackendAdapter>> {
    let mut adapters: HashMap<AdapterKind, Arc<dyn BackendAdapter>> = HashMap::new();
    adapters.insert(
        AdapterKind::LlamaBox,
        Arc::new(crate::adapter::llamabox::LlamaBoxAdapter::new(http_client.clone())),
    );
    adapters.insert(
        AdapterKind::Npu,
        Arc::new(crate::adapter::npu::NpuAdapter::new(http_client)),
    );
    adapters
}

pub async fn run(args: ServeArgs) -> i32 {
    let config = match load_config_with_overrides(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            return 1;
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("invalid configuration: {e}");
        return 1;
    }

    if let Err(e) = init_tracing(&config.logging, args.log_file.as_deref()) {
        eprintln!("failed to initialize logging: {e}");
        return 1;
    }

    tracing::info!("starting gatehouse server");
    tracing::debug!(?config, "loaded configuration");

    let lock_path = default_lock_path(&config.cache.root);
    let guard = match InstanceGuard::try_acquire(&lock_path) {
        Ok(Some(g)) => g,
        Ok(None) => {
            eprintln!("another gatehouse instance is already running (lock: {})", lock_path.display());
            return 1;
        }
        Err(e) => {
            eprintln!("failed to acquire instance lock: {e}");
            return 1;
        }
    };

    let registry = Arc::new(ModelRegistry::new(config.cache.root.join("user_models.json")));
    if let Err(e) = registry.load_user_catalog() {
        tracing::warn!(error = %e, "failed to load user catalog, starting with shipped catalog only");
    }

    let artifact_store = Arc::new(ArtifactStore::new(config.cache.root.clone()));
    let http_client = reqwest::Client::new();
    let adapters = build_adapters(http_client);
    let router = Arc::new(Router::with_hub_base_url(
        adapters,
        artifact_store.clone(),
        config.engine.clone(),
        config.cache.hf_token.clone(),
        config.cache.offline,
        config.cache.hub_base_url.clone(),
    ));

    let prometheus_handle = match setup_metrics() {
        Ok(h) => h,
        Err(e) => {
            eprintln!("failed to initialize metrics: {e}");
            return 1;
        }
    };
    let metrics = Arc::new(MetricsCollector::new(Instant::now(), prometheus_handle));

    let config = Arc::new(config);
    let shutdown = CancellationToken::new();
    let app_state = Arc::new(AppState::new(
        registry,
        artifact_store,
        router.clone(),
        metrics,
        config.clone(),
        shutdown.clone(),
    ));
    let app = create_router(app_state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("failed to bind {addr}: {e}");
            return 1;
        }
    };
    tracing::info!(%addr, "gatehouse listening");

    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await;

    if let Err(e) = serve_result {
        tracing::error!(error = %e, "server exited with an error");
    }

    if let Err(e) = router.unload().await {
        tracing::warn!(error = %e, "unload during shutdown reported an error");
    }
    drop(guard);
    tracing::info!("gatehouse stopped");
    0
}
