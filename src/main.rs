use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use jellyfin_mcp::auth::{PendingRequestSlot, SessionStore};
use jellyfin_mcp::config::{self, Config};
use jellyfin_mcp::dispatcher::Dispatcher;
use jellyfin_mcp::http_client::JellyfinHttpClient;
use jellyfin_mcp::metrics::MetricsCollector;
use jellyfin_mcp::routes::{self, AppState};
use jellyfin_mcp::service_spec::ServiceSpec;

#[tokio::main]
async fn main() -> Result<()> {
    // Check if interactive setup is needed (no .env and no server URL)
    if config::needs_interactive_setup() {
        let interactive_config = config::run_interactive_setup()?;
        interactive_config.apply_to_env();
    }

    // Load configuration first (for log level)
    let config = Config::load()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    config.validate()?;

    tracing::info!("🚀 Jellyfin MCP starting...");
    tracing::info!(
        "Server configured: {}:{}",
        config.server_host,
        config.server_port
    );
    tracing::debug!("Configuration: {:?}", config);

    let http_client = Arc::new(JellyfinHttpClient::new(
        &config.jellyfin_base_url,
        config.http_connect_timeout,
        config.http_request_timeout,
        config.http_max_retries,
    )?);
    tracing::info!("✅ HTTP client initialized for {}", http_client.base_url());

    let store = Arc::new(SessionStore::new(config.session_max_age()));
    let pending = Arc::new(PendingRequestSlot::new());
    let dispatcher = Arc::new(Dispatcher::new(
        http_client,
        config.credentials.clone(),
        store,
        pending,
    ));

    // Check configured credentials early; failure is not fatal
    tracing::info!("Resolving credentials...");
    dispatcher.warm_up().await;

    let service_spec = Arc::new(ServiceSpec::new(config.spec_path.clone()));
    match service_spec.index() {
        Ok(index) => tracing::info!(
            "✅ Service description loaded ({} sections, etag {})",
            index.keys.len(),
            index.etag
        ),
        Err(e) => tracing::warn!("Service description unavailable: {}", e),
    }

    let metrics = Arc::new(MetricsCollector::new());
    spawn_metrics_cleanup(metrics.clone());
    tracing::info!("✅ Metrics collector initialized");

    let app = routes::build_router(AppState {
        dispatcher,
        service_spec,
        metrics,
    });

    // Bind to configured host and port
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    print_startup_banner(&config);

    tracing::info!("🚀 Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("👋 Server shutdown complete");

    Ok(())
}

/// Periodically drop stale latency samples
fn spawn_metrics_cleanup(metrics: Arc<MetricsCollector>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            metrics.cleanup_old_samples();
        }
    });
}

/// Print startup banner
fn print_startup_banner(config: &Config) {
    let banner = r#"
╔═══════════════════════════════════════════════════════════╗
║                                                           ║
║                  🎬 Jellyfin MCP Server                   ║
║                                                           ║
║     Library tools with sign-in and automatic retry        ║
║                                                           ║
╚═══════════════════════════════════════════════════════════╝
"#;

    let creds = &config.credentials;
    let sign_in = match (
        creds.access_token.is_some() && creds.user_id.is_some(),
        creds.username.is_some() && creds.password.is_some(),
    ) {
        (true, true) => "token, then username/password",
        (true, false) => "token",
        (false, true) => "username/password",
        (false, false) => "on demand (authenticate_user / set_token)",
    };

    println!("{}", banner);
    println!("  Version:     {}", env!("CARGO_PKG_VERSION"));
    println!(
        "  Server:      http://{}:{}",
        config.server_host, config.server_port
    );
    println!("  Jellyfin:    {}", config.jellyfin_base_url);
    println!("  Sign-in:     {}", sign_in);
    println!("  Session age: {}h", config.session_max_age_hours);
    println!("  Log Level:   {}", config.log_level);
    println!();
}

/// Handle graceful shutdown signal
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown...");
        },
    }
}
