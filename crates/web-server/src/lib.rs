use axum::{
    Router,
    http::{HeaderValue, Method},
    routing::get,
};
use configuration::{ServerSettings, Settings};
use database::{ConnectionManager, SqlxManager};
use gateway::QueryGateway;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

pub mod error;
pub mod handlers;

/// The shared application state that all handlers can access.
pub struct AppState<M: ConnectionManager> {
    pub gateway: QueryGateway<M>,
    pub route_prefix: String,
}

impl<M: ConnectionManager> AppState<M> {
    pub fn new(gateway: QueryGateway<M>, server: &ServerSettings) -> Self {
        Self {
            gateway,
            route_prefix: server.route_prefix.clone(),
        }
    }
}

/// Builds the full HTTP surface: root, health, the gateway routes under the
/// configured prefix, and a JSON 404 for everything else.
pub fn router<M: ConnectionManager>(
    state: AppState<M>,
    server: &ServerSettings,
) -> anyhow::Result<Router> {
    let prefix = state.route_prefix.clone();

    let app = Router::new()
        .route("/", get(handlers::root::<M>))
        .route("/api/health", get(handlers::health::<M>))
        .route(&format!("{prefix}/test"), get(handlers::test::<M>))
        .route(&format!("{prefix}/tables"), get(handlers::tables::<M>))
        .route(&format!("{prefix}/query"), get(handlers::query::<M>))
        .fallback(handlers::not_found)
        .with_state(Arc::new(state))
        .layer(cors_layer(server)?)
        // Logs every incoming request.
        .layer(TraceLayer::new_for_http());

    Ok(app)
}

fn cors_layer(server: &ServerSettings) -> anyhow::Result<CorsLayer> {
    let origin = match server.cors_origins() {
        None => AllowOrigin::any(),
        Some(origins) => {
            let origins = origins
                .iter()
                .map(|o| HeaderValue::from_str(o))
                .collect::<Result<Vec<_>, _>>()?;
            AllowOrigin::list(origins)
        }
    };

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(AllowHeaders::any())
        .max_age(std::time::Duration::from_secs(3600))
        .expose_headers(Any))
}

/// The main function to configure and run the web server.
///
/// Tracing is expected to be initialised by the caller.
pub async fn run_server(settings: Settings) -> anyhow::Result<()> {
    let addr = settings.server.socket_addr()?;
    let gateway = QueryGateway::<SqlxManager>::from_settings(&settings)?;
    let pool = gateway.pool().clone();

    tracing::info!(
        backend = %settings.database.backend,
        host = %settings.database.host,
        database = %settings.database.name,
        capacity = pool.options().max_connections,
        "Testing database connection..."
    );
    let report = pool.health_check().await;
    if report.healthy {
        tracing::info!(latency_ms = report.latency_ms, "Database connected successfully.");
    } else {
        let reason = report.error.unwrap_or_default();
        tracing::error!(error = %reason, "Database connection check failed.");
        if settings.server.fail_fast {
            anyhow::bail!("startup health check failed: {reason}");
        }
    }

    let app = router(AppState::new(gateway, &settings.server), &settings.server)?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        cors_origin = %settings.server.cors_origin,
        prefix = %settings.server.route_prefix,
        "Web server listening on http://{}",
        addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("SIGINT received. Shutting down gracefully..."),
        _ = terminate => tracing::info!("SIGTERM received. Shutting down gracefully..."),
    }
}
