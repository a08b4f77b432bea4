//! Reusable boarding service runtime.
//!
//! Provides [`ServerHandle`] that encapsulates the full lifecycle: metrics
//! exporter, database init, migrations, service wiring, the expiry workers
//! and graceful shutdown.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use chrono::{Duration, Utc};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::cache::{ReadCache, SharedReadCache};
use crate::application::services::{
    start_basket_expiry_task, start_reservation_expiry_task, BasketService, BookingService,
    ExpiryReport, ExpiryService, PlanningService, PrestationService,
};
use crate::config::{AppConfig, MetricsConfig};
use crate::domain::RepositoryProvider;
use crate::infrastructure::{init_database, run_migrations, SeaOrmRepositoryProvider};
use crate::shared::errors::{AppError, InfraError};
use crate::shared::shutdown::{ShutdownCoordinator, ShutdownSignal};

// ── Options ────────────────────────────────────────────────────────

/// Options for starting the boarding service.
pub struct ServerOptions {
    /// Application configuration.
    pub config: AppConfig,
    /// Run database migrations on startup (default: true).
    pub auto_migrate: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            auto_migrate: true,
        }
    }
}

// ── Services ───────────────────────────────────────────────────────

/// Application services wired over one repository provider.
#[derive(Clone)]
pub struct Services {
    pub planning: Arc<PlanningService>,
    pub prestations: Arc<PrestationService>,
    pub booking: Arc<BookingService>,
    pub baskets: Arc<BasketService>,
    pub expiry: Arc<ExpiryService>,
    pub cache: SharedReadCache,
}

impl Services {
    pub fn new(repos: Arc<dyn RepositoryProvider>, config: &AppConfig) -> Self {
        let cache = ReadCache::shared();
        let planning = Arc::new(PlanningService::new(repos.clone()));
        let prestations = Arc::new(PrestationService::new(repos.clone(), cache.clone()));
        let booking = Arc::new(BookingService::new(
            repos.clone(),
            planning.clone(),
            prestations.clone(),
        ));
        let baskets = Arc::new(BasketService::new(
            repos.clone(),
            planning.clone(),
            booking.clone(),
        ));
        let expiry = Arc::new(
            ExpiryService::new(repos, planning.clone())
                .with_basket_ttl(Duration::minutes(config.expiry.basket_ttl_minutes)),
        );
        Self {
            planning,
            prestations,
            booking,
            baskets,
            expiry,
            cache,
        }
    }
}

// ── ServerHandle ───────────────────────────────────────────────────

/// Handle to a running boarding service.
///
/// # Examples
///
/// ```rust,no_run
/// use pet_boarding::server::{ServerHandle, ServerOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let handle = ServerHandle::start(ServerOptions::default()).await?;
///     handle.install_signal_handler();
///     handle.wait_for_shutdown_signal().await;
///     handle.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct ServerHandle {
    /// Repository provider for data access.
    pub repos: Arc<dyn RepositoryProvider>,
    /// Application services.
    pub services: Services,
    /// The configuration the server was started with.
    pub config: AppConfig,

    db: DatabaseConnection,
    shutdown: ShutdownCoordinator,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Start the boarding service with the given options.
    ///
    /// This will:
    /// 1. Install the Prometheus exporter (if enabled)
    /// 2. Connect to database and run migrations
    /// 3. Wire the application services
    /// 4. Start the reservation and basket expiry tasks
    pub async fn start(opts: ServerOptions) -> Result<Self, AppError> {
        let config = opts.config;
        config.validate()?;

        info!("Starting pet boarding service...");

        if config.metrics.enabled {
            install_metrics_exporter(&config.metrics)?;
        }

        // ── Database ───────────────────────────────────────────
        let db = connect(&config, opts.auto_migrate).await?;

        // ── Repositories & Services ────────────────────────────
        let repos: Arc<dyn RepositoryProvider> =
            Arc::new(SeaOrmRepositoryProvider::new(db.clone()));
        let services = Services::new(repos.clone(), &config);

        // ── Shutdown coordinator ───────────────────────────────
        let shutdown = ShutdownCoordinator::new(config.server.shutdown_timeout_secs);
        let signal = shutdown.signal();

        // ── Background tasks ───────────────────────────────────
        let mut tasks = Vec::new();
        if config.expiry.enabled {
            let interval = config.expiry.check_interval_secs;
            tasks.push(start_reservation_expiry_task(
                services.expiry.clone(),
                signal.clone(),
                interval,
            ));
            tasks.push(start_basket_expiry_task(
                services.expiry.clone(),
                signal,
                interval,
            ));
        } else {
            warn!("Expiry workers disabled by configuration");
        }

        info!("🚀 Pet boarding service started");

        Ok(Self {
            repos,
            services,
            config,
            db,
            shutdown,
            tasks,
        })
    }

    /// Get a cloneable shutdown signal.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    /// Resolve once shutdown has been triggered.
    pub async fn wait_for_shutdown_signal(&self) {
        self.shutdown.signal().wait().await;
    }

    /// Trigger shutdown and wait for the background tasks, bounded by the
    /// configured timeout.
    pub async fn shutdown(self) {
        info!("🛑 Shutting down pet boarding service...");
        self.shutdown.signal().trigger();

        let tasks = self.tasks;
        let finished = self
            .shutdown
            .cleanup_within_timeout(async move {
                for task in tasks {
                    if let Err(e) = task.await {
                        error!("Background task panicked: {}", e);
                    }
                }
            })
            .await;
        if !finished {
            warn!("Some background tasks did not stop in time");
        }

        if let Err(e) = self.db.close().await {
            warn!("Error closing database connection: {}", e);
        } else {
            info!("✅ Database connection closed");
        }

        info!("👋 Pet boarding service shutdown complete");
    }

    /// Check if any background task is still running.
    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|t| !t.is_finished())
    }
}

// ── Helpers ────────────────────────────────────────────────────────

async fn connect(config: &AppConfig, migrate: bool) -> Result<DatabaseConnection, InfraError> {
    let db = init_database(&config.database).await?;
    if migrate {
        info!("Running database migrations...");
        run_migrations(&db).await?;
    }
    Ok(db)
}

/// Result of a single [`run_expiry_once`] invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExpirySummary {
    pub reservations: ExpiryReport,
    pub baskets: ExpiryReport,
}

impl ExpirySummary {
    pub fn to_json(&self) -> Result<String, InfraError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Run one reservation pass and one basket pass, then return.
pub async fn run_expiry_once(config: &AppConfig, migrate: bool) -> Result<ExpirySummary, AppError> {
    config.validate()?;
    let db = connect(config, migrate).await?;
    let repos: Arc<dyn RepositoryProvider> = Arc::new(SeaOrmRepositoryProvider::new(db.clone()));
    let services = Services::new(repos, config);

    let now = Utc::now();
    let reservations = services.expiry.process_expired_reservations(now).await?;
    let baskets = services.expiry.process_expired_baskets(now).await?;
    info!(
        reservations = reservations.processed,
        baskets = baskets.processed,
        failed = reservations.failed + baskets.failed,
        "Expiry pass complete"
    );

    if let Err(e) = db.close().await {
        warn!("Error closing database connection: {}", e);
    }
    Ok(ExpirySummary {
        reservations,
        baskets,
    })
}

/// Install the Prometheus recorder and its scrape endpoint.
///
/// The global recorder can only be installed once per process; later calls
/// are no-ops.
fn install_metrics_exporter(config: &MetricsConfig) -> Result<(), InfraError> {
    static INSTALLED: OnceLock<SocketAddr> = OnceLock::new();

    if let Some(addr) = INSTALLED.get() {
        info!(%addr, "📊 Prometheus exporter already installed");
        return Ok(());
    }

    let addr: SocketAddr = config
        .listen_address
        .parse()
        .map_err(|e| InfraError::Metrics(format!("{}: {e}", config.listen_address)))?;
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| InfraError::Metrics(e.to_string()))?;
    let _ = INSTALLED.set(addr);

    info!(%addr, "📊 Prometheus metrics exporter listening");
    Ok(())
}

/// Initialize tracing (logging) from the application config.
///
/// Call this once at process startup (before [`ServerHandle::start`]).
/// `RUST_LOG` takes precedence over `logging.level`.
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
