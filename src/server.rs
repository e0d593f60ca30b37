//! Booking server runtime.
//!
//! [`ServerHandle`] owns the whole lifecycle: metrics recorder, database and
//! migrations, booking store, services, REST API and graceful shutdown.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tracing::{error, info, warn};

use crate::application::BookingService;
use crate::config::{AppConfig, LogFormat};
use crate::domain::BookingRepository;
use crate::infrastructure::database::migrator::Migrator;
use crate::infrastructure::{init_database, InMemoryBookingRepository, SeaOrmBookingRepository};
use crate::interfaces::http::modules::bookings::BookingAppState;
use crate::interfaces::http::{create_api_router, health_state};
use crate::shared::{RetryConfig, ShutdownCoordinator, ShutdownSignal};

// ── Options ────────────────────────────────────────────────────────

/// Options for starting the booking server.
pub struct ServerOptions {
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

// ── ServerHandle ───────────────────────────────────────────────────

/// Handle to a running booking server.
///
/// ```rust,no_run
/// use fleet_booking::server::{ServerHandle, ServerOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let handle = ServerHandle::start(ServerOptions::default()).await?;
///     handle.install_signal_handler();
///     handle.shutdown_signal().wait().await;
///     handle.wait().await;
///     Ok(())
/// }
/// ```
pub struct ServerHandle {
    pub repo: Arc<dyn BookingRepository>,
    pub service: Arc<BookingService>,
    /// The configuration the server was started with.
    pub config: AppConfig,
    /// Address the API is bound to (resolved when port 0 was requested).
    pub local_addr: SocketAddr,

    db: Option<DatabaseConnection>,
    shutdown: ShutdownCoordinator,
    api_task: tokio::task::JoinHandle<()>,
}

/// Process-wide Prometheus handle. The global recorder can only be
/// installed once, so a restarted server reuses it.
pub fn prometheus_handle() -> PrometheusHandle {
    static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

    PROM_HANDLE
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            if metrics::set_global_recorder(recorder).is_err() {
                warn!("A global metrics recorder is already installed; /metrics stays empty");
            } else {
                info!("Prometheus metrics recorder installed");
            }
            handle
        })
        .clone()
}

impl ServerHandle {
    /// Start the booking server.
    ///
    /// 1. Install the Prometheus recorder
    /// 2. Open the booking store (SeaORM + migrations, or in-memory)
    /// 3. Build the booking service and asset directory from config
    /// 4. Serve the REST API until shutdown is signalled
    pub async fn start(opts: ServerOptions) -> Result<Self, Box<dyn std::error::Error>> {
        let app_cfg = opts.config;
        app_cfg.validate()?;

        info!("Starting fleet booking server...");

        let prometheus_handle = prometheus_handle();

        // ── Booking store ──────────────────────────────────────
        let (repo, db): (Arc<dyn BookingRepository>, Option<DatabaseConnection>) =
            if app_cfg.database.is_memory() {
                warn!("Using in-memory booking store; bookings are lost on exit");
                (Arc::new(InMemoryBookingRepository::new()), None)
            } else {
                let db = init_database(&app_cfg.database.to_database_config()).await?;
                if opts.auto_migrate {
                    info!("Running database migrations...");
                    Migrator::up(&db, None).await?;
                    info!("Migrations completed");
                }
                (Arc::new(SeaOrmBookingRepository::new(db.clone())), Some(db))
            };

        // ── Services ───────────────────────────────────────────
        let assets = Arc::new(app_cfg.booking.asset_directory()?);
        let service = Arc::new(
            BookingService::new(repo.clone())
                .with_recheck_on_confirm(app_cfg.booking.recheck_on_confirm),
        );
        info!(
            default_rate = app_cfg.booking.default_rate_per_day,
            priced_assets = app_cfg.booking.rates.len(),
            recheck_on_confirm = app_cfg.booking.recheck_on_confirm,
            timeout_ms = app_cfg.booking.request_timeout_ms,
            "Booking service configured"
        );

        let booking_state = BookingAppState {
            service: service.clone(),
            assets,
            request_timeout: app_cfg.booking.request_timeout(),
            retry: RetryConfig::default(),
        };

        // ── REST API server ────────────────────────────────────
        let api_router = create_api_router(booking_state, health_state(repo.clone()), prometheus_handle);

        let shutdown = ShutdownCoordinator::new(app_cfg.server.shutdown_timeout);
        let shutdown_signal = shutdown.signal();

        let api_addr = format!("{}:{}", app_cfg.server.host, app_cfg.server.port);
        let listener = tokio::net::TcpListener::bind(&api_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("REST API listening on http://{}", local_addr);
        info!("Swagger UI available at http://{}/docs/", local_addr);

        let api_server = axum::serve(listener, api_router).with_graceful_shutdown(async move {
            shutdown_signal.wait().await;
            info!("REST API server received shutdown signal");
        });

        let api_task = tokio::spawn(async move {
            if let Err(e) = api_server.await {
                error!("REST API server error: {}", e);
            }
        });

        Ok(Self {
            repo,
            service,
            config: app_cfg,
            local_addr,
            db,
            shutdown,
            api_task,
        })
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait for shutdown to be triggered, drain in-flight requests within
    /// `server.shutdown_timeout` and close the database.
    pub async fn wait(self) {
        let Self {
            db,
            shutdown,
            api_task,
            ..
        } = self;

        shutdown
            .shutdown_with_cleanup(move || async move {
                match api_task.await {
                    Ok(()) => info!("REST API server stopped"),
                    Err(e) => error!("REST API server task panicked: {}", e),
                }
            })
            .await;

        if let Some(db) = db {
            if let Err(e) = db.close().await {
                warn!("Error closing database connection: {}", e);
            } else {
                info!("Database connection closed");
            }
        }

        info!("Fleet booking server shutdown complete");
    }

    /// Trigger shutdown and wait for completion.
    pub async fn shutdown(self) {
        info!("Shutting down fleet booking server...");
        self.trigger_shutdown();
        self.wait().await;
    }

    pub fn is_running(&self) -> bool {
        !self.api_task.is_finished()
    }
}

/// Initialize tracing from the application config. `RUST_LOG` wins over
/// `logging.level`.
///
/// Call this once at process startup (before [`ServerHandle::start`]).
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}
