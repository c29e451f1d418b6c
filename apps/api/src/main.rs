use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::{
    AppointmentBookingService, AppointmentState, AppointmentStore, AvailabilityService,
    BroadcastEventPublisher, CatalogStore, ClinicCalendar, ClinicCatalog, ExpirationSweeper, InMemoryStore,
    SupabaseAppointmentStore, SupabaseCatalogStore,
};
use shared_config::{AppConfig, StoreBackend};
use shared_database::SupabaseClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic scheduling API server");

    // Load configuration
    let config = Arc::new(AppConfig::from_env());

    let calendar = match config.clinic_hours.as_deref() {
        Some(hours) => ClinicCalendar::parse(hours).context("invalid CLINIC_HOURS")?,
        None => ClinicCalendar::default(),
    }
    .with_utc_offset_minutes(config.clinic_utc_offset_minutes)
    .context("invalid CLINIC_UTC_OFFSET_MINUTES")?;

    let (catalog, store) = build_stores(&config).await?;

    let publisher = Arc::new(BroadcastEventPublisher::default());
    spawn_event_logger(&publisher);

    let state = AppointmentState {
        config: Arc::clone(&config),
        booking: Arc::new(AppointmentBookingService::new(
            Arc::clone(&catalog),
            Arc::clone(&store),
            calendar.clone(),
            publisher.clone(),
        )),
        availability: Arc::new(
            AvailabilityService::new(catalog, Arc::clone(&store), calendar.clone())
                .with_step_minutes(config.slot_step_minutes),
        ),
    };

    let sweeper = Arc::new(
        ExpirationSweeper::new(store, calendar, publisher)
            .with_grace_minutes(config.no_show_grace_minutes)
            .with_interval(Duration::from_secs(config.no_show_sweep_interval_minutes * 60)),
    );
    let sweeper_handle = sweeper.start();

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(state, config.effective_store_backend())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    sweeper_handle.stop().await;
    info!("Server stopped");
    Ok(())
}

async fn build_stores(
    config: &AppConfig,
) -> anyhow::Result<(Arc<dyn CatalogStore>, Arc<dyn AppointmentStore>)> {
    let stores = match config.effective_store_backend() {
        StoreBackend::Supabase => {
            info!("Using Supabase store at {}", config.supabase_url);
            let supabase = Arc::new(SupabaseClient::new(config));
            let catalog: Arc<dyn CatalogStore> = Arc::new(SupabaseCatalogStore::new(Arc::clone(&supabase)));
            let store: Arc<dyn AppointmentStore> = Arc::new(SupabaseAppointmentStore::new(supabase));
            (catalog, store)
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store; appointments are lost on restart");
            let memory = Arc::new(InMemoryStore::new());
            memory.load_catalog(load_catalog(config).await?).await;
            let catalog: Arc<dyn CatalogStore> = memory.clone();
            let store: Arc<dyn AppointmentStore> = memory;
            (catalog, store)
        }
    };
    Ok(stores)
}

/// The memory backend has nothing to book against without a catalog file.
async fn load_catalog(config: &AppConfig) -> anyhow::Result<ClinicCatalog> {
    let path = config
        .clinic_catalog_path
        .as_deref()
        .context("CLINIC_CATALOG must point to a catalog JSON file when using the memory store")?;

    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read clinic catalog {}", path))?;
    let catalog = ClinicCatalog::from_json(&raw).with_context(|| format!("invalid clinic catalog {}", path))?;

    info!("Loaded clinic catalog from {}", path);
    Ok(catalog)
}

/// Stand-in consumer for the payment and notification collaborators.
fn spawn_event_logger(publisher: &BroadcastEventPublisher) {
    let mut events = publisher.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => info!(
                    kind = ?event.kind,
                    appointment_id = %event.appointment_id,
                    guardian_id = %event.guardian_id,
                    amount = event.amount,
                    "appointment event"
                ),
                Err(RecvError::Lagged(skipped)) => warn!("Event logger skipped {} events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
