use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use salon_api::config::ServerConfig;
use salon_api::router::build_app_router;
use salon_api::service::AppointmentService;
use salon_api::state::AppState;
use salon_db::{FileStore, KeyValueStore};
use salon_events::{
    EventBus, FlushConfig, FlushQueue, NotificationFanout, NotificationStore, PaymentLedger,
    PaymentRequester, PaymentTrigger, ReminderScheduler,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "salon_api=debug,salon_events=debug,salon_db=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Storage ---
    let store: Arc<dyn KeyValueStore> = Arc::new(
        FileStore::open(config.data_dir.clone())
            .await
            .expect("Failed to open data directory"),
    );
    tracing::info!(dir = %config.data_dir.display(), "Snapshot storage opened");

    let (flush, flush_handle) = FlushQueue::spawn(
        Arc::clone(&store),
        FlushConfig {
            max_retries: config.flush_max_retries,
            ..FlushConfig::default()
        },
    );

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());

    // --- Stores ---
    let deadline = config.storage_load_timeout();
    let appointments = Arc::new(
        AppointmentService::load(
            store.as_ref(),
            deadline,
            Arc::clone(&event_bus),
            flush.clone(),
            Vec::new(),
        )
        .await,
    );
    let notifications =
        Arc::new(NotificationStore::load(store.as_ref(), deadline, flush.clone()).await);
    let payments = Arc::new(PaymentLedger::load(store.as_ref(), deadline, flush.clone()).await);

    // --- Event services ---
    // Spawn notification fan-out (turns transitions into in-app notifications).
    let fanout = NotificationFanout::new(Arc::clone(&notifications), Arc::clone(&event_bus));
    let fanout_handle = tokio::spawn(fanout.run(event_bus.subscribe()));

    // Spawn payment trigger (requests a payment for every completion).
    let requester: Arc<dyn PaymentRequester> = payments.clone();
    let trigger = PaymentTrigger::new(requester, Arc::clone(&event_bus));
    let reconciled = trigger.reconcile(&appointments.all_appointments().await).await;
    if reconciled > 0 {
        tracing::info!(count = reconciled, "Requested payments missed before startup");
    }
    let trigger_handle = tokio::spawn(trigger.run(event_bus.subscribe()));

    // Spawn reminder scheduler.
    let reminder_cancel = CancellationToken::new();
    let reminder_scheduler = ReminderScheduler::new(
        appointments.clone(),
        Arc::clone(&notifications),
        Arc::clone(&event_bus),
        config.reminder_interval(),
        config.reminder_lead(),
    );
    let reminder_cancel_clone = reminder_cancel.clone();
    let reminder_handle = tokio::spawn(async move {
        reminder_scheduler.run(reminder_cancel_clone).await;
    });

    tracing::info!("Event services started (notification fan-out, payment trigger, reminders)");

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        appointments,
        notifications,
        payments,
        event_bus: Arc::clone(&event_bus),
        flush: flush.clone(),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    reminder_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), reminder_handle).await;
    tracing::info!("Reminder scheduler stopped");

    // Dropping the last bus handle closes the channel and ends both consumers.
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), fanout_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), trigger_handle).await;
    tracing::info!("Event services shut down");

    if tokio::time::timeout(Duration::from_secs(5), flush.flush())
        .await
        .is_err()
    {
        tracing::warn!("Timed out writing pending snapshots");
    }
    let failed = flush.failed_writes();
    if failed > 0 {
        tracing::warn!(failed, "Some snapshots were never persisted");
    }
    drop(flush);
    let _ = tokio::time::timeout(Duration::from_secs(5), flush_handle).await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
