//! Call list server launcher.
//!
//! Resolves configuration from the environment once at startup, builds the
//! in-memory stores and the call list service, and serves the REST API.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use api_rest::access::PermissiveAccess;
use calllist_core::{
    CallListService, CallRecordStore, CoreConfig, InMemoryDirectory, Patient, SystemClock,
    WorklistEntryStore, grace_window_from_env_value,
};
use calllist_types::{Line, NonEmptyText};

/// Main entry point for the call list server.
///
/// # Environment Variables
/// - `CALLLIST_REST_ADDR`: server address (default: "0.0.0.0:3000")
/// - `CALLLIST_GRACE_WINDOW_HOURS`: grace window in whole hours (default: 8)
/// - `CALLLIST_SEED_DEMO`: when set, seeds a few demo patients so the API is
///   usable out of the box
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration values fail validation, or
/// - the server address cannot be bound.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("calllist=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("CALLLIST_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let grace_window =
        grace_window_from_env_value(std::env::var("CALLLIST_GRACE_WINDOW_HOURS").ok())?;
    let cfg = CoreConfig::new(grace_window, calllist_core::config::DEFAULT_STORE_TIMEOUT)?;

    tracing::info!(
        "++ Starting call list REST on {} (grace window: {}h)",
        addr,
        grace_window.num_hours()
    );

    let directory = Arc::new(InMemoryDirectory::new());
    if std::env::var("CALLLIST_SEED_DEMO").is_ok() {
        seed_demo_patients(&directory)?;
    }

    let service = CallListService::new(
        &cfg,
        Arc::new(SystemClock),
        directory,
        Arc::new(WorklistEntryStore::new(&cfg)),
        Arc::new(CallRecordStore::new(&cfg)),
    );

    let state = AppState {
        service: Arc::new(service),
        access: Arc::new(PermissiveAccess),
    };

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, api_rest::router(state)).await?;

    Ok(())
}

/// Registers a handful of demo patients and logs their ids.
fn seed_demo_patients(directory: &InMemoryDirectory) -> anyhow::Result<()> {
    let demo = [
        ("Susan Everyteen", "main", "5551234567"),
        ("Thorny", "main", "5559876543"),
        ("James Hetfield", "VA", "5550001111"),
    ];

    for (name, line, phone) in demo {
        let patient = Patient {
            id: uuid::Uuid::new_v4(),
            name: NonEmptyText::new(name)?,
            line: Line::new(line)?,
            primary_phone: Some(phone.into()),
        };
        tracing::info!("demo patient {} on line '{}': {}", name, line, patient.id);
        directory.register(patient);
    }

    Ok(())
}
