use oasis::{
    event::Hub,
    housekeeping::{
        HousekeepingRepository, HousekeepingService, InMemoryHousekeepingRepository,
        PostgresHousekeepingRepository,
    },
    settlement::{
        ChargeSource, InMemoryHotelStore, PostgresChargeLedger, PostgresGuestDirectory,
        PostgresSettlementUnitOfWork, SettlementEngine,
    },
    AppConfig, AppState,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEMO_ROOMS: [&str; 4] = ["101", "102", "201", "202"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oasis=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Oasis back-office server");

    let config = AppConfig::from_env();
    let (hub, hub_task) = Hub::spawn(config.hub.clone());

    let (housekeeping_service, settlement_engine) = match &config.database_url {
        Some(database_url) => {
            let pool = sqlx::PgPool::connect(database_url).await?;
            info!("Connected to PostgreSQL");

            let repository: Arc<dyn HousekeepingRepository> =
                Arc::new(PostgresHousekeepingRepository::new(pool.clone()));
            let housekeeping = Arc::new(HousekeepingService::new(repository, hub.clone()));
            let engine = SettlementEngine::new(
                Arc::new(PostgresGuestDirectory::new(pool.clone())),
                Arc::new(PostgresChargeLedger::new(pool.clone(), ChargeSource::Laundry)),
                Arc::new(PostgresChargeLedger::new(pool.clone(), ChargeSource::Restaurant)),
                Arc::new(PostgresSettlementUnitOfWork::new(pool)),
            );
            (housekeeping, engine)
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory stores with demo rooms");

            let repository: Arc<dyn HousekeepingRepository> =
                Arc::new(InMemoryHousekeepingRepository::with_rooms(DEMO_ROOMS));
            let housekeeping = Arc::new(HousekeepingService::new(repository, hub.clone()));
            let store = Arc::new(InMemoryHotelStore::new());
            let engine = SettlementEngine::new(
                store.clone(),
                InMemoryHotelStore::charge_ledger(&store, ChargeSource::Laundry),
                InMemoryHotelStore::charge_ledger(&store, ChargeSource::Restaurant),
                store,
            );
            (housekeeping, engine)
        }
    };

    let settlement_engine = settlement_engine
        .with_payment_method(config.payment_method.clone())
        .with_housekeeping(housekeeping_service.clone());

    let app_state = AppState::new(
        hub,
        housekeeping_service,
        Arc::new(settlement_engine),
        config.token.clone(),
        config.session.clone(),
    );
    let app = oasis::build_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(bind_addr = %config.bind_addr, "Server listening");
    axum::serve(listener, app).await?;

    hub_task.abort();
    Ok(())
}
