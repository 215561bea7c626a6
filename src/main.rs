use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use neighborhood_ranker::config::{LoggingSettings, Settings};
use neighborhood_ranker::routes::{self, AppState};
use neighborhood_ranker::services::{
    Aggregator, AmenitySource, AqiSource, CacheManager, DeliveryCoverageSource, GrocerySource,
    MetricSource, PlacesClient, PostgresMetricsStore, RecommendationService, RentSource,
    RestaurantSource, ServiceOptions, TokenService, TransportSource,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    match logging.format.as_str() {
        "pretty" => subscriber.pretty().init(),
        "json" => subscriber.json().init(),
        _ => subscriber.init(),
    }
}

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    error!("{}: {}", context, err);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    init_logging(&settings.logging);

    info!("Starting neighborhood ranker...");

    // Initialize PostgreSQL metrics store
    let store = Arc::new(
        PostgresMetricsStore::from_settings(
            &settings.database.url,
            settings.database.max_connections,
            settings.database.min_connections,
            settings.database.acquire_timeout_secs,
            settings.database.idle_timeout_secs,
        )
        .await
        .map_err(|e| startup_error("Failed to connect to PostgreSQL", e))?,
    );

    info!("PostgreSQL metrics store initialized");

    // Initialize snapshot cache (Redis optional)
    let cache_ttl = settings.cache.ttl_secs.unwrap_or(300);
    let l1_cache_size = settings.cache.l1_cache_size.unwrap_or(1000);
    let cache = Arc::new(
        CacheManager::connect_or_in_memory(settings.cache.redis_url.as_deref(), l1_cache_size, cache_ttl)
            .await,
    );

    info!("Snapshot cache initialized (L1: {} entries, TTL: {}s)", l1_cache_size, cache_ttl);

    // Metric sources
    let sources_cfg = &settings.sources;
    let request_timeout = Duration::from_secs(sources_cfg.request_timeout_secs);

    let mut sources: Vec<Arc<dyn MetricSource>> = vec![
        Arc::new(RentSource::new(store.pool())),
        Arc::new(GrocerySource::new(store.pool())),
        Arc::new(TransportSource::new(store.pool(), sources_cfg.trips_per_month)),
        Arc::new(
            AqiSource::new(
                sources_cfg.waqi_base_url.clone(),
                sources_cfg.waqi_token.clone(),
                request_timeout,
            )
            .map_err(|e| startup_error("Failed to create AQI client", e))?,
        ),
        Arc::new(DeliveryCoverageSource::new(
            sources_cfg.delivery.blinkit.clone(),
            sources_cfg.delivery.zomato.clone(),
            sources_cfg.delivery.swiggy.clone(),
        )),
    ];

    match &sources_cfg.places_api_key {
        Some(key) if !key.trim().is_empty() => {
            let places = PlacesClient::new(
                sources_cfg.places_base_url.clone(),
                key.clone(),
                sources_cfg.places_radius_m,
                request_timeout,
            )
            .map_err(|e| startup_error("Failed to create Places client", e))?;
            sources.push(Arc::new(RestaurantSource::new(places.clone())));
            sources.push(Arc::new(AmenitySource::new(places)));
        }
        _ => warn!("No Places API key configured, restaurant and amenity metrics disabled"),
    }

    info!("{} metric sources configured", sources.len());

    let aggregator = Aggregator::new(
        store.clone(),
        sources,
        sources_cfg.max_concurrency,
        Duration::from_secs(sources_cfg.source_timeout_secs),
    );

    // Initialize recommendation service with configured weights
    let default_weights = settings
        .ranking
        .weights
        .to_weight_vector()
        .map_err(|e| startup_error("Invalid default weights", e))?;

    info!("Default weights: {:?}", default_weights);

    let service = RecommendationService::new(
        store,
        cache,
        aggregator,
        ServiceOptions {
            max_top_n: settings.ranking.max_top_n,
            default_weights,
            on_demand_deadline: Duration::from_secs(sources_cfg.on_demand_deadline_secs),
        },
    );

    if settings.auth.require_token && settings.auth.uses_default_secret() {
        warn!("Bearer tokens are required but auth.jwt_secret is the default placeholder; set JWT_SECRET_KEY");
    }

    let tokens = Arc::new(TokenService::new(
        &settings.auth.jwt_secret,
        chrono::Duration::minutes(settings.auth.access_token_ttl_minutes),
    ));

    // Build application state
    let app_state = AppState {
        service,
        tokens,
        require_token: settings.auth.require_token,
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(routes::handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(routes::handle_query_payload_error))
            .app_data(web::PathConfig::default().error_handler(routes::handle_path_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
