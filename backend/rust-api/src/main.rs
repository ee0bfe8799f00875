use std::net::SocketAddr;
use std::sync::Arc;
use survey_api::{config::Config, create_router, services::AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Exported only when an OTLP endpoint is configured
    let tracer = init_telemetry();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "survey_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer)))
        .init();

    tracing::info!("Starting survey API");

    let config = Config::load().expect("Failed to load configuration");
    tracing::info!("Configuration loaded for environment: {}", config.app_env);

    // The driver connects lazily; an unreachable server shows up in /health
    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .expect("Invalid MongoDB connection string");

    let redis_client =
        redis::Client::open(config.redis_uri.clone()).expect("Failed to create Redis client");

    let bind_addr = config.bind_addr.clone();
    let app_state = Arc::new(
        AppState::new(config, mongo_client, redis_client)
            .expect("Failed to initialize application state"),
    );

    let index_db = app_state.mongo.clone();
    tokio::spawn(async move {
        match survey_api::services::ensure_indexes(&index_db).await {
            Ok(()) => tracing::info!("MongoDB indexes ensured"),
            Err(e) => tracing::warn!("Failed to ensure MongoDB indexes: {:#}", e),
        }
    });

    let app = create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind {}: {}", bind_addr, e));

    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Server listening on {}", addr);
    }

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");

    tracing::info!("Server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}

fn init_telemetry() -> Option<opentelemetry_sdk::trace::Tracer> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::SdkTracerProvider;
    use opentelemetry_sdk::Resource;

    let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;

    let exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(otlp_endpoint)
        .build()
    {
        Ok(exporter) => exporter,
        Err(e) => {
            eprintln!("OTLP exporter disabled: {}", e);
            return None;
        }
    };

    let resource = Resource::builder_empty()
        .with_service_name("survey-api")
        .with_attributes(vec![KeyValue::new(
            "service.version",
            env!("CARGO_PKG_VERSION"),
        )])
        .build();

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build();

    let tracer = provider.tracer("survey-api");
    opentelemetry::global::set_tracer_provider(provider);

    Some(tracer)
}
