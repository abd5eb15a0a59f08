pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;

use axum::middleware::from_fn;
use axum::{
    routing::{get, post},
    Router,
};
use mongodb::{options::ClientOptions, Client};
use secrecy::ExposeSecret;
use service_core::middleware::{request_id_middleware, security_headers_middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use config::Config;
use services::{
    CatalogRepository, CheckoutService, OrderRepository, OrderStore, PaytrClient, ProductCatalog,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn OrderStore>,
    pub paytr: PaytrClient,
    pub checkout: CheckoutService,
}

impl AppState {
    /// Wire the application state from its collaborators. Tests inject
    /// in-memory store/catalog implementations here; production wiring in
    /// [`Application::build`] binds MongoDB-backed ones.
    pub fn new(
        config: Config,
        store: Arc<dyn OrderStore>,
        catalog: Arc<dyn ProductCatalog>,
    ) -> Self {
        let paytr = PaytrClient::new(config.paytr.clone());
        let checkout = CheckoutService::new(store.clone(), catalog, paytr.clone());
        Self {
            config,
            store,
            paytr,
            checkout,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        // Storefront-facing payment API
        .route("/payment/create", post(handlers::payment::create_payment))
        .route("/payment/status", get(handlers::payment::payment_status))
        .route("/payment/success", get(handlers::payment::payment_success))
        .route("/payment/failure", get(handlers::payment::payment_failure))
        // Gateway server-to-server notification
        .route("/webhooks/paytr", post(handlers::payment::paytr_callback))
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .with_state(state)
}

pub struct Application {
    port: u16,
    router: Router,
}

impl Application {
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let mut client_options = ClientOptions::parse(config.database.url.expose_secret()).await?;
        client_options.app_name = Some("payment-service".to_string());

        let client = Client::with_options(client_options)?;
        let db = client.database(&config.database.db_name);

        let repository = OrderRepository::new(&db);
        repository.init_indexes().await?;

        let catalog = CatalogRepository::new(&db);

        services::init_metrics();

        let state = AppState::new(config.clone(), Arc::new(repository), Arc::new(catalog));

        if state.paytr.is_configured() {
            tracing::info!("PayTR client initialized");
        } else {
            tracing::warn!(
                "PayTR credentials not configured - payment creation will be refused"
            );
        }

        Ok(Self {
            port: config.server.port,
            router: router(state),
        })
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        tracing::info!("Listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router).await?;

        Ok(())
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}
