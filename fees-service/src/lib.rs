pub mod config;
pub mod dtos;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod services;

use admin_core::middleware::tracing::{request_id, request_id_middleware};
use axum::middleware::from_fn;
use axum::{
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use config::Config;
use ledger::FeeLedger;
use services::PgLedgerStore;

#[derive(Clone)]
pub struct AppState {
    pub engine: FeeLedger,
}

/// Build the HTTP surface. The payment-reversal route exists only when
/// explicitly enabled.
pub fn router(state: AppState, enable_payment_delete: bool) -> Router {
    let mut payment_item =
        get(handlers::payments::get_payment).patch(handlers::payments::edit_payment);
    if enable_payment_delete {
        payment_item = payment_item.delete(handlers::payments::delete_payment);
    }

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .route("/students", post(handlers::students::create_student))
        .route("/students/:user_id", get(handlers::students::get_student))
        .route(
            "/students/:user_id/payments",
            get(handlers::students::list_payments),
        )
        .route("/payments", post(handlers::payments::create_payment))
        .route("/payments/:id", payment_item)
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    request_id = %request_id(request.headers()),
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
        let store = PgLedgerStore::connect(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;

        store.run_migrations().await?;
        services::metrics::init_metrics();

        let engine = FeeLedger::new(Arc::new(store));
        let state = AppState { engine };

        if config.enable_payment_delete {
            tracing::warn!("Payment deletion route is enabled");
        }

        let router = router(state, config.enable_payment_delete);

        Ok(Self {
            port: config.server.port,
            router,
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
