//! Application startup and lifecycle management.

use crate::config::ClubConfig;
use crate::handlers::{health, mappings, receipts, roles, transactions};
use crate::services::metrics::{http_metrics_middleware, init_metrics};
use crate::services::{
    ClubStore, Database, ElectionLedger, IdentityProvider, ImportReconciler, KeycloakClient,
    MappingService, ReceiptService, ReferenceResolver, RoleService, TransactionService,
};
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::security_headers::security_headers_middleware;
use service_core::middleware::tracing::request_id_middleware;
use service_core::retry::RetryConfig;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service_name: String,
    pub service_version: String,
    pub store: Arc<dyn ClubStore>,
    pub receipts: ReceiptService,
    pub mappings: MappingService,
    pub transactions: TransactionService,
    pub importer: ImportReconciler,
    pub roles: RoleService,
}

impl AppState {
    /// Wire every service over one store.
    pub fn new<S: ClubStore + 'static>(
        store: Arc<S>,
        identity: Arc<dyn IdentityProvider>,
        holder_commit_retries: u32,
    ) -> Self {
        let resolver = ReferenceResolver::new(store.clone());
        let receipts = ReceiptService::new(store.clone(), store.clone());
        let ledger = ElectionLedger::new(store.clone());

        Self {
            service_name: "club-service".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            mappings: MappingService::new(store.clone(), resolver.clone()),
            transactions: TransactionService::new(
                store.clone(),
                resolver.clone(),
                receipts.clone(),
            ),
            importer: ImportReconciler::new(
                store.clone(),
                store.clone(),
                resolver,
                receipts.clone(),
            ),
            roles: RoleService::new(
                store.clone(),
                store.clone(),
                ledger,
                identity,
                RetryConfig::with_max_retries(holder_commit_retries),
            ),
            receipts,
            store,
        }
    }

    pub fn with_service_info(mut self, name: &str, version: &str) -> Self {
        self.service_name = name.to_string();
        self.service_version = version.to_string();
        self
    }
}

/// Full HTTP surface with middleware applied.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/transactions",
            get(transactions::list_transactions).post(transactions::create_transaction),
        )
        .route("/transactions/imports", post(transactions::import_transactions))
        .route(
            "/transactions/:id",
            get(transactions::get_transaction).delete(transactions::delete_transaction),
        )
        .route(
            "/receipts",
            get(receipts::list_receipts).post(receipts::create_receipt),
        )
        .route(
            "/receipts/:id",
            get(receipts::get_receipt)
                .put(receipts::update_receipt)
                .delete(receipts::delete_receipt),
        )
        .route(
            "/mappings",
            get(mappings::list_mappings).post(mappings::create_mapping),
        )
        .route(
            "/mappings/:id",
            get(mappings::get_mapping)
                .put(mappings::update_mapping)
                .delete(mappings::delete_mapping),
        )
        .route("/roles", get(roles::list_roles).post(roles::create_role))
        .route("/roles/:id", get(roles::get_role).delete(roles::delete_role))
        .route("/roles/:id/permissions", post(roles::add_permission))
        .route(
            "/roles/:id/permissions/:permission",
            delete(roles::remove_permission),
        )
        .route(
            "/roles/:id/holder",
            put(roles::set_holder).delete(roles::remove_holder),
        )
        .route("/roles/:id/elections", get(roles::list_elections));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics_endpoint))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(http_metrics_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: ClubConfig) -> Result<Self, AppError> {
        Self::build_internal(config, true).await
    }

    /// Build the application without running migrations.
    pub async fn build_without_migrations(config: ClubConfig) -> Result<Self, AppError> {
        Self::build_internal(config, false).await
    }

    async fn build_internal(config: ClubConfig, run_migrations: bool) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        if run_migrations {
            db.run_migrations().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to run migrations");
                e
            })?;
        }

        let identity = KeycloakClient::new(&config.identity).map_err(|e| {
            tracing::error!(error = %e, "Failed to create identity provider client");
            AppError::ConfigError(anyhow::anyhow!("Identity provider client: {}", e))
        })?;

        let state = AppState::new(
            Arc::new(db),
            Arc::new(identity),
            config.holder_commit_retries,
        )
        .with_service_info(&config.service_name, &config.service_version);

        let addr = config.common.bind_addr();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Club service listener bound");

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        tracing::info!(
            service = "club-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, router).await.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}
