use crate::handlers::{
    aggregates::{get_daily_aggregate, get_monthly_aggregate},
    audit::get_audit_events,
    entries::{create_entry, delete_entry, update_entry},
    health::health_check,
    sessions::{close_session, get_today_session, open_session},
    sweeps::run_sweep,
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    routing::{get, post, put},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        // Health check
        .route("/health", get(health_check))
        // Cash session lifecycle
        .route("/api/v1/cash-sessions/open", post(open_session))
        .route("/api/v1/cash-sessions/close", post(close_session))
        .route("/api/v1/cash-sessions/today", get(get_today_session))
        // Ledger entries
        .route("/api/v1/ledger-entries", post(create_entry))
        .route("/api/v1/ledger-entries/:entry_id", put(update_entry).delete(delete_entry))
        // Aggregates
        .route("/api/v1/aggregates/daily", get(get_daily_aggregate))
        .route("/api/v1/aggregates/monthly", get(get_monthly_aggregate))
        // Auto-heal and audit trail
        .route("/api/v1/sweeps", post(run_sweep))
        .route("/api/v1/audit-events", get(get_audit_events))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // The global metrics recorder can only be installed once per process
    #[cfg(not(test))]
    let router = {
        let (prometheus_layer, metric_handle) = axum_prometheus::PrometheusMetricLayer::pair();
        router
            .route("/metrics", get(move || async move { metric_handle.render() }))
            .layer(prometheus_layer)
    };

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
