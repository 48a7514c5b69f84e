use axum::{
    Router,
    routing::{get, post},
};
use roster_service::{
    api::{handler::solve, state::RosterAppState},
    config::ServiceConfig,
    domain::service::SolveService,
};
use std::{env, net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(solve::solve_schedule),
    tags(
        (name = "Schedules", description = "Hour-granular shift schedule solving"),
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    let _guard = shared::telemetry::init_telemetry("roster-service");

    let port = env::var("SERVER_PORT").unwrap_or_else(|_| "8080".to_string());
    let config_path = env::var("ROSTER_CONFIG_PATH").unwrap_or_else(|_| "roster.toml".to_string());
    let config = match ServiceConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(%config_path, "Falling back to default config: {e}");
            ServiceConfig::default()
        }
    };

    let solve_service = Arc::new(SolveService::new(config));
    let state = Arc::new(RosterAppState {
        solve_service: Arc::clone(&solve_service),
    });

    let governor_conf = GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(10)
        .key_extractor(SmartIpKeyExtractor)
        .use_headers()
        .finish()
        .expect("Failed to build governor config");

    let app = Router::new()
        .route(
            "/health",
            get(|| async {
                axum::Json(shared::responses::HealthResponse {
                    message: "roster-service is up and solving",
                })
            }),
        )
        .route("/api/v1/schedules/solve", post(solve::solve_schedule))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Rate limiting (per-IP, 2 req/s with burst of 10)
        .layer(GovernorLayer::new(governor_conf))
        // tracing log (turn request into info level)
        .layer(
            TraceLayer::new_for_http()
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(tower_http::LatencyUnit::Millis),
                ),
        )
        .with_state(state);

    tracing::info!("roster-service listening on 0.0.0.0:{port}");

    let listener = TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("Failed to bind");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shared::shutdown::shutdown_signal())
    .await
    .expect("Server crashed");

    // Server stopped accepting new requests; wait for in-flight solves.
    let task_tracker = solve_service.task_tracker();
    task_tracker.close();
    tracing::info!("Waiting for in-flight solves to finish...");
    if tokio::time::timeout(
        shared::shutdown::DEFAULT_SHUTDOWN_TIMEOUT,
        task_tracker.wait(),
    )
    .await
    .is_err()
    {
        tracing::warn!("Shutdown timeout reached, some solves may not have finished");
    }
    tracing::info!("roster-service shut down");
}
