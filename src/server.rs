//! # Server Configuration
//!
//! Router assembly and server startup for the Calendar API.

use std::sync::Arc;

use axum::{
    Router,
    extract::{FromRef, Request},
    middleware::Next,
    response::Response,
    routing::{delete, get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use crate::auth::auth_middleware;
use crate::config::AppConfig;
use crate::handlers;
use crate::providers::ProviderRegistry;
use crate::service::CalendarConnectionService;
use crate::telemetry::{TraceContext, with_trace_context};

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub service: Arc<CalendarConnectionService>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, db: DatabaseConnection) -> Self {
        let registry = ProviderRegistry::from_config(&config);
        let service = Arc::new(CalendarConnectionService::new(
            Arc::clone(&config),
            Arc::new(db.clone()),
            registry,
        ));
        Self {
            config,
            db,
            service,
        }
    }
}

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        Arc::clone(&app_state.config)
    }
}

/// Attaches a fresh trace context to the request and scopes the handler
/// future to it, so error responses can carry the trace ID.
pub async fn trace_context_middleware(mut request: Request, next: Next) -> Response {
    let context = TraceContext {
        trace_id: format!("trace-{}", Uuid::new_v4()),
    };
    request.extensions_mut().insert(context.clone());

    with_trace_context(context, next.run(request)).await
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/calendar/connections", get(handlers::connections::list_connections))
        .route("/calendar/connect", post(handlers::connect::connect))
        .route("/calendar/callback", post(handlers::connect::callback))
        .route(
            "/calendar/connections/{id}",
            delete(handlers::connections::disconnect),
        )
        .route(
            "/calendar/connections/{id}/calendars",
            get(handlers::connections::list_calendars),
        )
        .route("/calendar/events", post(handlers::events::list_events))
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state.config),
            auth_middleware,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .merge(protected)
        .layer(axum::middleware::from_fn(trace_context_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
}

/// Starts the server with the given configuration
pub async fn run_server(
    config: AppConfig,
    db: DatabaseConnection,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;
    let profile = config.profile.clone();

    let state = AppState::new(Arc::new(config), db);
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, %profile, "Calendar API listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::health,
        crate::handlers::connect::connect,
        crate::handlers::connect::callback,
        crate::handlers::connections::list_connections,
        crate::handlers::connections::disconnect,
        crate::handlers::connections::list_calendars,
        crate::handlers::events::list_events,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::handlers::HealthResponse,
            crate::models::calendar_connection::ConnectionInfo,
            crate::handlers::connect::ConnectRequest,
            crate::handlers::connect::CallbackRequest,
            crate::handlers::connections::ConnectionsResponse,
            crate::handlers::connections::DisconnectResponse,
            crate::handlers::connections::CalendarsResponse,
            crate::handlers::events::ListEventsRequest,
            crate::handlers::events::EventsResponse,
            crate::service::OAuthUrlGrant,
            crate::providers::CalendarInfo,
            crate::providers::CalendarEvent,
            crate::providers::AccessRole,
            crate::providers::EventStatus,
            crate::providers::Attendee,
            crate::providers::ResponseStatus,
            crate::error::ApiError,
        )
    ),
    info(
        title = "Calendar API",
        description = "API for connecting calendar accounts and reading their data",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
