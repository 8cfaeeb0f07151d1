pub mod config;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use mindping_api::auth::{self, AppState};
use mindping_api::messages;
use mindping_api::middleware::require_auth;
use mindping_api::users;
use mindping_gateway::connection;

/// The full HTTP + WebSocket surface over one set of shared services.
pub fn app(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/user", get(auth::current_user))
        .route("/api/users/find/{username}", get(users::find_user))
        .route("/api/users/search", get(users::search_users))
        .route("/api/messages", get(messages::get_messages))
        .route("/api/messages/{id}/seen", post(messages::mark_seen))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let ws_route = Router::new()
        .route("/ws", get(ws_upgrade))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.registry.clone(), state.db.clone())
    })
}
