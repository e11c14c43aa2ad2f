use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{
    handlers, middleware::metrics_middleware, preferences, queues, quests, session, signals, ws,
};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Quests
        .route("/quests", get(quests::list_quests))
        .route("/quests/refresh", post(quests::refresh_quests))
        .route("/quests/enroll-all", post(quests::enroll_all))
        .route("/quests/{id}/enroll", post(quests::enroll))
        .route("/quests/{id}/start", post(quests::start_quest))
        // Session
        .route("/session", get(session::get_status))
        .route("/session/stop", post(session::stop))
        // Preferences
        .route(
            "/preferences",
            get(preferences::get_preferences).put(preferences::update_preferences),
        )
        // Queues ("video" or "play")
        .route(
            "/queues/{kind}",
            get(queues::get_queue)
                .post(queues::add_to_queue)
                .delete(queues::clear_queue),
        )
        .route("/queues/{kind}/start", post(queues::start_queue))
        // Executor bridge webhook
        .route("/executor/signals", post(signals::receive_signal))
        // Live events
        .route("/ws", get(ws::ws_handler))
        .layer(middleware::from_fn(metrics_middleware));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
