// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, analytics, health, profile, questions, simulations},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Every route except health and the leaderboard requires a bearer token.
/// * Admin routes additionally require the `admin` role.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let question_routes = Router::new()
        .route("/next", get(questions::next_question))
        .route("/answer", post(questions::submit_answer));

    let simulation_routes = Router::new()
        .route(
            "/",
            get(simulations::list_simulations).post(simulations::create_simulation),
        )
        .route("/{id}", get(simulations::get_simulation))
        .route("/{id}/finish", post(simulations::finish_simulation))
        .route("/{id}/analytics", get(simulations::simulation_analytics));

    let protected = Router::new()
        .nest("/questions", question_routes)
        .nest("/simulations", simulation_routes)
        .route("/analytics", get(analytics::get_analytics))
        .route("/review/wrong-questions", get(analytics::wrong_questions))
        .route("/profile/me", get(profile::get_me))
        .layer(auth.clone());

    // Auth runs first, then the role check.
    let admin_routes = Router::new()
        .route("/questions/import", post(admin::import_questions))
        .layer(middleware::from_fn(admin_middleware))
        .layer(auth);

    let api = Router::new()
        .route("/health", get(health::health_check))
        .route("/leaderboard", get(profile::get_leaderboard))
        .nest("/admin", admin_routes)
        .merge(protected);

    Router::new()
        .nest("/api", api)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
