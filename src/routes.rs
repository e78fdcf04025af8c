// routes.rs
use axum::{
    routing::{get, post},
    Router,
};
use http::Method;
use tower_http::cors::{Any, CorsLayer};

use crate::handlers;
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    let admin = Router::new()
        .route("/login", post(handlers::login))
        .route("/create-admin", post(handlers::create_admin))
        .route(
            "/polls",
            post(handlers::create_poll).get(handlers::list_polls),
        )
        .route(
            "/polls/{id}",
            get(handlers::get_poll_admin).delete(handlers::delete_poll),
        )
        .route("/polls/{id}/activate", post(handlers::activate_poll))
        .route("/polls/{id}/deactivate", post(handlers::deactivate_poll))
        .route("/polls/{id}/archive", post(handlers::archive_poll))
        .route("/polls/{id}/unarchive", post(handlers::unarchive_poll))
        .route("/polls/{id}/reactivate", post(handlers::reactivate_poll))
        .route(
            "/polls/by-slug/{slug}/activate",
            post(handlers::activate_poll_by_slug),
        )
        .route(
            "/polls/by-slug/{slug}/deactivate",
            post(handlers::deactivate_poll_by_slug),
        )
        .route("/polls/{id}/results", get(handlers::poll_results))
        .route("/polls/{id}/results.csv", get(handlers::poll_results_csv))
        .route("/polls/{id}/winners", get(handlers::poll_winners))
        .route("/polls/{id}/leaderboard", get(handlers::poll_leaderboard))
        .route("/polls/{id}/pick-winner", post(handlers::pick_winner));

    let attendee = Router::new()
        .route("/active", get(handlers::active_polls))
        .route("/by-title", get(handlers::poll_by_title))
        .route("/by-slug/{slug}", get(handlers::poll_by_slug))
        .route("/status", get(handlers::poll_status))
        .route("/{id}", get(handlers::get_active_poll))
        .route("/{id}/submit", post(handlers::submit_votes));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS]);

    Router::new()
        .nest("/admin", admin)
        .nest("/poll", attendee)
        .layer(cors)
        .with_state(state)
}
