use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that need no actor: health, post and profile reads, and the
/// account flows (registration and login).
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /posts/?offset=0&limit=3
        // Lists posts, most recent first.
        .route("/posts/", get(handlers::list_posts))
        // GET /posts/{id}/
        .route("/posts/{id}/", get(handlers::get_post))
        // GET /users/{id}/posts/
        // Posts published by one organisation, most recent first.
        .route("/users/{id}/posts/", get(handlers::list_posts_by_owner))
        // GET /profiles/{id}/
        // Profile of the user with this id.
        .route("/profiles/{id}/", get(handlers::get_profile))
        // POST /users/
        // Registers a regular account with an empty profile.
        .route("/users/", post(handlers::register_user))
        // POST /users/orgs/
        // Registers an organisation account with an empty profile.
        .route("/users/orgs/", post(handlers::register_org))
        // POST /users/login/
        // Email + password check; 401 for unknown email and wrong password alike.
        .route("/users/login/", post(handlers::login))
}
