use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Every route here sits behind the `auth_middleware` layer, so handlers always
/// receive a resolved `AuthUser`. Role and ownership checks happen in the
/// handlers through the permission gate.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /posts/
        // Organisation accounts only.
        .route("/posts/", post(handlers::create_post))
        // PUT/DELETE /posts/{id}/
        // Owner only. The ownership check precedes the mutation.
        .route(
            "/posts/{id}/",
            put(handlers::update_post).delete(handlers::delete_post),
        )
        // GET /users/me/
        .route("/users/me/", get(handlers::get_me))
        // PUT /users/me/password/
        // Requires the current password.
        .route("/users/me/password/", put(handlers::change_password))
        // PUT /profiles/me/
        // The actor's own profile; there is no path to anyone else's.
        .route("/profiles/me/", put(handlers::update_my_profile))
}
