use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Authentication and authorization core.
pub mod auth;
pub mod credentials;
pub mod permissions;

// Stores and the storage boundary beneath them.
pub mod memory;
pub mod posts;
pub mod repository;
pub mod users;

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;

// Routing segregated by access level (Public, Authenticated).
pub mod routes;
use auth::AuthUser;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use credentials::CredentialService;
pub use error::{AppError, AppResult};
pub use memory::InMemoryRepository;
pub use posts::PostStore;
pub use repository::{PostgresRepository, RepositoryState};
pub use users::UserStore;

/// ApiDoc
///
/// Aggregates the `#[utoipa::path]` handlers and `ToSchema` models into the
/// OpenAPI document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_posts, handlers::create_post, handlers::get_post,
        handlers::update_post, handlers::delete_post, handlers::register_user,
        handlers::register_org, handlers::login, handlers::get_me,
        handlers::change_password, handlers::list_posts_by_owner,
        handlers::get_profile, handlers::update_my_profile
    ),
    components(
        schemas(
            models::Post, models::NewPost, models::PostUpdate, models::CreatePostRequest,
            models::UpdatePostRequest, models::User, models::UserPublic, models::Profile,
            models::NewUser, models::RegisterUserRequest, models::LoginRequest,
            models::PasswordChange, models::ProfileUpdate, models::UpdateProfileRequest,
        )
    ),
    tags(
        (name = "volunteer-hub", description = "Organisation posts and accounts API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, cloneable container of the services shared by every request.
/// Handlers reach the stores through it; the raw repository is not exposed, so
/// every post mutation goes through the Post Store and its permission gate.
#[derive(Clone)]
pub struct AppState {
    pub users: UserStore,
    pub posts: PostStore,
    pub config: AppConfig,
}

impl AppState {
    /// Wires both stores over `repo`, building the credential service from the
    /// configured work factors.
    pub fn new(repo: RepositoryState, config: AppConfig) -> AppResult<Self> {
        let credentials = CredentialService::new(config.hashing)?;
        Ok(Self {
            users: UserStore::new(repo.clone(), credentials),
            posts: PostStore::new(repo, config.posts_max_page_size),
            config,
        })
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for UserStore {
    fn from_ref(app_state: &AppState) -> UserStore {
        app_state.users.clone()
    }
}

impl FromRef<AppState> for PostStore {
    fn from_ref(app_state: &AppState) -> PostStore {
        app_state.posts.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Enforces authentication for `authenticated_routes`. Extracting `AuthUser`
/// rejects the request with 401 before the handler runs.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies global and scoped middleware, and
/// registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 1. Route Assembly
    // Docs and public routes are open. The authenticated group is wrapped with
    // `route_layer`, so the auth check only runs for routes that matched and an
    // unknown path is still 404 rather than 401.
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .with_state(state);

    // 2. Global Middleware
    // Layers wrap outside-in: request id first, then the trace span that reads it,
    // then the id is copied onto the response. CORS wraps everything.
    base_router
        .layer(
            ServiceBuilder::new()
                // Every request gets an x-request-id before it is traced.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for `TraceLayer` carrying method, URI and the request id, so every log
/// line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
