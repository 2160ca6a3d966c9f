use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    models::{
        CreatePostRequest, LoginRequest, PasswordChange, Post, Profile, RegisterUserRequest,
        UpdatePostRequest, UpdateProfileRequest, UserPublic,
    },
    permissions,
};
use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use uuid::Uuid;

// --- Query Structs ---

/// ListPostsParams
///
/// Pagination for the post listings. Both parameters are optional; negative
/// values are rejected by deserialization.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListPostsParams {
    /// Number of posts to skip (default 0).
    pub offset: Option<u32>,
    /// Maximum number of posts to return (default 3, capped by configuration).
    pub limit: Option<u32>,
}

// --- Post Handlers ---

/// list_posts
///
/// [Public Route] Lists posts, most recent first.
#[utoipa::path(
    get,
    path = "/posts/",
    params(ListPostsParams),
    responses(
        (status = 200, description = "Posts, newest first", body = [Post]),
        (status = 400, description = "Malformed pagination")
    )
)]
pub async fn list_posts(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListPostsParams>,
) -> AppResult<Json<Vec<Post>>> {
    let posts = state
        .posts
        .list_posts_by_created_at(params.offset, params.limit)
        .await?;
    Ok(Json(posts))
}

/// list_posts_by_owner
///
/// [Public Route] The posts published by one organisation, most recent first.
/// Backs the organisation's "created opportunities" view.
#[utoipa::path(
    get,
    path = "/users/{id}/posts/",
    params(("id" = Uuid, Path, description = "Owner (organisation) ID"), ListPostsParams),
    responses((status = 200, description = "Posts of this owner, newest first", body = [Post]))
)]
pub async fn list_posts_by_owner(
    State(state): State<AppState>,
    ApiPath(owner_id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<ListPostsParams>,
) -> AppResult<Json<Vec<Post>>> {
    let posts = state
        .posts
        .list_posts_by_owner(owner_id, params.offset, params.limit)
        .await?;
    Ok(Json(posts))
}

/// create_post
///
/// [Authenticated Route] Publishes a new post owned by the requesting organisation.
/// Regular users receive 403.
#[utoipa::path(
    post,
    path = "/posts/",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Created", body = Post),
        (status = 403, description = "Not an organisation"),
        (status = 422, description = "Invalid post")
    )
)]
pub async fn create_post(
    actor: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreatePostRequest>,
) -> AppResult<(StatusCode, Json<Post>)> {
    // The role check happens inside the store, before anything is written.
    let post = state.posts.create_post(payload.new_post, &actor).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// get_post
///
/// [Public Route] Retrieves a single post.
#[utoipa::path(
    get,
    path = "/posts/{id}/",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = Post),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_post(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Post>> {
    Ok(Json(state.posts.get_post_by_id(id).await?))
}

/// update_post
///
/// [Authenticated Route] Partially updates a post. The ownership check runs
/// first and its `AuthorizedPost` is what the store's update accepts.
#[utoipa::path(
    put,
    path = "/posts/{id}/",
    params(("id" = Uuid, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated", body = Post),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found"),
        (status = 422, description = "Empty or invalid update")
    )
)]
pub async fn update_post(
    actor: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdatePostRequest>,
) -> AppResult<Json<Post>> {
    // 1. Load the target. A missing post is 404 before any ownership question.
    let post = state.posts.get_post_by_id(id).await?;

    // 2. Ownership gate. A non-owner stops here with 403 and nothing is written.
    let authorized = permissions::validate_post_modification_permissions(post, &actor)?;

    // 3. Apply the supplied fields.
    let updated = state
        .posts
        .update_post_by_id(authorized, payload.post_update)
        .await?;
    Ok(Json(updated))
}

/// delete_post
///
/// [Authenticated Route] Deletes a post owned by the requesting organisation and
/// returns the deleted id.
#[utoipa::path(
    delete,
    path = "/posts/{id}/",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Deleted post id", body = String),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_post(
    actor: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Uuid>> {
    // Same order as update: load, gate, then mutate.
    let post = state.posts.get_post_by_id(id).await?;
    let authorized = permissions::validate_post_modification_permissions(post, &actor)?;
    Ok(Json(state.posts.delete_post(authorized).await?))
}

// --- User Handlers ---

/// register_user
///
/// [Public Route] Registers a regular account. Duplicate emails receive 400.
#[utoipa::path(
    post,
    path = "/users/",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Registered", body = UserPublic),
        (status = 400, description = "Email taken"),
        (status = 422, description = "Invalid email or password")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterUserRequest>,
) -> AppResult<(StatusCode, Json<UserPublic>)> {
    let user = state.users.create_user(payload.new_user).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// register_org
///
/// [Public Route] Registers an organisation account.
#[utoipa::path(
    post,
    path = "/users/orgs/",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Registered", body = UserPublic),
        (status = 400, description = "Email taken"),
        (status = 422, description = "Invalid email or password")
    )
)]
pub async fn register_org(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterUserRequest>,
) -> AppResult<(StatusCode, Json<UserPublic>)> {
    let org = state.users.create_org(payload.new_user).await?;
    Ok((StatusCode::CREATED, Json(org)))
}

/// login
///
/// [Public Route] Checks an email/password pair. Unknown email and wrong
/// password produce the same 401.
#[utoipa::path(
    post,
    path = "/users/login/",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = UserPublic),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<Json<UserPublic>> {
    // 1. Verify. `None` covers both the unknown email and the wrong password.
    let user = state
        .users
        .authenticate_user(&payload.email, &payload.password)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    // 2. Respond with the public projection; credentials never leave the store.
    Ok(Json(state.users.populate_user(user).await?))
}

/// get_me
///
/// [Authenticated Route] The requesting user with their profile.
#[utoipa::path(
    get,
    path = "/users/me/",
    responses(
        (status = 200, description = "Current user", body = UserPublic),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn get_me(actor: AuthUser, State(state): State<AppState>) -> AppResult<Json<UserPublic>> {
    let user = state
        .users
        .get_user_by_id(actor.id)
        .await?
        .ok_or(AppError::Unauthenticated)?;
    Ok(Json(state.users.populate_user(user).await?))
}

/// change_password
///
/// [Authenticated Route] Replaces the requesting user's password after
/// re-checking the current one. Responds 204 with no body.
#[utoipa::path(
    put,
    path = "/users/me/password/",
    request_body = PasswordChange,
    responses(
        (status = 204, description = "Password changed"),
        (status = 403, description = "Current password is incorrect"),
        (status = 422, description = "New password is invalid")
    )
)]
pub async fn change_password(
    actor: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<PasswordChange>,
) -> AppResult<StatusCode> {
    state.users.change_password(&actor, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Profile Handlers ---

/// get_profile
///
/// [Public Route] The profile belonging to the user with this id.
#[utoipa::path(
    get,
    path = "/profiles/{id}/",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = Profile),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_profile(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> AppResult<Json<Profile>> {
    Ok(Json(state.users.get_profile_by_user_id(user_id).await?))
}

/// update_my_profile
///
/// [Authenticated Route] Partially updates the requesting user's own profile.
/// The target is always the actor, so there is no way to address someone
/// else's profile.
#[utoipa::path(
    put,
    path = "/profiles/me/",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated", body = Profile),
        (status = 422, description = "Empty or invalid update")
    )
)]
pub async fn update_my_profile(
    actor: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> AppResult<Json<Profile>> {
    let profile = state
        .users
        .update_profile(actor.id, payload.profile_update)
        .await?;
    Ok(Json(profile))
}
