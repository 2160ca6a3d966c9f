use axum::{
    extract::FromRequestParts,
    http::{Request, header, request::Parts},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use uuid::Uuid;
use volunteer_hub::{
    AppConfig, AppError, AppState, InMemoryRepository,
    auth::{AuthUser, Claims},
    config::Env,
    models::{NewUser, UserPublic},
    repository::RepositoryState,
};

// --- Test Helpers ---

fn state_for(env: Env) -> AppState {
    let config = AppConfig {
        env,
        ..AppConfig::default()
    };
    let repo = Arc::new(InMemoryRepository::new()) as RepositoryState;
    AppState::new(repo, config).expect("valid test state")
}

async fn seed_org(state: &AppState) -> UserPublic {
    state
        .users
        .create_org(NewUser {
            email: "org@example.com".to_string(),
            password: "secret-pass".to_string(),
        })
        .await
        .unwrap()
}

fn now() -> usize {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as usize
}

fn token_for(sub: Uuid, secret: &str, exp: usize) -> String {
    let claims = Claims { sub, exp, iat: now() };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn parts_with(headers: &[(&str, String)]) -> Parts {
    let mut builder = Request::builder().uri("/users/me/");
    for (name, value) in headers {
        builder = builder.header(*name, value);
    }
    builder.body(()).unwrap().into_parts().0
}

async fn extract(state: &AppState, headers: &[(&str, String)]) -> Result<AuthUser, AppError> {
    let mut parts = parts_with(headers);
    AuthUser::from_request_parts(&mut parts, state).await
}

// --- Tests ---

#[tokio::test]
async fn test_valid_bearer_token_resolves_the_stored_user() {
    let state = state_for(Env::Production);
    let org = seed_org(&state).await;
    let token = token_for(org.id, &state.config.jwt_secret, now() + 3600);

    let actor = extract(&state, &[(header::AUTHORIZATION.as_str(), format!("Bearer {token}"))])
        .await
        .unwrap();

    assert_eq!(actor, AuthUser { id: org.id, is_org: true });
}

#[tokio::test]
async fn test_missing_authorization_header_is_rejected() {
    let state = state_for(Env::Production);

    let result = extract(&state, &[]).await;

    assert!(matches!(result, Err(AppError::Unauthenticated)));
}

#[tokio::test]
async fn test_token_signed_with_another_secret_is_rejected() {
    let state = state_for(Env::Production);
    let org = seed_org(&state).await;
    let token = token_for(org.id, "some-other-secret", now() + 3600);

    let result = extract(&state, &[(header::AUTHORIZATION.as_str(), format!("Bearer {token}"))]).await;

    assert!(matches!(result, Err(AppError::Unauthenticated)));
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let state = state_for(Env::Production);
    let org = seed_org(&state).await;
    // Well past the default leeway.
    let token = token_for(org.id, &state.config.jwt_secret, now() - 3600);

    let result = extract(&state, &[(header::AUTHORIZATION.as_str(), format!("Bearer {token}"))]).await;

    assert!(matches!(result, Err(AppError::Unauthenticated)));
}

#[tokio::test]
async fn test_token_for_unknown_user_is_rejected() {
    let state = state_for(Env::Production);
    let token = token_for(Uuid::new_v4(), &state.config.jwt_secret, now() + 3600);

    let result = extract(&state, &[(header::AUTHORIZATION.as_str(), format!("Bearer {token}"))]).await;

    assert!(matches!(result, Err(AppError::Unauthenticated)));
}

#[tokio::test]
async fn test_local_bypass_header_resolves_existing_user() {
    let state = state_for(Env::Local);
    let org = seed_org(&state).await;

    let actor = extract(&state, &[("x-user-id", org.id.to_string())])
        .await
        .unwrap();

    assert_eq!(actor.id, org.id);
    assert!(actor.is_org);
}

#[tokio::test]
async fn test_local_bypass_is_ignored_in_production() {
    let state = state_for(Env::Production);
    let org = seed_org(&state).await;

    let result = extract(&state, &[("x-user-id", org.id.to_string())]).await;

    assert!(matches!(result, Err(AppError::Unauthenticated)));
}

#[tokio::test]
async fn test_local_bypass_with_unknown_id_falls_through_to_bearer() {
    let state = state_for(Env::Local);

    let result = extract(&state, &[("x-user-id", Uuid::new_v4().to_string())]).await;

    assert!(matches!(result, Err(AppError::Unauthenticated)));
}
