//! Postgres-backed repository tests.
//!
//! These need a live database and are ignored by default. Run them with
//! `DATABASE_URL=postgres://... cargo test --test repository_integration_tests -- --ignored`.
//! An ignored run without `DATABASE_URL` fails instead of passing silently.

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;
use volunteer_hub::{
    AppError,
    models::{HashedPassword, NewPost, NewUserRow, PostUpdate, ProfileUpdate, User},
    repository::{self, PostgresRepository, Repository},
};

// --- Test Context and Setup ---

/// Holds the pool so tests can issue raw SQL next to the repository calls.
struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        repository::run_migrations(&pool)
            .await
            .expect("Failed to run database migrations.");

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

fn unique_email(tag: &str) -> String {
    format!("{tag}-{}@test.example", Uuid::new_v4())
}

fn credentials(salt: &str) -> HashedPassword {
    HashedPassword {
        salt: salt.to_string(),
        password: format!("$argon2id$v=19$m=1024,t=1,p=1${salt}$aGFzaA"),
    }
}

fn row(email: &str, is_org: bool) -> NewUserRow {
    NewUserRow {
        email: email.to_string(),
        is_org,
        credentials: credentials("c2FsdHNhbHRzYWx0"),
    }
}

async fn create(repo: &PostgresRepository, tag: &str, is_org: bool) -> User {
    repo.create_user_with_profile(row(&unique_email(tag), is_org))
        .await
        .expect("Failed to create test user")
}

fn post(title: &str) -> NewPost {
    NewPost {
        title: title.to_string(),
        description: "From the integration suite".to_string(),
    }
}

// --- User Tests ---

#[tokio::test]
#[ignore = "requires Postgres; run with `cargo test -- --ignored`"]
async fn test_create_user_writes_user_and_profile() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let user = create(&repo, "user", false).await;

    let fetched = repo.get_user_by_email(&user.email).await.unwrap().unwrap();
    assert_eq!(fetched.user, user);
    assert_eq!(fetched.credentials.salt, "c2FsdHNhbHRzYWx0");

    let profile = repo.get_profile_by_user_id(user.id).await.unwrap().unwrap();
    assert_eq!(profile.id, user.profile_id);
    assert!(profile.is_empty());
}

#[tokio::test]
#[ignore = "requires Postgres; run with `cargo test -- --ignored`"]
async fn test_duplicate_email_is_rejected_by_the_unique_index() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let email = unique_email("dup");
    repo.create_user_with_profile(row(&email, false)).await.unwrap();

    let result = repo.create_user_with_profile(row(&email, true)).await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
#[ignore = "requires Postgres; run with `cargo test -- --ignored`"]
async fn test_concurrent_same_email_registrations_leave_one_row() {
    let ctx = DbTestContext::setup().await;
    let repo = Arc::new(ctx.repository());
    let email = unique_email("race");

    // All attempts pass any application-level pre-check; only the index decides.
    let attempts: Vec<_> = (0..8)
        .map(|i| {
            let repo = repo.clone();
            let email = email.clone();
            tokio::spawn(async move { repo.create_user_with_profile(row(&email, i % 2 == 0)).await })
        })
        .collect();

    let mut created = 0;
    let mut conflicts = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(_) => created += 1,
            Err(AppError::Conflict(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(conflicts, 7);

    let (users,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = $1")
        .bind(&email)
        .fetch_one(&ctx.pool)
        .await
        .unwrap();
    assert_eq!(users, 1);

    let (profiles,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM profiles p JOIN users u ON u.id = p.user_id WHERE u.email = $1",
    )
    .bind(&email)
    .fetch_one(&ctx.pool)
    .await
    .unwrap();
    assert_eq!(profiles, 1);
}

#[tokio::test]
#[ignore = "requires Postgres; run with `cargo test -- --ignored`"]
async fn test_update_password_replaces_salt_and_digest_together() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let user = create(&repo, "rehash", false).await;

    assert!(repo.update_password(user.id, credentials("bmV3c2FsdG5ld3NhbHQ")).await.unwrap());

    let stored = repo.get_credentials_by_user_id(user.id).await.unwrap().unwrap();
    assert!(stored == credentials("bmV3c2FsdG5ld3NhbHQ"));
    let refreshed = repo.get_user_by_id(user.id).await.unwrap().unwrap();
    assert!(refreshed.updated_at >= user.updated_at);

    assert!(!repo.update_password(Uuid::new_v4(), credentials("eA")).await.unwrap());
}

#[tokio::test]
#[ignore = "requires Postgres; run with `cargo test -- --ignored`"]
async fn test_update_profile_keeps_unsupplied_fields() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let user = create(&repo, "profile", false).await;

    repo.update_profile(
        user.id,
        ProfileUpdate {
            first_name: Some("Ada".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let profile = repo
        .update_profile(
            user.id,
            ProfileUpdate {
                bio: Some("Driver".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(profile.first_name.as_deref(), Some("Ada"));
    assert_eq!(profile.bio.as_deref(), Some("Driver"));
    assert_eq!(profile.last_name, None);

    let missing = repo
        .update_profile(Uuid::new_v4(), ProfileUpdate {
            bio: Some("ghost".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(missing.is_none());
}

// --- Post Tests ---

#[tokio::test]
#[ignore = "requires Postgres; run with `cargo test -- --ignored`"]
async fn test_non_organisation_owner_is_rejected_by_the_schema() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let volunteer = create(&repo, "volunteer", false).await;

    let result = repo.create_post(post("Forbidden"), volunteer.id).await;

    assert!(matches!(result, Err(AppError::Permission(_))));
}

#[tokio::test]
#[ignore = "requires Postgres; run with `cargo test -- --ignored`"]
async fn test_owner_reassignment_is_rejected_by_the_trigger() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let owner = create(&repo, "owner", true).await;
    let rival = create(&repo, "rival", true).await;
    let created = repo.create_post(post("Mine"), owner.id).await.unwrap();

    // Both accounts are organisations, so the composite key alone would accept this.
    let result = sqlx::query("UPDATE posts SET owner_id = $1 WHERE id = $2")
        .bind(rival.id)
        .bind(created.id)
        .execute(&ctx.pool)
        .await;

    match result {
        Err(sqlx::Error::Database(db)) => {
            assert!(db.message().contains("owner_id cannot be changed"), "{}", db.message())
        }
        other => panic!("expected the trigger to reject the update, got {other:?}"),
    }
    let current = repo.get_post_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(current.owner_id, owner.id);

    repo.delete_post(created.id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires Postgres; run with `cargo test -- --ignored`"]
async fn test_post_crud_round_trip() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let org = create(&repo, "org", true).await;

    let created = repo.create_post(post("Tree planting"), org.id).await.unwrap();
    assert_eq!(created.owner_id, org.id);

    let updated = repo
        .update_post(
            created.id,
            PostUpdate {
                title: None,
                description: Some("Saturday 9am".to_string()),
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.title, "Tree planting");
    assert_eq!(updated.description, "Saturday 9am");
    assert_eq!(updated.owner_id, org.id);

    assert!(repo.delete_post(created.id).await.unwrap());
    assert!(repo.get_post_by_id(created.id).await.unwrap().is_none());
    assert!(!repo.delete_post(created.id).await.unwrap());
}

#[tokio::test]
#[ignore = "requires Postgres; run with `cargo test -- --ignored`"]
async fn test_update_of_missing_post_returns_none() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let result = repo
        .update_post(
            Uuid::new_v4(),
            PostUpdate {
                title: Some("Ghost".to_string()),
                description: None,
            },
        )
        .await
        .unwrap();

    assert!(result.is_none());
}

#[tokio::test]
#[ignore = "requires Postgres; run with `cargo test -- --ignored`"]
async fn test_listing_is_newest_first() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let org = create(&repo, "lister", true).await;

    let older = repo.create_post(post("Older"), org.id).await.unwrap();
    let newer = repo.create_post(post("Newer"), org.id).await.unwrap();

    // Other suites share the table, so only the relative order is asserted.
    let listed = repo.list_posts_by_created_at(0, 1000).await.unwrap();
    let position = |id: Uuid| listed.iter().position(|p| p.id == id).unwrap();
    assert!(position(newer.id) < position(older.id));

    repo.delete_post(older.id).await.unwrap();
    repo.delete_post(newer.id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires Postgres; run with `cargo test -- --ignored`"]
async fn test_listing_by_owner_excludes_other_owners() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let org = create(&repo, "mine", true).await;
    let other = create(&repo, "theirs", true).await;

    let first = repo.create_post(post("First"), org.id).await.unwrap();
    let noise = repo.create_post(post("Noise"), other.id).await.unwrap();
    let second = repo.create_post(post("Second"), org.id).await.unwrap();

    let listed = repo.list_posts_by_owner(org.id, 0, 10).await.unwrap();
    let ids: Vec<Uuid> = listed.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    let paged = repo.list_posts_by_owner(org.id, 1, 10).await.unwrap();
    assert_eq!(paged.len(), 1);
    assert_eq!(paged[0].id, first.id);

    for id in [first.id, noise.id, second.id] {
        repo.delete_post(id).await.unwrap();
    }
}
