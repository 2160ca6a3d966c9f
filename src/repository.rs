use crate::{
    error::{AppError, AppResult},
    models::{
        HashedPassword, NewPost, NewUserRow, Post, PostUpdate, Profile, ProfileUpdate, User,
        UserInDb,
    },
};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Repository Trait
///
/// The storage boundary underneath the User Store and the Post Store. Implementations
/// are the final arbiter of the data invariants:
///
/// - email uniqueness (a violation surfaces as `AppError::Conflict`),
/// - user + profile creation as one atomic unit,
/// - post owners must be organisations (`AppError::Permission` otherwise),
/// - a post's owner never changes.
///
/// The trait performs no authorization beyond those constraints; callers go through
/// the stores and the permission gate.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user_by_email(&self, email: &str) -> AppResult<Option<UserInDb>>;
    async fn get_user_by_id(&self, id: Uuid) -> AppResult<Option<User>>;
    // Inserts the user row and its empty profile in a single transaction.
    async fn create_user_with_profile(&self, new_user: NewUserRow) -> AppResult<User>;
    // Salt and digest only, for re-verification of a signed-in user.
    async fn get_credentials_by_user_id(&self, user_id: Uuid) -> AppResult<Option<HashedPassword>>;
    // Replaces salt and digest together. `false` when the user does not exist.
    async fn update_password(&self, user_id: Uuid, credentials: HashedPassword) -> AppResult<bool>;

    // --- Profiles ---
    async fn get_profile_by_user_id(&self, user_id: Uuid) -> AppResult<Option<Profile>>;
    // Writes only the fields that are `Some`. `None` when the profile does not exist.
    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> AppResult<Option<Profile>>;

    // --- Posts ---
    // Newest first; ties broken by id, descending.
    async fn list_posts_by_created_at(&self, offset: i64, limit: i64) -> AppResult<Vec<Post>>;
    // Same ordering as above, restricted to one owner.
    async fn list_posts_by_owner(&self, owner_id: Uuid, offset: i64, limit: i64) -> AppResult<Vec<Post>>;
    async fn get_post_by_id(&self, id: Uuid) -> AppResult<Option<Post>>;
    async fn create_post(&self, new_post: NewPost, owner_id: Uuid) -> AppResult<Post>;
    // Writes only the fields that are `Some`. `None` when the post does not exist.
    async fn update_post(&self, id: Uuid, update: PostUpdate) -> AppResult<Option<Post>>;
    // `true` if a row was removed.
    async fn delete_post(&self, id: Uuid) -> AppResult<bool>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer between the stores.
pub type RepositoryState = Arc<dyn Repository>;

/// Applies the embedded SQL migrations under `./migrations`.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

const USER_COLUMNS: &str = "id, profile_id, email, is_org, created_at, updated_at";
const PROFILE_COLUMNS: &str =
    "id, user_id, first_name, last_name, phone, bio, created_at, updated_at";
const POST_COLUMNS: &str = "id, owner_id, title, description, created_at, updated_at";

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Constraint violations reported by the database are translated into the typed
/// errors above, so the schema, not a prior `SELECT`, decides races.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

#[async_trait]
impl Repository for PostgresRepository {
    /// get_user_by_email
    ///
    /// Reads the full row, salt and digest included, for authentication.
    /// The caller passes an already normalised email.
    async fn get_user_by_email(&self, email: &str) -> AppResult<Option<UserInDb>> {
        let user = sqlx::query_as::<_, UserInDb>(&format!(
            "SELECT {USER_COLUMNS}, salt, password FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// create_user_with_profile
    ///
    /// Inserts the user and its empty profile inside one transaction. A unique
    /// violation on `users.email` is the authoritative duplicate signal and maps to
    /// `AppError::Conflict`; the transaction is rolled back when dropped.
    async fn create_user_with_profile(&self, new_user: NewUserRow) -> AppResult<User> {
        // 1. Open the transaction. Both rows commit together or not at all.
        let mut tx = self.pool.begin().await?;
        let profile_id = Uuid::new_v4();

        // 2. Insert the user. Two concurrent registrations for one email both
        // reach this point; the second blocks on the index until the first
        // commits and then fails with 23505.
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, profile_id, email, is_org, salt, password) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(profile_id)
        .bind(&new_user.email)
        .bind(new_user.is_org)
        .bind(&new_user.credentials.salt)
        .bind(&new_user.credentials.password)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::email_taken()
            } else {
                AppError::Database(e)
            }
        })?;

        // 3. Insert the empty profile under the id reserved above.
        sqlx::query("INSERT INTO profiles (id, user_id) VALUES ($1, $2)")
            .bind(profile_id)
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        // 4. Commit.
        tx.commit().await?;
        Ok(user)
    }

    async fn get_credentials_by_user_id(&self, user_id: Uuid) -> AppResult<Option<HashedPassword>> {
        let credentials = sqlx::query_as::<_, HashedPassword>(
            "SELECT salt, password FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(credentials)
    }

    /// update_password
    ///
    /// Salt and digest are written in one statement so a reader never sees a
    /// digest paired with the wrong salt.
    async fn update_password(&self, user_id: Uuid, credentials: HashedPassword) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET salt = $2, password = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(user_id)
        .bind(&credentials.salt)
        .bind(&credentials.password)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_profile_by_user_id(&self, user_id: Uuid) -> AppResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    /// update_profile
    ///
    /// `COALESCE` keeps the stored value for every field that is `None`.
    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> AppResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            "UPDATE profiles \
             SET first_name = COALESCE($2, first_name), \
                 last_name = COALESCE($3, last_name), \
                 phone = COALESCE($4, phone), \
                 bio = COALESCE($5, bio), \
                 updated_at = NOW() \
             WHERE user_id = $1 \
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(user_id)
        .bind(update.first_name)
        .bind(update.last_name)
        .bind(update.phone)
        .bind(update.bio)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    /// list_posts_by_created_at
    ///
    /// Served by `posts_created_at_idx`. `id` breaks ties between posts created
    /// in the same microsecond so pages never overlap.
    async fn list_posts_by_created_at(&self, offset: i64, limit: i64) -> AppResult<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts \
             ORDER BY created_at DESC, id DESC \
             OFFSET $1 LIMIT $2"
        ))
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    async fn list_posts_by_owner(&self, owner_id: Uuid, offset: i64, limit: i64) -> AppResult<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts \
             WHERE owner_id = $1 \
             ORDER BY created_at DESC, id DESC \
             OFFSET $2 LIMIT $3"
        ))
        .bind(owner_id)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    async fn get_post_by_id(&self, id: Uuid) -> AppResult<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    /// create_post
    ///
    /// `posts (owner_id, owner_is_org)` references `users (id, is_org)` with
    /// `owner_is_org` pinned to true, so a non-organisation owner is rejected by the
    /// database even if the caller skipped the role check.
    async fn create_post(&self, new_post: NewPost, owner_id: Uuid) -> AppResult<Post> {
        // `owner_is_org` is left to its column default (TRUE).
        sqlx::query_as::<_, Post>(&format!(
            "INSERT INTO posts (id, owner_id, title, description) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {POST_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(&new_post.title)
        .bind(&new_post.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            // 23503: no `users` row with this id and `is_org = TRUE`.
            if is_foreign_key_violation(&e) {
                AppError::not_an_organisation()
            } else {
                AppError::Database(e)
            }
        })
    }

    /// update_post
    ///
    /// Uses `COALESCE` so a column is only written when the corresponding field is
    /// `Some`. `owner_id` is never part of the statement, and the
    /// `posts_owner_immutable` trigger rejects any statement that tries.
    async fn update_post(&self, id: Uuid, update: PostUpdate) -> AppResult<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "UPDATE posts \
             SET title = COALESCE($2, title), \
                 description = COALESCE($3, description), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {POST_COLUMNS}"
        ))
        .bind(id)
        .bind(update.title)
        .bind(update.description)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    async fn delete_post(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
