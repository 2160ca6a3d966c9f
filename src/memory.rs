use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        HashedPassword, NewPost, NewUserRow, Post, PostUpdate, Profile, ProfileUpdate, User,
        UserInDb,
    },
    repository::Repository,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, UserInDb>,
    // email -> user id; plays the role of the UNIQUE index.
    emails: HashMap<String, Uuid>,
    profiles: HashMap<Uuid, Profile>,
    posts: HashMap<Uuid, Post>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Tables {
    // Strictly increasing clock so creation order is always observable.
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(next);
        next
    }
}

// Newest first, ties broken by id, then OFFSET/LIMIT, as in the SQL queries.
fn page<'a>(posts: impl Iterator<Item = &'a Post>, offset: i64, limit: i64) -> Vec<Post> {
    let mut posts: Vec<Post> = posts.cloned().collect();
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

    let offset = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
    let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
    posts.into_iter().skip(offset).take(limit).collect()
}

/// InMemoryRepository
///
/// A `Repository` held in process memory, for tests and database-less local runs.
/// Every write takes the single write lock, so the uniqueness and ownership checks
/// are atomic with the insert they guard, mirroring the PostgreSQL constraints.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }

    pub async fn profile_count(&self) -> usize {
        self.tables.read().await.profiles.len()
    }

    pub async fn post_count(&self) -> usize {
        self.tables.read().await.posts.len()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user_by_email(&self, email: &str) -> AppResult<Option<UserInDb>> {
        let tables = self.tables.read().await;
        Ok(tables
            .emails
            .get(email)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn get_user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&id).map(|row| row.user.clone()))
    }

    async fn create_user_with_profile(&self, new_user: NewUserRow) -> AppResult<User> {
        let mut tables = self.tables.write().await;

        if tables.emails.contains_key(&new_user.email) {
            return Err(AppError::email_taken());
        }

        let now = tables.tick();
        let user = User {
            id: Uuid::new_v4(),
            profile_id: Uuid::new_v4(),
            email: new_user.email,
            is_org: new_user.is_org,
            created_at: now,
            updated_at: now,
        };
        let profile = Profile {
            id: user.profile_id,
            user_id: user.id,
            created_at: now,
            updated_at: now,
            ..Profile::default()
        };

        tables.emails.insert(user.email.clone(), user.id);
        tables.profiles.insert(profile.id, profile);
        tables.users.insert(
            user.id,
            UserInDb {
                user: user.clone(),
                credentials: new_user.credentials,
            },
        );

        tracing::debug!(user_id = %user.id, "inserted user and profile");
        Ok(user)
    }

    async fn get_credentials_by_user_id(&self, user_id: Uuid) -> AppResult<Option<HashedPassword>> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&user_id).map(|row| row.credentials.clone()))
    }

    async fn update_password(&self, user_id: Uuid, credentials: HashedPassword) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        let now = tables.tick();

        let Some(row) = tables.users.get_mut(&user_id) else {
            return Ok(false);
        };
        row.credentials = credentials;
        row.user.updated_at = now;
        Ok(true)
    }

    async fn get_profile_by_user_id(&self, user_id: Uuid) -> AppResult<Option<Profile>> {
        let tables = self.tables.read().await;
        Ok(tables
            .profiles
            .values()
            .find(|profile| profile.user_id == user_id)
            .cloned())
    }

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> AppResult<Option<Profile>> {
        let mut tables = self.tables.write().await;
        let now = tables.tick();

        let Some(profile) = tables
            .profiles
            .values_mut()
            .find(|profile| profile.user_id == user_id)
        else {
            return Ok(None);
        };
        update.apply_to(profile);
        profile.updated_at = now;
        Ok(Some(profile.clone()))
    }

    async fn list_posts_by_created_at(&self, offset: i64, limit: i64) -> AppResult<Vec<Post>> {
        let tables = self.tables.read().await;
        Ok(page(tables.posts.values(), offset, limit))
    }

    async fn list_posts_by_owner(&self, owner_id: Uuid, offset: i64, limit: i64) -> AppResult<Vec<Post>> {
        let tables = self.tables.read().await;
        let owned = tables.posts.values().filter(|post| post.owner_id == owner_id);
        Ok(page(owned, offset, limit))
    }

    async fn get_post_by_id(&self, id: Uuid) -> AppResult<Option<Post>> {
        Ok(self.tables.read().await.posts.get(&id).cloned())
    }

    async fn create_post(&self, new_post: NewPost, owner_id: Uuid) -> AppResult<Post> {
        let mut tables = self.tables.write().await;

        let owner_is_org = tables
            .users
            .get(&owner_id)
            .is_some_and(|row| row.user.is_org);
        if !owner_is_org {
            return Err(AppError::not_an_organisation());
        }

        let now = tables.tick();
        let post = Post {
            id: Uuid::new_v4(),
            owner_id,
            title: new_post.title,
            description: new_post.description,
            created_at: now,
            updated_at: now,
        };
        tables.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn update_post(&self, id: Uuid, update: PostUpdate) -> AppResult<Option<Post>> {
        let mut tables = self.tables.write().await;
        let now = tables.tick();

        let Some(post) = tables.posts.get_mut(&id) else {
            return Ok(None);
        };
        update.apply_to(post);
        post.updated_at = now;
        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.tables.write().await.posts.remove(&id).is_some())
    }
}
