use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{NewPost, Post, PostUpdate},
    permissions::{self, AuthorizedPost},
    repository::RepositoryState,
};

pub const DEFAULT_OFFSET: u32 = 0;
pub const DEFAULT_LIMIT: u32 = 3;

/// PostStore
///
/// Owns the Post lifecycle. Creation is restricted to organisations; updates and
/// deletes only accept posts that have passed the permission gate.
#[derive(Clone)]
pub struct PostStore {
    repo: RepositoryState,
    max_page_size: u32,
}

impl PostStore {
    pub fn new(repo: RepositoryState, max_page_size: u32) -> Self {
        Self { repo, max_page_size }
    }

    /// list_posts_by_created_at
    ///
    /// Most recent first. `offset` defaults to 0 and `limit` to 3; `limit` is
    /// clamped to the configured page size.
    pub async fn list_posts_by_created_at(
        &self,
        offset: Option<u32>,
        limit: Option<u32>,
    ) -> AppResult<Vec<Post>> {
        let (offset, limit) = self.page_bounds(offset, limit);
        self.repo.list_posts_by_created_at(offset, limit).await
    }

    /// list_posts_by_owner
    ///
    /// The posts published by one organisation, with the same ordering, defaults
    /// and page cap as `list_posts_by_created_at`. An owner without posts, or an
    /// unknown id, yields an empty page.
    pub async fn list_posts_by_owner(
        &self,
        owner_id: Uuid,
        offset: Option<u32>,
        limit: Option<u32>,
    ) -> AppResult<Vec<Post>> {
        let (offset, limit) = self.page_bounds(offset, limit);
        self.repo.list_posts_by_owner(owner_id, offset, limit).await
    }

    fn page_bounds(&self, offset: Option<u32>, limit: Option<u32>) -> (i64, i64) {
        let offset = offset.unwrap_or(DEFAULT_OFFSET);
        let limit = limit.unwrap_or(DEFAULT_LIMIT).min(self.max_page_size);
        (i64::from(offset), i64::from(limit))
    }

    pub async fn get_post_by_id(&self, id: Uuid) -> AppResult<Post> {
        self.repo
            .get_post_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post {id}")))
    }

    /// create_post
    ///
    /// Fails with `AppError::Permission` unless `requesting_user` is an
    /// organisation; nothing is written in that case. The owner is always the
    /// requesting user.
    pub async fn create_post(&self, new_post: NewPost, requesting_user: &AuthUser) -> AppResult<Post> {
        permissions::validate_post_creation_permissions(requesting_user)?;
        new_post.validate()?;

        let post = self.repo.create_post(new_post, requesting_user.id).await?;
        tracing::info!(post_id = %post.id, owner_id = %post.owner_id, "created post");
        Ok(post)
    }

    /// update_post_by_id
    ///
    /// Applies only the supplied fields. An update carrying no field at all is
    /// rejected as malformed.
    pub async fn update_post_by_id(
        &self,
        post: AuthorizedPost,
        post_update: PostUpdate,
    ) -> AppResult<Post> {
        post_update.validate()?;
        if post_update.is_empty() {
            return Err(AppError::Validation(
                "post_update must contain at least one field".to_string(),
            ));
        }

        let id = post.id();
        let updated = self
            .repo
            .update_post(id, post_update)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post {id}")))?;
        tracing::info!(post_id = %id, "updated post");
        Ok(updated)
    }

    /// delete_post
    ///
    /// Removes the post and returns its id.
    pub async fn delete_post(&self, post: AuthorizedPost) -> AppResult<Uuid> {
        let id = post.id();
        if !self.repo.delete_post(id).await? {
            return Err(AppError::NotFound(format!("Post {id}")));
        }
        tracing::info!(post_id = %id, owner_id = %post.post().owner_id, "deleted post");
        Ok(id)
    }
}
