//! Permission gate for post mutations.
//!
//! The Post Store's mutating operations accept an [`AuthorizedPost`], and the
//! only way to obtain one is [`validate_post_modification_permissions`]. The
//! ownership check therefore always completes before an update or delete is
//! issued, and a failed check aborts the whole operation.

use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::Post,
};

/// A post whose ownership by the requesting actor has been verified.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizedPost {
    post: Post,
}

impl AuthorizedPost {
    pub fn id(&self) -> Uuid {
        self.post.id
    }

    pub fn post(&self) -> &Post {
        &self.post
    }

    pub fn into_inner(self) -> Post {
        self.post
    }
}

/// Fails with `AppError::Permission` unless `requesting_user` owns `post`.
pub fn validate_post_modification_permissions(
    post: Post,
    requesting_user: &AuthUser,
) -> AppResult<AuthorizedPost> {
    if post.owner_id != requesting_user.id {
        tracing::warn!(
            post_id = %post.id,
            user_id = %requesting_user.id,
            "rejected modification by non-owner"
        );
        return Err(AppError::not_post_owner());
    }
    Ok(AuthorizedPost { post })
}

/// Fails with `AppError::Permission` unless `requesting_user` is an organisation.
pub fn validate_post_creation_permissions(requesting_user: &AuthUser) -> AppResult<()> {
    if !requesting_user.is_org {
        return Err(AppError::not_an_organisation());
    }
    Ok(())
}
