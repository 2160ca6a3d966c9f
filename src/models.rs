use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The identity record from the `users` table, without credential material.
/// This is what leaves the User Store: handlers, the permission gate and the
/// auth extractor only ever see this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    // One-to-one link to the `profiles` row created alongside the user.
    pub profile_id: Uuid,
    // Unique, stored normalised (trimmed, lowercase).
    pub email: String,
    // Organisation accounts are the only ones allowed to publish posts.
    pub is_org: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// HashedPassword
///
/// The salt and salted digest produced by the credential service. Lives only
/// inside the store boundary and is never serialized.
#[derive(Clone, PartialEq, Eq, FromRow, Default)]
pub struct HashedPassword {
    pub salt: String,
    pub password: String,
}

impl std::fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashedPassword")
            .field("salt", &"<redacted>")
            .field("password", &"<redacted>")
            .finish()
    }
}

/// UserInDb
///
/// Full `users` row as read by the repository for authentication.
#[derive(Debug, Clone, FromRow, Default)]
pub struct UserInDb {
    #[sqlx(flatten)]
    pub user: User,
    #[sqlx(flatten)]
    pub credentials: HashedPassword,
}

/// NewUserRow
///
/// Internal insert payload handed from the User Store to the repository once
/// the password has been hashed and the email normalised.
#[derive(Debug, Clone)]
pub struct NewUserRow {
    pub email: String,
    pub is_org: bool,
    pub credentials: HashedPassword,
}

/// Profile
///
/// One-to-one companion of a user, created empty at registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.phone.is_none()
            && self.bio.is_none()
    }
}

/// UserPublic
///
/// A user enriched with its profile. Output schema for registration, login and `/users/me/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserPublic {
    pub id: Uuid,
    pub email: String,
    pub is_org: bool,
    pub profile: Profile,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl UserPublic {
    pub fn new(user: User, profile: Profile) -> Self {
        Self {
            id: user.id,
            email: user.email,
            is_org: user.is_org,
            profile,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Post
///
/// A record from the `posts` table. `owner_id` always references an organisation
/// and never changes after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Post {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// NewUser
///
/// Registration payload shared by user and organisation sign-up.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct NewUser {
    #[validate(email, length(max = 255))]
    #[schema(example = "hello@greenhands.org")]
    pub email: String,
    #[validate(length(min = 7, max = 128))]
    pub password: String,
}

/// NewPost
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct NewPost {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 10000))]
    #[serde(default)]
    pub description: String,
}

/// PostUpdate
///
/// Partial update payload for `PUT /posts/{id}/`. Only fields that are `Some`
/// are written; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct PostUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 10000))]
    pub description: Option<String>,
}

impl PostUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }

    /// Applies the supplied fields to `post` in place.
    pub fn apply_to(self, post: &mut Post) {
        if let Some(title) = self.title {
            post.title = title;
        }
        if let Some(description) = self.description {
            post.description = description;
        }
    }
}

/// ProfileUpdate
///
/// Partial update payload for `PUT /profiles/me/`. Same semantics as
/// `PostUpdate`: `None` leaves the stored value untouched.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 100))]
    pub first_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 100))]
    pub last_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 32))]
    pub phone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000))]
    pub bio: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.phone.is_none()
            && self.bio.is_none()
    }

    pub fn apply_to(self, profile: &mut Profile) {
        if let Some(first_name) = self.first_name {
            profile.first_name = Some(first_name);
        }
        if let Some(last_name) = self.last_name {
            profile.last_name = Some(last_name);
        }
        if let Some(phone) = self.phone {
            profile.phone = Some(phone);
        }
        if let Some(bio) = self.bio {
            profile.bio = Some(bio);
        }
    }
}

/// PasswordChange
///
/// Body of `PUT /users/me/password/`. The new password obeys the same rules as
/// at registration.
#[derive(Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct PasswordChange {
    pub current_password: String,
    #[validate(length(min = 7, max = 128))]
    pub new_password: String,
}

impl std::fmt::Debug for PasswordChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordChange").finish_non_exhaustive()
    }
}

// --- Request Envelopes ---
// Bodies carry the payload under a named key, e.g. `{"new_post": {...}}`.

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreatePostRequest {
    pub new_post: NewPost,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdatePostRequest {
    pub post_update: PostUpdate,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateProfileRequest {
    pub profile_update: ProfileUpdate,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterUserRequest {
    pub new_user: NewUser,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}
