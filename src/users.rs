use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    credentials::CredentialService,
    error::{AppError, AppResult},
    models::{
        HashedPassword, NewUser, NewUserRow, PasswordChange, Profile, ProfileUpdate, User,
        UserPublic,
    },
    repository::RepositoryState,
};

/// Emails are compared and stored trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// UserStore
///
/// Owns the User + Profile lifecycle: registration of users and organisations,
/// lookup, and password authentication. The credential service is injected at
/// construction; salts and digests never leave this type.
#[derive(Clone)]
pub struct UserStore {
    repo: RepositoryState,
    credentials: CredentialService,
}

impl UserStore {
    pub fn new(repo: RepositoryState, credentials: CredentialService) -> Self {
        Self { repo, credentials }
    }

    /// get_user_by_email
    ///
    /// Exact match on the normalised email. `None` is a normal outcome.
    pub async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let found = self.repo.get_user_by_email(&normalize_email(email)).await?;
        Ok(found.map(|row| row.user))
    }

    pub async fn get_user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        self.repo.get_user_by_id(id).await
    }

    /// Registers a regular (non-organisation) account.
    pub async fn create_user(&self, new_user: NewUser) -> AppResult<UserPublic> {
        self.register(new_user, false).await
    }

    /// Registers an organisation account. Identical to `create_user` apart from
    /// the `is_org` flag.
    pub async fn create_org(&self, new_user: NewUser) -> AppResult<UserPublic> {
        self.register(new_user, true).await
    }

    async fn register(&self, mut new_user: NewUser, is_org: bool) -> AppResult<UserPublic> {
        new_user.email = normalize_email(&new_user.email);
        new_user.validate()?;
        let NewUser { email, password } = new_user;

        // Early exit for the common case. The storage constraint still decides
        // concurrent registrations that both get past this point.
        if self.repo.get_user_by_email(&email).await?.is_some() {
            return Err(AppError::email_taken());
        }

        let credentials = self.hash_password(password).await?;
        let user = self
            .repo
            .create_user_with_profile(NewUserRow {
                email,
                is_org,
                credentials,
            })
            .await?;

        tracing::info!(user_id = %user.id, is_org, "registered account");
        self.populate_user(user).await
    }

    /// authenticate_user
    ///
    /// Returns the user when `password` matches the stored credential, `None` when
    /// the email is unknown or the password is wrong. Both `None` paths run one
    /// full hash verification so they cost about the same.
    pub async fn authenticate_user(&self, email: &str, password: &str) -> AppResult<Option<User>> {
        let found = self.repo.get_user_by_email(&normalize_email(email)).await?;
        let password = password.to_string();
        let credentials = self.credentials.clone();

        let Some(row) = found else {
            tokio::task::spawn_blocking(move || credentials.burn_verification(&password)).await?;
            return Ok(None);
        };

        let HashedPassword { salt, password: digest } = row.credentials;
        let verified = tokio::task::spawn_blocking(move || {
            credentials.verify_password(&password, &salt, &digest)
        })
        .await??;

        if !verified {
            tracing::debug!(user_id = %row.user.id, "password mismatch");
            return Ok(None);
        }
        Ok(Some(row.user))
    }

    /// populate_user
    ///
    /// Attaches the linked profile. A user without a profile violates the creation
    /// invariant and is reported as not found.
    pub async fn populate_user(&self, user: User) -> AppResult<UserPublic> {
        let profile = self
            .repo
            .get_profile_by_user_id(user.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Profile for user {}", user.id)))?;
        Ok(UserPublic::new(user, profile))
    }

    /// change_password
    ///
    /// Re-verifies `current_password` for the signed-in `actor`, then stores a
    /// digest of `new_password` under a fresh salt. A wrong current password is
    /// `AppError::Permission` and leaves the stored credential untouched.
    pub async fn change_password(&self, actor: &AuthUser, change: PasswordChange) -> AppResult<()> {
        change.validate()?;

        let HashedPassword { salt, password: digest } = self
            .repo
            .get_credentials_by_user_id(actor.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", actor.id)))?;

        let credentials = self.credentials.clone();
        let current = change.current_password;
        let verified = tokio::task::spawn_blocking(move || {
            credentials.verify_password(&current, &salt, &digest)
        })
        .await??;
        if !verified {
            tracing::warn!(user_id = %actor.id, "password change with wrong current password");
            return Err(AppError::wrong_current_password());
        }

        let fresh = self.hash_password(change.new_password).await?;
        if !self.repo.update_password(actor.id, fresh).await? {
            return Err(AppError::NotFound(format!("User {}", actor.id)));
        }

        tracing::info!(user_id = %actor.id, "changed password");
        Ok(())
    }

    pub async fn get_profile_by_user_id(&self, user_id: Uuid) -> AppResult<Profile> {
        self.repo
            .get_profile_by_user_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Profile for user {user_id}")))
    }

    /// update_profile
    ///
    /// Writes only the supplied fields of the profile belonging to `user_id`.
    /// An update carrying no field is rejected as malformed.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        profile_update: ProfileUpdate,
    ) -> AppResult<Profile> {
        profile_update.validate()?;
        if profile_update.is_empty() {
            return Err(AppError::Validation(
                "profile_update must contain at least one field".to_string(),
            ));
        }

        let profile = self
            .repo
            .update_profile(user_id, profile_update)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Profile for user {user_id}")))?;
        tracing::info!(user_id = %user_id, "updated profile");
        Ok(profile)
    }

    async fn hash_password(&self, plaintext: String) -> AppResult<HashedPassword> {
        let credentials = self.credentials.clone();
        tokio::task::spawn_blocking(move || credentials.salt_and_hash_pw(&plaintext)).await?
    }
}
