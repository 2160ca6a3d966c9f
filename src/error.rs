use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// AppError
///
/// The typed failure taxonomy shared by the stores, the permission gate and the
/// transport layer. Stores raise these; `IntoResponse` translates them to HTTP.
///
/// Absence is not an error: lookups that may legitimately find nothing return
/// `Option`, and a failed login is `Ok(None)`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Permission(String),

    #[error("Could not validate credentials")]
    Unauthenticated,

    #[error("Invalid input: {0}")]
    Validation(String),

    /// The request itself could not be read: bad JSON syntax, wrong content
    /// type, an unparseable query string or path segment.
    #[error("Malformed request: {0}")]
    BadRequest(String),

    /// The stored salt/digest pair cannot be interpreted.
    #[error("Malformed stored credential: {0}")]
    Credential(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn email_taken() -> Self {
        AppError::Conflict("That email is already taken. Login or try another.".to_string())
    }

    pub fn not_post_owner() -> Self {
        AppError::Permission("Users are only able to modify posts that they created.".to_string())
    }

    pub fn not_an_organisation() -> Self {
        AppError::Permission("Only organisations are able to create posts.".to_string())
    }

    pub fn wrong_current_password() -> Self {
        AppError::Permission("The current password is incorrect.".to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            // Duplicate registrations are a client error in the registration flow.
            AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::Permission(_) => StatusCode::FORBIDDEN,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Credential(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

// --- Extractor Rejections ---
// axum reports 422 for well-formed input of the wrong shape and 4xx/5xx for the
// rest; the same split is kept, but the body uses the error envelope.

fn from_rejection(status: StatusCode, body_text: String) -> AppError {
    if status == StatusCode::UNPROCESSABLE_ENTITY {
        AppError::Validation(body_text)
    } else if status.is_server_error() {
        AppError::Internal(body_text)
    } else {
        AppError::BadRequest(body_text)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(error: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("background task failed: {error}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (error_type, message) = match &self {
            AppError::NotFound(_) => ("not_found", self.to_string()),
            AppError::Conflict(_) => ("conflict", self.to_string()),
            AppError::Permission(_) => ("forbidden", self.to_string()),
            AppError::Unauthenticated => ("unauthorized", self.to_string()),
            AppError::Validation(_) => ("validation_error", self.to_string()),
            AppError::BadRequest(_) => ("bad_request", self.to_string()),
            AppError::Credential(_) | AppError::Database(_) | AppError::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                ("internal_error", "An internal error occurred".to_string())
            }
        };

        let mut response = (
            status,
            Json(json!({
                "error": {
                    "type": error_type,
                    "message": message
                }
            })),
        )
            .into_response();

        if matches!(self, AppError::Unauthenticated) {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Bearer"),
            );
        }

        response
    }
}
