// src/error.rs ----------------------------------------------------------------
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Credential acquisition failures.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("interactive consent required but disabled for this deployment")]
    ConsentUnavailable,
    #[error("consent was denied: {0}")]
    ConsentDenied(String),
    #[error("consent redirect carried an unexpected state parameter")]
    StateMismatch,
    #[error("consent redirect listener failed: {0}")]
    Redirect(#[source] std::io::Error),
    #[error("credential has no refresh token")]
    NoRefreshToken,
    #[error("token endpoint answered {status}: {message}")]
    TokenEndpoint {
        status:  hyper::StatusCode,
        message: String,
    },
    #[error("token request failed: {0}")]
    Transport(#[from] hyper::Error),
    #[error("failed to build token request: {0}")]
    Request(#[from] hyper::http::Error),
    #[error("cannot read client secret: {0}")]
    ClientSecret(#[source] std::io::Error),
    #[error("credential storage failed: {0}")]
    Storage(#[source] std::io::Error),
    #[error("malformed token payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid authorization url: {0}")]
    Url(#[from] url::ParseError),
}

/// Mail or calendar data could not be read.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("gmail request failed: {0}")]
    Mail(#[source] google_gmail1::Error),
    #[error("calendar request failed: {0}")]
    Calendar(#[source] google_calendar3::Error),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(#[from] async_openai::error::OpenAIError),
    #[error("model returned no text")]
    EmptyResponse,
}

/// Anything that can abort a `/todos` request.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Auth(_)       => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Fetch(_)      => StatusCode::BAD_GATEWAY,
            AppError::Generation(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "request failed");
        (self.status(), self.to_string()).into_response()
    }
}
