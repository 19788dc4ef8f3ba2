use crate::client::TransportError;
use crate::crypto::TokenError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Input errors
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Email already subscribed")]
    AlreadySubscribed,
    // Token errors, the cause is kept for logging and tests only
    #[error("Invalid token")]
    TokenInvalid(#[from] TokenError),
    // Email transport errors
    #[error("Failed to send email: {0}")]
    Transport(#[from] TransportError),
    // Database errors
    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound(entity.into())
    }
}
