use actix_web::http::header::{self, HeaderValue};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

use crate::error::Error;

pub type RestResult<T> = Result<T, RestError>;

#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("This email is already subscribed.")]
    AlreadySubscribed,

    #[error("This link is invalid or has expired.")]
    InvalidLink,

    #[error("Authentication failed")]
    FailedToAuthenticate(#[source] anyhow::Error),

    #[error("Internal Server Error")]
    InternalError(#[source] anyhow::Error),
}

impl From<Error> for RestError {
    fn from(e: Error) -> Self {
        match e {
            Error::Validation(msg) => Self::BadRequest(msg),
            Error::NotFound(_) => Self::NotFound(e.to_string()),
            Error::AlreadySubscribed => Self::AlreadySubscribed,
            Error::TokenInvalid(_) => Self::InvalidLink,
            Error::Transport(_) | Error::Store(_) => {
                tracing::error!(error.cause_chain = ?e, "Request failed");
                Self::InternalError(e.into())
            }
        }
    }
}

impl From<sqlx::Error> for RestError {
    fn from(e: sqlx::Error) -> Self {
        Error::from(e).into()
    }
}

impl ResponseError for RestError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadySubscribed => StatusCode::CONFLICT,
            Self::InvalidLink | Self::FailedToAuthenticate(_) => StatusCode::UNAUTHORIZED,
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut res = HttpResponse::build(self.status_code());
        if let Self::FailedToAuthenticate(_) = self {
            res.insert_header((
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(r#"Basic realm="admin""#),
            ));
        }
        res.body(self.to_string())
    }
}
