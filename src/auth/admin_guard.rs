use std::future::Future;
use std::pin::Pin;

use actix_web::{dev, web, FromRequest, HttpRequest};

use anyhow::Context;

use argon2::{Argon2, PasswordHash, PasswordVerifier};

use secrecy::Secret;

use uuid::Uuid;

use crate::auth::Credentials;
use crate::controller::{RestError, RestResult};
use crate::domain::EmailAddress;
use crate::repo::{PgUsersRepo, UserStore};
use crate::telemetry::spawn_blocking_with_tracing;

/// Request guard for the back office, resolves to the authenticated user
#[derive(Debug, Clone)]
pub struct Administrator {
    pub id: Uuid,
    pub email: String,
}

impl FromRequest for Administrator {
    type Error = RestError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            // NOTE: Must be registered with the application at startup
            let users = req
                .app_data::<web::Data<PgUsersRepo>>()
                .context("Users repository not registered for application")
                .map_err(RestError::InternalError)?;
            let creds = Credentials::from_headers(req.headers())
                .map_err(RestError::FailedToAuthenticate)?;

            validate_credentials(users.get_ref(), creds).await
        })
    }
}

#[tracing::instrument("Validate credentials", skip(users, credentials), fields(email = %credentials.email))]
async fn validate_credentials<U>(users: &U, credentials: Credentials) -> RestResult<Administrator>
where
    U: UserStore + ?Sized,
{
    let email: EmailAddress = credentials
        .email
        .parse()
        .context("Malformed email in credentials")
        .map_err(RestError::FailedToAuthenticate)?;

    let user = users
        .fetch_credentials_by_email(&email)
        .await?
        .context("No user stored for email")
        .map_err(RestError::FailedToAuthenticate)?;

    let password = credentials.password;
    let password_hash = user.password_hash;
    spawn_blocking_with_tracing(move || verify_password_hash(password, password_hash))
        .await
        .context("Failed to spawn blocking task")
        .map_err(RestError::InternalError)??;

    Ok(Administrator {
        id: user.id,
        email: user.email,
    })
}

#[tracing::instrument("Verify password hash", skip(password, password_hash))]
fn verify_password_hash(password: Secret<String>, password_hash: Secret<String>) -> RestResult<()> {
    use secrecy::ExposeSecret;

    let password_hash = PasswordHash::new(password_hash.expose_secret())
        .context("Failed to parse stored password hash")
        .map_err(RestError::InternalError)?;

    Argon2::default()
        .verify_password(password.expose_secret().as_bytes(), &password_hash)
        .context("Failed to verify password hash")
        .map_err(RestError::FailedToAuthenticate)
}
