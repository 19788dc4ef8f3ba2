use actix_web::http::header::{self, HeaderMap};

use anyhow::Context;

use secrecy::Secret;

const BASIC_AUTH_PREFIX: &str = "Basic ";

/// Email and password presented by an administrator
#[derive(Debug)]
pub struct Credentials {
    pub email: String,
    pub password: Secret<String>,
}

impl Credentials {
    /// Extract credentials from the `Authorization` header of a request
    pub fn from_headers(headers: &HeaderMap) -> anyhow::Result<Self> {
        let header_value = headers
            .get(header::AUTHORIZATION)
            .context("Missing authorization in header")?
            .to_str()
            .context("Authorization header is not valid text")?;

        Self::from_basic(header_value)
    }

    /// Extract credentials from a string formatted as 'Basic <base64 email:password>'
    pub fn from_basic(header_value: &str) -> anyhow::Result<Self> {
        use base64::Engine;

        let encoded = header_value
            .strip_prefix(BASIC_AUTH_PREFIX)
            .context("Authorization scheme not basic")?;

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .context("Failed to decode authorization header")?;
        let decoded = String::from_utf8(decoded).context("Failed to decode authorization header")?;

        let (email, password) = decoded
            .split_once(':')
            .context("Missing password in authorization")?;
        if email.is_empty() {
            anyhow::bail!("Missing email in authorization");
        }

        Ok(Self {
            email: email.into(),
            password: Secret::new(password.into()),
        })
    }
}
