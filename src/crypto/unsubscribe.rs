use chrono::Duration;

use crate::domain::EmailAddress;

use super::{SigningKey, Token, TokenResult};

/// Purpose tag carried by every unsubscribe token
pub const UNSUBSCRIBE_PURPOSE: &str = "unsubscribe";

/// Self-contained credential granting the right to deactivate one email's subscription.
/// Never persisted; the email travels inside the signed payload.
#[derive(Debug)]
pub struct UnsubscribeToken;

impl UnsubscribeToken {
    /// Default validity window of an unsubscribe link
    pub fn default_validity() -> Duration {
        Duration::days(30)
    }

    pub fn issue(key: &SigningKey, email: &EmailAddress, valid_for: Duration) -> TokenResult<Token> {
        Token::builder(email.as_ref())
            .purpose(UNSUBSCRIBE_PURPOSE)
            .expires_in(valid_for)
            .sign(key.as_ref())
    }

    /// Verify a raw token string. The precise failure is kept in the error,
    /// subscriber-facing callers are expected to collapse it.
    pub fn verify(key: &SigningKey, token: &str) -> TokenResult<EmailAddress> {
        let email: String = token
            .parse::<Token>()?
            .verify_for(key.as_ref(), UNSUBSCRIBE_PURPOSE)?;
        // A correctly signed payload that is not an email was not issued by us
        email
            .parse()
            .map_err(|_| super::TokenError::InvalidFormat)
    }
}
