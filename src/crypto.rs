mod signing_key;
mod token;
mod unsubscribe;

pub use signing_key::SigningKey;
pub use token::{Token, TokenBuilder, TokenError, TokenResult};
pub use unsubscribe::{UnsubscribeToken, UNSUBSCRIBE_PURPOSE};
