use std::time::Duration;

use reqwest::Client;

use serde::{Deserialize, Serialize};

use secrecy::Secret;

use url::Url;

use crate::domain::EmailAddress;

const POSTMARK_TOKEN_HEADER: &str = "X-Postmark-Server-Token";

/// Errors raised while handing a message to the email relay
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Email relay request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Email relay rejected the message: {0}")]
    Rejected(String),
}

/// Receipt returned by the relay for an accepted message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivery {
    pub message_id: Option<String>,
}

/// Anything able to transmit a single, fully rendered email
#[async_trait::async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, email: &Email) -> Result<Delivery, TransportError>;
}

#[derive(Debug, Clone)]
pub struct Email {
    pub recipient: EmailAddress,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

impl Email {
    fn as_request<'e>(&'e self, sender: &'e EmailAddress) -> SendEmailRequest<'e> {
        SendEmailRequest {
            to: self.recipient.as_ref(),
            from: sender.as_ref(),
            subject: &self.subject,
            html_body: &self.html_body,
            text_body: &self.text_body,
        }
    }
}

/// REST client for a Postmark-compatible email relay
#[derive(Debug)]
pub struct EmailClient {
    client: Client,
    sender: EmailAddress,

    api_send_email_url: Url,
    api_auth_token: Secret<String>,
}

impl EmailClient {
    pub fn new(
        sender: EmailAddress,
        api_timeout: Duration,
        api_base_url: Url,
        api_auth_token: Secret<String>,
    ) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(api_timeout).build()?;

        let api_send_email_url = api_base_url.join("email")?;

        Ok(Self {
            client,
            sender,
            api_send_email_url,
            api_auth_token,
        })
    }
}

#[async_trait::async_trait]
impl EmailTransport for EmailClient {
    #[tracing::instrument(
        name = "Send an email via API",
        skip(self, email),
        fields(recipient = %email.recipient)
    )]
    async fn send(&self, email: &Email) -> Result<Delivery, TransportError> {
        use secrecy::ExposeSecret;

        let body = email.as_request(&self.sender);

        let res = self
            .client
            .post(self.api_send_email_url.clone())
            .header(POSTMARK_TOKEN_HEADER, self.api_auth_token.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        let bytes = res.bytes().await?;
        // The relay may answer with an empty body, only the status is authoritative
        let reply: SendEmailResponse = serde_json::from_slice(&bytes).unwrap_or_default();

        if !status.is_success() {
            let reason = reply.message.unwrap_or_else(|| status.to_string());
            return Err(TransportError::Rejected(reason));
        }

        Ok(Delivery {
            message_id: reply.message_id,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendEmailRequest<'a> {
    to: &'a str,
    from: &'a str,
    subject: &'a str,
    html_body: &'a str,
    text_body: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct SendEmailResponse {
    #[serde(rename = "MessageID")]
    message_id: Option<String>,
    #[serde(rename = "Message")]
    message: Option<String>,
}
