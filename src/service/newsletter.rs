use std::time::Duration;

use regex::Regex;

use serde::Serialize;

use url::Url;

use uuid::Uuid;

use crate::client::{Email, EmailTransport};
use crate::crypto::{SigningKey, UnsubscribeToken};
use crate::domain::EmailAddress;
use crate::error::{Error, Result};
use crate::model::{ActivityAction, NewActivity};
use crate::repo::{ActivityStore, SubscriptionStore};
use crate::template::{self, FieldValues, UNSUBSCRIBE_URL_FIELD};

use super::{activity, subscriptions};

lazy_static::lazy_static! {
    static ref LINK_REGEX: Regex =
        Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*"([^"]*)"[^>]*>(.*?)</a>"#).unwrap();
    static ref BREAK_REGEX: Regex =
        Regex::new(r"(?i)<br\s*/?>|</(p|div|h[1-6]|li|tr)>").unwrap();
    static ref STYLE_REGEX: Regex =
        Regex::new(r"(?is)<(style|script|head)[^>]*>.*?</(style|script|head)>").unwrap();
    static ref TAG_REGEX: Regex = Regex::new(r"(?s)<[^>]*>").unwrap();
    static ref BLANK_LINES_REGEX: Regex = Regex::new(r"\n\s*\n+").unwrap();
    static ref BODY_CLOSE_REGEX: Regex = Regex::new(r"(?i)</body\s*>").unwrap();
}

/// Knobs of the dispatch loop, fixed for the lifetime of the process
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub token_validity: chrono::Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            batch_size: 50,
            batch_delay: Duration::from_secs(1),
            token_validity: UnsubscribeToken::default_validity(),
        }
    }
}

/// One newsletter send, built at request time and dropped once dispatched.
///
/// The body stays a template until each recipient's copy is rendered, so the
/// unsubscribe link is substituted in the same pass as every other value.
#[derive(Debug, Clone)]
pub struct DispatchJob {
    pub subject: String,
    pub html: String,
    pub values: FieldValues,
    pub recipients: Vec<EmailAddress>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent { message_id: Option<String> },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipientOutcome {
    pub recipient: String,
    #[serde(flatten)]
    pub status: DeliveryStatus,
}

impl RecipientOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self.status, DeliveryStatus::Sent { .. })
    }
}

/// Per-recipient report of a dispatch, in recipient order
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchResult {
    pub sent: usize,
    pub failed: usize,
    pub recipients: Vec<RecipientOutcome>,
}

impl From<Vec<RecipientOutcome>> for DispatchResult {
    fn from(recipients: Vec<RecipientOutcome>) -> Self {
        let sent = recipients.iter().filter(|o| o.is_sent()).count();
        Self {
            sent,
            failed: recipients.len() - sent,
            recipients,
        }
    }
}

/// Sends a rendered newsletter to every recipient, one message at a time.
///
/// Recipients are processed in fixed-size batches with a fixed pause between
/// batches. A failed send is recorded for that recipient and the loop carries
/// on; nothing is retried.
#[derive(Debug)]
pub struct Dispatcher<T> {
    transport: T,
    signing_key: SigningKey,
    base_url: Url,
    settings: DispatchSettings,
}

impl<T: EmailTransport> Dispatcher<T> {
    pub fn new(
        transport: T,
        signing_key: SigningKey,
        mut base_url: Url,
        settings: DispatchSettings,
    ) -> Self {
        // Url::join drops the last path segment unless it ends with a slash
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            transport,
            signing_key,
            base_url,
            settings,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Personal link letting `email` deactivate its subscription
    pub fn unsubscribe_url(&self, email: &EmailAddress) -> anyhow::Result<Url> {
        let token = UnsubscribeToken::issue(&self.signing_key, email, self.settings.token_validity)?;
        let url = self
            .base_url
            .join(&format!("subscriptions/unsubscribe/{}", token))?;
        Ok(url)
    }

    /// Build the email a single recipient receives
    pub fn personalize(
        &self,
        recipient: &EmailAddress,
        subject: &str,
        html: &str,
        values: &FieldValues,
    ) -> anyhow::Result<Email> {
        let unsubscribe_url = self.unsubscribe_url(recipient)?;

        let mut values = values.clone();
        values.insert(UNSUBSCRIBE_URL_FIELD.to_string(), unsubscribe_url.to_string().into());
        let mut html_body = template::substitute(html, &values);
        if !template::keeps_placeholder(html, &values, UNSUBSCRIBE_URL_FIELD) {
            html_body = append_unsubscribe_footer(&html_body, unsubscribe_url.as_str());
        }
        let text_body = html_to_text(&html_body);

        Ok(Email {
            recipient: recipient.clone(),
            subject: subject.to_string(),
            html_body,
            text_body,
        })
    }

    #[tracing::instrument(
        name = "Dispatch newsletter",
        skip(self, job),
        fields(subject = %job.subject, recipients = job.recipients.len())
    )]
    pub async fn send(&self, job: &DispatchJob) -> Result<DispatchResult> {
        if job.subject.trim().is_empty() {
            return Err(Error::validation("Newsletter subject cannot be empty"));
        }
        // Rendered once up front so unresolved fields are reported once, not per recipient
        if template::render(&job.html, &job.values).trim().is_empty() {
            return Err(Error::validation("Newsletter body cannot be empty"));
        }

        let batch_size = self.settings.batch_size.max(1);
        let mut outcomes = Vec::with_capacity(job.recipients.len());

        for (idx, batch) in job.recipients.chunks(batch_size).enumerate() {
            if idx > 0 {
                tracing::debug!(
                    "Pausing {:?} before batch {}",
                    self.settings.batch_delay,
                    idx + 1
                );
                tokio::time::sleep(self.settings.batch_delay).await;
            }
            for recipient in batch {
                outcomes.push(self.send_one(recipient, job).await);
            }
        }

        let result = DispatchResult::from(outcomes);
        tracing::info!(
            sent = result.sent,
            failed = result.failed,
            "Newsletter dispatch finished"
        );
        Ok(result)
    }

    async fn send_one(&self, recipient: &EmailAddress, job: &DispatchJob) -> RecipientOutcome {
        let status = match self.personalize(recipient, &job.subject, &job.html, &job.values) {
            Ok(email) => match self.transport.send(&email).await {
                Ok(delivery) => DeliveryStatus::Sent {
                    message_id: delivery.message_id,
                },
                Err(error) => {
                    tracing::warn!(
                        error.cause_chain = ?error,
                        "Failed to send newsletter to {}",
                        recipient
                    );
                    DeliveryStatus::Failed {
                        reason: error.to_string(),
                    }
                }
            },
            Err(error) => {
                tracing::error!(
                    error.cause_chain = ?error,
                    "Failed to personalize newsletter for {}",
                    recipient
                );
                DeliveryStatus::Failed {
                    reason: format!("Failed to build unsubscribe link: {}", error),
                }
            }
        };

        RecipientOutcome {
            recipient: recipient.to_string(),
            status,
        }
    }
}

/// A newsletter ready for dispatch and who asked for it to be sent
#[derive(Debug, Clone)]
pub struct Publication {
    pub subject: String,
    pub html: String,
    /// Final field values, defaults and coercion already applied
    pub values: FieldValues,
    pub template_id: Option<Uuid>,
    pub author_id: Uuid,
    pub author_email: String,
}

/// Send a publication to every subscription active at the time of the call,
/// then record a `newsletter_sent` activity with the delivery counts.
#[tracing::instrument(
    name = "Publish newsletter",
    skip_all,
    fields(subject = %publication.subject, author = %publication.author_email)
)]
pub async fn publish<T, S, A>(
    dispatcher: &Dispatcher<T>,
    directory: &S,
    activity_store: &A,
    publication: Publication,
) -> Result<DispatchResult>
where
    T: EmailTransport,
    S: SubscriptionStore + ?Sized,
    A: ActivityStore + ?Sized,
{
    let recipients = subscriptions::active_recipients(directory).await?;
    let job = DispatchJob {
        subject: publication.subject,
        html: publication.html,
        values: publication.values,
        recipients,
    };
    let result = dispatcher.send(&job).await?;

    let mut entry = NewActivity::new(ActivityAction::NewsletterSent)
        .by_user(publication.author_id, publication.author_email)
        .details(format!(
            "\"{}\": sent {}, failed {}",
            job.subject, result.sent, result.failed
        ));
    if let Some(template_id) = publication.template_id {
        entry = entry.entity("template", template_id);
    }
    activity::record(activity_store, entry).await;

    Ok(result)
}

/// Standard unsubscribe paragraph for bodies that carry no `{{unsubscribe_url}}`
fn append_unsubscribe_footer(body: &str, url: &str) -> String {
    let footer = format!(
        r#"<p style="font-size:12px;color:#888888;text-align:center">If you no longer wish to receive these emails, you can <a href="{}">unsubscribe here</a>.</p>"#,
        url
    );
    match BODY_CLOSE_REGEX.find_iter(body).last() {
        Some(close) => format!("{}{}{}", &body[..close.start()], footer, &body[close.start()..]),
        None => format!("{}{}", body, footer),
    }
}

/// Plain-text alternative of an HTML email, keeping link targets visible
fn html_to_text(html: &str) -> String {
    let text = STYLE_REGEX.replace_all(html, "");
    let text = LINK_REGEX.replace_all(&text, "$2 ($1)");
    let text = BREAK_REGEX.replace_all(&text, "\n");
    let text = TAG_REGEX.replace_all(&text, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&");
    let text: String = text
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");

    BLANK_LINES_REGEX
        .replace_all(text.trim(), "\n\n")
        .into_owned()
}
