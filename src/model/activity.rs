use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use serde::{Deserialize, Serialize};

use uuid::Uuid;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    NewsletterSent,
    Subscribed,
    Resubscribed,
    Unsubscribed,
    TemplateCreated,
    TemplateUpdated,
    TemplateDeleted,
}

impl AsRef<str> for ActivityAction {
    fn as_ref(&self) -> &str {
        match self {
            Self::NewsletterSent => "newsletter_sent",
            Self::Subscribed => "subscribed",
            Self::Resubscribed => "resubscribed",
            Self::Unsubscribed => "unsubscribed",
            Self::TemplateCreated => "template_created",
            Self::TemplateUpdated => "template_updated",
            Self::TemplateDeleted => "template_deleted",
        }
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl FromStr for ActivityAction {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let action = match value {
            "newsletter_sent" => Self::NewsletterSent,
            "subscribed" => Self::Subscribed,
            "resubscribed" => Self::Resubscribed,
            "unsubscribed" => Self::Unsubscribed,
            "template_created" => Self::TemplateCreated,
            "template_updated" => Self::TemplateUpdated,
            "template_deleted" => Self::TemplateDeleted,
            other => {
                return Err(Error::validation(format!(
                    "{} is not a known activity",
                    other
                )))
            }
        };
        Ok(action)
    }
}

/// Audit entry about to be appended
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub user_id: Option<Uuid>,
    pub user_email: Option<String>,
    pub action: ActivityAction,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub details: Option<String>,
}

impl NewActivity {
    pub fn new(action: ActivityAction) -> Self {
        Self {
            user_id: None,
            user_email: None,
            action,
            entity_type: None,
            entity_id: None,
            details: None,
        }
    }

    pub fn by_user(mut self, id: Uuid, email: impl Into<String>) -> Self {
        self.user_id = Some(id);
        self.user_email = Some(email.into());
        self
    }

    /// Attribute the activity to someone without an account, e.g. a subscriber
    pub fn by_email(mut self, email: impl Into<String>) -> Self {
        self.user_email = Some(email.into());
        self
    }

    pub fn entity(mut self, entity_type: impl Into<String>, entity_id: impl ToString) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.to_string());
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Stored, append-only audit entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub user_email: Option<String>,
    pub action: ActivityAction,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}
