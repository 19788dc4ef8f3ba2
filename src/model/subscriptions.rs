use uuid::Uuid;

use chrono::{DateTime, Utc};

use serde::Serialize;

use crate::domain::{EmailAddress, PersonName};
use crate::error::{Error, Result};

/// New Subscription request
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub email: EmailAddress,
    pub name: Option<PersonName>,
}

/// Stored Subscription record, at most one per normalized email
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn status(&self) -> SubscriptionStatus {
        SubscriptionStatus::from_active(self.active)
    }
}

/// Both states are re-enterable, there is no terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubscriptionStatus {
    Active,
    Inactive,
}

/// What a subscribe request does to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeTransition {
    /// No record exists yet
    Create,
    /// Flip an inactive record back to active
    Reactivate,
}

impl SubscriptionStatus {
    pub fn from_active(active: bool) -> Self {
        if active {
            Self::Active
        } else {
            Self::Inactive
        }
    }

    pub fn is_active(self) -> bool {
        self == Self::Active
    }

    /// Transition taken by `subscribe` given the current record state, if any
    pub fn on_subscribe(current: Option<Self>) -> Result<SubscribeTransition> {
        match current {
            None => Ok(SubscribeTransition::Create),
            Some(Self::Inactive) => Ok(SubscribeTransition::Reactivate),
            Some(Self::Active) => Err(Error::AlreadySubscribed),
        }
    }

    /// State after `unsubscribe`, unconditionally inactive
    pub fn on_unsubscribe(self) -> Self {
        Self::Inactive
    }
}
