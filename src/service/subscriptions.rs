use crate::crypto::{SigningKey, UnsubscribeToken};
use crate::domain::EmailAddress;
use crate::error::{Error, Result};
use crate::model::{
    ActivityAction, NewActivity, NewSubscription, SubscribeTransition, Subscription,
    SubscriptionStatus,
};
use crate::repo::{ActivityStore, SubscriptionStore};

use super::activity;

/// Result of a successful subscribe request
#[derive(Debug, Clone)]
pub enum SubscribeOutcome {
    Created(Subscription),
    Reactivated(Subscription),
}

impl SubscribeOutcome {
    pub fn subscription(&self) -> &Subscription {
        match self {
            Self::Created(subscription) | Self::Reactivated(subscription) => subscription,
        }
    }
}

/// Subscribe an email, creating its record or reactivating an inactive one.
/// An already active email is rejected.
#[tracing::instrument(name = "Subscribe", skip(store, activity_store))]
pub async fn subscribe<S, A>(
    store: &S,
    activity_store: &A,
    new_subscription: NewSubscription,
) -> Result<SubscribeOutcome>
where
    S: SubscriptionStore + ?Sized,
    A: ActivityStore + ?Sized,
{
    let current = store.find_by_email(&new_subscription.email).await?;
    let transition = SubscriptionStatus::on_subscribe(current.as_ref().map(Subscription::status))?;

    let (outcome, action) = match (transition, current) {
        (SubscribeTransition::Reactivate, Some(current)) => {
            let subscription = store
                .set_active(current.id, true, new_subscription.name.as_ref())
                .await?;
            (
                SubscribeOutcome::Reactivated(subscription),
                ActivityAction::Resubscribed,
            )
        }
        _ => {
            // A concurrent request may have created the record since the lookup
            let subscription = store
                .insert(&new_subscription)
                .await?
                .ok_or(Error::AlreadySubscribed)?;
            (
                SubscribeOutcome::Created(subscription),
                ActivityAction::Subscribed,
            )
        }
    };

    let subscription = outcome.subscription();
    activity::record(
        activity_store,
        NewActivity::new(action)
            .by_email(subscription.email.clone())
            .entity("subscription", subscription.id),
    )
    .await;

    Ok(outcome)
}

/// Deactivate the subscription named by an unsubscribe token.
/// Unsubscribing an inactive record succeeds without changing it.
#[tracing::instrument(name = "Unsubscribe", skip_all)]
pub async fn unsubscribe<S, A>(
    store: &S,
    activity_store: &A,
    signing_key: &SigningKey,
    token: &str,
) -> Result<Subscription>
where
    S: SubscriptionStore + ?Sized,
    A: ActivityStore + ?Sized,
{
    let email = UnsubscribeToken::verify(signing_key, token).map_err(|error| {
        tracing::info!(error.cause = %error, "Rejected unsubscribe token");
        Error::TokenInvalid(error)
    })?;

    let current = store
        .find_by_email(&email)
        .await?
        .ok_or_else(|| Error::not_found("Subscription"))?;

    if !current.status().is_active() {
        return Ok(current);
    }

    let next = current.status().on_unsubscribe();
    let subscription = store
        .set_active(current.id, next.is_active(), None)
        .await?;

    activity::record(
        activity_store,
        NewActivity::new(ActivityAction::Unsubscribed)
            .by_email(subscription.email.clone())
            .entity("subscription", subscription.id),
    )
    .await;

    Ok(subscription)
}

/// Snapshot of the emails that should receive a newsletter right now.
/// Stored emails that no longer parse are skipped.
#[tracing::instrument(name = "Fetch active recipients", skip(store))]
pub async fn active_recipients<S>(store: &S) -> Result<Vec<EmailAddress>>
where
    S: SubscriptionStore + ?Sized,
{
    let recipients = store
        .fetch_active_emails()
        .await?
        .into_iter()
        .filter_map(|email| match email.parse() {
            Ok(recipient) => Some(recipient),
            Err(error) => {
                tracing::warn!(
                    error.cause_chain = ?error,
                    "Skipping an active subscription with invalid email {}",
                    email
                );
                None
            }
        })
        .collect();

    Ok(recipients)
}
