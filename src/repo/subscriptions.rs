use uuid::Uuid;

use sqlx::PgPool;

use crate::domain::{EmailAddress, PersonName};
use crate::model::{NewSubscription, Subscription};

/// Subscription store, must be implemented for each backing store used.
/// NOTE: Intended to facilitate easier testing/mocking
#[async_trait::async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Look up the single record for a normalized email
    async fn find_by_email(&self, email: &EmailAddress) -> sqlx::Result<Option<Subscription>>;

    /// Insert a new active subscription.
    /// Returns `None` if a record for the email already exists.
    async fn insert(&self, new_subscription: &NewSubscription)
        -> sqlx::Result<Option<Subscription>>;

    /// Toggle the active flag, optionally refreshing the display name
    async fn set_active(
        &self,
        id: Uuid,
        active: bool,
        name: Option<&PersonName>,
    ) -> sqlx::Result<Subscription>;

    /// Every subscription, newest first
    async fn fetch_all(&self) -> sqlx::Result<Vec<Subscription>>;

    /// Emails of all active subscriptions at the time of the call
    async fn fetch_active_emails(&self) -> sqlx::Result<Vec<String>>;
}

/// Postgres Subscription Repository
#[derive(Debug, Clone)]
pub struct PgSubscriptionRepo {
    pool: PgPool,
}

impl PgSubscriptionRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SubscriptionStore for PgSubscriptionRepo {
    #[tracing::instrument(name = "Find subscription by email", skip(self))]
    async fn find_by_email(&self, email: &EmailAddress) -> sqlx::Result<Option<Subscription>> {
        sqlx::query_as::<_, Subscription>("select * from subscriptions where email = $1")
            .bind(email.as_ref())
            .fetch_optional(&self.pool)
            .await
    }

    #[tracing::instrument(name = "Insert subscription", skip(self))]
    async fn insert(
        &self,
        new_subscription: &NewSubscription,
    ) -> sqlx::Result<Option<Subscription>> {
        sqlx::query_as::<_, Subscription>(
            "insert into subscriptions(email, name, active) values ($1, $2, true) \
             on conflict (email) do nothing returning *",
        )
        .bind(new_subscription.email.as_ref())
        .bind(new_subscription.name.as_ref().map(|name| name.as_ref()))
        .fetch_optional(&self.pool)
        .await
    }

    #[tracing::instrument(name = "Set subscription active flag", skip(self))]
    async fn set_active(
        &self,
        id: Uuid,
        active: bool,
        name: Option<&PersonName>,
    ) -> sqlx::Result<Subscription> {
        sqlx::query_as::<_, Subscription>(
            "update subscriptions set active = $2, name = coalesce($3, name), updated_at = now() \
             where id = $1 returning *",
        )
        .bind(id)
        .bind(active)
        .bind(name.map(|name| name.as_ref()))
        .fetch_one(&self.pool)
        .await
    }

    #[tracing::instrument(name = "Fetch all subscriptions", skip(self))]
    async fn fetch_all(&self) -> sqlx::Result<Vec<Subscription>> {
        sqlx::query_as::<_, Subscription>("select * from subscriptions order by created_at desc")
            .fetch_all(&self.pool)
            .await
    }

    #[tracing::instrument(name = "Fetch active subscription emails", skip(self))]
    async fn fetch_active_emails(&self) -> sqlx::Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "select email from subscriptions where active order by created_at",
        )
        .fetch_all(&self.pool)
        .await
    }
}
