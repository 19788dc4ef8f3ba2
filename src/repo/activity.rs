use chrono::{DateTime, Utc};

use sqlx::PgPool;

use uuid::Uuid;

use crate::model::{ActivityRecord, NewActivity};

/// Append-only activity log
#[async_trait::async_trait]
pub trait ActivityStore: Send + Sync {
    async fn append(&self, activity: &NewActivity) -> sqlx::Result<ActivityRecord>;

    /// Most recent records first
    async fn fetch_recent(&self, limit: i64) -> sqlx::Result<Vec<ActivityRecord>>;
}

#[derive(Debug, sqlx::FromRow)]
struct ActivityRow {
    id: Uuid,
    user_id: Option<Uuid>,
    user_email: Option<String>,
    action: String,
    entity_type: Option<String>,
    entity_id: Option<String>,
    details: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ActivityRow> for ActivityRecord {
    type Error = sqlx::Error;

    fn try_from(row: ActivityRow) -> sqlx::Result<Self> {
        let action = row
            .action
            .parse()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            user_email: row.user_email,
            action,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            details: row.details,
            timestamp: row.created_at,
        })
    }
}

/// Postgres Activity Repository
#[derive(Debug, Clone)]
pub struct PgActivityRepo {
    pool: PgPool,
}

impl PgActivityRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ActivityStore for PgActivityRepo {
    #[tracing::instrument(name = "Append activity", skip(self))]
    async fn append(&self, activity: &NewActivity) -> sqlx::Result<ActivityRecord> {
        sqlx::query_as::<_, ActivityRow>(
            "insert into activity_log(user_id, user_email, action, entity_type, entity_id, details) \
             values ($1, $2, $3, $4, $5, $6) returning *",
        )
        .bind(activity.user_id)
        .bind(&activity.user_email)
        .bind(activity.action.to_string())
        .bind(&activity.entity_type)
        .bind(&activity.entity_id)
        .bind(&activity.details)
        .fetch_one(&self.pool)
        .await?
        .try_into()
    }

    #[tracing::instrument(name = "Fetch recent activity", skip(self))]
    async fn fetch_recent(&self, limit: i64) -> sqlx::Result<Vec<ActivityRecord>> {
        sqlx::query_as::<_, ActivityRow>(
            "select * from activity_log order by created_at desc limit $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(ActivityRecord::try_from)
        .collect()
    }
}
