use secrecy::Secret;

use sqlx::PgPool;

use uuid::Uuid;

use crate::domain::EmailAddress;

#[derive(Debug)]
pub struct NewUser {
    pub email: EmailAddress,
    pub password_hash: String,
}

#[derive(Debug)]
pub struct UserCredentials {
    pub id: Uuid,
    pub email: String,
    pub password_hash: Secret<String>,
}

#[derive(sqlx::FromRow)]
struct CredentialsRow {
    id: Uuid,
    email: String,
    password_hash: String,
}

impl From<CredentialsRow> for UserCredentials {
    fn from(row: CredentialsRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            password_hash: Secret::new(row.password_hash),
        }
    }
}

/// Administrators allowed into the back office
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, new_user: &NewUser) -> sqlx::Result<Uuid>;

    async fn fetch_credentials_by_email(
        &self,
        email: &EmailAddress,
    ) -> sqlx::Result<Option<UserCredentials>>;
}

#[derive(Debug, Clone)]
pub struct PgUsersRepo {
    pool: PgPool,
}

impl PgUsersRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserStore for PgUsersRepo {
    #[tracing::instrument("Insert a new user record", skip(self, new_user))]
    async fn insert(&self, new_user: &NewUser) -> sqlx::Result<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "insert into users(email, password_hash) values ($1, $2) returning id",
        )
        .bind(new_user.email.as_ref())
        .bind(&new_user.password_hash)
        .fetch_one(&self.pool)
        .await
    }

    #[tracing::instrument("Fetch user credentials", skip(self))]
    async fn fetch_credentials_by_email(
        &self,
        email: &EmailAddress,
    ) -> sqlx::Result<Option<UserCredentials>> {
        let row = sqlx::query_as::<_, CredentialsRow>(
            "select id, email, password_hash from users where email = $1",
        )
        .bind(email.as_ref())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserCredentials::from))
    }
}
