use chrono::{DateTime, Utc};

use sqlx::types::Json;
use sqlx::PgPool;

use uuid::Uuid;

use crate::model::{EditableField, NewTemplate, Template};

/// Template store, documents are always written whole
#[async_trait::async_trait]
pub trait TemplateStore: Send + Sync {
    async fn insert(&self, new_template: &NewTemplate) -> sqlx::Result<Template>;

    /// Replace the full document, `None` if no template has this id
    async fn replace(&self, id: Uuid, template: &NewTemplate) -> sqlx::Result<Option<Template>>;

    async fn fetch_by_id(&self, id: Uuid) -> sqlx::Result<Option<Template>>;

    async fn fetch_all(&self) -> sqlx::Result<Vec<Template>>;

    /// Returns whether a template was deleted
    async fn delete(&self, id: Uuid) -> sqlx::Result<bool>;
}

#[derive(Debug, sqlx::FromRow)]
struct TemplateRow {
    id: Uuid,
    name: String,
    description: String,
    html_content: String,
    editable_fields: Json<Vec<EditableField>>,
    kind: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TemplateRow> for Template {
    type Error = sqlx::Error;

    fn try_from(row: TemplateRow) -> sqlx::Result<Self> {
        let kind = row
            .kind
            .parse()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            html_content: row.html_content,
            editable_fields: row.editable_fields.0,
            kind,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Postgres Template Repository
#[derive(Debug, Clone)]
pub struct PgTemplateRepo {
    pool: PgPool,
}

impl PgTemplateRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TemplateStore for PgTemplateRepo {
    #[tracing::instrument(name = "Insert template", skip(self, new_template), fields(name = %new_template.name))]
    async fn insert(&self, new_template: &NewTemplate) -> sqlx::Result<Template> {
        sqlx::query_as::<_, TemplateRow>(
            "insert into newsletter_templates(name, description, html_content, editable_fields, kind) \
             values ($1, $2, $3, $4, $5) returning *",
        )
        .bind(&new_template.name)
        .bind(&new_template.description)
        .bind(&new_template.html_content)
        .bind(Json(&new_template.editable_fields))
        .bind(new_template.kind.to_string())
        .fetch_one(&self.pool)
        .await?
        .try_into()
    }

    #[tracing::instrument(name = "Replace template", skip(self, template))]
    async fn replace(&self, id: Uuid, template: &NewTemplate) -> sqlx::Result<Option<Template>> {
        sqlx::query_as::<_, TemplateRow>(
            "update newsletter_templates \
             set name = $2, description = $3, html_content = $4, editable_fields = $5, kind = $6, updated_at = now() \
             where id = $1 returning *",
        )
        .bind(id)
        .bind(&template.name)
        .bind(&template.description)
        .bind(&template.html_content)
        .bind(Json(&template.editable_fields))
        .bind(template.kind.to_string())
        .fetch_optional(&self.pool)
        .await?
        .map(Template::try_from)
        .transpose()
    }

    #[tracing::instrument(name = "Fetch template by id", skip(self))]
    async fn fetch_by_id(&self, id: Uuid) -> sqlx::Result<Option<Template>> {
        sqlx::query_as::<_, TemplateRow>("select * from newsletter_templates where id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Template::try_from)
            .transpose()
    }

    #[tracing::instrument(name = "Fetch all templates", skip(self))]
    async fn fetch_all(&self) -> sqlx::Result<Vec<Template>> {
        sqlx::query_as::<_, TemplateRow>("select * from newsletter_templates order by name")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Template::try_from)
            .collect()
    }

    #[tracing::instrument(name = "Delete template", skip(self))]
    async fn delete(&self, id: Uuid) -> sqlx::Result<bool> {
        let result = sqlx::query("delete from newsletter_templates where id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
