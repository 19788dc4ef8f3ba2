use actix_web::dev::HttpServiceFactory;
use actix_web::{post, web, Responder};

use serde::Deserialize;

use uuid::Uuid;

use crate::auth::Administrator;
use crate::client::EmailClient;
use crate::error::Error;
use crate::repo::{PgActivityRepo, PgSubscriptionRepo, PgTemplateRepo, TemplateStore};
use crate::service::{self, Dispatcher, Publication};
use crate::template::{self, FieldValues};

use super::RestResult;

/// Either a stored template with field values, or ready-made HTML
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishBody {
    subject: String,
    #[serde(default)]
    template_id: Option<Uuid>,
    #[serde(default)]
    html: Option<String>,
    #[serde(default)]
    values: FieldValues,
}

impl PublishBody {
    /// Markup to send and the final values to fill it with
    async fn content<S>(&self, templates: &S) -> Result<(String, FieldValues), Error>
    where
        S: TemplateStore + ?Sized,
    {
        match (&self.template_id, &self.html) {
            (Some(id), _) => {
                let template = templates
                    .fetch_by_id(*id)
                    .await?
                    .ok_or_else(|| Error::not_found("Template"))?;
                let values = template.resolve_values(&self.values);
                Ok((template.html_content, values))
            }
            (None, Some(html)) => {
                let values = template::coerce_conditionals(html, &self.values)?;
                Ok((html.clone(), values))
            }
            (None, None) => Err(Error::validation(
                "Either a template or an HTML body is required",
            )),
        }
    }
}

/// Render and send a newsletter to every active subscription.
/// Individual delivery failures are reported in the body, not as an error status.
#[tracing::instrument(
    name = "Publish a newsletter",
    skip(body, templates, directory, activity_store, dispatcher),
    fields(subject = %body.subject)
)]
#[post("")]
async fn publish(
    admin: Administrator,
    body: web::Json<PublishBody>,
    templates: web::Data<PgTemplateRepo>,
    directory: web::Data<PgSubscriptionRepo>,
    activity_store: web::Data<PgActivityRepo>,
    dispatcher: web::Data<Dispatcher<EmailClient>>,
) -> RestResult<impl Responder> {
    let body = body.into_inner();
    let (html, values) = body.content(templates.get_ref()).await?;

    let publication = Publication {
        subject: body.subject,
        html,
        values,
        template_id: body.template_id,
        author_id: admin.id,
        author_email: admin.email,
    };
    let result = service::publish(
        dispatcher.get_ref(),
        directory.get_ref(),
        activity_store.get_ref(),
        publication,
    )
    .await?;

    Ok(web::Json(result))
}

/// Newsletter endpoints
pub fn scope() -> impl HttpServiceFactory {
    web::scope("/newsletters").service(publish)
}
