use actix_web::dev::HttpServiceFactory;
use actix_web::http::header::ContentType;
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};

use serde::Deserialize;

use uuid::Uuid;

use crate::auth::Administrator;
use crate::error::Error;
use crate::model::{ActivityAction, NewActivity, NewTemplate};
use crate::repo::{PgActivityRepo, PgTemplateRepo, TemplateStore};
use crate::service::activity;
use crate::template::FieldValues;

use super::RestResult;

#[derive(Debug, Deserialize)]
pub struct PreviewBody {
    #[serde(default)]
    values: FieldValues,
}

#[tracing::instrument(name = "List templates", skip(store))]
#[get("")]
async fn list(_admin: Administrator, store: web::Data<PgTemplateRepo>) -> RestResult<impl Responder> {
    Ok(web::Json(store.fetch_all().await?))
}

#[tracing::instrument(name = "Create template", skip(store, activity_store, body))]
#[post("")]
async fn create(
    admin: Administrator,
    body: web::Json<NewTemplate>,
    store: web::Data<PgTemplateRepo>,
    activity_store: web::Data<PgActivityRepo>,
) -> RestResult<impl Responder> {
    let new_template = body.into_inner();
    new_template.validate()?;

    let template = store.insert(&new_template).await?;
    activity::record(
        activity_store.get_ref(),
        NewActivity::new(ActivityAction::TemplateCreated)
            .by_user(admin.id, admin.email)
            .entity("template", template.id)
            .details(template.name.clone()),
    )
    .await;

    Ok(HttpResponse::Created().json(template))
}

#[tracing::instrument(name = "Fetch template", skip(store))]
#[get("/{id}")]
async fn fetch(
    _admin: Administrator,
    path: web::Path<(Uuid,)>,
    store: web::Data<PgTemplateRepo>,
) -> RestResult<impl Responder> {
    let (id,) = path.into_inner();

    let template = store
        .fetch_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Template"))?;

    Ok(web::Json(template))
}

/// Full-document replacement, last write wins
#[tracing::instrument(name = "Replace template", skip(store, activity_store, body))]
#[put("/{id}")]
async fn replace(
    admin: Administrator,
    path: web::Path<(Uuid,)>,
    body: web::Json<NewTemplate>,
    store: web::Data<PgTemplateRepo>,
    activity_store: web::Data<PgActivityRepo>,
) -> RestResult<impl Responder> {
    let (id,) = path.into_inner();
    let replacement = body.into_inner();
    replacement.validate()?;

    let template = store
        .replace(id, &replacement)
        .await?
        .ok_or_else(|| Error::not_found("Template"))?;
    activity::record(
        activity_store.get_ref(),
        NewActivity::new(ActivityAction::TemplateUpdated)
            .by_user(admin.id, admin.email)
            .entity("template", template.id)
            .details(template.name.clone()),
    )
    .await;

    Ok(web::Json(template))
}

#[tracing::instrument(name = "Delete template", skip(store, activity_store))]
#[delete("/{id}")]
async fn remove(
    admin: Administrator,
    path: web::Path<(Uuid,)>,
    store: web::Data<PgTemplateRepo>,
    activity_store: web::Data<PgActivityRepo>,
) -> RestResult<impl Responder> {
    let (id,) = path.into_inner();

    if !store.delete(id).await? {
        return Err(Error::not_found("Template").into());
    }
    activity::record(
        activity_store.get_ref(),
        NewActivity::new(ActivityAction::TemplateDeleted)
            .by_user(admin.id, admin.email)
            .entity("template", id),
    )
    .await;

    Ok(HttpResponse::NoContent().finish())
}

/// Render a stored template with ad-hoc values, nothing is sent or saved
#[tracing::instrument(name = "Preview template", skip(store, body))]
#[post("/{id}/preview")]
async fn preview(
    _admin: Administrator,
    path: web::Path<(Uuid,)>,
    body: web::Json<PreviewBody>,
    store: web::Data<PgTemplateRepo>,
) -> RestResult<impl Responder> {
    let (id,) = path.into_inner();

    let template = store
        .fetch_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Template"))?;

    Ok(HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(template.render(&body.values)))
}

/// Template administration endpoints
pub fn scope() -> impl HttpServiceFactory {
    web::scope("/templates")
        .service(list)
        .service(create)
        .service(fetch)
        .service(replace)
        .service(remove)
        .service(preview)
}
