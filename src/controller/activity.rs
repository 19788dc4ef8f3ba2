use actix_web::dev::HttpServiceFactory;
use actix_web::{get, web, Responder};

use serde::Deserialize;

use crate::auth::Administrator;
use crate::repo::{ActivityStore, PgActivityRepo};

use super::RestResult;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    limit: Option<i64>,
}

impl ActivityQuery {
    fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// Recent audit entries, newest first
#[tracing::instrument(name = "List activity", skip(store))]
#[get("")]
async fn recent(
    _admin: Administrator,
    query: web::Query<ActivityQuery>,
    store: web::Data<PgActivityRepo>,
) -> RestResult<impl Responder> {
    let records = store.fetch_recent(query.limit()).await?;

    Ok(web::Json(records))
}

/// Activity log endpoints
pub fn scope() -> impl HttpServiceFactory {
    web::scope("/activity").service(recent)
}
