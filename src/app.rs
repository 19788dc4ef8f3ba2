use std::net::TcpListener;

use actix_web::dev::Server;
use actix_web::{get, HttpResponse, Responder};
use actix_web::{web, App, HttpServer};

use sqlx::PgPool;

use tracing_actix_web::TracingLogger;

use crate::client::EmailClient;
use crate::controller::{self, subscriptions};
use crate::crypto::SigningKey;
use crate::repo::{PgActivityRepo, PgSubscriptionRepo, PgTemplateRepo, PgUsersRepo};
use crate::service::Dispatcher;

/// Simple health-check endpoint
#[tracing::instrument(name = "Health check")]
#[get("/health_check")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().finish()
}

/// Run the application on a specified TCP listener
pub fn run(
    listener: TcpListener,
    pool: PgPool,
    signing_key: SigningKey,
    dispatcher: Dispatcher<EmailClient>,
) -> anyhow::Result<Server> {
    // Wrap application data, every repository shares the same pool
    let subscriptions_repo = web::Data::new(PgSubscriptionRepo::new(pool.clone()));
    let templates_repo = web::Data::new(PgTemplateRepo::new(pool.clone()));
    let activity_repo = web::Data::new(PgActivityRepo::new(pool.clone()));
    let users_repo = web::Data::new(PgUsersRepo::new(pool));
    let signing_key = web::Data::new(signing_key);
    let dispatcher = web::Data::new(dispatcher);

    // Start the server
    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(subscriptions_repo.clone())
            .app_data(templates_repo.clone())
            .app_data(activity_repo.clone())
            .app_data(users_repo.clone())
            .app_data(signing_key.clone())
            .app_data(dispatcher.clone())
            .service(health_check)
            .service(subscriptions::scope())
            .service(controller::admin_scope())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
