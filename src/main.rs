use std::net::TcpListener;

use anyhow::Context;

use parish_newsletter::client::EmailClient;
use parish_newsletter::crypto::SigningKey;
use parish_newsletter::service::Dispatcher;
use parish_newsletter::settings::Settings;
use parish_newsletter::{app, db, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = telemetry::create_subscriber("info", std::io::stdout);
    telemetry::set_subscriber(subscriber)?;

    let settings = Settings::load().context("Failed to load settings")?;

    let signing_key = SigningKey::new(settings.app.secret_key())?;

    let email_client = EmailClient::new(
        settings.email.sender()?,
        settings.email.api_timeout(),
        settings.email.api_base_url()?,
        settings.email.api_auth_token(),
    )?;
    let dispatcher = Dispatcher::new(
        email_client,
        signing_key.clone(),
        settings.app.base_url()?,
        settings.newsletter.dispatch(),
    );

    let pool = db::connect(&settings.database).await?;

    let listener = TcpListener::bind(settings.app.addr())?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    let result = app::run(listener, pool.clone(), signing_key, dispatcher)?
        .await
        .context("Failed to run app");

    pool.close().await;
    result
}
