use std::net::TcpListener;
use std::time::Duration;

use reqwest::{Client, Method, Response};

use secrecy::Secret;

use serde::Serialize;

use sqlx::PgPool;

use url::Url;

use uuid::Uuid;

use wiremock::MockServer;

use parish_newsletter::app;
use parish_newsletter::client::EmailClient;
use parish_newsletter::crypto::SigningKey;
use parish_newsletter::repo::{NewUser, PgUsersRepo, UserStore};
use parish_newsletter::service::{DispatchSettings, Dispatcher};

#[derive(Debug, Serialize)]
pub struct NewSubscriber {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

pub struct TestApp {
    pub addr: String,
    pub signing_key: SigningKey,

    pub client: Client,
    pub email_server: MockServer,
}

impl TestApp {
    pub async fn spawn(pool: &PgPool) -> Self {
        use rand::{distributions::Alphanumeric, Rng};

        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to listen on random port");
        let port = listener.local_addr().unwrap().port();

        let addr = format!("http://127.0.0.1:{}", port);

        let signing_key = {
            let rand_key: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(32)
                .map(char::from)
                .collect();

            SigningKey::new(&Secret::new(rand_key)).expect("Failed to create crypto signing key")
        };

        let email_server = MockServer::start().await;

        let email_client = {
            let sender = "test@test.com"
                .parse()
                .expect("Failed to parse sender email address");
            let api_base_url =
                Url::parse(&email_server.uri()).expect("Failed to parse mock server uri");
            let api_auth_token = Secret::new("TestAuthorization".into());
            let api_timeout = Duration::from_secs(2);

            EmailClient::new(sender, api_timeout, api_base_url, api_auth_token)
                .expect("Failed to create email client")
        };

        let dispatcher = Dispatcher::new(
            email_client,
            signing_key.clone(),
            Url::parse(&addr).expect("Failed to parse app address"),
            DispatchSettings {
                batch_size: 2,
                batch_delay: Duration::from_millis(10),
                ..DispatchSettings::default()
            },
        );

        let server = app::run(listener, pool.clone(), signing_key.clone(), dispatcher)
            .expect("Failed to spawn app instance");
        let _ = tokio::spawn(server);

        let client = Client::new();

        Self {
            addr,
            signing_key,
            client,
            email_server,
        }
    }

    pub fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", &self.addr, url);
        self.client.request(method, url)
    }

    pub fn authorized_request(
        &self,
        method: Method,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> reqwest::RequestBuilder {
        let req = self.request(method, url);
        if let Some(creds) = credentials {
            req.basic_auth(creds.username.clone(), Some(creds.password.clone()))
        } else {
            req
        }
    }

    pub async fn health_check(&self) -> reqwest::Result<Response> {
        self.request(Method::GET, "health_check").send().await
    }

    pub async fn subscription_create(
        &self,
        new_subscriber: &NewSubscriber,
    ) -> reqwest::Result<Response> {
        self.request(Method::POST, "subscriptions")
            .form(new_subscriber)
            .send()
            .await
    }

    pub async fn unsubscribe(&self, token: &str) -> reqwest::Result<Response> {
        self.request(Method::GET, &format!("subscriptions/unsubscribe/{}", token))
            .send()
            .await
    }

    pub async fn newsletter_publish<B: Serialize>(
        &self,
        credentials: Option<&Credentials>,
        body: &B,
    ) -> reqwest::Result<Response> {
        self.authorized_request(Method::POST, "admin/newsletters", credentials)
            .json(body)
            .send()
            .await
    }

    /// Unsubscribe links found in the HTML bodies the relay received, in order
    pub async fn sent_unsubscribe_links(&self) -> Vec<Url> {
        self.email_server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|req| {
                let body: serde_json::Value = serde_json::from_slice(&req.body).ok()?;
                let html = body["HtmlBody"].as_str()?.to_owned();
                linkify::LinkFinder::new()
                    .links(&html)
                    .filter(|l| *l.kind() == linkify::LinkKind::Url)
                    .find(|l| l.as_str().contains("/subscriptions/unsubscribe/"))
                    .and_then(|l| Url::parse(l.as_str()).ok())
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub password: String,
}

impl TestUser {
    pub async fn register(pool: &PgPool, email: &str, password: &str) -> Self {
        use argon2::password_hash::SaltString;
        use argon2::{Argon2, PasswordHasher};

        let salt = SaltString::generate(&mut rand::thread_rng());

        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .expect("Failed to hash user password")
            .to_string();

        let new_user = NewUser {
            email: email.parse().expect("Failed to parse email address"),
            password_hash,
        };

        let id = PgUsersRepo::new(pool.clone())
            .insert(&new_user)
            .await
            .expect("Failed to insert test user");

        Self {
            id,
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    pub async fn admin(pool: &PgPool) -> Self {
        Self::register(pool, "admin@parish.org", "correct horse battery staple").await
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.email.clone(),
            password: self.password.clone(),
        }
    }
}
