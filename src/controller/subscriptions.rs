use actix_web::dev::HttpServiceFactory;
use actix_web::http::header::ContentType;
use actix_web::{get, post, web, HttpResponse, Responder};

use serde::Deserialize;

use crate::auth::Administrator;
use crate::client::{EmailClient, EmailTransport};
use crate::crypto::SigningKey;
use crate::error::Error;
use crate::model::{NewSubscription, Subscription};
use crate::repo::{PgActivityRepo, PgSubscriptionRepo, SubscriptionStore};
use crate::service::{subscriptions, Dispatcher, SubscribeOutcome};
use crate::template::FieldValues;

use super::RestResult;

const WELCOME_SUBJECT: &str = "Welcome to the parish newsletter";
const WELCOME_HTML: &str = "<html><body><p>{{greeting}}</p><p>Thank you for subscribing to our parish newsletter. \
     You will receive news about Mass times, events and announcements.</p>\
     <p>Changed your mind? <a href=\"{{unsubscribe_url}}\">Unsubscribe</a>.</p></body></html>";

/// Form deserialization wrapper for parsing new subscriptions
#[derive(Debug, Deserialize)]
pub struct SubscribeForm {
    email: String,
    #[serde(default)]
    name: Option<String>,
}

impl TryFrom<SubscribeForm> for NewSubscription {
    type Error = Error;

    fn try_from(form: SubscribeForm) -> Result<Self, Self::Error> {
        let email = form.email.parse()?;
        let name = match form.name {
            Some(name) if !name.trim().is_empty() => Some(name.parse()?),
            _ => None,
        };

        Ok(Self { email, name })
    }
}

/// Subscribe from the public website form
#[tracing::instrument(
    name = "Create a new subscriber",
    skip(form, store, activity, dispatcher),
    fields(email = %form.email)
)]
#[post("")]
async fn create(
    form: web::Form<SubscribeForm>,
    store: web::Data<PgSubscriptionRepo>,
    activity: web::Data<PgActivityRepo>,
    dispatcher: web::Data<Dispatcher<EmailClient>>,
) -> RestResult<impl Responder> {
    let new_subscription = NewSubscription::try_from(form.into_inner())?;

    let outcome =
        subscriptions::subscribe(store.get_ref(), activity.get_ref(), new_subscription).await?;

    send_welcome_email(dispatcher.get_ref(), outcome.subscription()).await;

    let res = match outcome {
        SubscribeOutcome::Created(subscription) => HttpResponse::Created().json(subscription),
        SubscribeOutcome::Reactivated(subscription) => HttpResponse::Ok().json(subscription),
    };
    Ok(res)
}

/// Target of the personal link carried by every newsletter
#[tracing::instrument(name = "Unsubscribe by token", skip_all)]
#[get("/unsubscribe/{token}")]
async fn unsubscribe(
    path: web::Path<(String,)>,
    store: web::Data<PgSubscriptionRepo>,
    activity: web::Data<PgActivityRepo>,
    signing_key: web::Data<SigningKey>,
) -> RestResult<impl Responder> {
    let (token,) = path.into_inner();

    let subscription = subscriptions::unsubscribe(
        store.get_ref(),
        activity.get_ref(),
        signing_key.get_ref(),
        &token,
    )
    .await?;

    Ok(HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(unsubscribed_page(&subscription)))
}

/// Every subscription, active or not, newest first
#[tracing::instrument(name = "List subscriptions", skip(store))]
#[get("")]
async fn list(
    _admin: Administrator,
    store: web::Data<PgSubscriptionRepo>,
) -> RestResult<impl Responder> {
    let subscriptions: Vec<Subscription> = store.fetch_all().await?;

    Ok(web::Json(subscriptions))
}

/// Best effort, the subscription stands even if the relay is down
async fn send_welcome_email<T: EmailTransport>(
    dispatcher: &Dispatcher<T>,
    subscription: &Subscription,
) {
    let recipient = match subscription.email.parse() {
        Ok(recipient) => recipient,
        Err(error) => {
            tracing::warn!(error.cause_chain = ?error, "Skipping welcome email");
            return;
        }
    };
    let greeting = match &subscription.name {
        Some(name) => format!("Dear {},", name),
        None => "Hello,".to_string(),
    };
    let values: FieldValues = [("greeting".to_string(), greeting.into())].into();

    let email = match dispatcher.personalize(&recipient, WELCOME_SUBJECT, WELCOME_HTML, &values) {
        Ok(email) => email,
        Err(error) => {
            tracing::error!(error.cause_chain = ?error, "Failed to build welcome email");
            return;
        }
    };
    if let Err(error) = dispatcher.transport().send(&email).await {
        tracing::warn!(error.cause_chain = ?error, "Failed to send welcome email");
    }
}

fn unsubscribed_page(subscription: &Subscription) -> String {
    format!(
        "<html><body><h1>You have been unsubscribed</h1>\
         <p>{} will no longer receive the parish newsletter. \
         You can subscribe again at any time from our website.</p></body></html>",
        subscription.email
    )
}

/// Public subscription endpoints
pub fn scope() -> impl HttpServiceFactory {
    web::scope("/subscriptions")
        .service(create)
        .service(unsubscribe)
}

/// Administrator view of the recipient directory
pub fn admin_scope() -> impl HttpServiceFactory {
    web::scope("/subscriptions").service(list)
}
