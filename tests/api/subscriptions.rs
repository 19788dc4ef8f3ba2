use reqwest::StatusCode;

use sqlx::PgPool;

use wiremock::matchers::*;
use wiremock::{Mock, ResponseTemplate};

use parish_newsletter::crypto::{Token, UnsubscribeToken};

use crate::helpers::{NewSubscriber, TestApp};

async fn active_flag(pool: &PgPool, email: &str) -> bool {
    sqlx::query_scalar::<_, bool>("select active from subscriptions where email = $1")
        .bind(email)
        .fetch_one(pool)
        .await
        .expect("Failed to fetch subscription")
}

fn subscriber(email: &str) -> NewSubscriber {
    NewSubscriber {
        name: Some("Test Subscriber".into()),
        email: Some(email.into()),
    }
}

#[sqlx::test]
async fn subscribe_creates_an_active_record(pool: PgPool) -> sqlx::Result<()> {
    let app = TestApp::spawn(&pool).await;

    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let res = app
        .subscription_create(&subscriber("Test@Test.com"))
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::CREATED, res.status());
    assert!(active_flag(&pool, "test@test.com").await);

    Ok(())
}

#[sqlx::test]
async fn subscribe_succeeds_when_welcome_email_fails(pool: PgPool) -> sqlx::Result<()> {
    let app = TestApp::spawn(&pool).await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .mount(&app.email_server)
        .await;

    let res = app
        .subscription_create(&subscriber("test@test.com"))
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::CREATED, res.status());

    Ok(())
}

#[sqlx::test]
async fn subscribe_rejects_bad_input(pool: PgPool) -> sqlx::Result<()> {
    let app = TestApp::spawn(&pool).await;

    let test_cases = vec![
        ("missing email", NewSubscriber { name: Some("Name".into()), email: None }),
        ("malformed email", subscriber("bad email address")),
        (
            "malformed name",
            NewSubscriber {
                name: Some("<script>".into()),
                email: Some("test@test.com".into()),
            },
        ),
    ];

    for (desc, new_subscriber) in test_cases {
        let res = app
            .subscription_create(&new_subscriber)
            .await
            .expect("Failed to execute request");

        assert_eq!(StatusCode::BAD_REQUEST, res.status(), "{}", desc);
    }

    Ok(())
}

#[sqlx::test]
async fn subscribing_twice_is_a_conflict(pool: PgPool) -> sqlx::Result<()> {
    let app = TestApp::spawn(&pool).await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .mount(&app.email_server)
        .await;

    app.subscription_create(&subscriber("test@test.com"))
        .await
        .expect("Failed to execute request");
    let res = app
        .subscription_create(&subscriber("TEST@test.com"))
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::CONFLICT, res.status());
    assert_eq!(
        "This email is already subscribed.",
        res.text().await.expect("Failed to read body")
    );

    Ok(())
}

#[sqlx::test]
async fn welcome_link_unsubscribes_and_resubscribe_reactivates(pool: PgPool) -> sqlx::Result<()> {
    let app = TestApp::spawn(&pool).await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .mount(&app.email_server)
        .await;

    app.subscription_create(&subscriber("test@test.com"))
        .await
        .expect("Failed to execute request");

    let links = app.sent_unsubscribe_links().await;
    assert_eq!(links.len(), 1);

    let res = app
        .client
        .get(links[0].clone())
        .send()
        .await
        .expect("Failed to follow unsubscribe link");
    assert_eq!(StatusCode::OK, res.status());
    assert!(!active_flag(&pool, "test@test.com").await);

    // Following the link again changes nothing
    let res = app
        .client
        .get(links[0].clone())
        .send()
        .await
        .expect("Failed to follow unsubscribe link");
    assert_eq!(StatusCode::OK, res.status());

    let res = app
        .subscription_create(&subscriber("test@test.com"))
        .await
        .expect("Failed to execute request");
    assert_eq!(StatusCode::OK, res.status());

    let count = sqlx::query_scalar::<_, i64>("select count(*) from subscriptions")
        .fetch_one(&pool)
        .await?;
    assert_eq!(count, 1);
    assert!(active_flag(&pool, "test@test.com").await);

    Ok(())
}

#[sqlx::test]
async fn invalid_tokens_are_unauthorized(pool: PgPool) -> sqlx::Result<()> {
    let app = TestApp::spawn(&pool).await;

    let email = "test@test.com".parse().unwrap();
    let expired = UnsubscribeToken::issue(&app.signing_key, &email, chrono::Duration::seconds(-1))
        .expect("Failed to sign token");
    let wrong_purpose = Token::builder("test@test.com")
        .purpose("confirm")
        .sign(app.signing_key.as_ref())
        .expect("Failed to sign token");

    for token in [expired.to_string(), wrong_purpose.to_string(), "garbage".into()] {
        let res = app.unsubscribe(&token).await.expect("Failed to execute request");

        assert_eq!(StatusCode::UNAUTHORIZED, res.status());
        assert_eq!(
            "This link is invalid or has expired.",
            res.text().await.expect("Failed to read body")
        );
    }

    Ok(())
}

#[sqlx::test]
async fn unsubscribing_an_unknown_email_is_not_found(pool: PgPool) -> sqlx::Result<()> {
    let app = TestApp::spawn(&pool).await;

    let email = "ghost@test.com".parse().unwrap();
    let token = UnsubscribeToken::issue(&app.signing_key, &email, UnsubscribeToken::default_validity())
        .expect("Failed to sign token");

    let res = app
        .unsubscribe(token.as_ref())
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::NOT_FOUND, res.status());

    Ok(())
}
